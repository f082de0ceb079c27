//! Human-pattern pacing.
//!
//! Every browser action the crawler performs is throttled through a `Pacer`
//! so automated traffic does not present uniform, bot-like timing. The
//! production implementation draws from a seedable RNG; tests inject a
//! zero-delay pacer and keep session logic unchanged.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    ]
});

/// Throughput/latency presets mimicking common consumer connections.
/// Values are bytes per second and milliseconds.
pub static NETWORK_PRESETS: Lazy<Vec<NetworkProfile>> = Lazy::new(|| {
    vec![
        NetworkProfile { label: "fast-3g", download_bps: 1_000_000.0, upload_bps: 500_000.0, latency_ms: 50.0 },
        NetworkProfile { label: "slow-3g", download_bps: 500_000.0, upload_bps: 250_000.0, latency_ms: 100.0 },
        NetworkProfile { label: "dsl", download_bps: 5_000_000.0, upload_bps: 2_500_000.0, latency_ms: 20.0 },
    ]
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkProfile {
    pub label: &'static str,
    pub download_bps: f64,
    pub upload_bps: f64,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollStep {
    /// Wheel distance in pixels.
    pub distance: f64,
    pub pause: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct PointerStep {
    pub x: f64,
    pub y: f64,
    pub pause: Duration,
}

/// Randomized timing and interaction policy.
pub trait Pacer: Send + Sync {
    /// Uniform duration in `[min_ms, max_ms]` milliseconds, inclusive.
    fn delay(&self, min_ms: u64, max_ms: u64) -> Duration;

    /// 2-6 scroll steps, 100-800px each, 300-1200ms pauses.
    fn scroll_plan(&self) -> Vec<ScrollStep>;

    /// 1-4 pointer moves, x in [100,800], y in [100,600], 100-500ms pauses.
    fn pointer_plan(&self) -> Vec<PointerStep>;

    fn user_agent(&self) -> &'static str;

    /// ~30% of sessions run under emulated network conditions.
    fn network_profile(&self) -> Option<NetworkProfile>;

    /// Randomized desktop viewport: width in [1200,1600], height in [800,1000].
    fn viewport(&self) -> (u32, u32);

    /// Uniform random permutation of `0..len`, used to de-fingerprint
    /// term/site execution order.
    fn shuffle_indices(&self, len: usize) -> Vec<usize>;
}

/// Production pacer backed by a seedable RNG.
pub struct HumanPacer {
    rng: Mutex<StdRng>,
}

impl HumanPacer {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Deterministic pacer for tests.
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl Default for HumanPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacer for HumanPacer {
    fn delay(&self, min_ms: u64, max_ms: u64) -> Duration {
        let ms = self.with_rng(|rng| rng.gen_range(min_ms..=max_ms.max(min_ms)));
        Duration::from_millis(ms)
    }

    fn scroll_plan(&self) -> Vec<ScrollStep> {
        self.with_rng(|rng| {
            let steps = rng.gen_range(2..=6);
            (0..steps)
                .map(|_| ScrollStep {
                    distance: rng.gen_range(100..=800) as f64,
                    pause: Duration::from_millis(rng.gen_range(300..=1200)),
                })
                .collect()
        })
    }

    fn pointer_plan(&self) -> Vec<PointerStep> {
        self.with_rng(|rng| {
            let steps = rng.gen_range(1..=4);
            (0..steps)
                .map(|_| PointerStep {
                    x: rng.gen_range(100..=800) as f64,
                    y: rng.gen_range(100..=600) as f64,
                    pause: Duration::from_millis(rng.gen_range(100..=500)),
                })
                .collect()
        })
    }

    fn user_agent(&self) -> &'static str {
        self.with_rng(|rng| USER_AGENTS.choose(rng).copied())
            .unwrap_or(USER_AGENTS[0])
    }

    fn network_profile(&self) -> Option<NetworkProfile> {
        self.with_rng(|rng| {
            if rng.gen_bool(0.3) {
                NETWORK_PRESETS.choose(rng).copied()
            } else {
                None
            }
        })
    }

    fn viewport(&self) -> (u32, u32) {
        self.with_rng(|rng| (rng.gen_range(1200..=1600), rng.gen_range(800..=1000)))
    }

    fn shuffle_indices(&self, len: usize) -> Vec<usize> {
        self.with_rng(|rng| {
            let mut indices: Vec<usize> = (0..len).collect();
            indices.shuffle(rng);
            indices
        })
    }
}

/// Zero-delay pacer so session and orchestrator tests run instantly.
#[cfg(test)]
pub struct InstantPacer;

#[cfg(test)]
impl Pacer for InstantPacer {
    fn delay(&self, _min_ms: u64, _max_ms: u64) -> Duration {
        Duration::ZERO
    }

    fn scroll_plan(&self) -> Vec<ScrollStep> {
        Vec::new()
    }

    fn pointer_plan(&self) -> Vec<PointerStep> {
        Vec::new()
    }

    fn user_agent(&self) -> &'static str {
        USER_AGENTS[0]
    }

    fn network_profile(&self) -> Option<NetworkProfile> {
        None
    }

    fn viewport(&self) -> (u32, u32) {
        (1280, 900)
    }

    fn shuffle_indices(&self, len: usize) -> Vec<usize> {
        (0..len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_bounds() {
        let pacer = HumanPacer::seeded(7);
        for _ in 0..200 {
            let d = pacer.delay(300, 1200);
            assert!(d >= Duration::from_millis(300) && d <= Duration::from_millis(1200));
        }
    }

    #[test]
    fn seeded_pacers_are_deterministic() {
        let a = HumanPacer::seeded(42);
        let b = HumanPacer::seeded(42);
        for _ in 0..20 {
            assert_eq!(a.delay(100, 5000), b.delay(100, 5000));
        }
        assert_eq!(a.shuffle_indices(10), b.shuffle_indices(10));
    }

    #[test]
    fn scroll_plan_stays_within_ranges() {
        let pacer = HumanPacer::seeded(1);
        for _ in 0..100 {
            let plan = pacer.scroll_plan();
            assert!((2..=6).contains(&plan.len()));
            for step in plan {
                assert!((100.0..=800.0).contains(&step.distance));
                assert!(step.pause >= Duration::from_millis(300));
                assert!(step.pause <= Duration::from_millis(1200));
            }
        }
    }

    #[test]
    fn pointer_plan_stays_within_ranges() {
        let pacer = HumanPacer::seeded(2);
        for _ in 0..100 {
            let plan = pacer.pointer_plan();
            assert!((1..=4).contains(&plan.len()));
            for step in plan {
                assert!((100.0..=800.0).contains(&step.x));
                assert!((100.0..=600.0).contains(&step.y));
                assert!(step.pause >= Duration::from_millis(100));
                assert!(step.pause <= Duration::from_millis(500));
            }
        }
    }

    #[test]
    fn user_agent_comes_from_pool() {
        let pacer = HumanPacer::seeded(3);
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&pacer.user_agent()));
        }
    }

    #[test]
    fn network_profile_is_preset_or_absent() {
        let pacer = HumanPacer::seeded(4);
        let mut saw_some = false;
        let mut saw_none = false;
        for _ in 0..300 {
            match pacer.network_profile() {
                Some(profile) => {
                    saw_some = true;
                    assert!(NETWORK_PRESETS.iter().any(|p| p.label == profile.label));
                }
                None => saw_none = true,
            }
        }
        assert!(saw_some && saw_none);
    }

    #[test]
    fn viewport_within_desktop_bounds() {
        let pacer = HumanPacer::seeded(5);
        for _ in 0..100 {
            let (w, h) = pacer.viewport();
            assert!((1200..=1600).contains(&w));
            assert!((800..=1000).contains(&h));
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let pacer = HumanPacer::seeded(6);
        let mut indices = pacer.shuffle_indices(25);
        indices.sort_unstable();
        assert_eq!(indices, (0..25).collect::<Vec<_>>());
    }
}

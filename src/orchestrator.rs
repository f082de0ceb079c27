//! Multi-site orchestration: fans search terms across sites, isolates
//! per-(term, site) failures and merges the results.
//!
//! Sessions run sequentially over the (term, site) cartesian product; the
//! randomized inter-term/inter-site delays are the throttle that keeps the
//! crawler from hammering a rate-limited board. The orchestrator itself
//! never fails: failures only show up as fewer records and log entries.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::models::{JobRecord, ScrapeRequest};
use crate::pacing::Pacer;
use crate::session::{self, SessionOutcome};
use crate::sites::{profile, SiteId, SiteProfile};

/// Seam between orchestration and the browser. Tests substitute a fake to
/// exercise fault isolation without Chrome.
#[async_trait]
pub trait SiteScraper: Send + Sync {
    async fn scrape(&self, req: &ScrapeRequest, profile: &'static SiteProfile) -> SessionOutcome;
}

/// Production scraper: one full page session per invocation.
pub struct BrowserScraper {
    pacer: Arc<dyn Pacer>,
}

impl BrowserScraper {
    pub fn new(pacer: Arc<dyn Pacer>) -> Self {
        Self { pacer }
    }
}

#[async_trait]
impl SiteScraper for BrowserScraper {
    async fn scrape(&self, req: &ScrapeRequest, profile: &'static SiteProfile) -> SessionOutcome {
        session::run(req, profile, self.pacer.as_ref()).await
    }
}

pub struct Orchestrator<S: SiteScraper> {
    scraper: S,
    pacer: Arc<dyn Pacer>,
}

impl Orchestrator<BrowserScraper> {
    pub fn with_browser(pacer: Arc<dyn Pacer>) -> Self {
        Self {
            scraper: BrowserScraper::new(pacer.clone()),
            pacer,
        }
    }
}

impl<S: SiteScraper> Orchestrator<S> {
    pub fn new(scraper: S, pacer: Arc<dyn Pacer>) -> Self {
        Self { scraper, pacer }
    }

    /// Scrape a single (site, term) pair. Configuration errors surface here;
    /// session failures do not — partial records are returned as-is.
    pub async fn scrape_site(&self, req: &ScrapeRequest) -> Vec<JobRecord> {
        let profile = profile(req.site);
        let outcome = self.scraper.scrape(req, profile).await;
        if let Some(err) = outcome.error {
            warn!(site = %req.site, term = %req.term, %err, "session failed, keeping partial records");
        }
        outcome.records
    }

    /// Fan `terms` across `sites` in randomized order and return the merged,
    /// deduplicated records. Empty input or all-failed sessions yield an
    /// empty list, never an error. Duplicate terms are executed as given;
    /// deduplication happens only on the merged output.
    pub async fn scrape_all(
        &self,
        terms: &[String],
        sites: &[SiteId],
        page_limit: usize,
        location: &str,
        deadline: Option<Instant>,
    ) -> Vec<JobRecord> {
        let term_order = self.pacer.shuffle_indices(terms.len());
        let site_order = self.pacer.shuffle_indices(sites.len());

        info!(
            terms = terms.len(),
            sites = sites.len(),
            page_limit,
            location,
            "starting multi-site scrape"
        );

        let mut all_jobs: Vec<JobRecord> = Vec::new();
        sleep(self.pacer.delay(2000, 5000)).await;

        'outer: for &ti in &term_order {
            let term = &terms[ti];
            sleep(self.pacer.delay(3000, 8000)).await;

            for &si in &site_order {
                let site = sites[si];
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    warn!("deadline reached, stopping scrape with partial results");
                    break 'outer;
                }
                sleep(self.pacer.delay(3500, 7000)).await;

                let mut req = ScrapeRequest::new(site, term.clone(), location, page_limit);
                req.deadline = deadline;

                let outcome = self.scraper.scrape(&req, profile(site)).await;
                let failed = outcome.error.is_some();
                match outcome.error {
                    Some(ScrapeError::Cancelled) => {
                        all_jobs.extend(outcome.records);
                        warn!("scrape cancelled, stopping with partial results");
                        break 'outer;
                    }
                    Some(err) => {
                        warn!(%site, %term, %err, "site scrape failed, continuing");
                    }
                    None => {
                        info!(%site, %term, count = outcome.records.len(), "site scrape finished");
                    }
                }
                all_jobs.extend(outcome.records);

                if failed {
                    // Extended recovery delay after a failure before moving on.
                    sleep(self.pacer.delay(5000, 10000)).await;
                } else {
                    sleep(self.pacer.delay(500, 1500)).await;
                }
            }
        }

        sleep(self.pacer.delay(1000, 2000)).await;

        let total = all_jobs.len();
        let unique = dedup_jobs(all_jobs);
        info!(total, unique = unique.len(), "scrape complete");
        unique
    }
}

/// Collapse records sharing a `title-company` key. Key order follows first
/// occurrence; the surviving representative is the last one processed.
/// Idempotent by construction.
pub fn dedup_jobs(jobs: Vec<JobRecord>) -> Vec<JobRecord> {
    use std::collections::HashMap;

    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, JobRecord> = HashMap::new();

    for job in jobs {
        let key = job.dedup_key();
        if !by_key.contains_key(&key) {
            order.push(key.clone());
        }
        by_key.insert(key, job);
    }

    order.into_iter().filter_map(|key| by_key.remove(&key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::InstantPacer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(title: &str, company: &str, url: &str) -> JobRecord {
        JobRecord::new(title.into(), company.into(), "desc".into(), url.into())
    }

    /// Fake scraper: fails for the configured site, yields canned records
    /// otherwise, and counts invocations.
    struct FakeScraper {
        failing_site: Option<SiteId>,
        calls: AtomicUsize,
    }

    impl FakeScraper {
        fn new(failing_site: Option<SiteId>) -> Self {
            Self { failing_site, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl SiteScraper for FakeScraper {
        async fn scrape(&self, req: &ScrapeRequest, _profile: &'static SiteProfile) -> SessionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(req.site) == self.failing_site {
                return SessionOutcome {
                    records: vec![],
                    error: Some(ScrapeError::Navigation(anyhow::anyhow!("tab crashed"))),
                };
            }
            SessionOutcome {
                records: vec![job(
                    &format!("{} Engineer", req.term),
                    req.site.as_str(),
                    &format!("https://{}.example/{}", req.site, req.term),
                )],
                error: None,
            }
        }
    }

    fn orchestrator(scraper: FakeScraper) -> Orchestrator<FakeScraper> {
        Orchestrator::new(scraper, Arc::new(InstantPacer))
    }

    #[test]
    fn dedup_keeps_one_record_per_key_last_write_wins() {
        let jobs = vec![
            job("Frontend Developer", "Acme", "https://a.example/1"),
            job("Backend Developer", "Globex", "https://b.example/1"),
            job("Frontend Developer", "Acme", "https://a.example/other"),
        ];
        let unique = dedup_jobs(jobs);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].dedup_key(), "Frontend Developer-Acme");
        // last-write-wins representative
        assert_eq!(unique[0].url, "https://a.example/other");
        assert_eq!(unique[1].dedup_key(), "Backend Developer-Globex");
    }

    #[test]
    fn dedup_is_idempotent() {
        let jobs = vec![
            job("A", "X", "u1"),
            job("B", "Y", "u2"),
            job("A", "X", "u3"),
            job("C", "Z", "u4"),
        ];
        let once = dedup_jobs(jobs);
        let keys: Vec<_> = once.iter().map(|j| j.dedup_key()).collect();
        let twice = dedup_jobs(once.clone());
        let keys_again: Vec<_> = twice.iter().map(|j| j.dedup_key()).collect();
        assert_eq!(keys, keys_again);
        assert_eq!(once.len(), twice.len());
    }

    #[tokio::test]
    async fn failing_site_does_not_poison_other_sites() {
        let orch = orchestrator(FakeScraper::new(Some(SiteId::Indeed)));
        let terms = vec!["Frontend Developer".to_string()];
        let sites = vec![SiteId::Seek, SiteId::Indeed, SiteId::Linkedin];

        let jobs = orch.scrape_all(&terms, &sites, 1, "Perth, WA", None).await;

        let companies: Vec<_> = jobs.iter().map(|j| j.company.as_str()).collect();
        assert!(companies.contains(&"seek"));
        assert!(companies.contains(&"linkedin"));
        assert!(!companies.contains(&"indeed"));
    }

    #[tokio::test]
    async fn duplicate_terms_run_twice_but_collapse_in_output() {
        let orch = orchestrator(FakeScraper::new(None));
        let terms = vec!["X".to_string(), "X".to_string()];
        let sites = vec![SiteId::Seek];

        let jobs = orch.scrape_all(&terms, &sites, 1, "Perth, WA", None).await;

        assert_eq!(orch.scraper.calls.load(Ordering::SeqCst), 2);
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let orch = orchestrator(FakeScraper::new(None));
        let jobs = orch.scrape_all(&[], &[SiteId::Seek], 1, "Perth, WA", None).await;
        assert!(jobs.is_empty());
        assert_eq!(orch.scraper.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_sites_failing_yields_empty_not_error() {
        let orch = orchestrator(FakeScraper::new(Some(SiteId::Seek)));
        let jobs = orch
            .scrape_all(&["rust".to_string()], &[SiteId::Seek], 1, "Perth, WA", None)
            .await;
        assert!(jobs.is_empty());
    }
}

//! Page session driver: one browser instance per (site, term) scrape.
//!
//! A session walks `Launching -> Configuring -> Navigating -> Extracting ->
//! Paginating -> Closed`. Every step is throttled through the injected
//! [`Pacer`], and the browser handle never outlives the session: it is
//! dropped on every exit path, success or failure.

use headless_chrome::protocol::cdp::types::Method;
use headless_chrome::protocol::cdp::Input::{
    DispatchMouseEvent, DispatchMouseEventPointer_TypeOption, DispatchMouseEventTypeOption,
};
use headless_chrome::{Browser, LaunchOptions};
use serde::Serialize;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::extract::extract_jobs;
use crate::models::{JobRecord, ScrapeRequest};
use crate::pacing::Pacer;
use crate::sites::{build_search_url, SiteProfile};

/// Navigation budget per page load. Job boards are heavy and slow; a generous
/// wait beats an eager timeout here.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(75);

/// `Network.emulateNetworkConditions` with just the four parameters the
/// throttle uses, sent as a raw command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmulateNetworkConditions {
    offline: bool,
    latency: f64,
    download_throughput: f64,
    upload_throughput: f64,
}

impl Method for EmulateNetworkConditions {
    const NAME: &'static str = "Network.emulateNetworkConditions";
    type ReturnObject = serde_json::Value;
}

/// What a session produced. Partial records survive a failed session; the
/// orchestrator decides what to do with the error.
pub struct SessionOutcome {
    pub records: Vec<JobRecord>,
    pub error: Option<ScrapeError>,
}

/// Run one full scrape session for a (site, term) pair.
///
/// Never panics and never loses already-extracted records: any error is
/// returned alongside whatever was collected before it happened.
pub async fn run(req: &ScrapeRequest, profile: &'static SiteProfile, pacer: &dyn Pacer) -> SessionOutcome {
    let mut records = Vec::new();
    let error = match drive(req, profile, pacer, &mut records).await {
        Ok(()) => None,
        Err(err) => {
            warn!(site = %req.site, term = %req.term, %err, "session terminated early");
            Some(err)
        }
    };
    SessionOutcome { records, error }
}

async fn drive(
    req: &ScrapeRequest,
    profile: &'static SiteProfile,
    pacer: &dyn Pacer,
    records: &mut Vec<JobRecord>,
) -> Result<(), ScrapeError> {
    // Initial randomized delay before any browser resource is acquired.
    pause(req, pacer.delay(1500, 5000)).await?;

    let (width, height) = pacer.viewport();
    let user_agent = pacer.user_agent();
    info!(site = %req.site, term = %req.term, width, height, user_agent, "launching session");

    let ua_arg = format!("--user-agent={}", user_agent);
    let args = vec![
        OsStr::new("--no-sandbox"),
        OsStr::new("--disable-setuid-sandbox"),
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--disable-infobars"),
        OsStr::new("--ignore-certificate-errors"),
        OsStr::new("--incognito"),
        OsStr::new("--headless=new"),
        OsStr::new(&ua_arg),
    ];

    let browser = Browser::new(LaunchOptions {
        headless: false, // new headless mode is passed via args
        window_size: Some((width, height)),
        args,
        ..Default::default()
    })?;

    let result = paginate(&browser, req, profile, pacer, records).await;

    // Randomized delay before release so closes don't form a burst pattern.
    if !matches!(result, Err(ScrapeError::Cancelled)) {
        sleep(pacer.delay(1000, 3000)).await;
    }
    drop(browser);

    result
}

async fn paginate(
    browser: &Browser,
    req: &ScrapeRequest,
    profile: &'static SiteProfile,
    pacer: &dyn Pacer,
    records: &mut Vec<JobRecord>,
) -> Result<(), ScrapeError> {
    let tab = browser.new_tab()?;
    tab.set_default_timeout(NAVIGATION_TIMEOUT);

    if let Some(net) = pacer.network_profile() {
        info!(site = %req.site, preset = net.label, "throttling network conditions");
        tab.call_method(EmulateNetworkConditions {
            offline: false,
            latency: net.latency_ms,
            download_throughput: net.download_bps,
            upload_throughput: net.upload_bps,
        })?;
    }

    let url = build_search_url(profile, &req.term, &req.location);
    pause(req, pacer.delay(1000, 3000)).await?;

    info!(site = %req.site, %url, "navigating");
    tab.navigate_to(&url)?;
    tab.wait_until_navigated()?;

    // Settle after load; heavy boards keep hydrating past the load event.
    pause(req, pacer.delay(2000, 5000)).await?;

    for page in 0..req.page_limit {
        pause(req, pacer.delay(800, 2500)).await?;
        perform_scrolls(&tab, req, pacer).await?;
        perform_pointer_moves(&tab, req, pacer).await?;

        let html = tab.get_content()?;
        let page_records = extract_jobs(&html, profile)?;
        info!(site = %req.site, page = page + 1, count = page_records.len(), "extracted page");
        records.extend(page_records);

        if page + 1 == req.page_limit {
            break;
        }

        pause(req, pacer.delay(500, 1500)).await?;
        let next = match tab.find_element(profile.selectors.next_page) {
            Ok(el) => el,
            Err(_) => {
                info!(site = %req.site, page = page + 1, "no next-page control, session complete");
                break;
            }
        };

        pause(req, pacer.delay(1500, 3500)).await?;
        perform_pointer_moves(&tab, req, pacer).await?;
        pause(req, pacer.delay(300, 900)).await?;

        next.click()?;
        tab.wait_until_navigated()?;
        pause(req, pacer.delay(3000, 6000)).await?;
    }

    Ok(())
}

/// Scroll through the page with a randomized wheel plan (trusted CDP events).
async fn perform_scrolls(
    tab: &Arc<headless_chrome::Tab>,
    req: &ScrapeRequest,
    pacer: &dyn Pacer,
) -> Result<(), ScrapeError> {
    for step in pacer.scroll_plan() {
        tab.call_method(DispatchMouseEvent {
            Type: DispatchMouseEventTypeOption::MouseWheel,
            x: 100.0,
            y: 100.0,
            button: None,
            buttons: None,
            modifiers: None,
            timestamp: None,
            delta_x: Some(0.0),
            delta_y: Some(step.distance),
            pointer_Type: Some(DispatchMouseEventPointer_TypeOption::Mouse),
            force: None,
            tangential_pressure: None,
            tilt_x: None,
            tilt_y: None,
            twist: None,
            click_count: None,
        })?;
        pause(req, step.pause).await?;
    }
    Ok(())
}

/// Wander the pointer across the viewport (trusted CDP events).
async fn perform_pointer_moves(
    tab: &Arc<headless_chrome::Tab>,
    req: &ScrapeRequest,
    pacer: &dyn Pacer,
) -> Result<(), ScrapeError> {
    for step in pacer.pointer_plan() {
        tab.call_method(DispatchMouseEvent {
            Type: DispatchMouseEventTypeOption::MouseMoved,
            x: step.x,
            y: step.y,
            button: None,
            buttons: None,
            modifiers: None,
            timestamp: None,
            delta_x: None,
            delta_y: None,
            pointer_Type: Some(DispatchMouseEventPointer_TypeOption::Mouse),
            force: None,
            tangential_pressure: None,
            tilt_x: None,
            tilt_y: None,
            twist: None,
            click_count: None,
        })?;
        pause(req, step.pause).await?;
    }
    Ok(())
}

/// Suspension point: sleeps the paced duration and honors the request
/// deadline on both sides of the sleep.
async fn pause(req: &ScrapeRequest, duration: Duration) -> Result<(), ScrapeError> {
    if req.expired() {
        return Err(ScrapeError::Cancelled);
    }
    sleep(duration).await;
    if req.expired() {
        return Err(ScrapeError::Cancelled);
    }
    Ok(())
}

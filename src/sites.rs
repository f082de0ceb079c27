//! Static per-site scrape configuration.
//!
//! Each supported job board gets one immutable [`SiteProfile`] describing how
//! to build its search URL and which selectors locate the pieces of a job
//! card. Profiles are registered once in a lazy table and only ever read, so
//! concurrent sessions can share them freely. Site-specific behavior that the
//! selectors cannot express (how to turn a card into an absolute url) lives
//! in [`LinkRule`] so the extractor stays free of per-site branching.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use utoipa::ToSchema;

use crate::error::ScrapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SiteId {
    Seek,
    Indeed,
    Linkedin,
}

impl SiteId {
    pub const ALL: [SiteId; 3] = [SiteId::Seek, SiteId::Indeed, SiteId::Linkedin];

    /// Fails with `UnknownSite` for anything outside the configured set. This
    /// is the configuration-error gate: it runs before any browser resource
    /// is acquired.
    pub fn parse(value: &str) -> Result<SiteId, ScrapeError> {
        match value {
            "seek" => Ok(SiteId::Seek),
            "indeed" => Ok(SiteId::Indeed),
            "linkedin" => Ok(SiteId::Linkedin),
            other => Err(ScrapeError::UnknownSite(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteId::Seek => "seek",
            SiteId::Indeed => "indeed",
            SiteId::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CSS selectors for one site's result page. Required fields locate the job
/// card pieces every site exposes; optional ones are absent where a board
/// simply doesn't render that data.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    pub title: &'static str,
    pub company: &'static str,
    pub description: &'static str,
    pub link: &'static str,
    /// Enclosing job-card container the field selectors are scoped to.
    pub container: &'static str,
    pub next_page: &'static str,
    pub location: Option<&'static str>,
    pub salary: Option<&'static str>,
    pub date_posted: Option<&'static str>,
}

/// How a job card's href becomes an absolute url.
#[derive(Debug, Clone, Copy)]
pub enum LinkRule {
    /// Hrefs are site-relative; prefix the base origin.
    Prefix { base: &'static str },
    /// Hrefs are already absolute.
    Absolute,
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub id: SiteId,
    pub search_url: &'static str,
    pub location_param: Option<&'static str>,
    pub selectors: SelectorSet,
    pub link_rule: LinkRule,
}

static REGISTRY: Lazy<HashMap<SiteId, SiteProfile>> = Lazy::new(|| {
    let mut registry = HashMap::new();

    registry.insert(
        SiteId::Seek,
        SiteProfile {
            id: SiteId::Seek,
            search_url: "https://www.seek.com.au/jobs?keywords=",
            location_param: Some("&where="),
            selectors: SelectorSet {
                title: r#"[data-automation="jobTitle"]"#,
                company: r#"[data-automation="jobCompany"]"#,
                description: r#"[data-automation="jobShortDescription"]"#,
                link: r#"[data-automation="jobTitle"]"#,
                container: r#"[data-automation="jobCard"]"#,
                next_page: r#"[data-automation="pagination-next"]"#,
                location: Some(r#"[data-automation="jobLocation"]"#),
                salary: Some(r#"[data-automation="jobSalary"]"#),
                date_posted: Some(r#"[data-automation="jobListingDate"]"#),
            },
            link_rule: LinkRule::Prefix { base: "https://www.seek.com.au" },
        },
    );

    registry.insert(
        SiteId::Indeed,
        SiteProfile {
            id: SiteId::Indeed,
            search_url: "https://www.indeed.com/jobs?q=",
            location_param: Some("&l="),
            selectors: SelectorSet {
                title: ".jobTitle",
                company: ".companyName",
                description: ".job-snippet",
                link: ".jcs-JobTitle",
                container: ".job_seen_beacon",
                next_page: r#"[data-testid="pagination-page-next"]"#,
                location: Some(".companyLocation"),
                salary: None,
                date_posted: Some(".date"),
            },
            link_rule: LinkRule::Prefix { base: "https://www.indeed.com" },
        },
    );

    registry.insert(
        SiteId::Linkedin,
        SiteProfile {
            id: SiteId::Linkedin,
            search_url: "https://www.linkedin.com/jobs/search/?keywords=",
            location_param: Some("&location="),
            selectors: SelectorSet {
                title: ".job-card-list__title",
                company: ".job-card-container__company-name",
                description: ".job-card-list__description",
                link: ".job-card-list__title",
                container: ".job-card-container",
                next_page:
                    ".artdeco-pagination__button--next:not(.artdeco-pagination__button--disabled)",
                location: Some(".job-card-container__metadata-item"),
                salary: None,
                date_posted: Some(".job-card-container__posted-date"),
            },
            link_rule: LinkRule::Absolute,
        },
    );

    registry
});

/// Table lookup. Infallible for a parsed [`SiteId`]; unknown identifiers are
/// rejected earlier by [`SiteId::parse`].
pub fn profile(site: SiteId) -> &'static SiteProfile {
    &REGISTRY[&site]
}

/// Resolve a site identifier string straight to its profile.
pub fn lookup(site: &str) -> Result<&'static SiteProfile, ScrapeError> {
    SiteId::parse(site).map(profile)
}

/// Search template + url-encoded term, plus the location parameter where the
/// site supports one.
pub fn build_search_url(profile: &SiteProfile, term: &str, location: &str) -> String {
    let mut url = format!("{}{}", profile.search_url, urlencoding::encode(term));
    if let Some(param) = profile.location_param {
        if !location.is_empty() {
            url.push_str(param);
            url.push_str(&urlencoding::encode(location));
        }
    }
    url
}

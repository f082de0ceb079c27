use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::sites::SiteId;

/// One scraped job posting, normalized across sites.
///
/// The id is assigned at extraction time and never reused. Title and company
/// are guaranteed non-empty after trimming; the extractor drops records that
/// violate this instead of surfacing them.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub description: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<String>,
    #[serde(default = "Utc::now")]
    pub scraped_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(title: String, company: String, description: String, url: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            company,
            description,
            url,
            location: None,
            salary: None,
            date_posted: None,
            scraped_at: Utc::now(),
        }
    }

    /// Approximate-identity key used for deduplication. Two postings with the
    /// same title and company collapse to one even when their urls differ.
    pub fn dedup_key(&self) -> String {
        format!("{}-{}", self.title, self.company)
    }
}

/// One per-site scrape invocation. Ephemeral.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub site: SiteId,
    pub term: String,
    pub location: String,
    pub page_limit: usize,
    /// Cooperative cancellation: checked at every suspension point.
    pub deadline: Option<Instant>,
}

impl ScrapeRequest {
    pub fn new(site: SiteId, term: impl Into<String>, location: impl Into<String>, page_limit: usize) -> Self {
        Self {
            site,
            term: term.into(),
            location: location.into(),
            page_limit: page_limit.max(1),
            deadline: None,
        }
    }

    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_is_title_dash_company() {
        let job = JobRecord::new(
            "Frontend Developer".into(),
            "Acme".into(),
            "Build UIs".into(),
            "https://example.com/1".into(),
        );
        assert_eq!(job.dedup_key(), "Frontend Developer-Acme");
        assert!(!job.id.is_empty());
    }

    #[test]
    fn page_limit_is_clamped_to_at_least_one() {
        let req = ScrapeRequest::new(SiteId::Seek, "rust", "Perth, WA", 0);
        assert_eq!(req.page_limit, 1);
        assert!(!req.expired());
    }
}

//! HTTP surface over the scraping core and the match service.
//!
//! Request validation (unknown sites, missing terms, bad page limits) fails
//! with a 400 envelope before any browser resource is acquired. Session and
//! upstream-service failures never reach the client as errors: they only
//! shrink the returned job list.

use axum::{extract::State, Json};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::matching::MatchClient;
use crate::models::{JobRecord, ScrapeRequest};
use crate::orchestrator::{BrowserScraper, Orchestrator};
use crate::sites::SiteId;

static DEFAULT_LOCATION: Lazy<String> =
    Lazy::new(|| std::env::var("DEFAULT_LOCATION").unwrap_or_else(|_| "Perth, WA".to_string()));

pub struct AppState {
    pub orchestrator: Orchestrator<BrowserScraper>,
    pub matcher: MatchClient,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeSiteRequest {
    pub site: String,
    pub search_terms: String,
    pub page_limit: Option<usize>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJobsRequest {
    pub search_terms: Vec<String>,
    pub sites: Option<Vec<String>>,
    pub page_limit: Option<usize>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchScoreRequest {
    pub resume_text: String,
    pub job: JobRecord,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeywordsRequest {
    pub resume_text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobsResponse {
    pub error: bool,
    pub message: String,
    pub data: Vec<JobRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreResponse {
    pub error: bool,
    pub message: String,
    pub data: f32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TermsResponse {
    pub error: bool,
    pub message: String,
    pub data: Vec<String>,
}

/// Scrape a single job site for one search term.
#[utoipa::path(
    post,
    path = "/api/scrape/site",
    request_body = ScrapeSiteRequest,
    responses(
        (status = 200, description = "Scraped job list", body = JobsResponse),
        (status = 400, description = "Unknown site or invalid parameters"),
    ),
    tag = "scrape"
)]
pub async fn scrape_site(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeSiteRequest>,
) -> Result<Json<JobsResponse>, ApiError> {
    let site = crate::sites::lookup(&req.site)?.id;
    let term = req.search_terms.trim().to_string();
    if term.is_empty() {
        return Err(ApiError::Validation(
            "Missing required parameters: site, searchTerms".to_string(),
        ));
    }
    let page_limit = effective_page_limit(req.page_limit)?;
    let location = effective_location(req.location);

    let request = ScrapeRequest::new(site, term, location.clone(), page_limit);
    let jobs = state.orchestrator.scrape_site(&request).await;

    Ok(Json(JobsResponse {
        error: false,
        message: format!("Successfully scraped {} jobs from {} in {}", jobs.len(), site, location),
        data: jobs,
    }))
}

/// Scrape multiple job sites for multiple search terms, deduplicated.
#[utoipa::path(
    post,
    path = "/api/scrape/jobs",
    request_body = ScrapeJobsRequest,
    responses(
        (status = 200, description = "Deduplicated job list across sites", body = JobsResponse),
        (status = 400, description = "Unknown site or invalid parameters"),
    ),
    tag = "scrape"
)]
pub async fn scrape_jobs(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeJobsRequest>,
) -> Result<Json<JobsResponse>, ApiError> {
    let terms: Vec<String> = req
        .search_terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return Err(ApiError::Validation(
            "Missing or invalid searchTerms parameter. Must be an array of strings.".to_string(),
        ));
    }
    let sites = effective_sites(req.sites)?;
    let page_limit = effective_page_limit(req.page_limit)?;
    let location = effective_location(req.location);

    let jobs = state
        .orchestrator
        .scrape_all(&terms, &sites, page_limit, &location, None)
        .await;

    Ok(Json(JobsResponse {
        error: false,
        message: format!("Successfully scraped {} jobs in {}", jobs.len(), location),
        data: jobs,
    }))
}

/// Score how well a scraped job matches a resume (0-100).
#[utoipa::path(
    post,
    path = "/api/match/score",
    request_body = MatchScoreRequest,
    responses((status = 200, description = "Match score", body = ScoreResponse)),
    tag = "match"
)]
pub async fn match_score(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MatchScoreRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    if req.resume_text.trim().is_empty() {
        return Err(ApiError::Validation("Missing required parameter: resumeText".to_string()));
    }

    let score = state.matcher.score(&req.job, &req.resume_text).await;
    Ok(Json(ScoreResponse {
        error: false,
        message: format!("Evaluated match for {}", req.job.title),
        data: score,
    }))
}

/// Extract suggested job search terms from resume text.
#[utoipa::path(
    post,
    path = "/api/match/keywords",
    request_body = KeywordsRequest,
    responses((status = 200, description = "Suggested search terms", body = TermsResponse)),
    tag = "match"
)]
pub async fn match_keywords(
    State(state): State<Arc<AppState>>,
    Json(req): Json<KeywordsRequest>,
) -> Result<Json<TermsResponse>, ApiError> {
    if req.resume_text.trim().is_empty() {
        return Err(ApiError::Validation("Missing required parameter: resumeText".to_string()));
    }

    let terms = state.matcher.keywords(&req.resume_text).await;
    Ok(Json(TermsResponse {
        error: false,
        message: format!("Generated {} search terms", terms.len()),
        data: terms,
    }))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Server is running")),
    tag = "health"
)]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Server is running" }))
}

pub fn default_location() -> String {
    DEFAULT_LOCATION.clone()
}

fn effective_location(location: Option<String>) -> String {
    location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(default_location)
}

fn effective_page_limit(page_limit: Option<usize>) -> Result<usize, ApiError> {
    match page_limit {
        None => Ok(1),
        Some(0) => Err(ApiError::Validation("pageLimit must be at least 1".to_string())),
        Some(limit) => Ok(limit),
    }
}

/// Sites default to the full configured set; any unknown identifier rejects
/// the whole request before a session starts.
fn effective_sites(sites: Option<Vec<String>>) -> Result<Vec<SiteId>, ApiError> {
    match sites {
        None => Ok(SiteId::ALL.to_vec()),
        Some(names) if names.is_empty() => Ok(SiteId::ALL.to_vec()),
        Some(names) => names
            .iter()
            .map(|name| SiteId::parse(name).map_err(ApiError::from))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_site_rejected_before_any_session() {
        let err = effective_sites(Some(vec!["seek".into(), "monster_board_typo".into()]));
        assert!(err.is_err());
    }

    #[test]
    fn sites_default_to_full_configured_set() {
        assert_eq!(effective_sites(None).unwrap(), SiteId::ALL.to_vec());
        assert_eq!(effective_sites(Some(vec![])).unwrap(), SiteId::ALL.to_vec());
    }

    #[test]
    fn page_limit_defaults_to_one_and_rejects_zero() {
        assert_eq!(effective_page_limit(None).unwrap(), 1);
        assert_eq!(effective_page_limit(Some(3)).unwrap(), 3);
        assert!(effective_page_limit(Some(0)).is_err());
    }

    #[test]
    fn blank_location_falls_back_to_default_region() {
        assert_eq!(effective_location(Some("  ".into())), default_location());
        assert_eq!(effective_location(Some("Sydney, NSW".into())), "Sydney, NSW");
    }
}

mod api;
mod error;
mod extract;
mod matching;
mod models;
mod orchestrator;
mod pacing;
mod session;
mod sites;

use axum::{
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::matching::MatchClient;
use crate::orchestrator::Orchestrator;
use crate::pacing::HumanPacer;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::scrape_site,
        api::scrape_jobs,
        api::match_score,
        api::match_keywords,
        api::health
    ),
    components(
        schemas(
            api::ScrapeSiteRequest,
            api::ScrapeJobsRequest,
            api::MatchScoreRequest,
            api::KeywordsRequest,
            api::JobsResponse,
            api::ScoreResponse,
            api::TermsResponse,
            crate::models::JobRecord,
            crate::sites::SiteId
        )
    ),
    tags(
        (name = "scrape", description = "Multi-site job scraping"),
        (name = "match", description = "Resume match scoring and search-term extraction"),
        (name = "health", description = "Liveness")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let pacer = Arc::new(HumanPacer::new());
    let state = Arc::new(api::AppState {
        orchestrator: Orchestrator::with_browser(pacer),
        matcher: MatchClient::from_env(),
    });

    let app = Router::new()
        .merge(SwaggerUi::new("/job-crawler-swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/scrape/site", post(api::scrape_site))
        .route("/api/scrape/jobs", post(api::scrape_jobs))
        .route("/api/match/score", post(api::match_score))
        .route("/api/match/keywords", post(api::match_keywords))
        .route("/api/health", get(api::health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

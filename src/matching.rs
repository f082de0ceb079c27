//! Resume/job match scoring and search-term extraction.
//!
//! The primary path calls the OpenAI chat-completions API over reqwest. The
//! service being unreachable, unconfigured or returning garbage is never a
//! hard failure: both operations degrade to local keyword heuristics so a
//! scrape request always gets an answer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::warn;

use crate::error::ScrapeError;
use crate::models::JobRecord;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9+#.\-]+").unwrap());

// Words too common to signal a skill or role.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "the", "and", "for", "with", "that", "this", "from", "have", "has", "had", "are", "was",
        "were", "will", "would", "can", "could", "should", "you", "your", "our", "their", "them",
        "they", "his", "her", "its", "not", "but", "all", "any", "each", "per", "into", "out",
        "about", "over", "under", "more", "most", "other", "some", "such", "than", "then", "also",
        "been", "being", "both", "when", "where", "which", "while", "who", "whom", "why", "how",
        "work", "working", "years", "year", "role", "team", "job", "jobs", "experience", "skills",
        "ability", "strong", "good", "well", "new", "use", "using", "used",
    ]
    .into_iter()
    .collect()
});

pub struct MatchClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl MatchClient {
    pub fn from_env() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("OPENAI_API_KEY not set; match scoring will use the local keyword heuristic");
        }
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key,
            model,
        }
    }

    /// How well `job` matches the resume, 0-100. Falls back to the local
    /// keyword-overlap heuristic on any upstream failure.
    pub async fn score(&self, job: &JobRecord, resume_text: &str) -> f32 {
        match self.score_remote(job, resume_text).await {
            Ok(score) => score.clamp(0.0, 100.0),
            Err(err) => {
                warn!(%err, title = %job.title, "match service unavailable, using overlap heuristic");
                keyword_overlap_score(job, resume_text)
            }
        }
    }

    /// Suggested search terms for a resume. Falls back to local frequent-term
    /// extraction on any upstream failure.
    pub async fn keywords(&self, resume_text: &str) -> Vec<String> {
        match self.keywords_remote(resume_text).await {
            Ok(terms) if !terms.is_empty() => terms,
            Ok(_) => {
                warn!("match service returned no search terms, using local extraction");
                local_keywords(resume_text)
            }
            Err(err) => {
                warn!(%err, "match service unavailable, using local extraction");
                local_keywords(resume_text)
            }
        }
    }

    async fn score_remote(&self, job: &JobRecord, resume_text: &str) -> Result<f32, ScrapeError> {
        let body = json!({
            "model": self.model,
            "temperature": 0.3,
            "response_format": {"type": "json_object"},
            "messages": [
                {
                    "role": "system",
                    "content": "You evaluate how well a job listing matches a candidate's resume. \
                                Rate the match from 0 to 100. Respond with ONLY a JSON object with \
                                a single numeric field \"score\"."
                },
                {
                    "role": "user",
                    "content": format!(
                        "Resume:\n{}\n\nJob:\nTitle: {}\nCompany: {}\nDescription: {}",
                        resume_text, job.title, job.company, job.description
                    )
                }
            ]
        });

        let content = self.complete(body).await?;
        let parsed: Value = serde_json::from_str(&content)
            .map_err(|e| ScrapeError::Upstream(format!("unparseable score response: {e}")))?;
        parsed["score"]
            .as_f64()
            .map(|s| s as f32)
            .ok_or_else(|| ScrapeError::Upstream("no score field in response".to_string()))
    }

    async fn keywords_remote(&self, resume_text: &str) -> Result<Vec<String>, ScrapeError> {
        let body = json!({
            "model": self.model,
            "temperature": 0.1,
            "response_format": {"type": "json_object"},
            "messages": [
                {
                    "role": "system",
                    "content": "You extract job search terms from resume text. Use only terms \
                                present in the resume. Respond with ONLY a JSON object with a \
                                single field \"searchTerms\" containing 5-8 job title strings."
                },
                {
                    "role": "user",
                    "content": format!("RESUME CONTENT START\n{}\nRESUME CONTENT END", resume_text)
                }
            ]
        });

        let content = self.complete(body).await?;
        let parsed: Value = serde_json::from_str(&content)
            .map_err(|e| ScrapeError::Upstream(format!("unparseable keywords response: {e}")))?;
        let terms = parsed["searchTerms"]
            .as_array()
            .ok_or_else(|| ScrapeError::Upstream("no searchTerms field in response".to_string()))?;
        Ok(terms
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect())
    }

    /// One chat completion round-trip; returns the first choice's content.
    async fn complete(&self, body: Value) -> Result<String, ScrapeError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ScrapeError::Upstream("OPENAI_API_KEY is not configured".to_string()))?;

        let response = self
            .http
            .post(OPENAI_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScrapeError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScrapeError::Upstream(format!(
                "completion request failed with status {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ScrapeError::Upstream(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScrapeError::Upstream("empty completion response".to_string()))
    }
}

/// Degraded local approximation: share of the job's significant words that
/// also appear in the resume, scaled to 0-100.
pub fn keyword_overlap_score(job: &JobRecord, resume_text: &str) -> f32 {
    let job_text = format!("{} {} {}", job.title, job.company, job.description);
    let job_words = significant_words(&job_text);
    if job_words.is_empty() {
        return 0.0;
    }
    let resume_words = significant_words(resume_text);
    let overlap = job_words.intersection(&resume_words).count();
    (overlap as f32 / job_words.len() as f32 * 100.0).clamp(0.0, 100.0)
}

/// Degraded local approximation: most frequent significant resume words.
pub fn local_keywords(resume_text: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in tokenize(resume_text) {
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(6).map(|(word, _)| word).collect()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(w.as_str()))
}

fn significant_words(text: &str) -> HashSet<String> {
    tokenize(text).collect()
}

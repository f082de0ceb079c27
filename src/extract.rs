//! Record extraction from rendered HTML.
//!
//! Pure function of its inputs: a page snapshot string and a site profile.
//! No browser or network access, so it can be exercised directly on fixture
//! markup.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ScrapeError;
use crate::models::JobRecord;
use crate::sites::{LinkRule, SiteProfile};

/// Parse a rendered page into job records using the profile's selectors.
///
/// Each element matching the title selector anchors one candidate record;
/// the remaining fields are resolved inside its nearest job-card container.
/// A missing optional selector or a missing match yields an absent field.
/// Records whose trimmed title or company is empty are skipped, not errors.
pub fn extract_jobs(html: &str, profile: &SiteProfile) -> Result<Vec<JobRecord>, ScrapeError> {
    let document = Html::parse_document(html);

    let title_selector = parse_selector(profile.selectors.title)?;
    let container_selector = parse_selector(profile.selectors.container)?;
    let company_selector = parse_selector(profile.selectors.company).ok();
    let description_selector = parse_selector(profile.selectors.description).ok();
    let link_selector = parse_selector(profile.selectors.link).ok();
    let location_selector = profile.selectors.location.and_then(|s| parse_selector(s).ok());
    let salary_selector = profile.selectors.salary.and_then(|s| parse_selector(s).ok());
    let date_selector = profile.selectors.date_posted.and_then(|s| parse_selector(s).ok());

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for title_el in document.select(&title_selector) {
        let title = element_text(title_el);
        let card = closest(title_el, &container_selector).unwrap_or(title_el);

        let company = company_selector
            .as_ref()
            .and_then(|sel| field_text(card, sel))
            .unwrap_or_default();

        if title.is_empty() || company.is_empty() {
            skipped += 1;
            continue;
        }

        let description = description_selector
            .as_ref()
            .and_then(|sel| field_text(card, sel))
            .unwrap_or_default();
        let url = resolve_url(card, title_el, link_selector.as_ref(), profile.link_rule);

        let mut record = JobRecord::new(title, company, description, url);
        record.location = location_selector.as_ref().and_then(|sel| field_text(card, sel));
        record.salary = salary_selector.as_ref().and_then(|sel| field_text(card, sel));
        record.date_posted = date_selector.as_ref().and_then(|sel| field_text(card, sel));
        records.push(record);
    }

    if skipped > 0 {
        debug!(site = %profile.id, skipped, "dropped records with empty title/company");
    }

    Ok(records)
}

fn parse_selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Extraction(format!("bad selector {css:?}: {e}")))
}

/// Nearest enclosing element matching `selector`, walking ancestors.
fn closest<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| selector.matches(ancestor))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// First match of `selector` inside `scope`, trimmed; empty text counts as
/// absent.
fn field_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = scope.select(selector).next().map(element_text)?;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Find the card's link element via the profile's link selector, read its
/// href (walking up to an enclosing anchor when the matched element carries
/// none), and absolutize per the site's [`LinkRule`].
fn resolve_url<'a>(
    card: ElementRef<'a>,
    title_el: ElementRef<'a>,
    link_selector: Option<&Selector>,
    rule: LinkRule,
) -> String {
    let link_el = link_selector
        .and_then(|sel| {
            if sel.matches(&card) {
                Some(card)
            } else {
                card.select(sel).next()
            }
        })
        .unwrap_or(title_el);

    let href = link_el.value().attr("href").or_else(|| {
        link_el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "a")
            .and_then(|a| a.value().attr("href"))
    });

    match (href, rule) {
        (Some(href), LinkRule::Prefix { base }) => absolutize(base, href),
        (Some(href), LinkRule::Absolute) => href.to_string(),
        (None, _) => String::new(),
    }
}

fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{base}{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::{profile, SiteId};

    fn seek_card(title: &str, company: &str, href: &str) -> String {
        format!(
            r#"<div data-automation="jobCard">
                <a data-automation="jobTitle" href="{href}">{title}</a>
                <span data-automation="jobCompany">{company}</span>
                <span data-automation="jobShortDescription">Ship features</span>
                <span data-automation="jobLocation">Perth WA</span>
                <span data-automation="jobSalary">$120k</span>
                <span data-automation="jobListingDate">2d ago</span>
            </div>"#
        )
    }

    #[test]
    fn extracts_three_well_formed_seek_cards() {
        let html = format!(
            "<html><body>{}{}{}</body></html>",
            seek_card("Frontend Developer", "Acme", "/job/1"),
            seek_card("Backend Developer", "Globex", "/job/2"),
            seek_card("Platform Engineer", "Initech", "/job/3"),
        );

        let jobs = extract_jobs(&html, profile(SiteId::Seek)).unwrap();
        assert_eq!(jobs.len(), 3);
        for job in &jobs {
            assert!(!job.id.is_empty());
            assert!(!job.title.is_empty());
            assert!(!job.company.is_empty());
        }
        assert_eq!(jobs[0].url, "https://www.seek.com.au/job/1");
        assert_eq!(jobs[0].location.as_deref(), Some("Perth WA"));
        assert_eq!(jobs[0].salary.as_deref(), Some("$120k"));
        assert_eq!(jobs[0].date_posted.as_deref(), Some("2d ago"));
    }

    #[test]
    fn no_title_matches_yields_empty_not_error() {
        let html = "<html><body><p>nothing to see</p></body></html>";
        let jobs = extract_jobs(html, profile(SiteId::Seek)).unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn record_with_empty_company_is_skipped() {
        let html = format!(
            "<html><body>{}{}</body></html>",
            seek_card("Frontend Developer", "", "/job/1"),
            seek_card("Backend Developer", "Globex", "/job/2"),
        );
        let jobs = extract_jobs(&html, profile(SiteId::Seek)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Backend Developer");
    }

    #[test]
    fn indeed_url_comes_from_enclosing_anchor() {
        let html = r#"<html><body>
            <div class="job_seen_beacon">
                <a class="jcs-JobTitle" href="/rc/clk?jk=abc">
                    <span class="jobTitle">Data Engineer</span>
                </a>
                <span class="companyName">Hooli</span>
                <div class="job-snippet">Pipelines all day</div>
                <div class="companyLocation">Remote</div>
            </div>
        </body></html>"#;

        let jobs = extract_jobs(html, profile(SiteId::Indeed)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://www.indeed.com/rc/clk?jk=abc");
        assert_eq!(jobs[0].company, "Hooli");
        assert!(jobs[0].salary.is_none());
    }

    #[test]
    fn linkedin_absolute_href_passes_through() {
        let html = r#"<html><body>
            <div class="job-card-container">
                <a class="job-card-list__title" href="https://www.linkedin.com/jobs/view/1">SRE</a>
                <span class="job-card-container__company-name">Umbrella</span>
                <p class="job-card-list__description">Keep it up</p>
            </div>
        </body></html>"#;

        let jobs = extract_jobs(html, profile(SiteId::Linkedin)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://www.linkedin.com/jobs/view/1");
        assert!(jobs[0].location.is_none());
    }

    #[test]
    fn missing_optional_fields_are_absent_not_errors() {
        let html = r#"<html><body>
            <div data-automation="jobCard">
                <a data-automation="jobTitle" href="/job/9">Minimal Role</a>
                <span data-automation="jobCompany">Tiny Co</span>
            </div>
        </body></html>"#;

        let jobs = extract_jobs(html, profile(SiteId::Seek)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].description.is_empty());
        assert!(jobs[0].location.is_none());
        assert!(jobs[0].salary.is_none());
        assert!(jobs[0].date_posted.is_none());
    }
}

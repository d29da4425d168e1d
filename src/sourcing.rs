//! Lead sourcing — discovers prospect buildings from apartments.com listing
//! pages and Google search results for property management companies.
//!
//! Extraction is regex-over-HTML: both sources are scraped best-effort and
//! any page that fails to parse yields zero leads, never an error for the
//! whole run.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

use crate::error::{Result, SourcingError};
use crate::model::Building;
use crate::store::EntityStore;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Delay between page fetches.
const PAGE_PAUSE: Duration = Duration::from_secs(2);

/// Search-result titles that are aggregator noise, not companies.
const GOOGLE_SKIP_LIST: &[&str] = &["yelp", "indeed", "glassdoor", "wikipedia"];

/// Supported target cities and their state abbreviations.
pub const CITY_STATES: &[(&str, &str)] = &[
    ("New York", "NY"),
    ("Los Angeles", "CA"),
    ("Chicago", "IL"),
    ("Miami", "FL"),
    ("Austin", "TX"),
    ("San Francisco", "CA"),
    ("Seattle", "WA"),
    ("Denver", "CO"),
    ("Boston", "MA"),
    ("Atlanta", "GA"),
    ("Dallas", "TX"),
    ("Houston", "TX"),
    ("Phoenix", "AZ"),
    ("Philadelphia", "PA"),
    ("Washington", "DC"),
    ("Nashville", "TN"),
    ("Charlotte", "NC"),
    ("Portland", "OR"),
    ("Minneapolis", "MN"),
    ("San Diego", "CA"),
];

pub fn state_for_city(city: &str) -> Option<&'static str> {
    CITY_STATES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(city))
        .map(|(_, state)| *state)
}

static PLACARD_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<(?:span|div)[^>]*class="[^"]*(?:js-placardTitle|property-title)[^"]*"[^>]*>(.*?)</(?:span|div)>"#)
        .unwrap_or_else(|e| panic!("invalid placard title regex: {e}"))
});

static PROPERTY_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div[^>]*class="[^"]*property-address[^"]*"[^>]*>(.*?)</div>"#)
        .unwrap_or_else(|e| panic!("invalid address regex: {e}"))
});

static UNIT_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:units?|apartments?|homes?)")
        .unwrap_or_else(|e| panic!("invalid unit count regex: {e}"))
});

static PROPERTY_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]*class="[^"]*property-link[^"]*"[^>]*href="([^"]+)""#)
        .unwrap_or_else(|e| panic!("invalid property link regex: {e}"))
});

static GOOGLE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<h3[^>]*>(.*?)</h3>")
        .unwrap_or_else(|e| panic!("invalid result title regex: {e}"))
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]+>").unwrap_or_else(|e| panic!("invalid tag regex: {e}"))
});

/// Strip tags and decode the handful of entities these pages actually use.
fn html_text(fragment: &str) -> String {
    TAG.replace_all(fragment, "")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .trim()
        .to_string()
}

/// Parse one apartments.com listing page into building leads.
pub fn parse_apartments_page(html: &str, city: &str, state: &str) -> Vec<Building> {
    let mut buildings = Vec::new();

    // Each listing is one <article> placard; split and inspect each chunk.
    for chunk in html.split("<article") {
        if !chunk.contains("placard") && !chunk.contains("data-listingid") {
            continue;
        }

        let Some(name) = PLACARD_TITLE
            .captures(chunk)
            .map(|c| html_text(&c[1]))
            .filter(|n| !n.is_empty())
        else {
            continue;
        };

        let address = PROPERTY_ADDRESS
            .captures(chunk)
            .map(|c| html_text(&c[1]))
            .filter(|a| !a.is_empty());

        let unit_count = UNIT_COUNT
            .captures(chunk)
            .and_then(|c| c[1].parse::<u32>().ok());

        let property_url = PROPERTY_LINK.captures(chunk).map(|c| {
            let href = c[1].to_string();
            if href.starts_with('/') {
                format!("https://www.apartments.com{href}")
            } else {
                href
            }
        });

        let mut building = Building::new(name, city)
            .with_state(state)
            .with_source("apartments_com");
        building.address = address;
        building.unit_count = unit_count;
        building.property_url = property_url;
        buildings.push(building);
    }

    buildings
}

/// Parse a Google search result page into property-management company leads.
pub fn parse_google_results(html: &str, city: &str, state: &str) -> Vec<Building> {
    let mut buildings = Vec::new();

    for captures in GOOGLE_TITLE.captures_iter(html) {
        let title = html_text(&captures[1]);
        if title.is_empty() {
            continue;
        }

        let lower = title.to_lowercase();
        if GOOGLE_SKIP_LIST.iter().any(|skip| lower.contains(skip)) {
            continue;
        }

        // Titles come as "Company - tagline" or "Company | tagline".
        let company = title
            .split(" - ")
            .next()
            .and_then(|s| s.split(" | ").next())
            .unwrap_or(&title)
            .trim()
            .to_string();
        if company.is_empty() {
            continue;
        }

        buildings.push(
            Building::new(company.clone(), city)
                .with_company(company)
                .with_state(state)
                .with_source("google"),
        );
    }

    buildings
}

/// Lead sourcer over the two public web sources.
pub struct LeadSourcer {
    store: Arc<dyn EntityStore>,
    http: reqwest::Client,
    page_pause: Duration,
}

impl LeadSourcer {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            page_pause: PAGE_PAUSE,
        }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, SourcingError> {
        let resp = self
            .http
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| SourcingError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(SourcingError::FetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", resp.status()),
            });
        }

        resp.text().await.map_err(|e| SourcingError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn scrape_apartments(&self, city: &str, state: &str, max_pages: u32) -> Vec<Building> {
        let city_slug = city.to_lowercase().replace(' ', "-");
        let state_slug = state.to_lowercase();
        let mut buildings = Vec::new();

        for page in 1..=max_pages {
            let url = format!("https://www.apartments.com/{city_slug}-{state_slug}/{page}/");
            info!(%url, "Scraping listings");

            let html = match self.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(error = %e, "Skipping page");
                    continue;
                }
            };

            let found = parse_apartments_page(&html, city, state);
            if found.is_empty() {
                info!(page, "No listings found, stopping pagination");
                break;
            }
            info!(page, count = found.len(), "Parsed listings");
            buildings.extend(found);

            if page < max_pages {
                tokio::time::sleep(self.page_pause).await;
            }
        }

        buildings
    }

    async fn search_google(&self, city: &str, state: &str) -> Vec<Building> {
        let query = format!("property management company {city} {state} multifamily");
        let url = format!(
            "https://www.google.com/search?q={}",
            query.replace(' ', "+")
        );

        match self.fetch(&url).await {
            Ok(html) => parse_google_results(&html, city, state),
            Err(e) => {
                warn!(error = %e, "Google search failed");
                Vec::new()
            }
        }
    }

    /// Source leads for the given cities. Returns the count of buildings
    /// actually added (dedupe hits don't count).
    pub async fn run(&self, cities: &[String], max_pages: u32) -> Result<u32> {
        let mut total_added = 0;

        for city in cities {
            let Some(state) = state_for_city(city) else {
                warn!(city = %city, "Unknown city, skipping");
                continue;
            };

            info!(%city, state, "Sourcing leads");
            let mut leads = self.scrape_apartments(city, state, max_pages).await;
            leads.extend(self.search_google(city, state).await);

            let mut added = 0;
            for lead in &leads {
                match self.store.insert_building(lead).await {
                    // Same id back means the row was actually inserted.
                    Ok(stored) if stored.id == lead.id => added += 1,
                    Ok(_) => {}
                    Err(e) => warn!(building = %lead.name, error = %e, "Failed to save lead"),
                }
            }

            info!(%city, found = leads.len(), added, "City done");
            total_added += added;
        }

        info!(total_added, "Sourcing complete");
        Ok(total_added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BuildingStatus;

    const LISTING_PAGE: &str = r#"
    <ul>
      <li class="mortar-wrapper">
        <article class="placard" data-listingid="abc123">
          <a class="property-link" href="/the-archer-new-york-ny/abc123/"></a>
          <span class="js-placardTitle title">The Archer</span>
          <div class="property-address" title="245 W 25th St">245 W 25th St, New York, NY</div>
          <div class="property-pricing">120 Units Available</div>
        </article>
      </li>
      <li class="mortar-wrapper">
        <article class="placard">
          <a class="property-link" href="https://www.apartments.com/hudson-yards/"></a>
          <span class="js-placardTitle title">Hudson &amp; Yards</span>
        </article>
      </li>
      <li><article class="ad-placement"><span>Sponsored</span></article></li>
    </ul>
    "#;

    #[test]
    fn parses_apartment_listings() {
        let buildings = parse_apartments_page(LISTING_PAGE, "New York", "NY");
        assert_eq!(buildings.len(), 2);

        assert_eq!(buildings[0].name, "The Archer");
        assert_eq!(
            buildings[0].address.as_deref(),
            Some("245 W 25th St, New York, NY")
        );
        assert_eq!(buildings[0].unit_count, Some(120));
        assert_eq!(
            buildings[0].property_url.as_deref(),
            Some("https://www.apartments.com/the-archer-new-york-ny/abc123/")
        );
        assert_eq!(buildings[0].source.as_deref(), Some("apartments_com"));
        assert_eq!(buildings[0].status, BuildingStatus::New);

        // Entity decoded, absolute url kept as-is, no units found.
        assert_eq!(buildings[1].name, "Hudson & Yards");
        assert_eq!(
            buildings[1].property_url.as_deref(),
            Some("https://www.apartments.com/hudson-yards/")
        );
        assert_eq!(buildings[1].unit_count, None);
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(parse_apartments_page("<html><body></body></html>", "Austin", "TX").is_empty());
    }

    const SEARCH_PAGE: &str = r#"
    <div class="g"><h3>Greystone Management - NYC Property Managers</h3></div>
    <div class="g"><h3>Top 10 property managers | Yelp</h3></div>
    <div class="g"><h3>Bozzuto | Apartment Management</h3></div>
    <div class="g"><h3>Property manager jobs - Indeed</h3></div>
    "#;

    #[test]
    fn parses_google_results_with_skip_list() {
        let buildings = parse_google_results(SEARCH_PAGE, "New York", "NY");
        assert_eq!(buildings.len(), 2);
        assert_eq!(buildings[0].name, "Greystone Management");
        assert_eq!(buildings[0].company.as_deref(), Some("Greystone Management"));
        assert_eq!(buildings[1].name, "Bozzuto");
        assert_eq!(buildings[1].source.as_deref(), Some("google"));
    }

    #[test]
    fn city_state_lookup() {
        assert_eq!(state_for_city("New York"), Some("NY"));
        assert_eq!(state_for_city("austin"), Some("TX"));
        assert_eq!(state_for_city("Springfield"), None);
    }
}

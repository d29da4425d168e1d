//! Contact enrichment — finds people at prospect buildings via the
//! Apollo.io search API, falling back to harvesting email addresses from the
//! building's own website.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{Building, BuildingStatus, Contact, UNKNOWN_NAME};
use crate::store::EntityStore;

const APOLLO_URL: &str = "https://api.apollo.io/v1/mixed_people/search";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Job titles worth reaching at a building or management company.
const TARGET_TITLES: &[&str] = &[
    "Property Manager",
    "Asset Manager",
    "Head of Leasing",
    "Director of Operations",
    "Managing Director",
    "Leasing Director",
    "Regional Manager",
    "VP of Operations",
    "General Manager",
    "Director of Leasing",
    "Vice President Leasing",
];

/// Substrings marking harvested addresses as tooling noise, not people.
const EMAIL_DENYLIST: &[&str] = &[
    "example.com",
    "sentry",
    "webpack",
    ".png",
    ".jpg",
    "wixpress",
    "schema.org",
    "googleapis",
    "cloudflare",
    "noreply",
    "no-reply",
    "@w3.org",
];

/// Subpages likely to carry staff contact details.
const CONTACT_PATHS: &[&str] = &["/contact", "/about", "/team", "/leadership"];

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
        .unwrap_or_else(|e| panic!("invalid email regex: {e}"))
});

/// Extract plausible people emails from page text, lowercased and
/// denylist-filtered. Returned in sorted order for determinism.
pub fn harvest_emails(text: &str) -> Vec<String> {
    let mut found = BTreeSet::new();
    for m in EMAIL.find_iter(text) {
        let email = m.as_str().to_lowercase();
        if !EMAIL_DENYLIST.iter().any(|skip| email.contains(skip)) {
            found.insert(email);
        }
    }
    found.into_iter().collect()
}

#[derive(Deserialize)]
struct ApolloResponse {
    #[serde(default)]
    people: Vec<ApolloPerson>,
}

#[derive(Deserialize)]
struct ApolloPerson {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    linkedin_url: Option<String>,
}

impl ApolloPerson {
    fn into_contact(self) -> Option<Contact> {
        let full_name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if full_name.is_empty() {
            return None;
        }

        let mut contact = Contact::new(full_name).with_source("apollo");
        contact.title = self.title.filter(|t| !t.is_empty());
        contact.email = self.email.filter(|e| !e.is_empty());
        contact.linkedin_url = self.linkedin_url.filter(|u| !u.is_empty());
        Some(contact)
    }
}

/// Contact enricher over Apollo and website scraping.
pub struct ContactEnricher {
    store: Arc<dyn EntityStore>,
    http: reqwest::Client,
    apollo_api_key: Option<SecretString>,
    fetch_pause: Duration,
}

impl ContactEnricher {
    pub fn new(store: Arc<dyn EntityStore>, apollo_api_key: Option<SecretString>) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            apollo_api_key,
            fetch_pause: Duration::from_secs(1),
        }
    }

    /// Search Apollo for contacts at `company` with relevant titles.
    async fn search_apollo(&self, key: &SecretString, company: &str, city: &str) -> Vec<Contact> {
        let payload = json!({
            "q_organization_name": company,
            "person_titles": TARGET_TITLES,
            "person_locations": [city],
            "per_page": 10,
            "page": 1,
        });

        let resp = match self
            .http
            .post(APOLLO_URL)
            .header("X-Api-Key", key.expose_secret())
            .json(&payload)
            .timeout(Duration::from_secs(15))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "Apollo request failed");
                return Vec::new();
            }
        };

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "Apollo API error");
            return Vec::new();
        }

        let parsed: ApolloResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Apollo response unreadable");
                return Vec::new();
            }
        };

        let contacts: Vec<Contact> = parsed
            .people
            .into_iter()
            .filter_map(ApolloPerson::into_contact)
            .collect();
        info!(company, count = contacts.len(), "Apollo search done");
        contacts
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let resp = self
            .http
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.text().await.ok()
    }

    /// Harvest contact emails from a building's website, including the
    /// usual contact/about subpages.
    async fn scrape_website(&self, url: &str) -> Vec<Contact> {
        let mut emails = BTreeSet::new();

        if let Some(text) = self.fetch_text(url).await {
            emails.extend(harvest_emails(&text));
        }

        let base = url.trim_end_matches('/');
        for path in CONTACT_PATHS {
            if let Some(text) = self.fetch_text(&format!("{base}{path}")).await {
                emails.extend(harvest_emails(&text));
            }
            tokio::time::sleep(self.fetch_pause).await;
        }

        emails
            .into_iter()
            .map(|email| {
                Contact::new(UNKNOWN_NAME)
                    .with_email(email)
                    .with_source("website")
            })
            .collect()
    }

    /// Enrich up to `limit` buildings in status `new`. Returns the count of
    /// contacts saved.
    pub async fn run(&self, limit: usize, use_apollo: bool) -> Result<u32> {
        let buildings = self
            .store
            .buildings_by_status(BuildingStatus::New, limit)
            .await?;
        if buildings.is_empty() {
            info!("No new buildings to enrich. Run seed or source first");
            return Ok(0);
        }

        let apollo_key = if use_apollo {
            let key = self.apollo_api_key.clone();
            if key.is_none() {
                info!("APOLLO_API_KEY not set, using website scraping only");
            }
            key
        } else {
            None
        };

        info!(count = buildings.len(), "Enriching buildings");
        let mut total_saved = 0;

        for building in &buildings {
            match self.enrich_one(building, apollo_key.as_ref()).await {
                Ok(saved) => total_saved += saved,
                Err(e) => warn!(building = %building.name, error = %e, "Enrichment failed, continuing"),
            }
            tokio::time::sleep(self.fetch_pause).await;
        }

        info!(total_saved, "Enrichment complete");
        Ok(total_saved)
    }

    async fn enrich_one(&self, building: &Building, apollo_key: Option<&SecretString>) -> Result<u32> {
        let company = building.company.as_deref().unwrap_or(&building.name);
        info!(building = %building.name, city = %building.city, "Enriching");

        let mut contacts = Vec::new();
        if let Some(key) = apollo_key {
            contacts = self.search_apollo(key, company, &building.city).await;
        }
        if contacts.is_empty() {
            if let Some(ref url) = building.property_url {
                info!(%url, "Scraping website for contacts");
                contacts = self.scrape_website(url).await;
            }
        }

        let mut saved = 0;
        for mut contact in contacts {
            contact.building_id = Some(building.id);
            match self.store.insert_contact(&contact).await {
                Ok(stored) if stored.id == contact.id => saved += 1,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to save contact"),
            }
        }

        if saved > 0 {
            self.store
                .update_building_status(building.id, BuildingStatus::Enriched)
                .await?;
        }

        info!(building = %building.name, saved, "Building done");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harvest_filters_noise_and_lowercases() {
        let page = r#"
            Contact us at Leasing@TheArcher.com or call.
            <img src="logo.png"> sentry-dsn: o4505@sentry.io
            webmaster@example.com admin@cdn.cloudflare.com
            noreply@mailer.thearcher.com info@thearcher.com
        "#;
        let emails = harvest_emails(page);
        assert_eq!(emails, vec!["info@thearcher.com", "leasing@thearcher.com"]);
    }

    #[test]
    fn harvest_deduplicates() {
        let emails = harvest_emails("pm@building.com and again pm@building.com");
        assert_eq!(emails, vec!["pm@building.com"]);
    }

    #[test]
    fn apollo_person_needs_a_name() {
        let person = ApolloPerson {
            first_name: String::new(),
            last_name: String::new(),
            title: Some("Property Manager".to_string()),
            email: Some("pm@x.com".to_string()),
            linkedin_url: None,
        };
        assert!(person.into_contact().is_none());

        let person = ApolloPerson {
            first_name: "Sarah".to_string(),
            last_name: "Johnson".to_string(),
            title: Some("Property Manager".to_string()),
            email: Some("sarah@x.com".to_string()),
            linkedin_url: Some("https://linkedin.com/in/sarahj".to_string()),
        };
        let contact = person.into_contact().unwrap();
        assert_eq!(contact.full_name, "Sarah Johnson");
        assert_eq!(contact.email.as_deref(), Some("sarah@x.com"));
        assert_eq!(contact.source.as_deref(), Some("apollo"));
    }

    #[test]
    fn empty_apollo_fields_become_none() {
        let person = ApolloPerson {
            first_name: "Jo".to_string(),
            last_name: String::new(),
            title: Some(String::new()),
            email: Some(String::new()),
            linkedin_url: None,
        };
        let contact = person.into_contact().unwrap();
        assert_eq!(contact.full_name, "Jo");
        assert!(contact.title.is_none());
        assert!(contact.email.is_none());
    }
}

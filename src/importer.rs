//! CSV contact import — accepts exports from Apollo, LinkedIn, or any
//! hand-built sheet. Header names are normalized against the common export
//! variants, so column order and naming don't matter.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use csv::StringRecord;
use tracing::{info, warn};

use crate::error::{ImportError, Result};
use crate::model::{Building, BuildingStatus, Contact, UNKNOWN_NAME};
use crate::store::EntityStore;

/// Internal field names an import row can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    FirstName,
    LastName,
    FullName,
    Email,
    Title,
    Company,
    LinkedinUrl,
    City,
    State,
}

/// Map CSV headers to internal fields. Unrecognized columns are ignored.
fn normalize_headers(headers: &StringRecord) -> HashMap<Field, usize> {
    let mut mapping = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
        let key = h.trim().to_lowercase().replace(' ', "_");
        let field = match key.as_str() {
            "first_name" | "first" => Field::FirstName,
            "last_name" | "last" => Field::LastName,
            "name" | "full_name" | "contact_name" => Field::FullName,
            "email" | "email_address" | "work_email" => Field::Email,
            "title" | "job_title" | "position" => Field::Title,
            "company" | "company_name" | "organization" | "organization_name"
            | "account_name" => Field::Company,
            "linkedin_url" | "linkedin" | "person_linkedin_url" | "linkedin_profile" => {
                Field::LinkedinUrl
            }
            "city" | "person_city" | "location_city" => Field::City,
            "state" | "person_state" | "location_state" => Field::State,
            _ => continue,
        };
        mapping.entry(field).or_insert(i);
    }
    mapping
}

fn cell<'a>(row: &'a StringRecord, mapping: &HashMap<Field, usize>, field: Field) -> Option<&'a str> {
    mapping
        .get(&field)
        .and_then(|&i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Import summary for one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: u32,
    pub skipped: u32,
}

/// Import contacts from a CSV file, creating buildings for any company
/// column values along the way.
pub async fn run(
    store: &Arc<dyn EntityStore>,
    csv_path: &Path,
    default_city: &str,
    default_state: &str,
) -> Result<ImportReport> {
    if !csv_path.exists() {
        return Err(ImportError::FileNotFound(csv_path.display().to_string()).into());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)
        .map_err(|e| ImportError::Parse(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Parse(e.to_string()))?
        .clone();
    let mapping = normalize_headers(&headers);

    info!(
        columns = mapping.len(),
        total = headers.len(),
        "Detected usable columns"
    );

    if !mapping.contains_key(&Field::Email)
        && !mapping.contains_key(&Field::FullName)
        && !mapping.contains_key(&Field::FirstName)
    {
        let found = headers.iter().collect::<Vec<_>>().join(", ");
        return Err(ImportError::NoUsableColumns(found).into());
    }

    let mut report = ImportReport::default();

    for record in reader.records() {
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "Bad row, skipping");
                report.skipped += 1;
                continue;
            }
        };
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        match import_row(store, &row, &mapping, default_city, default_state).await {
            Ok(true) => report.imported += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                warn!(error = %e, "Row failed, skipping");
                report.skipped += 1;
            }
        }
    }

    info!(
        imported = report.imported,
        skipped = report.skipped,
        "Import complete"
    );
    Ok(report)
}

/// Import one row. Returns whether a contact was saved.
async fn import_row(
    store: &Arc<dyn EntityStore>,
    row: &StringRecord,
    mapping: &HashMap<Field, usize>,
    default_city: &str,
    default_state: &str,
) -> Result<bool> {
    let full_name = cell(row, mapping, Field::FullName)
        .map(str::to_string)
        .or_else(|| {
            let first = cell(row, mapping, Field::FirstName).unwrap_or("");
            let last = cell(row, mapping, Field::LastName).unwrap_or("");
            let joined = format!("{first} {last}").trim().to_string();
            (!joined.is_empty()).then_some(joined)
        })
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let email = cell(row, mapping, Field::Email).map(|e| e.to_lowercase());
    let linkedin = cell(row, mapping, Field::LinkedinUrl);

    // A row with neither email nor LinkedIn can never be reached.
    if email.is_none() && linkedin.is_none() {
        info!(name = %full_name, "No email or LinkedIn, skipping");
        return Ok(false);
    }

    let city = cell(row, mapping, Field::City).unwrap_or(default_city);
    let state = cell(row, mapping, Field::State).unwrap_or(default_state);

    let building_id = match cell(row, mapping, Field::Company) {
        Some(company) => {
            let mut building = Building::new(company, city)
                .with_company(company)
                .with_state(state)
                .with_source("csv_import");
            // Imported companies come with contacts attached already.
            building.status = BuildingStatus::Enriched;
            Some(store.insert_building(&building).await?.id)
        }
        None => None,
    };

    let mut contact = Contact::new(&full_name).with_source("csv_import");
    contact.email = email;
    contact.title = cell(row, mapping, Field::Title).map(str::to_string);
    contact.linkedin_url = linkedin.map(str::to_string);
    contact.building_id = building_id;

    store.insert_contact(&contact).await?;
    info!(name = %full_name, "Imported");
    Ok(true)
}

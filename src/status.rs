//! Pipeline status report — funnel counts across buildings, contacts, and
//! messages. This is a user-facing report, printed to stdout rather than
//! logged.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{BuildingStatus, ContactStatus, MessageStatus};
use crate::store::EntityStore;

/// Snapshot of the pipeline funnel.
#[derive(Debug, Default)]
pub struct StatusReport {
    pub buildings_total: u64,
    pub buildings: Vec<(&'static str, u64)>,
    pub contacts_total: u64,
    pub contacts: Vec<(&'static str, u64)>,
    pub messages_total: u64,
    pub messages: Vec<(&'static str, u64)>,
}

impl StatusReport {
    fn count_for(rows: &[(&'static str, u64)], status: &str) -> u64 {
        rows.iter()
            .find(|(name, _)| *name == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn enriched_buildings(&self) -> u64 {
        Self::count_for(&self.buildings, "enriched")
    }

    pub fn emailed_contacts(&self) -> u64 {
        Self::count_for(&self.contacts, "emailed")
    }

    pub fn replied_contacts(&self) -> u64 {
        Self::count_for(&self.contacts, "replied")
    }

    pub fn meeting_contacts(&self) -> u64 {
        Self::count_for(&self.contacts, "meeting")
    }
}

/// Gather the funnel snapshot. Only non-zero statuses are listed.
pub async fn gather(store: &Arc<dyn EntityStore>) -> Result<StatusReport> {
    let mut report = StatusReport {
        buildings_total: store.count_buildings().await?,
        contacts_total: store.count_contacts().await?,
        messages_total: store.count_messages().await?,
        ..Default::default()
    };

    for status in BuildingStatus::all() {
        let count = store.count_buildings_by_status(*status).await?;
        if count > 0 {
            report.buildings.push((status.as_str(), count));
        }
    }
    for status in ContactStatus::all() {
        let count = store.count_contacts_by_status(*status).await?;
        if count > 0 {
            report.contacts.push((status.as_str(), count));
        }
    }
    for status in MessageStatus::all() {
        let count = store.count_messages_by_status(*status).await?;
        if count > 0 {
            report.messages.push((status.as_str(), count));
        }
    }

    Ok(report)
}

/// The `status` command: print the funnel to stdout.
pub async fn run(store: &Arc<dyn EntityStore>) -> Result<()> {
    let report = gather(store).await?;

    println!("{}", "=".repeat(50));
    println!("  Outreach Engine — Pipeline Status");
    println!("{}", "=".repeat(50));

    println!("\nBuildings: {}", report.buildings_total);
    for (status, count) in &report.buildings {
        println!("  {status}: {count}");
    }

    println!("\nContacts: {}", report.contacts_total);
    for (status, count) in &report.contacts {
        println!("  {status}: {count}");
    }

    println!("\nMessages: {}", report.messages_total);
    for (status, count) in &report.messages {
        println!("  {status}: {count}");
    }

    if report.buildings_total > 0 {
        let enriched = report.enriched_buildings();
        let pct = enriched * 100 / report.buildings_total;
        println!("\nConversion funnel:");
        println!(
            "  Buildings → Enriched: {enriched}/{} ({pct}%)",
            report.buildings_total
        );
        println!(
            "  Contacted → Replied:  {}/{}",
            report.replied_contacts(),
            report.emailed_contacts()
        );
        println!(
            "  Replied → Meeting:    {}/{}",
            report.meeting_contacts(),
            report.replied_contacts()
        );
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Building, Contact};
    use crate::store::LibSqlStore;

    #[tokio::test]
    async fn gathers_only_nonzero_statuses() {
        let store: Arc<dyn EntityStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let building = store
            .insert_building(&Building::new("The Archer", "New York"))
            .await
            .unwrap();
        store
            .update_building_status(building.id, BuildingStatus::Enriched)
            .await
            .unwrap();
        store
            .insert_contact(&Contact::new("Sarah").with_email("s@x.com"))
            .await
            .unwrap();

        let report = gather(&store).await.unwrap();
        assert_eq!(report.buildings_total, 1);
        assert_eq!(report.buildings, vec![("enriched", 1)]);
        assert_eq!(report.contacts, vec![("new", 1)]);
        assert!(report.messages.is_empty());
        assert_eq!(report.enriched_buildings(), 1);
        assert_eq!(report.replied_contacts(), 0);
    }
}

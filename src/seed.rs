//! Seed the database with the known target companies from the distribution
//! playbook. These get prospected before any automated sourcing runs.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::model::Building;
use crate::store::EntityStore;

struct Target {
    name: &'static str,
    company: &'static str,
    city: &'static str,
    state: &'static str,
    unit_count: u32,
    property_url: &'static str,
}

const fn target(
    name: &'static str,
    company: &'static str,
    city: &'static str,
    state: &'static str,
    unit_count: u32,
    property_url: &'static str,
) -> Target {
    Target {
        name,
        company,
        city,
        state,
        unit_count,
        property_url,
    }
}

/// Mix of institutional operators and mid-size regional managers.
const TARGETS: &[Target] = &[
    // Institutional (large operators)
    target("Greystar", "Greystar Real Estate Partners", "New York", "NY", 5000, "https://www.greystar.com"),
    target("Greystar", "Greystar Real Estate Partners", "Los Angeles", "CA", 3000, "https://www.greystar.com"),
    target("Greystar", "Greystar Real Estate Partners", "Miami", "FL", 2500, "https://www.greystar.com"),
    target("AvalonBay Communities", "AvalonBay", "New York", "NY", 4000, "https://www.avaloncommunities.com"),
    target("AvalonBay Communities", "AvalonBay", "Los Angeles", "CA", 2000, "https://www.avaloncommunities.com"),
    target("Equity Residential", "Equity Residential", "New York", "NY", 3500, "https://www.equityapartments.com"),
    target("Equity Residential", "Equity Residential", "Chicago", "IL", 2000, "https://www.equityapartments.com"),
    target("Bozzuto", "Bozzuto Group", "New York", "NY", 2000, "https://www.bozzuto.com"),
    target("Bozzuto", "Bozzuto Group", "Miami", "FL", 1500, "https://www.bozzuto.com"),
    target("Related Companies", "Related Companies", "New York", "NY", 5000, "https://www.related.com"),
    // NYC-focused mid-size operators
    target("Stonehenge NYC", "Stonehenge Partners", "New York", "NY", 800, "https://www.stonehengenyc.com"),
    target("Rose Associates", "Rose Associates", "New York", "NY", 1200, "https://www.roseassociates.com"),
    target("L+M Development Partners", "L+M Development", "New York", "NY", 2000, "https://www.lmdevpartners.com"),
    target("Brookfield Properties", "Brookfield", "New York", "NY", 3000, "https://www.brookfieldproperties.com"),
    target("Silverstein Properties", "Silverstein Properties", "New York", "NY", 1000, "https://www.silversteinproperties.com"),
    target("TF Cornerstone", "TF Cornerstone", "New York", "NY", 1500, "https://www.tfcornerstone.com"),
    target("Gotham Organization", "Gotham Organization", "New York", "NY", 800, "https://www.gothamorg.com"),
    // Miami-focused
    target("Related Group", "Related Group", "Miami", "FL", 2000, "https://www.relatedgroup.com"),
    target("ZOM Living", "ZOM Living", "Miami", "FL", 1000, "https://www.zomliving.com"),
    // LA-focused
    target("Essex Property Trust", "Essex Property Trust", "Los Angeles", "CA", 2500, "https://www.essexapartmenthomes.com"),
    target("Decron Properties", "Decron Properties", "Los Angeles", "CA", 800, "https://www.decron.com"),
    // Chicago-focused
    target("Related Midwest", "Related Midwest", "Chicago", "IL", 1500, "https://www.relatedmidwest.com"),
    target("Magellan Development", "Magellan Development", "Chicago", "IL", 1000, "https://www.magellandevelopment.com"),
    // Austin-focused
    target("Oden Hughes", "Oden Hughes", "Austin", "TX", 600, "https://www.odenhughes.com"),
    target("Presidium", "Presidium Group", "Austin", "TX", 800, "https://www.presidiumgroup.com"),
    // National mid-size
    target("Camden Property Trust", "Camden Property Trust", "Austin", "TX", 1500, "https://www.camdenliving.com"),
    target("UDR", "UDR Inc", "New York", "NY", 1000, "https://www.udr.com"),
    target("MAA", "Mid-America Apartment Communities", "Miami", "FL", 1200, "https://www.maac.com"),
    target("Cortland", "Cortland", "Atlanta", "GA", 2000, "https://www.cortland.com"),
];

/// Seed the target buildings. Re-running is safe: existing (name, city)
/// pairs are left untouched. Returns the count actually added.
pub async fn run(store: &Arc<dyn EntityStore>) -> Result<u32> {
    info!(count = TARGETS.len(), "Seeding target buildings");
    let mut added = 0;

    for t in TARGETS {
        let building = Building::new(t.name, t.city)
            .with_company(t.company)
            .with_state(t.state)
            .with_unit_count(t.unit_count)
            .with_property_url(t.property_url)
            .with_source("manual");

        match store.insert_building(&building).await {
            Ok(stored) if stored.id == building.id => {
                info!(name = t.name, city = t.city, "Seeded");
                added += 1;
            }
            Ok(_) => {}
            Err(e) => warn!(name = t.name, error = %e, "Failed to seed"),
        }
    }

    info!(added, "Seeding complete");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;

    #[tokio::test]
    async fn seeds_all_targets_once() {
        let store: Arc<dyn EntityStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());

        let added = run(&store).await.unwrap();
        assert_eq!(added as usize, TARGETS.len());
        assert_eq!(store.count_buildings().await.unwrap() as usize, TARGETS.len());

        // Idempotent: a second run adds nothing.
        let added = run(&store).await.unwrap();
        assert_eq!(added, 0);
        assert_eq!(store.count_buildings().await.unwrap() as usize, TARGETS.len());
    }

    #[test]
    fn targets_are_unique_per_name_city() {
        let mut seen = std::collections::HashSet::new();
        for t in TARGETS {
            assert!(seen.insert((t.name, t.city)), "duplicate: {} / {}", t.name, t.city);
        }
    }
}

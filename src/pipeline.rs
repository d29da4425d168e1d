//! Full pipeline orchestration: source → enrich → write → followup → send.
//!
//! Each step is isolated: a failing step is logged and the rest of the
//! pipeline still runs, since every step reads its own work from the store.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::Config;
use crate::enricher::ContactEnricher;
use crate::error::Result;
use crate::llm::{AnthropicClient, TextGenerator};
use crate::mail::ResendMailer;
use crate::sender::SendGate;
use crate::sourcing::LeadSourcer;
use crate::store::EntityStore;
use crate::{followup, writer};

pub struct PipelineOptions {
    pub cities: Option<Vec<String>>,
    pub max_pages: u32,
    pub limit: usize,
    pub use_ai: bool,
    pub dry_run: bool,
}

/// Run the pipeline end-to-end.
pub async fn run(store: &Arc<dyn EntityStore>, config: &Config, opts: &PipelineOptions) -> Result<()> {
    info!("Pipeline starting");

    let cities = opts.cities.clone().unwrap_or_else(|| config.target_cities.clone());

    info!("Step 1: sourcing leads");
    let sourcer = LeadSourcer::new(Arc::clone(store));
    if let Err(e) = sourcer.run(&cities, opts.max_pages).await {
        error!(error = %e, "Sourcing failed, continuing");
    }

    info!("Step 2: enriching contacts");
    let enricher = ContactEnricher::new(Arc::clone(store), config.apollo_api_key.clone());
    if let Err(e) = enricher.run(opts.limit, true).await {
        error!(error = %e, "Enrichment failed, continuing");
    }

    info!("Step 3: writing outreach drafts");
    let llm: Option<AnthropicClient> = if opts.use_ai {
        match config.require_anthropic_key() {
            Ok(key) => Some(AnthropicClient::new(key.clone())),
            Err(e) => {
                info!("{e}. Using plain templates");
                None
            }
        }
    } else {
        None
    };
    let llm_ref = llm.as_ref().map(|c| c as &dyn TextGenerator);
    if let Err(e) = writer::run(store, llm_ref, opts.limit, 1).await {
        error!(error = %e, "Writing failed, continuing");
    }

    info!("Step 4: checking follow-ups");
    if let Err(e) = followup::run(store, opts.dry_run).await {
        error!(error = %e, "Follow-up pass failed, continuing");
    }

    if opts.dry_run {
        info!("Step 5: skipped sending (dry run)");
    } else {
        info!("Step 5: sending queued mail");
        let mailer = ResendMailer::new(config.require_resend_key()?.clone());
        let gate = SendGate::new(
            Arc::clone(store),
            Arc::new(mailer),
            config.from_email.clone(),
            config.domain_birth_date,
            config.daily_email_limit,
        );
        gate.run(true, false).await?;
    }

    info!("Pipeline complete");
    Ok(())
}

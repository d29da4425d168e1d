use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use outreach_engine::cli::{Cli, Command};
use outreach_engine::config::Config;
use outreach_engine::enricher::ContactEnricher;
use outreach_engine::llm::{AnthropicClient, TextGenerator};
use outreach_engine::mail::ResendMailer;
use outreach_engine::pipeline::{self, PipelineOptions};
use outreach_engine::sender::SendGate;
use outreach_engine::sourcing::LeadSourcer;
use outreach_engine::store::{EntityStore, LibSqlStore};
use outreach_engine::{classifier, followup, importer, seed, status, writer, Result};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let store: Arc<dyn EntityStore> =
        Arc::new(LibSqlStore::new_local(Path::new(&config.database_path)).await?);

    match cli.command {
        Command::Source { cities, pages } => {
            let cities = cities.unwrap_or_else(|| config.target_cities.clone());
            LeadSourcer::new(store).run(&cities, pages).await?;
        }

        Command::Enrich { limit, no_apollo } => {
            ContactEnricher::new(store, config.apollo_api_key.clone())
                .run(limit, !no_apollo)
                .await?;
        }

        Command::Write {
            limit,
            sequence,
            no_ai,
        } => {
            let llm = if no_ai {
                None
            } else {
                Some(AnthropicClient::new(config.require_anthropic_key()?.clone()))
            };
            let llm_ref = llm.as_ref().map(|c| c as &dyn TextGenerator);
            writer::run(&store, llm_ref, limit, sequence).await?;
        }

        Command::Send {
            auto_queue,
            dry_run,
        } => {
            let mailer = ResendMailer::new(config.require_resend_key()?.clone());
            let gate = SendGate::new(
                store,
                Arc::new(mailer),
                config.from_email.clone(),
                config.domain_birth_date,
                config.daily_email_limit,
            );
            gate.run(auto_queue, dry_run).await?;
        }

        Command::Followup { dry_run } => {
            followup::run(&store, dry_run).await?;
        }

        Command::Pipeline {
            cities,
            pages,
            limit,
            no_ai,
            dry_run,
        } => {
            let opts = PipelineOptions {
                cities,
                max_pages: pages,
                limit,
                use_ai: !no_ai,
                dry_run,
            };
            pipeline::run(&store, &config, &opts).await?;
        }

        Command::Import {
            csv_file,
            city,
            state,
        } => {
            importer::run(&store, &csv_file, &city, &state).await?;
        }

        Command::Seed => {
            seed::run(&store).await?;
        }

        Command::Classify { email, reply } => {
            let llm = AnthropicClient::new(config.require_anthropic_key()?.clone());
            classifier::process_reply(&store, &llm, &email, &reply).await?;
        }

        Command::Status => {
            status::run(&store).await?;
        }
    }

    Ok(())
}

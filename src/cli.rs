//! Command-line interface for the outreach engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "outreach",
    about = "Outbound engine for landlord acquisition",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Find new buildings via public listing and search pages
    Source {
        /// Cities to search (defaults to TARGET_CITIES)
        #[arg(long, num_args = 1..)]
        cities: Option<Vec<String>>,
        /// Max listing pages per city
        #[arg(long, default_value_t = 3)]
        pages: u32,
    },

    /// Find contacts at new buildings
    Enrich {
        /// Max buildings to process
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Skip Apollo, use website scraping only
        #[arg(long)]
        no_apollo: bool,
    },

    /// Generate outreach email drafts
    Write {
        /// Max contacts
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Sequence step to draft
        #[arg(long, default_value_t = 1)]
        sequence: u32,
        /// Skip AI personalization, use plain templates
        #[arg(long)]
        no_ai: bool,
    },

    /// Send queued emails under the daily cap
    Send {
        /// Queue all drafts before sending
        #[arg(long)]
        auto_queue: bool,
        /// Preview without sending
        #[arg(long)]
        dry_run: bool,
    },

    /// Draft due follow-up emails
    Followup {
        /// Preview only
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the full pipeline: source, enrich, write, followup, send
    Pipeline {
        /// Cities to search (defaults to TARGET_CITIES)
        #[arg(long, num_args = 1..)]
        cities: Option<Vec<String>>,
        /// Max listing pages per city
        #[arg(long, default_value_t = 3)]
        pages: u32,
        /// Max items per step
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Skip AI personalization
        #[arg(long)]
        no_ai: bool,
        /// Run everything except sending
        #[arg(long)]
        dry_run: bool,
    },

    /// Import contacts from a CSV export (Apollo, LinkedIn, ...)
    Import {
        /// Path to the CSV file
        csv_file: PathBuf,
        /// Default city for rows without one
        #[arg(long, default_value = "New York")]
        city: String,
        /// Default state for rows without one
        #[arg(long, default_value = "NY")]
        state: String,
    },

    /// Seed the database with known target companies
    Seed,

    /// Classify an incoming reply and apply its transitions
    Classify {
        /// Contact email address the reply came from
        #[arg(long)]
        email: String,
        /// The reply text
        #[arg(long)]
        reply: String,
    },

    /// Show pipeline statistics
    Status,
}

//! Outreach engine — outbound pipeline for landlord acquisition.
//!
//! Buildings come in through sourcing, seeding, or CSV import; contacts are
//! attached by enrichment; drafts are generated from a fixed template
//! sequence; the send gate delivers them under a warming daily cap; and
//! replies feed the classification state machine.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod enricher;
pub mod error;
pub mod followup;
pub mod importer;
pub mod llm;
pub mod mail;
pub mod model;
pub mod pipeline;
pub mod seed;
pub mod sender;
pub mod sequence;
pub mod sourcing;
pub mod status;
pub mod store;
pub mod writer;

pub use config::Config;
pub use error::{Error, Result};

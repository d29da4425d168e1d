//! Error types for the outreach engine.
//!
//! Expected absences of work (no key configured, nothing queued, daily cap
//! reached) are `Ok` outcomes, not variants here — only genuine faults land
//! in these enums.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Sourcing error: {0}")]
    Sourcing(#[from] SourcingError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),
}

/// Configuration-related errors. Fatal for the command that hits them.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors from the entity store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Template instantiation errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("No template defined for sequence number {0}")]
    UnknownStep(u32),

    #[error("Unresolved placeholder {{{name}}} in template")]
    UnresolvedPlaceholder { name: String },
}

/// AI text-service errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Mail-delivery errors other than bounces (bounces are a delivery outcome,
/// not an error).
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Delivery request failed: {0}")]
    RequestFailed(String),

    #[error("Provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Lead-sourcing / scraping errors.
#[derive(Debug, thiserror::Error)]
pub enum SourcingError {
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Unknown city: {0} (not in the city/state table)")]
    UnknownCity(String),
}

/// CSV import errors.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV must have at least an email or name column (found: {0})")]
    NoUsableColumns(String),

    #[error("CSV parse error: {0}")]
    Parse(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;

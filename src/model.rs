//! Typed entity records for the three collections: buildings, contacts,
//! and outreach messages. Status enums are closed — conversion to/from the
//! store's string representation happens here, at the boundary.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Sentinel full name for contacts harvested without a real name.
pub const UNKNOWN_NAME: &str = "Unknown";

// ── Building ────────────────────────────────────────────────────────

/// Funnel status of a prospect building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingStatus {
    New,
    Enriched,
    Contacted,
    Replied,
    Meeting,
    Onboarded,
    Rejected,
}

impl BuildingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingStatus::New => "new",
            BuildingStatus::Enriched => "enriched",
            BuildingStatus::Contacted => "contacted",
            BuildingStatus::Replied => "replied",
            BuildingStatus::Meeting => "meeting",
            BuildingStatus::Onboarded => "onboarded",
            BuildingStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "enriched" => BuildingStatus::Enriched,
            "contacted" => BuildingStatus::Contacted,
            "replied" => BuildingStatus::Replied,
            "meeting" => BuildingStatus::Meeting,
            "onboarded" => BuildingStatus::Onboarded,
            "rejected" => BuildingStatus::Rejected,
            _ => BuildingStatus::New,
        }
    }

    /// All statuses, in funnel order. Used by the status command.
    pub fn all() -> &'static [BuildingStatus] {
        &[
            BuildingStatus::New,
            BuildingStatus::Enriched,
            BuildingStatus::Contacted,
            BuildingStatus::Replied,
            BuildingStatus::Meeting,
            BuildingStatus::Onboarded,
            BuildingStatus::Rejected,
        ]
    }
}

/// A prospect organization/property. At most one row per (name, city).
#[derive(Debug, Clone)]
pub struct Building {
    pub id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub address: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub unit_count: Option<u32>,
    pub property_url: Option<String>,
    /// How this building was discovered (apartments_com, google, manual, csv_import).
    pub source: Option<String>,
    pub status: BuildingStatus,
    pub created_at: DateTime<Utc>,
}

impl Building {
    pub fn new(name: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            company: None,
            address: None,
            city: city.into(),
            state: None,
            unit_count: None,
            property_url: None,
            source: None,
            status: BuildingStatus::New,
            created_at: Utc::now(),
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_unit_count(mut self, count: u32) -> Self {
        self.unit_count = Some(count);
        self
    }

    pub fn with_property_url(mut self, url: impl Into<String>) -> Self {
        self.property_url = Some(url.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ── Contact ─────────────────────────────────────────────────────────

/// Funnel status of a contact. `Rejected` and `Unsubscribed` are absorbing:
/// no further sends once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    New,
    Emailed,
    Replied,
    Meeting,
    Closed,
    Rejected,
    Unsubscribed,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Emailed => "emailed",
            ContactStatus::Replied => "replied",
            ContactStatus::Meeting => "meeting",
            ContactStatus::Closed => "closed",
            ContactStatus::Rejected => "rejected",
            ContactStatus::Unsubscribed => "unsubscribed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "emailed" => ContactStatus::Emailed,
            "replied" => ContactStatus::Replied,
            "meeting" => ContactStatus::Meeting,
            "closed" => ContactStatus::Closed,
            "rejected" => ContactStatus::Rejected,
            "unsubscribed" => ContactStatus::Unsubscribed,
            _ => ContactStatus::New,
        }
    }

    pub fn all() -> &'static [ContactStatus] {
        &[
            ContactStatus::New,
            ContactStatus::Emailed,
            ContactStatus::Replied,
            ContactStatus::Meeting,
            ContactStatus::Closed,
            ContactStatus::Rejected,
            ContactStatus::Unsubscribed,
        ]
    }
}

/// A person at a building. At most one row per email address.
#[derive(Debug, Clone)]
pub struct Contact {
    pub id: Uuid,
    pub building_id: Option<Uuid>,
    pub full_name: String,
    pub email: Option<String>,
    pub title: Option<String>,
    pub linkedin_url: Option<String>,
    /// Append-only, timestamped free-text log.
    pub notes: Option<String>,
    pub source: Option<String>,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            building_id: None,
            full_name: full_name.into(),
            email: None,
            title: None,
            linkedin_url: None,
            notes: None,
            source: None,
            status: ContactStatus::New,
            created_at: Utc::now(),
        }
    }

    pub fn with_building(mut self, building_id: Uuid) -> Self {
        self.building_id = Some(building_id);
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_linkedin(mut self, url: impl Into<String>) -> Self {
        self.linkedin_url = Some(url.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// First token of the full name, falling back to "there" for the
    /// `Unknown` sentinel. This is the `{first_name}` template variable.
    pub fn first_name(&self) -> &str {
        if self.full_name == UNKNOWN_NAME {
            return "there";
        }
        self.full_name
            .split_whitespace()
            .next()
            .unwrap_or("there")
    }
}

// ── OutreachMessage ─────────────────────────────────────────────────

/// Lifecycle status of one outreach message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Draft,
    Queued,
    Sent,
    Opened,
    Replied,
    Bounced,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Draft => "draft",
            MessageStatus::Queued => "queued",
            MessageStatus::Sent => "sent",
            MessageStatus::Opened => "opened",
            MessageStatus::Replied => "replied",
            MessageStatus::Bounced => "bounced",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => MessageStatus::Queued,
            "sent" => MessageStatus::Sent,
            "opened" => MessageStatus::Opened,
            "replied" => MessageStatus::Replied,
            "bounced" => MessageStatus::Bounced,
            _ => MessageStatus::Draft,
        }
    }

    pub fn all() -> &'static [MessageStatus] {
        &[
            MessageStatus::Draft,
            MessageStatus::Queued,
            MessageStatus::Sent,
            MessageStatus::Opened,
            MessageStatus::Replied,
            MessageStatus::Bounced,
        ]
    }
}

/// One instance of one sequence step sent (or pending) to one contact.
#[derive(Debug, Clone)]
pub struct OutreachMessage {
    pub id: Uuid,
    pub contact_id: Uuid,
    /// Denormalized convenience reference.
    pub building_id: Option<Uuid>,
    /// 1-based position in the template sequence.
    pub sequence_number: u32,
    pub subject: String,
    pub body: String,
    pub status: MessageStatus,
    /// Set only on the transition into `Sent`.
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutreachMessage {
    pub fn draft(
        contact_id: Uuid,
        building_id: Option<Uuid>,
        sequence_number: u32,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            contact_id,
            building_id,
            sequence_number,
            subject: subject.into(),
            body: body.into(),
            status: MessageStatus::Draft,
            sent_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in MessageStatus::all() {
            assert_eq!(MessageStatus::parse(s.as_str()), *s);
        }
        for s in ContactStatus::all() {
            assert_eq!(ContactStatus::parse(s.as_str()), *s);
        }
        for s in BuildingStatus::all() {
            assert_eq!(BuildingStatus::parse(s.as_str()), *s);
        }
    }

    #[test]
    fn unknown_status_strings_fall_back() {
        assert_eq!(MessageStatus::parse("???"), MessageStatus::Draft);
        assert_eq!(ContactStatus::parse("???"), ContactStatus::New);
        assert_eq!(BuildingStatus::parse("???"), BuildingStatus::New);
    }

    #[test]
    fn first_name_takes_first_token() {
        let c = Contact::new("Sarah Johnson");
        assert_eq!(c.first_name(), "Sarah");
    }

    #[test]
    fn first_name_unknown_sentinel_is_there() {
        let c = Contact::new(UNKNOWN_NAME);
        assert_eq!(c.first_name(), "there");
    }

    #[test]
    fn first_name_empty_is_there() {
        let c = Contact::new("");
        assert_eq!(c.first_name(), "there");
    }
}

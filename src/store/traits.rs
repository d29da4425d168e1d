//! Backend-agnostic `EntityStore` trait — single async interface for all
//! persistence over the three entity collections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    Building, BuildingStatus, Contact, ContactStatus, MessageStatus, OutreachMessage,
};

/// Async store over buildings, contacts, and outreach messages.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // ── Buildings ───────────────────────────────────────────────────

    /// Insert a building, deduplicated on (name, city). Returns the stored
    /// row: the existing one unchanged if the key was already present.
    async fn insert_building(&self, building: &Building) -> Result<Building, StoreError>;

    async fn building_by_id(&self, id: Uuid) -> Result<Option<Building>, StoreError>;

    async fn buildings_by_status(
        &self,
        status: BuildingStatus,
        limit: usize,
    ) -> Result<Vec<Building>, StoreError>;

    async fn update_building_status(
        &self,
        id: Uuid,
        status: BuildingStatus,
    ) -> Result<(), StoreError>;

    async fn count_buildings(&self) -> Result<u64, StoreError>;

    async fn count_buildings_by_status(&self, status: BuildingStatus) -> Result<u64, StoreError>;

    // ── Contacts ────────────────────────────────────────────────────

    /// Insert a contact, deduplicated on email (when present). Returns the
    /// stored row: the existing one unchanged if the email was known.
    async fn insert_contact(&self, contact: &Contact) -> Result<Contact, StoreError>;

    async fn contact_by_id(&self, id: Uuid) -> Result<Option<Contact>, StoreError>;

    async fn contact_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError>;

    async fn contacts_by_status(
        &self,
        status: ContactStatus,
        limit: usize,
    ) -> Result<Vec<Contact>, StoreError>;

    async fn update_contact_status(
        &self,
        id: Uuid,
        status: ContactStatus,
    ) -> Result<(), StoreError>;

    /// Append a timestamped line to the contact's notes log.
    async fn append_contact_note(&self, id: Uuid, note: &str) -> Result<(), StoreError>;

    async fn count_contacts(&self) -> Result<u64, StoreError>;

    async fn count_contacts_by_status(&self, status: ContactStatus) -> Result<u64, StoreError>;

    // ── Outreach messages ───────────────────────────────────────────

    async fn insert_message(&self, message: &OutreachMessage) -> Result<(), StoreError>;

    /// All messages for a contact, newest sequence number first.
    async fn messages_for_contact(
        &self,
        contact_id: Uuid,
    ) -> Result<Vec<OutreachMessage>, StoreError>;

    /// Messages in a status, oldest-created first (FIFO for the send gate).
    async fn messages_by_status(
        &self,
        status: MessageStatus,
        limit: usize,
    ) -> Result<Vec<OutreachMessage>, StoreError>;

    /// The most recently sent message to a contact, if any.
    async fn latest_sent_message(
        &self,
        contact_id: Uuid,
    ) -> Result<Option<OutreachMessage>, StoreError>;

    async fn update_message_status(
        &self,
        id: Uuid,
        status: MessageStatus,
    ) -> Result<(), StoreError>;

    /// Transition a message into `Sent` and stamp `sent_at`.
    async fn mark_message_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Count messages with status `Sent` whose `sent_at` is at or after the
    /// given instant. Drives the daily send-cap accounting.
    async fn count_messages_sent_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn count_messages(&self) -> Result<u64, StoreError>;

    async fn count_messages_by_status(&self, status: MessageStatus) -> Result<u64, StoreError>;
}

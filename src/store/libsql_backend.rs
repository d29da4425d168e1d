//! libSQL backend — async `EntityStore` trait implementation.
//!
//! Supports local file and in-memory databases. All timestamps are written
//! as RFC 3339 and parsed leniently on the way back out.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    Building, BuildingStatus, Contact, ContactStatus, MessageStatus, OutreachMessage,
};
use crate::store::migrations;
use crate::store::traits::EntityStore;

/// libSQL entity store.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create database directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

/// Convert `Option<&str>` to a libsql value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_uuid(id: Option<Uuid>) -> libsql::Value {
    match id {
        Some(id) => libsql::Value::Text(id.to_string()),
        None => libsql::Value::Null,
    }
}

const BUILDING_COLUMNS: &str =
    "id, name, company, address, city, state, unit_count, property_url, source, status, created_at";

const CONTACT_COLUMNS: &str =
    "id, building_id, full_name, email, title, linkedin_url, notes, source, status, created_at";

const MESSAGE_COLUMNS: &str =
    "id, contact_id, building_id, sequence_number, subject, body, status, sent_at, created_at";

/// Map a libsql row to a Building. Column order matches BUILDING_COLUMNS.
fn row_to_building(row: &libsql::Row) -> Result<Building, libsql::Error> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(9)?;
    let created_str: String = row.get(10)?;
    let unit_count: Option<i64> = row.get::<i64>(6).ok();

    Ok(Building {
        id: parse_uuid(&id_str),
        name: row.get(1)?,
        company: row.get(2).ok(),
        address: row.get(3).ok(),
        city: row.get(4)?,
        state: row.get(5).ok(),
        unit_count: unit_count.and_then(|n| u32::try_from(n).ok()),
        property_url: row.get(7).ok(),
        source: row.get(8).ok(),
        status: BuildingStatus::parse(&status_str),
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql row to a Contact. Column order matches CONTACT_COLUMNS.
fn row_to_contact(row: &libsql::Row) -> Result<Contact, libsql::Error> {
    let id_str: String = row.get(0)?;
    let building_id: Option<String> = row.get(1).ok();
    let status_str: String = row.get(8)?;
    let created_str: String = row.get(9)?;

    Ok(Contact {
        id: parse_uuid(&id_str),
        building_id: building_id.as_deref().map(parse_uuid),
        full_name: row.get(2)?,
        email: row.get(3).ok(),
        title: row.get(4).ok(),
        linkedin_url: row.get(5).ok(),
        notes: row.get(6).ok(),
        source: row.get(7).ok(),
        status: ContactStatus::parse(&status_str),
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql row to an OutreachMessage. Column order matches MESSAGE_COLUMNS.
fn row_to_message(row: &libsql::Row) -> Result<OutreachMessage, libsql::Error> {
    let id_str: String = row.get(0)?;
    let contact_str: String = row.get(1)?;
    let building_id: Option<String> = row.get(2).ok();
    let seq: i64 = row.get(3)?;
    let status_str: String = row.get(6)?;
    let sent_at: Option<String> = row.get(7).ok();
    let created_str: String = row.get(8)?;

    Ok(OutreachMessage {
        id: parse_uuid(&id_str),
        contact_id: parse_uuid(&contact_str),
        building_id: building_id.as_deref().map(parse_uuid),
        sequence_number: u32::try_from(seq).unwrap_or(0),
        subject: row.get(4)?,
        body: row.get(5)?,
        status: MessageStatus::parse(&status_str),
        sent_at: sent_at.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_str),
    })
}

async fn collect_rows<T>(
    mut rows: libsql::Rows,
    map: fn(&libsql::Row) -> Result<T, libsql::Error>,
    what: &str,
) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| StoreError::Query(format!("{what}: {e}")))?
    {
        out.push(map(&row).map_err(|e| StoreError::Query(format!("{what} row: {e}")))?);
    }
    Ok(out)
}

async fn count_query(
    conn: &Connection,
    sql: &str,
    query_params: impl libsql::params::IntoParams,
    what: &str,
) -> Result<u64, StoreError> {
    let mut rows = conn
        .query(sql, query_params)
        .await
        .map_err(|e| StoreError::Query(format!("{what}: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| StoreError::Query(format!("{what}: {e}")))?
    {
        Some(row) => {
            let n: i64 = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("{what}: {e}")))?;
            Ok(u64::try_from(n).unwrap_or(0))
        }
        None => Ok(0),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl EntityStore for LibSqlStore {
    async fn insert_building(&self, building: &Building) -> Result<Building, StoreError> {
        let conn = self.conn();

        // Dedupe on (name, city): return the existing row unchanged.
        let mut rows = conn
            .query(
                &format!("SELECT {BUILDING_COLUMNS} FROM buildings WHERE name = ?1 AND city = ?2"),
                params![building.name.clone(), building.city.clone()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_building dedupe: {e}")))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("insert_building dedupe: {e}")))?
        {
            return row_to_building(&row)
                .map_err(|e| StoreError::Query(format!("insert_building dedupe row: {e}")));
        }

        conn.execute(
            "INSERT INTO buildings (id, name, company, address, city, state, unit_count, property_url, source, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                building.id.to_string(),
                building.name.clone(),
                opt_text(building.company.as_deref()),
                opt_text(building.address.as_deref()),
                building.city.clone(),
                opt_text(building.state.as_deref()),
                match building.unit_count {
                    Some(n) => libsql::Value::Integer(n as i64),
                    None => libsql::Value::Null,
                },
                opt_text(building.property_url.as_deref()),
                opt_text(building.source.as_deref()),
                building.status.as_str(),
                building.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| StoreError::Query(format!("insert_building: {e}")))?;

        Ok(building.clone())
    }

    async fn building_by_id(&self, id: Uuid) -> Result<Option<Building>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {BUILDING_COLUMNS} FROM buildings WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("building_by_id: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("building_by_id: {e}")))?
        {
            Some(row) => Ok(Some(row_to_building(&row).map_err(|e| {
                StoreError::Query(format!("building_by_id row: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    async fn buildings_by_status(
        &self,
        status: BuildingStatus,
        limit: usize,
    ) -> Result<Vec<Building>, StoreError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BUILDING_COLUMNS} FROM buildings WHERE status = ?1 \
                     ORDER BY created_at ASC LIMIT ?2"
                ),
                params![status.as_str(), limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("buildings_by_status: {e}")))?;

        collect_rows(rows, row_to_building, "buildings_by_status").await
    }

    async fn update_building_status(
        &self,
        id: Uuid,
        status: BuildingStatus,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE buildings SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_building_status: {e}")))?;
        Ok(())
    }

    async fn count_buildings(&self) -> Result<u64, StoreError> {
        count_query(
            self.conn(),
            "SELECT COUNT(*) FROM buildings",
            (),
            "count_buildings",
        )
        .await
    }

    async fn count_buildings_by_status(&self, status: BuildingStatus) -> Result<u64, StoreError> {
        count_query(
            self.conn(),
            "SELECT COUNT(*) FROM buildings WHERE status = ?1",
            params![status.as_str()],
            "count_buildings_by_status",
        )
        .await
    }

    // ── Contacts ────────────────────────────────────────────────────

    async fn insert_contact(&self, contact: &Contact) -> Result<Contact, StoreError> {
        let conn = self.conn();

        // Dedupe on email when one is present.
        if let Some(ref email) = contact.email {
            if let Some(existing) = self.contact_by_email(email).await? {
                return Ok(existing);
            }
        }

        conn.execute(
            "INSERT INTO contacts (id, building_id, full_name, email, title, linkedin_url, notes, source, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                contact.id.to_string(),
                opt_uuid(contact.building_id),
                contact.full_name.clone(),
                opt_text(contact.email.as_deref()),
                opt_text(contact.title.as_deref()),
                opt_text(contact.linkedin_url.as_deref()),
                opt_text(contact.notes.as_deref()),
                opt_text(contact.source.as_deref()),
                contact.status.as_str(),
                contact.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| StoreError::Query(format!("insert_contact: {e}")))?;

        Ok(contact.clone())
    }

    async fn contact_by_id(&self, id: Uuid) -> Result<Option<Contact>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("contact_by_id: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("contact_by_id: {e}")))?
        {
            Some(row) => Ok(Some(row_to_contact(&row).map_err(|e| {
                StoreError::Query(format!("contact_by_id row: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    async fn contact_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| StoreError::Query(format!("contact_by_email: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("contact_by_email: {e}")))?
        {
            Some(row) => Ok(Some(row_to_contact(&row).map_err(|e| {
                StoreError::Query(format!("contact_by_email row: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    async fn contacts_by_status(
        &self,
        status: ContactStatus,
        limit: usize,
    ) -> Result<Vec<Contact>, StoreError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts WHERE status = ?1 \
                     ORDER BY created_at ASC LIMIT ?2"
                ),
                params![status.as_str(), limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("contacts_by_status: {e}")))?;

        collect_rows(rows, row_to_contact, "contacts_by_status").await
    }

    async fn update_contact_status(
        &self,
        id: Uuid,
        status: ContactStatus,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE contacts SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_contact_status: {e}")))?;
        Ok(())
    }

    async fn append_contact_note(&self, id: Uuid, note: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE contacts SET notes = CASE \
                     WHEN notes IS NULL OR notes = '' THEN ?1 \
                     ELSE notes || char(10) || ?1 \
                 END WHERE id = ?2",
                params![note, id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("append_contact_note: {e}")))?;
        Ok(())
    }

    async fn count_contacts(&self) -> Result<u64, StoreError> {
        count_query(
            self.conn(),
            "SELECT COUNT(*) FROM contacts",
            (),
            "count_contacts",
        )
        .await
    }

    async fn count_contacts_by_status(&self, status: ContactStatus) -> Result<u64, StoreError> {
        count_query(
            self.conn(),
            "SELECT COUNT(*) FROM contacts WHERE status = ?1",
            params![status.as_str()],
            "count_contacts_by_status",
        )
        .await
    }

    // ── Outreach messages ───────────────────────────────────────────

    async fn insert_message(&self, message: &OutreachMessage) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO outreach_messages (id, contact_id, building_id, sequence_number, subject, body, status, sent_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    message.id.to_string(),
                    message.contact_id.to_string(),
                    opt_uuid(message.building_id),
                    message.sequence_number as i64,
                    message.subject.clone(),
                    message.body.clone(),
                    message.status.as_str(),
                    match message.sent_at {
                        Some(t) => libsql::Value::Text(t.to_rfc3339()),
                        None => libsql::Value::Null,
                    },
                    message.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_message: {e}")))?;
        Ok(())
    }

    async fn messages_for_contact(
        &self,
        contact_id: Uuid,
    ) -> Result<Vec<OutreachMessage>, StoreError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM outreach_messages \
                     WHERE contact_id = ?1 ORDER BY sequence_number DESC"
                ),
                params![contact_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("messages_for_contact: {e}")))?;

        collect_rows(rows, row_to_message, "messages_for_contact").await
    }

    async fn messages_by_status(
        &self,
        status: MessageStatus,
        limit: usize,
    ) -> Result<Vec<OutreachMessage>, StoreError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM outreach_messages WHERE status = ?1 \
                     ORDER BY created_at ASC LIMIT ?2"
                ),
                params![status.as_str(), limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("messages_by_status: {e}")))?;

        collect_rows(rows, row_to_message, "messages_by_status").await
    }

    async fn latest_sent_message(
        &self,
        contact_id: Uuid,
    ) -> Result<Option<OutreachMessage>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM outreach_messages \
                     WHERE contact_id = ?1 AND status = 'sent' \
                     ORDER BY sent_at DESC LIMIT 1"
                ),
                params![contact_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("latest_sent_message: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("latest_sent_message: {e}")))?
        {
            Some(row) => Ok(Some(row_to_message(&row).map_err(|e| {
                StoreError::Query(format!("latest_sent_message row: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    async fn update_message_status(
        &self,
        id: Uuid,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE outreach_messages SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_message_status: {e}")))?;
        Ok(())
    }

    async fn mark_message_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE outreach_messages SET status = 'sent', sent_at = ?1 WHERE id = ?2",
                params![sent_at.to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("mark_message_sent: {e}")))?;
        Ok(())
    }

    async fn count_messages_sent_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        count_query(
            self.conn(),
            "SELECT COUNT(*) FROM outreach_messages WHERE status = 'sent' AND sent_at >= ?1",
            params![since.to_rfc3339()],
            "count_messages_sent_since",
        )
        .await
    }

    async fn count_messages(&self) -> Result<u64, StoreError> {
        count_query(
            self.conn(),
            "SELECT COUNT(*) FROM outreach_messages",
            (),
            "count_messages",
        )
        .await
    }

    async fn count_messages_by_status(&self, status: MessageStatus) -> Result<u64, StoreError> {
        count_query(
            self.conn(),
            "SELECT COUNT(*) FROM outreach_messages WHERE status = ?1",
            params![status.as_str()],
            "count_messages_by_status",
        )
        .await
    }
}

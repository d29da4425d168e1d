//! Send gate — admits queued messages for delivery under a daily cap that
//! ramps up while the sending domain warms.
//!
//! Hitting the daily limit is a normal outcome, not an error. Transient
//! provider faults leave the message queued for the next cycle; only a hard
//! bounce signal is terminal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::mail::{self, Mailer, SendOutcome};
use crate::model::{ContactStatus, MessageStatus, OutreachMessage};
use crate::store::EntityStore;

/// Weekly ramp for a fresh sending domain: (domain age in weeks, daily cap).
/// The first row whose age bound exceeds the domain's real-valued age wins;
/// past the table the configured default cap applies.
pub const WARMUP_SCHEDULE: &[(u32, u32)] = &[(1, 15), (2, 25), (3, 40)];

/// How many queued messages one cycle will consider.
const BATCH_LIMIT: usize = 200;

/// Effective daily cap for `today` given the domain's birth date.
pub fn warmup_limit(
    today: NaiveDate,
    domain_birth_date: NaiveDate,
    schedule: &[(u32, u32)],
    default_cap: u32,
) -> u32 {
    let days_old = (today - domain_birth_date).num_days().max(0);
    let weeks_old = days_old as f64 / 7.0;

    for &(weeks, cap) in schedule {
        if weeks_old < f64::from(weeks) {
            return cap;
        }
    }
    default_cap
}

/// Start of the current UTC calendar day.
fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or(now.naive_utc())
        .and_utc()
}

/// Summary of one send cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub queued: u32,
    pub sent: u32,
    pub bounced: u32,
    pub skipped_no_email: u32,
    pub deferred: u32,
}

/// One send cycle over the queued messages.
pub struct SendGate {
    store: Arc<dyn EntityStore>,
    mailer: Arc<dyn Mailer>,
    from_email: String,
    domain_birth_date: NaiveDate,
    default_cap: u32,
    /// Pause between deliveries. Zero in tests.
    send_pause: Duration,
}

impl SendGate {
    pub fn new(
        store: Arc<dyn EntityStore>,
        mailer: Arc<dyn Mailer>,
        from_email: String,
        domain_birth_date: NaiveDate,
        default_cap: u32,
    ) -> Self {
        Self {
            store,
            mailer,
            from_email,
            domain_birth_date,
            default_cap,
            send_pause: Duration::from_secs(2),
        }
    }

    pub fn with_send_pause(mut self, pause: Duration) -> Self {
        self.send_pause = pause;
        self
    }

    /// Promote all drafts to the send queue.
    pub async fn queue_drafts(&self) -> Result<u32> {
        let drafts = self
            .store
            .messages_by_status(MessageStatus::Draft, BATCH_LIMIT)
            .await?;
        let mut queued = 0;
        for draft in &drafts {
            self.store
                .update_message_status(draft.id, MessageStatus::Queued)
                .await?;
            queued += 1;
        }
        if queued > 0 {
            info!(count = queued, "Queued drafts for sending");
        }
        Ok(queued)
    }

    /// Run one cycle: admit queued messages FIFO up to today's remaining
    /// budget and deliver each.
    pub async fn run(&self, auto_queue: bool, dry_run: bool) -> Result<SendReport> {
        let mut report = SendReport::default();

        if auto_queue {
            report.queued = self.queue_drafts().await?;
        }

        let now = Utc::now();
        let limit = warmup_limit(
            now.date_naive(),
            self.domain_birth_date,
            WARMUP_SCHEDULE,
            self.default_cap,
        );
        let sent_today = self
            .store
            .count_messages_sent_since(start_of_utc_day(now))
            .await?;
        let remaining = u64::from(limit).saturating_sub(sent_today);

        info!(
            daily_limit = limit,
            sent_today, remaining, "Send gate opening"
        );

        if remaining == 0 {
            info!("Daily send limit reached, nothing to do until tomorrow");
            return Ok(report);
        }

        let queued = self
            .store
            .messages_by_status(MessageStatus::Queued, BATCH_LIMIT)
            .await?;
        if queued.is_empty() {
            info!("No queued messages. Run write or followup first");
            return Ok(report);
        }

        let batch = &queued[..queued.len().min(remaining as usize)];

        if dry_run {
            for message in batch {
                info!(
                    message = %message.id,
                    sequence = message.sequence_number,
                    subject = %message.subject,
                    "[dry run] would send"
                );
            }
            return Ok(report);
        }

        for (i, message) in batch.iter().enumerate() {
            match self.deliver(message).await {
                Ok(SendOutcome::Delivered) => report.sent += 1,
                Ok(SendOutcome::Bounced { .. }) => report.bounced += 1,
                Err(DeliveryError::NoAddress) => report.skipped_no_email += 1,
                Err(DeliveryError::Transient(reason)) => {
                    warn!(message = %message.id, %reason, "Delivery failed, leaving queued");
                    report.deferred += 1;
                }
                Err(DeliveryError::Store(e)) => return Err(e.into()),
            }

            if i + 1 < batch.len() && !self.send_pause.is_zero() {
                tokio::time::sleep(self.send_pause).await;
            }
        }

        info!(
            sent = report.sent,
            bounced = report.bounced,
            deferred = report.deferred,
            "Send cycle complete"
        );
        Ok(report)
    }

    /// Deliver one message and record the outcome.
    async fn deliver(&self, message: &OutreachMessage) -> std::result::Result<SendOutcome, DeliveryError> {
        let contact = self
            .store
            .contact_by_id(message.contact_id)
            .await
            .map_err(DeliveryError::Store)?;

        let Some(email) = contact.as_ref().and_then(|c| c.email.clone()) else {
            // Addressless message should never sit in the queue.
            warn!(message = %message.id, "Queued message has no destination address, reverting to draft");
            self.store
                .update_message_status(message.id, MessageStatus::Draft)
                .await
                .map_err(DeliveryError::Store)?;
            return Err(DeliveryError::NoAddress);
        };

        let html = mail::to_html(&message.body);
        let outcome = self
            .mailer
            .send(&self.from_email, &email, &message.subject, &html)
            .await;

        match outcome {
            Ok(SendOutcome::Delivered) => {
                self.store
                    .mark_message_sent(message.id, Utc::now())
                    .await
                    .map_err(DeliveryError::Store)?;
                self.store
                    .update_contact_status(message.contact_id, ContactStatus::Emailed)
                    .await
                    .map_err(DeliveryError::Store)?;
                info!(to = %email, sequence = message.sequence_number, "Sent");
                Ok(SendOutcome::Delivered)
            }
            Ok(SendOutcome::Bounced { reason }) => {
                self.store
                    .update_message_status(message.id, MessageStatus::Bounced)
                    .await
                    .map_err(DeliveryError::Store)?;
                warn!(to = %email, %reason, "Bounced");
                Ok(SendOutcome::Bounced { reason })
            }
            Err(e) => Err(DeliveryError::Transient(e.to_string())),
        }
    }
}

enum DeliveryError {
    NoAddress,
    Transient(String),
    Store(crate::error::StoreError),
}

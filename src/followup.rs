//! Follow-up eligibility engine.
//!
//! Given each emailed contact's message history and the current time,
//! decides who is due for the next sequence step and who has exhausted the
//! sequence with no reply. The decision itself is a pure function over the
//! history; store access stays at the edges.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{Building, Contact, ContactStatus, MessageStatus, OutreachMessage};
use crate::sequence;
use crate::store::EntityStore;
use crate::writer::{self, DraftOutcome};

/// Upper bound on contacts examined per run.
const SCAN_LIMIT: usize = 500;

/// Outcome of the per-contact eligibility decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDecision {
    /// Due for the next step now.
    Due {
        next_sequence: u32,
        days_since_last: i64,
    },
    /// Next step exists but its delay has not elapsed.
    Waiting {
        next_sequence: u32,
        due_at: DateTime<Utc>,
    },
    /// A reply exists somewhere in the history — the sequence is stopped.
    Replied,
    /// Nothing has actually been sent yet; there is no delay clock to run.
    NothingSent,
    /// Past the last defined step. Surfaced for manual review.
    Exhausted,
}

/// Decide the next step for one contact from its message history.
///
/// The contact-status filter happens at the caller; this function only
/// looks at messages. A message-level `Replied` suppresses follow-up even
/// when the contact's aggregate status has not caught up yet — the two are
/// updated by different components and may briefly disagree.
pub fn next_step(history: &[OutreachMessage], now: DateTime<Utc>) -> StepDecision {
    if history.iter().any(|m| m.status == MessageStatus::Replied) {
        return StepDecision::Replied;
    }

    // Only a confirmed send anchors the delay clock. Drafts and queued
    // messages don't count.
    let latest_sent = history
        .iter()
        .filter(|m| m.status == MessageStatus::Sent)
        .max_by_key(|m| m.sequence_number);

    let Some(latest) = latest_sent else {
        return StepDecision::NothingSent;
    };

    let next_sequence = latest.sequence_number + 1;
    let Some(template) = sequence::template_for(next_sequence) else {
        return StepDecision::Exhausted;
    };

    let anchor = latest.sent_at.unwrap_or(latest.created_at);
    let due_at = anchor + chrono::Duration::days(template.delay_days);

    // Closed lower bound: exactly on the boundary counts as due.
    if now >= due_at {
        StepDecision::Due {
            next_sequence,
            days_since_last: (now - anchor).num_days(),
        }
    } else {
        StepDecision::Waiting {
            next_sequence,
            due_at,
        }
    }
}

/// A contact due for a follow-up, with denormalized building context.
#[derive(Debug, Clone)]
pub struct FollowupCandidate {
    pub contact: Contact,
    pub building: Option<Building>,
    pub next_sequence: u32,
    pub days_since_last: i64,
}

/// Everything one eligibility pass found.
#[derive(Debug, Default)]
pub struct FollowupReport {
    pub due: Vec<FollowupCandidate>,
    /// Contacts that completed the full sequence with no reply.
    pub exhausted: Vec<Contact>,
}

/// Scan all `emailed` contacts and classify each against the sequence.
pub async fn find_due_followups(
    store: &Arc<dyn EntityStore>,
    now: DateTime<Utc>,
) -> Result<FollowupReport> {
    let contacts = store
        .contacts_by_status(ContactStatus::Emailed, SCAN_LIMIT)
        .await?;

    let mut report = FollowupReport::default();

    for contact in contacts {
        let history = store.messages_for_contact(contact.id).await?;
        if history.is_empty() {
            continue;
        }

        match next_step(&history, now) {
            StepDecision::Due {
                next_sequence,
                days_since_last,
            } => {
                let building = match contact.building_id {
                    Some(id) => store.building_by_id(id).await?,
                    None => None,
                };
                report.due.push(FollowupCandidate {
                    contact,
                    building,
                    next_sequence,
                    days_since_last,
                });
            }
            StepDecision::Exhausted => report.exhausted.push(contact),
            StepDecision::Waiting { .. }
            | StepDecision::Replied
            | StepDecision::NothingSent => {}
        }
    }

    Ok(report)
}

/// The `followup` command: draft the next step for everyone who is due.
/// Returns the number of drafts created.
pub async fn run(store: &Arc<dyn EntityStore>, dry_run: bool) -> Result<u32> {
    let report = find_due_followups(store, Utc::now()).await?;

    if report.due.is_empty() && report.exhausted.is_empty() {
        info!("No contacts need follow-up right now");
        return Ok(0);
    }

    info!(count = report.due.len(), "Contacts due for follow-up");
    let mut generated = 0;

    for candidate in &report.due {
        let name = &candidate.contact.full_name;
        let email = candidate.contact.email.as_deref().unwrap_or("no email");
        info!(
            contact = %name,
            email = %email,
            next_sequence = candidate.next_sequence,
            days_since_last = candidate.days_since_last,
            "Due for follow-up"
        );

        if dry_run {
            generated += 1;
            continue;
        }

        // Template fill only — follow-ups reuse the base copy; the intro is
        // the personalized one.
        match writer::create_draft(
            store,
            None,
            &candidate.contact,
            candidate.building.as_ref(),
            candidate.next_sequence,
        )
        .await
        {
            Ok(DraftOutcome::Created) => generated += 1,
            Ok(DraftOutcome::SkippedExisting) => {
                info!(contact = %name, sequence = candidate.next_sequence, "Draft already exists, skipping");
            }
            Ok(DraftOutcome::SkippedNoEmail) => {
                warn!(contact = %name, "No email address, skipping follow-up");
            }
            Err(e) => {
                // One contact's failure must not abort the rest of the batch.
                warn!(contact = %name, error = %e, "Failed to create follow-up draft");
            }
        }
    }

    if !report.exhausted.is_empty() {
        info!(
            count = report.exhausted.len(),
            "Contacts completed the full sequence with no reply — consider manual outreach"
        );
    }

    let action = if dry_run { "Would generate" } else { "Generated" };
    info!("{action} {generated} follow-up drafts");
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn msg(seq: u32, status: MessageStatus, sent_days_ago: Option<i64>) -> OutreachMessage {
        let mut m = OutreachMessage::draft(Uuid::new_v4(), None, seq, "s", "b");
        m.status = status;
        m.sent_at = sent_days_ago.map(|d| Utc::now() - Duration::days(d));
        m
    }

    #[test]
    fn replied_anywhere_stops_the_sequence() {
        // Reply on step 1 suppresses follow-up even with a later sent step.
        let history = vec![
            msg(2, MessageStatus::Sent, Some(30)),
            msg(1, MessageStatus::Replied, Some(40)),
        ];
        assert_eq!(next_step(&history, Utc::now()), StepDecision::Replied);
    }

    #[test]
    fn drafts_and_queued_only_are_not_eligible() {
        let history = vec![
            msg(1, MessageStatus::Draft, None),
            msg(2, MessageStatus::Queued, None),
        ];
        assert_eq!(next_step(&history, Utc::now()), StepDecision::NothingSent);
    }

    #[test]
    fn due_exactly_on_the_boundary() {
        // Step 2 has delay_days = 4.
        let now = Utc::now();
        let mut m = msg(1, MessageStatus::Sent, None);
        m.sent_at = Some(now - Duration::days(4));
        match next_step(&[m], now) {
            StepDecision::Due {
                next_sequence,
                days_since_last,
            } => {
                assert_eq!(next_sequence, 2);
                assert_eq!(days_since_last, 4);
            }
            other => panic!("expected Due, got {other:?}"),
        }
    }

    #[test]
    fn not_due_one_day_early() {
        let now = Utc::now();
        let mut m = msg(1, MessageStatus::Sent, None);
        m.sent_at = Some(now - Duration::days(3));
        match next_step(&[m], now) {
            StepDecision::Waiting { next_sequence, .. } => assert_eq!(next_sequence, 2),
            other => panic!("expected Waiting, got {other:?}"),
        }
    }

    #[test]
    fn max_step_sent_means_exhausted() {
        let last = sequence::max_sequence_number();
        let history = vec![msg(last, MessageStatus::Sent, Some(30))];
        assert_eq!(next_step(&history, Utc::now()), StepDecision::Exhausted);
    }

    #[test]
    fn latest_sent_wins_over_earlier_sent() {
        // Steps 1 and 2 both sent; step 3 (delay 7) anchors on step 2.
        let now = Utc::now();
        let history = vec![
            msg(1, MessageStatus::Sent, Some(20)),
            msg(2, MessageStatus::Sent, Some(8)),
        ];
        match next_step(&history, now) {
            StepDecision::Due { next_sequence, .. } => assert_eq!(next_sequence, 3),
            other => panic!("expected Due, got {other:?}"),
        }
    }

    #[test]
    fn pending_later_step_does_not_advance_the_clock() {
        // Step 2 exists as a draft; eligibility still keys off the sent step 1.
        let now = Utc::now();
        let history = vec![
            msg(2, MessageStatus::Draft, None),
            msg(1, MessageStatus::Sent, Some(5)),
        ];
        match next_step(&history, now) {
            StepDecision::Due { next_sequence, .. } => assert_eq!(next_sequence, 2),
            other => panic!("expected Due, got {other:?}"),
        }
    }

    mod store_scan {
        use super::*;
        use crate::model::{Building, Contact};
        use crate::store::LibSqlStore;

        async fn seeded_store() -> (Arc<dyn EntityStore>, Contact) {
            let store: Arc<dyn EntityStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
            let building = store
                .insert_building(&Building::new("The Archer", "New York"))
                .await
                .unwrap();
            let contact = store
                .insert_contact(
                    &Contact::new("Sarah Johnson")
                        .with_email("sarah@example.com")
                        .with_building(building.id),
                )
                .await
                .unwrap();
            store
                .update_contact_status(contact.id, ContactStatus::Emailed)
                .await
                .unwrap();
            (store, contact)
        }

        #[tokio::test]
        async fn due_contact_is_reported_with_building_context() {
            let (store, contact) = seeded_store().await;

            let mut m = OutreachMessage::draft(contact.id, None, 1, "s", "b");
            m.status = MessageStatus::Sent;
            m.sent_at = Some(Utc::now() - Duration::days(10));
            store.insert_message(&m).await.unwrap();

            let report = find_due_followups(&store, Utc::now()).await.unwrap();
            assert_eq!(report.due.len(), 1);
            assert!(report.exhausted.is_empty());

            let candidate = &report.due[0];
            assert_eq!(candidate.next_sequence, 2);
            assert_eq!(candidate.days_since_last, 10);
            assert_eq!(candidate.building.as_ref().unwrap().name, "The Archer");
        }

        #[tokio::test]
        async fn exhausted_contact_is_listed_separately() {
            let (store, contact) = seeded_store().await;

            let mut m = OutreachMessage::draft(
                contact.id,
                None,
                sequence::max_sequence_number(),
                "s",
                "b",
            );
            m.status = MessageStatus::Sent;
            m.sent_at = Some(Utc::now() - Duration::days(30));
            store.insert_message(&m).await.unwrap();

            let report = find_due_followups(&store, Utc::now()).await.unwrap();
            assert!(report.due.is_empty());
            assert_eq!(report.exhausted.len(), 1);
            assert_eq!(report.exhausted[0].id, contact.id);
        }

        #[tokio::test]
        async fn followup_run_creates_draft_once() {
            let (store, contact) = seeded_store().await;

            let mut m = OutreachMessage::draft(contact.id, None, 1, "s", "b");
            m.status = MessageStatus::Sent;
            m.sent_at = Some(Utc::now() - Duration::days(10));
            store.insert_message(&m).await.unwrap();

            assert_eq!(run(&store, false).await.unwrap(), 1);

            let history = store.messages_for_contact(contact.id).await.unwrap();
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].sequence_number, 2);
            assert_eq!(history[0].status, MessageStatus::Draft);

            // Re-run: the duplicate-step guard keeps it at one draft.
            assert_eq!(run(&store, false).await.unwrap(), 0);
            assert_eq!(store.messages_for_contact(contact.id).await.unwrap().len(), 2);
        }
    }
}

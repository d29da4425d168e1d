//! Reply classification state machine.
//!
//! Each inbound reply is assigned one of a closed set of categories; the
//! category alone determines the contact transition, the message transition,
//! and whether pending sequence steps are cancelled. The AI call only picks
//! the category — every state change is table-driven and deterministic.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{LlmError, Result, StoreError};
use crate::llm::{self, TextGenerator};
use crate::model::{Contact, ContactStatus, MessageStatus};
use crate::store::EntityStore;

/// Closed set of reply categories. Unknown AI output coerces to `Question`,
/// the safe default: it stops the sequence and asks a human to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCategory {
    Interested,
    NotInterested,
    OutOfOffice,
    WrongPerson,
    Unsubscribe,
    Question,
}

impl ReplyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyCategory::Interested => "interested",
            ReplyCategory::NotInterested => "not_interested",
            ReplyCategory::OutOfOffice => "out_of_office",
            ReplyCategory::WrongPerson => "wrong_person",
            ReplyCategory::Unsubscribe => "unsubscribe",
            ReplyCategory::Question => "question",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "interested" => ReplyCategory::Interested,
            "not_interested" => ReplyCategory::NotInterested,
            "out_of_office" => ReplyCategory::OutOfOffice,
            "wrong_person" => ReplyCategory::WrongPerson,
            "unsubscribe" => ReplyCategory::Unsubscribe,
            _ => ReplyCategory::Question,
        }
    }

    pub fn all() -> &'static [ReplyCategory] {
        &[
            ReplyCategory::Interested,
            ReplyCategory::NotInterested,
            ReplyCategory::OutOfOffice,
            ReplyCategory::WrongPerson,
            ReplyCategory::Unsubscribe,
            ReplyCategory::Question,
        ]
    }

    /// New contact status, or `None` when the contact stays where it is
    /// (out-of-office keeps the contact in the sequence).
    pub fn contact_status(&self) -> Option<ContactStatus> {
        match self {
            ReplyCategory::Interested | ReplyCategory::Question => Some(ContactStatus::Replied),
            ReplyCategory::NotInterested | ReplyCategory::WrongPerson => {
                Some(ContactStatus::Rejected)
            }
            ReplyCategory::Unsubscribe => Some(ContactStatus::Unsubscribed),
            ReplyCategory::OutOfOffice => None,
        }
    }

    /// New status for the most recent sent message, or `None` to leave it.
    pub fn message_status(&self) -> Option<MessageStatus> {
        match self {
            ReplyCategory::OutOfOffice => None,
            _ => Some(MessageStatus::Replied),
        }
    }

    /// Whether pending (`draft`/`queued`) steps are cancelled.
    pub fn stops_sequence(&self) -> bool {
        !matches!(self, ReplyCategory::OutOfOffice)
    }

    /// Category description given to the classifier prompt.
    pub fn description(&self) -> &'static str {
        match self {
            ReplyCategory::Interested => {
                "Wants to learn more, open to a call, positive response"
            }
            ReplyCategory::NotInterested => "Polite or firm decline, not relevant, bad timing",
            ReplyCategory::OutOfOffice => "Auto-reply, vacation, will return later",
            ReplyCategory::WrongPerson => "Not the right contact, referred elsewhere",
            ReplyCategory::Unsubscribe => "Asked to be removed, do not contact",
            ReplyCategory::Question => "Asking about pricing, details, how it works",
        }
    }
}

/// Result of classifying one reply.
#[derive(Debug, Clone)]
pub struct Classification {
    pub category: ReplyCategory,
    pub confidence: f64,
    pub summary: String,
    pub suggested_response: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
struct RawClassification {
    category: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    suggested_response: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

fn classify_prompt(reply_text: &str, original_subject: &str, contact_name: &str) -> String {
    let category_descriptions = ReplyCategory::all()
        .iter()
        .map(|c| format!("  - {}: {}", c.as_str(), c.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let category_names = ReplyCategory::all()
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Classify this email reply into one of these categories:\n\
         {category_descriptions}\n\n\
         Context:\n\
         - We sent a cold outreach email about LeaseFlex (a lease flexibility product for renters)\n\
         - We pitched it as a zero-cost amenity for property managers that increases lease conversion\n\
         - Original subject: {original_subject}\n\
         - Contact name: {contact_name}\n\n\
         Their reply:\n\
         ---\n\
         {reply_text}\n\
         ---\n\n\
         Respond in JSON with:\n\
         - \"category\": one of [{category_names}]\n\
         - \"confidence\": 0.0 to 1.0\n\
         - \"summary\": one sentence summary of their reply\n\
         - \"suggested_response\": if category is \"interested\" or \"question\", draft a short reply (2-3 sentences, casual founder tone). Otherwise null.\n\
         - \"notes\": any useful context (e.g. \"referred to Sarah Johnson\", \"back March 5th\")\n\n\
         JSON only, no other text."
    )
}

/// Classify a reply. Any failure degrades to a `Question` classification
/// with zero confidence so a human reviews it.
pub async fn classify(
    llm: &dyn TextGenerator,
    reply_text: &str,
    original_subject: &str,
    contact_name: &str,
) -> Classification {
    let prompt = classify_prompt(reply_text, original_subject, contact_name);

    match try_classify(llm, &prompt).await {
        Ok(classification) => classification,
        Err(e) => {
            warn!(error = %e, "Classification failed, defaulting to question");
            Classification {
                category: ReplyCategory::Question,
                confidence: 0.0,
                summary: format!("Classification failed: {e}"),
                suggested_response: None,
                notes: None,
            }
        }
    }
}

async fn try_classify(
    llm: &dyn TextGenerator,
    prompt: &str,
) -> std::result::Result<Classification, LlmError> {
    let text = llm.generate(None, prompt, 500).await?;
    let raw: RawClassification = serde_json::from_str(llm::strip_code_fences(&text))?;

    Ok(Classification {
        category: ReplyCategory::parse(&raw.category),
        confidence: raw.confidence,
        summary: raw.summary,
        suggested_response: raw.suggested_response,
        notes: raw.notes,
    })
}

/// Classify a reply from `contact_email` and apply the category's
/// transitions. Returns the classification, or `None` when the contact is
/// unknown.
pub async fn process_reply(
    store: &Arc<dyn EntityStore>,
    llm: &dyn TextGenerator,
    contact_email: &str,
    reply_text: &str,
) -> Result<Option<Classification>> {
    let Some(contact) = store.contact_by_email(contact_email).await? else {
        warn!(email = contact_email, "Contact not found, reply ignored");
        return Ok(None);
    };

    let original = store.latest_sent_message(contact.id).await?;
    let original_subject = original.as_ref().map(|m| m.subject.as_str()).unwrap_or("");

    info!(contact = %contact.full_name, email = contact_email, "Classifying reply");
    let classification = classify(llm, reply_text, original_subject, &contact.full_name).await;
    let category = classification.category;

    info!(
        category = category.as_str(),
        confidence = classification.confidence,
        summary = %classification.summary,
        "Reply classified"
    );

    apply_transitions(store, &contact, category, classification.notes.as_deref()).await?;

    if let Some(ref response) = classification.suggested_response {
        info!(suggested_response = %response, "Suggested reply");
    }

    Ok(Some(classification))
}

/// Apply a category's transition row to the contact and its messages.
/// Idempotent: re-running the same category is a no-op beyond the note.
async fn apply_transitions(
    store: &Arc<dyn EntityStore>,
    contact: &Contact,
    category: ReplyCategory,
    notes: Option<&str>,
) -> std::result::Result<(), StoreError> {
    if let Some(status) = category.contact_status() {
        store.update_contact_status(contact.id, status).await?;
    }

    if let Some(notes) = notes {
        let stamp = Utc::now().format("%Y-%m-%d");
        let line = format!("[{stamp}] Reply classified as {}: {notes}", category.as_str());
        store.append_contact_note(contact.id, &line).await?;
    }

    if let Some(status) = category.message_status() {
        if let Some(original) = store.latest_sent_message(contact.id).await? {
            store.update_message_status(original.id, status).await?;
        }
    }

    if category.stops_sequence() {
        let mut cancelled = 0;
        for message in store.messages_for_contact(contact.id).await? {
            if message.status == MessageStatus::Queued {
                store
                    .update_message_status(message.id, MessageStatus::Draft)
                    .await?;
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(count = cancelled, "Cancelled pending follow-ups");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Contact, OutreachMessage};
    use crate::store::LibSqlStore;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct FakeLlm {
        response: String,
    }

    #[async_trait]
    impl TextGenerator for FakeLlm {
        async fn generate(
            &self,
            _system: Option<&str>,
            _prompt: &str,
            _max_tokens: u32,
        ) -> std::result::Result<String, LlmError> {
            Ok(self.response.clone())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl TextGenerator for FailingLlm {
        async fn generate(
            &self,
            _system: Option<&str>,
            _prompt: &str,
            _max_tokens: u32,
        ) -> std::result::Result<String, LlmError> {
            Err(LlmError::RequestFailed("connection reset".to_string()))
        }
    }

    fn json_reply(category: &str) -> String {
        format!(
            r#"{{"category": "{category}", "confidence": 0.9, "summary": "s", "suggested_response": null, "notes": "from the reply"}}"#
        )
    }

    #[test]
    fn transition_table() {
        use ReplyCategory::*;

        let rows: &[(ReplyCategory, Option<ContactStatus>, Option<MessageStatus>, bool)] = &[
            (Interested, Some(ContactStatus::Replied), Some(MessageStatus::Replied), true),
            (NotInterested, Some(ContactStatus::Rejected), Some(MessageStatus::Replied), true),
            (OutOfOffice, None, None, false),
            (WrongPerson, Some(ContactStatus::Rejected), Some(MessageStatus::Replied), true),
            (Unsubscribe, Some(ContactStatus::Unsubscribed), Some(MessageStatus::Replied), true),
            (Question, Some(ContactStatus::Replied), Some(MessageStatus::Replied), true),
        ];

        for (category, contact, message, stops) in rows {
            assert_eq!(category.contact_status(), *contact, "{category:?}");
            assert_eq!(category.message_status(), *message, "{category:?}");
            assert_eq!(category.stops_sequence(), *stops, "{category:?}");
        }
    }

    #[test]
    fn unknown_category_coerces_to_question() {
        assert_eq!(ReplyCategory::parse("spam"), ReplyCategory::Question);
        assert_eq!(ReplyCategory::parse(""), ReplyCategory::Question);
        for c in ReplyCategory::all() {
            assert_eq!(ReplyCategory::parse(c.as_str()), *c);
        }
    }

    async fn seeded_store(pending: usize) -> (Arc<dyn EntityStore>, Contact, Uuid) {
        let store: Arc<dyn EntityStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let contact = store
            .insert_contact(&Contact::new("Sarah Johnson").with_email("sarah@example.com"))
            .await
            .unwrap();

        let sent = OutreachMessage::draft(contact.id, None, 1, "Intro", "Body");
        store.insert_message(&sent).await.unwrap();
        store.mark_message_sent(sent.id, Utc::now()).await.unwrap();
        store
            .update_contact_status(contact.id, ContactStatus::Emailed)
            .await
            .unwrap();

        for i in 0..pending {
            let m = OutreachMessage::draft(
                contact.id,
                None,
                (i + 2) as u32,
                format!("Follow-up {i}"),
                "Body",
            );
            store.insert_message(&m).await.unwrap();
            store
                .update_message_status(m.id, MessageStatus::Queued)
                .await
                .unwrap();
        }

        (store, contact, sent.id)
    }

    #[tokio::test]
    async fn unsubscribe_cancels_all_pending() {
        for pending in [0usize, 1, 5] {
            let (store, contact, sent_id) = seeded_store(pending).await;
            let llm = FakeLlm {
                response: json_reply("unsubscribe"),
            };

            let result = process_reply(&store, &llm, "sarah@example.com", "remove me")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(result.category, ReplyCategory::Unsubscribe);

            let c = store.contact_by_id(contact.id).await.unwrap().unwrap();
            assert_eq!(c.status, ContactStatus::Unsubscribed);
            assert!(c.notes.unwrap().contains("Reply classified as unsubscribe"));

            let messages = store.messages_for_contact(contact.id).await.unwrap();
            assert_eq!(
                messages.iter().filter(|m| m.status == MessageStatus::Queued).count(),
                0
            );
            assert_eq!(
                messages.iter().filter(|m| m.status == MessageStatus::Draft).count(),
                pending
            );
            let sent = messages.iter().find(|m| m.id == sent_id).unwrap();
            assert_eq!(sent.status, MessageStatus::Replied);
        }
    }

    #[tokio::test]
    async fn out_of_office_changes_nothing() {
        let (store, contact, sent_id) = seeded_store(1).await;
        let llm = FakeLlm {
            response: json_reply("out_of_office"),
        };

        process_reply(&store, &llm, "sarah@example.com", "back March 5th")
            .await
            .unwrap();

        let c = store.contact_by_id(contact.id).await.unwrap().unwrap();
        assert_eq!(c.status, ContactStatus::Emailed);

        let messages = store.messages_for_contact(contact.id).await.unwrap();
        let sent = messages.iter().find(|m| m.id == sent_id).unwrap();
        assert_eq!(sent.status, MessageStatus::Sent);
        assert_eq!(
            messages.iter().filter(|m| m.status == MessageStatus::Queued).count(),
            1
        );
    }

    #[tokio::test]
    async fn reprocessing_same_reply_is_idempotent() {
        let (store, contact, _) = seeded_store(2).await;
        let llm = FakeLlm {
            response: json_reply("interested"),
        };

        process_reply(&store, &llm, "sarah@example.com", "yes, tell me more")
            .await
            .unwrap();
        process_reply(&store, &llm, "sarah@example.com", "yes, tell me more")
            .await
            .unwrap();

        let c = store.contact_by_id(contact.id).await.unwrap().unwrap();
        assert_eq!(c.status, ContactStatus::Replied);
        let messages = store.messages_for_contact(contact.id).await.unwrap();
        assert_eq!(
            messages.iter().filter(|m| m.status == MessageStatus::Queued).count(),
            0
        );
    }

    #[tokio::test]
    async fn llm_failure_defaults_to_question() {
        let (store, contact, _) = seeded_store(0).await;

        let result = process_reply(&store, &FailingLlm, "sarah@example.com", "???")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.category, ReplyCategory::Question);
        assert_eq!(result.confidence, 0.0);

        // Question still stops the sequence and flags the contact.
        let c = store.contact_by_id(contact.id).await.unwrap().unwrap();
        assert_eq!(c.status, ContactStatus::Replied);
    }

    #[tokio::test]
    async fn unknown_contact_is_ignored() {
        let store: Arc<dyn EntityStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let llm = FakeLlm {
            response: json_reply("interested"),
        };

        let result = process_reply(&store, &llm, "nobody@example.com", "hello")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn code_fenced_json_is_accepted() {
        let (store, _, _) = seeded_store(0).await;
        let llm = FakeLlm {
            response: format!("```json\n{}\n```", json_reply("not_interested")),
        };

        let result = process_reply(&store, &llm, "sarah@example.com", "no thanks")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.category, ReplyCategory::NotInterested);
    }
}

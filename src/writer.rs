//! Draft generator — materializes sequence templates into draft messages,
//! optionally personalizing the body with AI. Personalization failure is
//! non-fatal: the template-filled body is the fallback.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::llm::TextGenerator;
use crate::model::{Building, Contact, ContactStatus, OutreachMessage, UNKNOWN_NAME};
use crate::sequence;
use crate::store::EntityStore;

/// System instruction for the personalization call.
const PERSONALIZE_SYSTEM_PROMPT: &str = "\
You are a cold email personalizer for LeaseFlex, a renter mobility product.

Your job: take a base email template and personalize it for a specific property manager / building.

Rules:
- Keep the email SHORT (under 120 words)
- Never sound like a sales robot
- Sound like a founder sending a genuine note
- Reference something specific about their building or company if possible
- Keep the core value prop intact: LeaseFlex increases lease conversion by giving renters confidence to commit
- The building pays nothing — renters pay a small monthly fee
- Sign off as Justin
- Do NOT add subject line — just return the email body
- Do NOT use excessive formatting, bullet points are fine but sparingly
- Match the casual, direct tone of the template
";

/// Outcome of one draft-creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOutcome {
    Created,
    /// A message already exists for this (contact, sequence_number) —
    /// any status counts, the guard checks presence only.
    SkippedExisting,
    SkippedNoEmail,
}

/// The `{building_name}` fallback when the contact has no building.
fn building_name(building: Option<&Building>) -> &str {
    building.map(|b| b.name.as_str()).unwrap_or("your building")
}

/// Create a draft for one (contact, sequence_number) pair.
///
/// Idempotent per step: if any message already exists at this sequence
/// number for the contact, nothing is created.
pub async fn create_draft(
    store: &Arc<dyn EntityStore>,
    llm: Option<&dyn TextGenerator>,
    contact: &Contact,
    building: Option<&Building>,
    sequence_number: u32,
) -> Result<DraftOutcome> {
    if contact.email.is_none() {
        return Ok(DraftOutcome::SkippedNoEmail);
    }

    let template = sequence::template_for(sequence_number)
        .ok_or(crate::error::TemplateError::UnknownStep(sequence_number))?;

    // Duplicate-step guard: re-check right before creation.
    let existing = store.messages_for_contact(contact.id).await?;
    if existing
        .iter()
        .any(|m| m.sequence_number == sequence_number)
    {
        return Ok(DraftOutcome::SkippedExisting);
    }

    let variables = [
        ("first_name", contact.first_name()),
        ("building_name", building_name(building)),
    ];
    let filled = sequence::fill_template(template, &variables)?;

    let body = match llm {
        Some(llm) => match personalize(llm, template.body, contact, building).await {
            Ok(body) => body,
            Err(e) => {
                warn!(contact = %contact.full_name, error = %e, "AI personalization failed, using template body");
                filled.body
            }
        },
        None => filled.body,
    };

    let message = OutreachMessage::draft(
        contact.id,
        building.map(|b| b.id),
        sequence_number,
        filled.subject,
        body,
    );
    store.insert_message(&message).await?;
    Ok(DraftOutcome::Created)
}

/// Personalize a template body for one contact via the AI service.
async fn personalize(
    llm: &dyn TextGenerator,
    template_body: &str,
    contact: &Contact,
    building: Option<&Building>,
) -> std::result::Result<String, crate::error::LlmError> {
    let mut context = Vec::new();
    if let Some(b) = building {
        context.push(format!("Building: {}", b.name));
        if let Some(ref company) = b.company {
            context.push(format!("Company: {company}"));
        }
        context.push(format!(
            "City: {}, {}",
            b.city,
            b.state.as_deref().unwrap_or("")
        ));
        if let Some(units) = b.unit_count {
            context.push(format!("Units: {units}"));
        }
    }
    if contact.full_name != UNKNOWN_NAME {
        context.push(format!("Contact: {}", contact.full_name));
    }
    if let Some(ref title) = contact.title {
        context.push(format!("Title: {title}"));
    }

    let prompt = format!(
        "Personalize this email template for the contact below.\n\n\
         TEMPLATE:\n{template_body}\n\n\
         CONTEXT:\n{}\n\n\
         Return only the personalized email body, nothing else.",
        context.join("\n")
    );

    llm.generate(Some(PERSONALIZE_SYSTEM_PROMPT), &prompt, 500)
        .await
}

/// The `write` command: draft one sequence step for contacts that have not
/// been emailed yet. Returns the number of drafts written.
pub async fn run(
    store: &Arc<dyn EntityStore>,
    llm: Option<&dyn TextGenerator>,
    limit: usize,
    sequence_number: u32,
) -> Result<u32> {
    let contacts = store.contacts_by_status(ContactStatus::New, limit).await?;
    if contacts.is_empty() {
        info!("No new contacts to write emails for. Run enrich first");
        return Ok(0);
    }

    info!(
        count = contacts.len(),
        sequence = sequence_number,
        ai = llm.is_some(),
        "Writing outreach drafts"
    );

    let mut written = 0;
    for contact in &contacts {
        let building = match contact.building_id {
            Some(id) => store.building_by_id(id).await?,
            None => None,
        };

        match create_draft(store, llm, contact, building.as_ref(), sequence_number).await {
            Ok(DraftOutcome::Created) => {
                info!(contact = %contact.full_name, "Draft created");
                written += 1;
            }
            Ok(DraftOutcome::SkippedExisting) => {
                info!(contact = %contact.full_name, sequence = sequence_number, "Already has this step, skipping");
            }
            Ok(DraftOutcome::SkippedNoEmail) => {
                info!(contact = %contact.full_name, "No email, skipping");
            }
            Err(e) => {
                warn!(contact = %contact.full_name, error = %e, "Failed to save draft");
            }
        }
    }

    info!("Wrote {written} email drafts");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::model::MessageStatus;
    use crate::store::LibSqlStore;
    use async_trait::async_trait;

    struct FakeLlm {
        response: std::result::Result<String, String>,
    }

    #[async_trait]
    impl TextGenerator for FakeLlm {
        async fn generate(
            &self,
            _system: Option<&str>,
            _prompt: &str,
            _max_tokens: u32,
        ) -> std::result::Result<String, LlmError> {
            self.response
                .clone()
                .map_err(LlmError::RequestFailed)
        }
    }

    async fn store_with_contact() -> (Arc<dyn EntityStore>, Contact, Building) {
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
        (store, contact, building)
    }

    #[tokio::test]
    async fn draft_fills_template_variables() {
        let (store, contact, building) = store_with_contact().await;

        let outcome = create_draft(&store, None, &contact, Some(&building), 1)
            .await
            .unwrap();
        assert_eq!(outcome, DraftOutcome::Created);

        let drafts = store.messages_for_contact(contact.id).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].status, MessageStatus::Draft);
        assert_eq!(drafts[0].subject, "Lease conversion tool for The Archer");
        assert!(drafts[0].body.starts_with("Hi Sarah,"));
    }

    #[tokio::test]
    async fn duplicate_step_guard_blocks_any_status() {
        let (store, contact, building) = store_with_contact().await;

        create_draft(&store, None, &contact, Some(&building), 2)
            .await
            .unwrap();

        // Queued at the same step: blocked.
        let existing = store.messages_for_contact(contact.id).await.unwrap();
        store
            .update_message_status(existing[0].id, MessageStatus::Queued)
            .await
            .unwrap();
        assert_eq!(
            create_draft(&store, None, &contact, Some(&building), 2)
                .await
                .unwrap(),
            DraftOutcome::SkippedExisting
        );

        // Bounced at the same step: presence-only check, still blocked.
        store
            .update_message_status(existing[0].id, MessageStatus::Bounced)
            .await
            .unwrap();
        assert_eq!(
            create_draft(&store, None, &contact, Some(&building), 2)
                .await
                .unwrap(),
            DraftOutcome::SkippedExisting
        );

        assert_eq!(store.messages_for_contact(contact.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_email_is_skipped() {
        let store: Arc<dyn EntityStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let contact = store.insert_contact(&Contact::new("No Mail")).await.unwrap();

        let outcome = create_draft(&store, None, &contact, None, 1).await.unwrap();
        assert_eq!(outcome, DraftOutcome::SkippedNoEmail);
        assert!(store.messages_for_contact(contact.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_name_and_missing_building_fall_back() {
        let store: Arc<dyn EntityStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let contact = store
            .insert_contact(&Contact::new(UNKNOWN_NAME).with_email("pm@building.com"))
            .await
            .unwrap();

        create_draft(&store, None, &contact, None, 1).await.unwrap();

        let drafts = store.messages_for_contact(contact.id).await.unwrap();
        assert!(drafts[0].body.starts_with("Hi there,"));
        assert_eq!(drafts[0].subject, "Lease conversion tool for your building");
    }

    #[tokio::test]
    async fn ai_body_replaces_template_body_but_not_subject() {
        let (store, contact, building) = store_with_contact().await;
        let llm = FakeLlm {
            response: Ok("Hi Sarah — personalized note.".to_string()),
        };

        create_draft(&store, Some(&llm), &contact, Some(&building), 1)
            .await
            .unwrap();

        let drafts = store.messages_for_contact(contact.id).await.unwrap();
        assert_eq!(drafts[0].body, "Hi Sarah — personalized note.");
        assert_eq!(drafts[0].subject, "Lease conversion tool for The Archer");
    }

    #[tokio::test]
    async fn ai_failure_falls_back_to_template_body() {
        let (store, contact, building) = store_with_contact().await;
        let llm = FakeLlm {
            response: Err("overloaded".to_string()),
        };

        let outcome = create_draft(&store, Some(&llm), &contact, Some(&building), 1)
            .await
            .unwrap();
        assert_eq!(outcome, DraftOutcome::Created);

        let drafts = store.messages_for_contact(contact.id).await.unwrap();
        assert!(drafts[0].body.starts_with("Hi Sarah,"));
    }

    #[tokio::test]
    async fn write_run_drafts_new_contacts_only() {
        let (store, contact, _building) = store_with_contact().await;

        // A second contact already emailed — must not get a new intro.
        let emailed = store
            .insert_contact(&Contact::new("Old Contact").with_email("old@example.com"))
            .await
            .unwrap();
        store
            .update_contact_status(emailed.id, ContactStatus::Emailed)
            .await
            .unwrap();

        let written = run(&store, None, 50, 1).await.unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.messages_for_contact(contact.id).await.unwrap().len(), 1);
        assert!(store.messages_for_contact(emailed.id).await.unwrap().is_empty());
    }
}

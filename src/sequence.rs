//! The outreach sequence — ordered, immutable email templates.
//!
//! These are base templates; the writer personalizes bodies with AI where
//! enabled. `delay_days` is the minimum whole days after the previous step's
//! send before the step becomes eligible.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::TemplateError;

/// One numbered step in the outreach sequence.
#[derive(Debug, Clone)]
pub struct SequenceTemplate {
    pub id: &'static str,
    /// 1-based, strictly increasing across `SEQUENCE`.
    pub sequence_number: u32,
    pub subject: &'static str,
    pub body: &'static str,
    /// Minimum whole days after the previous step's `sent_at`.
    pub delay_days: i64,
}

/// The full sequence, in order.
pub static SEQUENCE: &[SequenceTemplate] = &[
    SequenceTemplate {
        id: "intro",
        sequence_number: 1,
        subject: "Lease conversion tool for {building_name}",
        body: "Hi {first_name},\n\n\
I'm building a renter mobility product that lets tenants break their lease without penalty.\n\n\
The reason property managers are interested:\n\n\
It increases lease conversion by giving renters confidence to commit.\n\n\
Buildings that offer LeaseFlex see:\n\n\
\u{2022} Faster lease decisions — renters stop hesitating\n\
\u{2022} Fewer negotiation requests — tenants accept standard terms\n\
\u{2022} Longer lease terms — renters choose 12 months instead of 6\n\n\
It costs the building nothing. Renters pay a small monthly fee.\n\n\
Would you be open to a quick call to see how it works?\n\n\
Justin\nFounder, LeaseFlex",
        delay_days: 0,
    },
    SequenceTemplate {
        id: "follow_up_1",
        sequence_number: 2,
        subject: "Re: Lease conversion tool for {building_name}",
        body: "Hi {first_name},\n\n\
Following up on my note last week. Wanted to share a quick stat:\n\n\
The average lease break costs a tenant $5,000\u{2013}$15,000. That fear is why renters hesitate to sign — or choose month-to-month.\n\n\
LeaseFlex removes that fear. Buildings that offer it as an amenity see measurably faster leasing velocity.\n\n\
Happy to walk you through it in 10 minutes if you're curious.\n\n\
Justin",
        delay_days: 4,
    },
    SequenceTemplate {
        id: "follow_up_2",
        sequence_number: 3,
        subject: "Quick question about {building_name}",
        body: "Hi {first_name},\n\n\
Last note from me — just curious:\n\n\
Do your tenants ever hesitate to sign because they're worried about job changes, relocations, or life events locking them into a lease?\n\n\
If that comes up, LeaseFlex is a zero-cost amenity that solves it. Tenants pay a small monthly fee and get covered if they need to break their lease.\n\n\
Happy to chat if it's relevant. If not, no worries at all.\n\n\
Justin",
        delay_days: 7,
    },
];

/// The terminal step number. Contacts past this have exhausted the sequence.
pub fn max_sequence_number() -> u32 {
    SEQUENCE
        .iter()
        .map(|t| t.sequence_number)
        .max()
        .unwrap_or(0)
}

/// Look up the template for a sequence number.
pub fn template_for(sequence_number: u32) -> Option<&'static SequenceTemplate> {
    SEQUENCE
        .iter()
        .find(|t| t.sequence_number == sequence_number)
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex"));

/// Resolve `{name}` placeholders in `text` from the variable map.
///
/// Fails if any placeholder is left unresolved — callers must supply at
/// least `first_name` and `building_name`.
pub fn fill(text: &str, variables: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = text.to_string();
    for (name, value) in variables {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    if let Some(caps) = PLACEHOLDER.captures(&out) {
        return Err(TemplateError::UnresolvedPlaceholder {
            name: caps[1].to_string(),
        });
    }
    Ok(out)
}

/// A filled (subject, body) pair for one step.
#[derive(Debug, Clone)]
pub struct FilledTemplate {
    pub sequence_number: u32,
    pub subject: String,
    pub body: String,
}

/// Fill both subject and body of a template.
pub fn fill_template(
    template: &SequenceTemplate,
    variables: &[(&str, &str)],
) -> Result<FilledTemplate, TemplateError> {
    Ok(FilledTemplate {
        sequence_number: template.sequence_number,
        subject: fill(template.subject, variables)?,
        body: fill(template.body, variables)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_strictly_increase() {
        for pair in SEQUENCE.windows(2) {
            assert!(pair[0].sequence_number < pair[1].sequence_number);
        }
    }

    #[test]
    fn max_sequence_is_three() {
        assert_eq!(max_sequence_number(), 3);
    }

    #[test]
    fn template_lookup() {
        assert_eq!(template_for(1).unwrap().id, "intro");
        assert_eq!(template_for(2).unwrap().delay_days, 4);
        assert_eq!(template_for(3).unwrap().delay_days, 7);
        assert!(template_for(4).is_none());
    }

    #[test]
    fn fill_resolves_all_placeholders() {
        let vars = [("first_name", "Sarah"), ("building_name", "The Archer")];
        let filled = fill_template(template_for(1).unwrap(), &vars).unwrap();
        assert!(filled.subject.contains("The Archer"));
        assert!(filled.body.starts_with("Hi Sarah,"));
        assert!(!filled.body.contains('{'));
    }

    #[test]
    fn fill_fails_on_missing_variable() {
        let vars = [("first_name", "Sarah")];
        let err = fill_template(template_for(1).unwrap(), &vars).unwrap_err();
        match err {
            TemplateError::UnresolvedPlaceholder { name } => {
                assert_eq!(name, "building_name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

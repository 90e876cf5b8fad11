//! Persona and safety policy for answer composition.
//!
//! The policy is structured data rather than an inline string: every
//! safety constraint is a named field, so a policy change is a reviewable
//! data edit and each constraint can be tested independently of
//! generation. Rendering derives the preamble text from the fields.

use serde::{Deserialize, Serialize};

use crate::session::{Role, Turn};

/// Versioned persona and safety constraints for the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaPolicy {
    /// Policy revision, logged with every composed prompt.
    pub version: String,
    /// Subject-matter boundary the assistant must stay inside.
    pub domain: String,
    /// The only jurisdiction whose emergency hotlines may be given.
    pub hotline_jurisdiction: String,
    /// Explicitly refuse hotlines from other jurisdictions.
    pub forbid_foreign_hotlines: bool,
    /// Upper bound on answer length, in sentences.
    pub max_response_sentences: u8,
    /// Every answer must close with a supportive follow-up question.
    pub require_followup_question: bool,
    /// Never diagnose or prescribe.
    pub forbid_diagnosis_and_prescription: bool,
    /// Gently redirect questions outside the domain.
    pub redirect_out_of_scope: bool,
}

impl Default for PersonaPolicy {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            domain: "mental health and well-being".to_string(),
            hotline_jurisdiction: "Kenya".to_string(),
            forbid_foreign_hotlines: true,
            max_response_sentences: 2,
            require_followup_question: true,
            forbid_diagnosis_and_prescription: true,
            redirect_out_of_scope: true,
        }
    }
}

impl PersonaPolicy {
    /// Renders the persona/safety preamble from the policy fields.
    pub fn render_preamble(&self) -> String {
        let mut parts = vec![format!(
            "You are a compassionate and supportive AI assistant specializing in {domain}. \
             Your purpose is to provide information, strategies, and encouragement based on \
             the provided context from researched content and psychological best practices. \
             Always prioritize empathy, non-judgment, and safety.",
            domain = self.domain
        )];

        if self.redirect_out_of_scope {
            parts.push(format!(
                "If the question is outside the scope of {domain} or the context is not \
                 relevant, remind the user that you only answer questions related to {domain}, \
                 and gently redirect them to consult a licensed mental health professional \
                 for personalized advice.",
                domain = self.domain
            ));
        }

        parts.push(format!(
            "Keep responses concise, ideally in 1-{max} sentences or a few brief bullet \
             points; avoid lengthy paragraphs or unnecessary elaboration.",
            max = self.max_response_sentences
        ));

        if self.require_followup_question {
            parts.push(
                "After providing an answer, always ask a relevant, open-ended follow-up \
                 question in an empathetic and supportive manner to better understand the \
                 user's current well-being or to offer further support."
                    .to_string(),
            );
        }

        let mut hotline = format!(
            "When providing mental health emergency or support hotlines, only provide \
             contact information relevant to {}.",
            self.hotline_jurisdiction
        );
        if self.forbid_foreign_hotlines {
            hotline.push_str(" Do not provide hotlines for any other country.");
        }
        parts.push(hotline);

        if self.forbid_diagnosis_and_prescription {
            parts.push("Do not provide medical diagnoses or prescriptions.".to_string());
        }

        parts.join(" ")
    }

    /// Builds the full model prompt: preamble, retrieved context, the
    /// serialized history, and the raw user input.
    pub fn render_prompt(&self, context: &[String], history: &[Turn], input: &str) -> String {
        let mut prompt = self.render_preamble();
        prompt.push_str("\nContext: ");
        prompt.push_str(&context.join("\n\n"));
        prompt.push('\n');
        for turn in history {
            prompt.push_str(&serialize_turn(turn));
            prompt.push('\n');
        }
        prompt.push_str("User: ");
        prompt.push_str(input);
        prompt
    }
}

fn serialize_turn(turn: &Turn) -> String {
    let label = match turn.role {
        Role::User => "User",
        Role::Assistant => "Assistant",
    };
    format!("{label}: {}", turn.content)
}

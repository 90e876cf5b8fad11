//! Answer composition: retrieved context + history + persona policy in,
//! bounded answer + source attributions out.

use std::sync::Arc;

use crate::generation::CompletionProvider;
use crate::prompt::PersonaPolicy;
use crate::retrieval::ScoredChunk;
use crate::session::Turn;
use crate::types::SolaceError;

/// Generic text returned for any masked generation failure. The real
/// cause goes to the logs, never to the caller.
const GENERATION_FAILURE_MESSAGE: &str = "the language model call failed";

/// An answer with the distinct sources of the context it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedAnswer {
    pub answer: String,
    /// Deduplicated, in order of first appearance among retrieved chunks.
    pub sources: Vec<String>,
}

/// Merges retrieved chunks, dialogue history, and the persona policy into
/// one prompt, invokes the completion provider, and extracts the answer
/// plus attributions.
pub struct AnswerComposer {
    policy: PersonaPolicy,
    completions: Arc<dyn CompletionProvider>,
}

impl AnswerComposer {
    pub fn new(policy: PersonaPolicy, completions: Arc<dyn CompletionProvider>) -> Self {
        Self {
            policy,
            completions,
        }
    }

    pub fn policy(&self) -> &PersonaPolicy {
        &self.policy
    }

    /// Composes and generates an answer for `query`.
    ///
    /// Model output is passed through as-is; no semantic validation
    /// happens here. Any provider failure is logged with its cause and
    /// surfaced as a generic [`SolaceError::Generation`] so callers can
    /// present a uniform degraded response.
    pub async fn compose(
        &self,
        query: &str,
        retrieved: &[ScoredChunk],
        history: &[Turn],
    ) -> Result<ComposedAnswer, SolaceError> {
        let context: Vec<String> = retrieved
            .iter()
            .map(|hit| hit.text().to_string())
            .collect();
        let prompt = self.policy.render_prompt(&context, history, query);

        tracing::debug!(
            policy_version = %self.policy.version,
            context_chunks = retrieved.len(),
            history_turns = history.len(),
            "composing answer"
        );

        let answer = match self.completions.complete(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "completion provider failed");
                return Err(SolaceError::Generation(
                    GENERATION_FAILURE_MESSAGE.to_string(),
                ));
            }
        };

        Ok(ComposedAnswer {
            answer,
            sources: distinct_sources(retrieved),
        })
    }
}

/// Distinct chunk sources in order of first appearance.
fn distinct_sources(retrieved: &[ScoredChunk]) -> Vec<String> {
    let mut sources = Vec::new();
    for hit in retrieved {
        if !sources.iter().any(|existing| existing == hit.source()) {
            sources.push(hit.source().to_string());
        }
    }
    sources
}

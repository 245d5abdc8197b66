//! Conversational answers over one document or a portfolio

use std::sync::Arc;

use lease_types::{ChatRole, ChatTurn, DocumentRecord};
use serde::Serialize;
use tracing::{info, warn};

use crate::context::{build_document_context, build_portfolio_context, DocumentContext, PortfolioContext};
use crate::error::AnalysisError;
use crate::gateway::GenerativeModel;
use crate::intent::{Intent, IntentClassifier, KeywordIntentClassifier};
use crate::pipeline::Stage;
use crate::prompts::{
    COMPARATIVE_ANALYSIS_PROMPT, DOCUMENT_ASSISTANT_PROMPT, PORTFOLIO_SUMMARY_PROMPT,
};

/// What a chat turn is about
#[derive(Debug, Clone, PartialEq)]
pub enum ChatScope {
    Document(DocumentContext),
    Portfolio(PortfolioContext),
}

impl ChatScope {
    /// One document gets document scope, several get portfolio scope.
    /// `None` for an empty selection.
    pub fn from_documents(docs: &[DocumentRecord], excerpt_chars: usize) -> Option<Self> {
        match docs {
            [] => None,
            [doc] => Some(ChatScope::Document(build_document_context(doc, excerpt_chars))),
            _ => Some(ChatScope::Portfolio(build_portfolio_context(
                docs,
                excerpt_chars,
            ))),
        }
    }

    fn render(&self) -> String {
        match self {
            ChatScope::Document(context) => context.render(),
            ChatScope::Portfolio(context) => context.render(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub content: String,
    /// Set for portfolio scope only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
}

pub struct ConversationalResponder {
    model: Arc<dyn GenerativeModel>,
    classifier: Box<dyn IntentClassifier>,
    max_history_turns: usize,
}

impl ConversationalResponder {
    pub fn new(model: Arc<dyn GenerativeModel>, max_history_turns: usize) -> Self {
        Self {
            model,
            classifier: Box::new(KeywordIntentClassifier::new()),
            max_history_turns,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// System prompt, context, the most recent prior turns, then the message
    pub fn build_prompt(
        &self,
        scope: &ChatScope,
        message: &str,
        prior_turns: &[ChatTurn],
    ) -> (String, Option<Intent>) {
        let (system, intent) = match scope {
            ChatScope::Document(_) => (DOCUMENT_ASSISTANT_PROMPT, None),
            ChatScope::Portfolio(_) => match self.classifier.classify(message) {
                Intent::PortfolioSummary => {
                    (PORTFOLIO_SUMMARY_PROMPT, Some(Intent::PortfolioSummary))
                }
                Intent::ComparativeAnalysis => {
                    (COMPARATIVE_ANALYSIS_PROMPT, Some(Intent::ComparativeAnalysis))
                }
            },
        };

        let mut prompt = format!("{}\n\nCONTEXT:\n{}\n", system, scope.render());

        let skip = prior_turns.len().saturating_sub(self.max_history_turns);
        let recent = &prior_turns[skip..];
        if !recent.is_empty() {
            prompt.push_str("\nCONVERSATION HISTORY:\n");
            for turn in recent {
                let speaker = match turn.role {
                    ChatRole::User => "User",
                    ChatRole::Assistant => "Assistant",
                };
                prompt.push_str(&format!("{}: {}\n", speaker, turn.content.trim()));
            }
        }

        prompt.push_str(&format!("\nUser: {}\nAssistant:", message.trim()));
        (prompt, intent)
    }

    pub async fn respond(
        &self,
        scope: &ChatScope,
        message: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<ChatReply, AnalysisError> {
        if message.trim().is_empty() {
            return Err(AnalysisError::EmptyMessage);
        }

        let (prompt, intent) = self.build_prompt(scope, message, prior_turns);
        info!(?intent, history = prior_turns.len(), "Generating chat response");

        let content = self.model.generate(&prompt, None).await.map_err(|e| {
            warn!(error = %e, "Chat model call failed");
            AnalysisError::upstream(Stage::Responding, e)
        })?;

        Ok(ChatReply {
            content: content.trim().to_string(),
            intent,
        })
    }
}

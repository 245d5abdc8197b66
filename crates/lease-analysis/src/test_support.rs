//! Deterministic model double for tests
//!
//! Responses are chosen by the first matching `when*` rule (substring of the
//! prompt), then from the queued `respond_with`/`fail_with` script, then
//! from the `otherwise` fallback.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ModelError;
use crate::gateway::{GenerativeModel, InlineData};

type Reply = Result<String, String>;

#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<(String, Reply)>,
    script: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    prompts: Mutex<Vec<String>>,
    inline_calls: Mutex<usize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    pub fn fail_with(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    /// Answer any prompt containing `needle` with `text`
    pub fn when(mut self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Ok(text.into())));
        self
    }

    /// Fail any prompt containing `needle`
    pub fn when_fails(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Err(message.into())));
        self
    }

    pub fn otherwise(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(Ok(text.into()));
        self
    }

    fn push(self, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    /// Every prompt received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn inline_calls(&self) -> usize {
        *self.inline_calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(
        &self,
        prompt: &str,
        inline: Option<&InlineData>,
    ) -> Result<String, ModelError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        if inline.is_some() {
            *self.inline_calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        }

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| {
                self.script
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .pop_front()
            })
            .or_else(|| self.fallback.clone());

        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ModelError::Api {
                status: 500,
                message,
            }),
            None => Err(ModelError::EmptyResponse),
        }
    }
}

//! Narrow interfaces to the collaborators the core depends on
//!
//! - `GenerativeModel`: text generation, optionally with an inline binary
//! - `StorageGateway`: raw document bytes
//! - `PersistenceGateway`: analyzed documents, obligations and chat history

use async_trait::async_trait;
use lease_types::{ChatTurn, DocumentRecord, ObligationRecord};

use crate::error::{ModelError, PersistError, StorageError};

/// Binary attachment sent alongside a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineData {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate text for a prompt, optionally grounded on an inline file
    async fn generate(&self, prompt: &str, inline: Option<&InlineData>)
        -> Result<String, ModelError>;
}

#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Store bytes at `path`, returning the resulting location
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_document(&self, record: DocumentRecord) -> Result<DocumentRecord, PersistError>;

    /// Returns `PersistError::NotFound` for unknown ids
    async fn get_document(&self, id: &str) -> Result<DocumentRecord, PersistError>;

    async fn find_document_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<DocumentRecord>, PersistError>;

    /// Replace the obligations stored for a document
    async fn save_obligations(
        &self,
        document_id: &str,
        records: &[ObligationRecord],
    ) -> Result<(), PersistError>;

    /// Empty when nothing was stored yet
    async fn get_obligations(&self, document_id: &str)
        -> Result<Vec<ObligationRecord>, PersistError>;

    async fn append_chat_turns(
        &self,
        conversation_id: &str,
        turns: &[ChatTurn],
    ) -> Result<(), PersistError>;

    /// Oldest first
    async fn list_chat_turns(&self, conversation_id: &str) -> Result<Vec<ChatTurn>, PersistError>;
}

//! In-process gateway implementations
//!
//! Used by the ephemeral server mode and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use lease_types::{ChatTurn, DocumentRecord, ObligationRecord};
use tokio::sync::RwLock;

use crate::error::{PersistError, StorageError};
use crate::gateway::{PersistenceGateway, StorageGateway};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl StorageGateway for MemoryStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects
            .write()
            .await
            .insert(path.to_string(), (content_type.to_string(), bytes.to_vec()));
        Ok(format!("memory://{}", path))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryPersistence {
    documents: RwLock<Vec<DocumentRecord>>,
    obligations: RwLock<HashMap<String, Vec<ObligationRecord>>>,
    conversations: RwLock<HashMap<String, Vec<ChatTurn>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryPersistence {
    async fn save_document(&self, record: DocumentRecord) -> Result<DocumentRecord, PersistError> {
        let mut documents = self.documents.write().await;
        match documents.iter_mut().find(|d| d.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => documents.push(record.clone()),
        }
        Ok(record)
    }

    async fn get_document(&self, id: &str) -> Result<DocumentRecord, PersistError> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| PersistError::NotFound(id.to_string()))
    }

    async fn find_document_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<DocumentRecord>, PersistError> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .find(|d| d.session_id == session_id)
            .cloned())
    }

    async fn save_obligations(
        &self,
        document_id: &str,
        records: &[ObligationRecord],
    ) -> Result<(), PersistError> {
        self.obligations
            .write()
            .await
            .insert(document_id.to_string(), records.to_vec());
        Ok(())
    }

    async fn get_obligations(
        &self,
        document_id: &str,
    ) -> Result<Vec<ObligationRecord>, PersistError> {
        Ok(self
            .obligations
            .read()
            .await
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_chat_turns(
        &self,
        conversation_id: &str,
        turns: &[ChatTurn],
    ) -> Result<(), PersistError> {
        self.conversations
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .extend_from_slice(turns);
        Ok(())
    }

    async fn list_chat_turns(&self, conversation_id: &str) -> Result<Vec<ChatTurn>, PersistError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}

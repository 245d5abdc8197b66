//! SQLite persistence for analyzed documents, obligations and chat history

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lease_analysis::{PersistError, PersistenceGateway};
use lease_types::{AnalysisResults, ChatRole, ChatTurn, DocumentRecord, ObligationRecord};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
struct DbDocument {
    id: String,
    owner_id: String,
    session_id: String,
    file_name: String,
    content_type: String,
    storage_location: String,
    document_hash: String,
    lease_type: String,
    modes_json: String,
    extracted_text: String,
    results_json: String,
    created_at: DateTime<Utc>,
}

impl DbDocument {
    fn into_record(self) -> Result<DocumentRecord, PersistError> {
        let modes: Vec<String> = serde_json::from_str(&self.modes_json)?;
        let results: AnalysisResults = serde_json::from_str(&self.results_json)?;
        Ok(DocumentRecord {
            id: self.id,
            owner_id: self.owner_id,
            session_id: self.session_id,
            file_name: self.file_name,
            content_type: self.content_type,
            storage_location: self.storage_location,
            document_hash: self.document_hash,
            lease_type: self.lease_type,
            modes,
            extracted_text: self.extracted_text,
            results,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbChatTurn {
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

const DOCUMENT_COLUMNS: &str = "id, owner_id, session_id, file_name, content_type, \
    storage_location, document_hash, lease_type, modes_json, extracted_text, results_json, created_at";

fn backend(err: sqlx::Error) -> PersistError {
    PersistError::Backend(err.to_string())
}

pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    pub async fn connect(database_url: &str) -> Result<Self> {
        tracing::info!("Connecting to database: {}", database_url);

        // Every connection to an in-memory database gets its own copy, so
        // keep exactly one alive
        let in_memory = database_url.contains(":memory:");
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(database_url).await?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                session_id TEXT NOT NULL UNIQUE,
                file_name TEXT NOT NULL,
                content_type TEXT NOT NULL,
                storage_location TEXT NOT NULL,
                document_hash TEXT NOT NULL,
                lease_type TEXT NOT NULL,
                modes_json TEXT NOT NULL,
                extracted_text TEXT NOT NULL,
                results_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id)")
            .execute(pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS obligations (
                document_id TEXT PRIMARY KEY,
                records_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_turns_conversation ON chat_turns(conversation_id)",
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for SqlitePersistence {
    async fn save_document(&self, record: DocumentRecord) -> Result<DocumentRecord, PersistError> {
        let modes_json = serde_json::to_string(&record.modes)?;
        let results_json = serde_json::to_string(&record.results)?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, session_id, file_name, content_type, storage_location,
                                   document_hash, lease_type, modes_json, extracted_text, results_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                modes_json = excluded.modes_json,
                extracted_text = excluded.extracted_text,
                results_json = excluded.results_json
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.session_id)
        .bind(&record.file_name)
        .bind(&record.content_type)
        .bind(&record.storage_location)
        .bind(&record.document_hash)
        .bind(&record.lease_type)
        .bind(&modes_json)
        .bind(&record.extracted_text)
        .bind(&results_json)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        tracing::info!("Saved document {} for session {}", record.id, record.session_id);
        Ok(record)
    }

    async fn get_document(&self, id: &str) -> Result<DocumentRecord, PersistError> {
        let row: Option<DbDocument> =
            sqlx::query_as(&format!("SELECT {} FROM documents WHERE id = ?", DOCUMENT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        row.ok_or_else(|| PersistError::NotFound(format!("document {}", id)))?
            .into_record()
    }

    async fn find_document_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<DocumentRecord>, PersistError> {
        let row: Option<DbDocument> = sqlx::query_as(&format!(
            "SELECT {} FROM documents WHERE session_id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(DbDocument::into_record).transpose()
    }

    async fn save_obligations(
        &self,
        document_id: &str,
        records: &[ObligationRecord],
    ) -> Result<(), PersistError> {
        let records_json = serde_json::to_string(records)?;
        sqlx::query(
            r#"
            INSERT INTO obligations (document_id, records_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                records_json = excluded.records_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(document_id)
        .bind(&records_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get_obligations(
        &self,
        document_id: &str,
    ) -> Result<Vec<ObligationRecord>, PersistError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT records_json FROM obligations WHERE document_id = ?")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        match row {
            Some((json,)) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn append_chat_turns(
        &self,
        conversation_id: &str,
        turns: &[ChatTurn],
    ) -> Result<(), PersistError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for turn in turns {
            sqlx::query(
                "INSERT INTO chat_turns (conversation_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(conversation_id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(turn.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn list_chat_turns(&self, conversation_id: &str) -> Result<Vec<ChatTurn>, PersistError> {
        let rows: Vec<DbChatTurn> = sqlx::query_as(
            "SELECT role, content, created_at FROM chat_turns WHERE conversation_id = ? ORDER BY id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|row| ChatTurn {
                role: match row.role.as_str() {
                    "assistant" => ChatRole::Assistant,
                    _ => ChatRole::User,
                },
                content: row.content,
                timestamp: row.created_at,
            })
            .collect())
    }
}

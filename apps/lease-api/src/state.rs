//! Application state for the lease API

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use lease_analysis::{
    AnalysisConfig, AnalysisPipeline, ConversationalResponder, GeminiClient, GeminiConfig,
    GenerativeModel, ObligationExtractor, PdfTextExtractor, PersistenceGateway, ProgressChannel,
    StorageGateway,
};

use crate::db::SqlitePersistence;
use crate::storage::LocalStorage;

/// How uploaded files are turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExtractorKind {
    /// Send the file to the generative model
    Model,
    /// Extract PDF text locally with pdf-extract
    Local,
}

/// Server settings resolved from the command line and environment
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub database_url: String,
    pub storage_dir: PathBuf,
    pub extractor: ExtractorKind,
    pub analysis: AnalysisConfig,
}

pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    pub progress: Arc<ProgressChannel>,
    pub persistence: Arc<dyn PersistenceGateway>,
    pub obligations: ObligationExtractor,
    pub responder: ConversationalResponder,
    pub config: AnalysisConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub async fn new(settings: &ServerSettings) -> Result<Self> {
        let model: Arc<dyn GenerativeModel> = Arc::new(GeminiClient::new(GeminiConfig::from_env())?);

        tokio::fs::create_dir_all(&settings.storage_dir).await?;
        let storage: Arc<dyn StorageGateway> = Arc::new(LocalStorage::new(&settings.storage_dir));
        let persistence: Arc<dyn PersistenceGateway> =
            Arc::new(SqlitePersistence::connect(&settings.database_url).await?);

        Ok(Self::with_gateways(
            model,
            storage,
            persistence,
            settings.extractor,
            settings.analysis.clone(),
        ))
    }

    /// Wire the core services over the given collaborators
    pub fn with_gateways(
        model: Arc<dyn GenerativeModel>,
        storage: Arc<dyn StorageGateway>,
        persistence: Arc<dyn PersistenceGateway>,
        extractor: ExtractorKind,
        config: AnalysisConfig,
    ) -> Self {
        let progress = Arc::new(ProgressChannel::new(config.session_ttl));

        let pipeline = AnalysisPipeline::new(
            Arc::clone(&model),
            storage,
            Arc::clone(&persistence),
            Arc::clone(&progress),
            config.clone(),
        );
        let pipeline = match extractor {
            ExtractorKind::Model => pipeline,
            ExtractorKind::Local => pipeline.with_extractor(Arc::new(PdfTextExtractor::new())),
        };

        Self {
            pipeline: Arc::new(pipeline),
            progress,
            obligations: ObligationExtractor::with_persistence(
                Arc::clone(&model),
                Arc::clone(&persistence),
            ),
            responder: ConversationalResponder::new(model, config.max_history_turns),
            persistence,
            config,
        }
    }
}

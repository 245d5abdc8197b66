//! Lease analysis core
//!
//! Takes an uploaded lease through validation, storage, text extraction and
//! a set of independent AI analysis modes, publishing progress per session
//! as it goes. Also provides obligation extraction with a repair fallback
//! chain and the context assembly behind document and portfolio chat.
//!
//! External systems (model, object storage, database) sit behind the traits
//! in [`gateway`].

pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod extraction;
pub mod gateway;
pub mod intent;
pub mod json;
pub mod memory;
pub mod model;
pub mod modes;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod text;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use chat::{ChatReply, ChatScope, ConversationalResponder};
pub use config::AnalysisConfig;
pub use context::{build_document_context, build_portfolio_context, DocumentContext, PortfolioContext};
pub use error::{AnalysisError, ModelError, PersistError, StorageError, TextExtractionError};
pub use extraction::{ExtractionOutcome, ExtractionSource, ObligationExtractor};
pub use gateway::{GenerativeModel, InlineData, PersistenceGateway, StorageGateway};
pub use intent::{Intent, IntentClassifier, KeywordIntentClassifier};
pub use memory::{MemoryPersistence, MemoryStorage};
pub use model::{GeminiClient, GeminiConfig};
pub use pipeline::{
    AnalysisPipeline, PipelineFailure, PipelineInput, PipelineOutput, Stage, UploadedFile,
};
pub use progress::ProgressChannel;
pub use text::{ModelTextExtractor, PdfTextExtractor, TextExtractor};

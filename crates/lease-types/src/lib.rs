pub mod analysis;
pub mod document;
pub mod obligation;
pub mod progress;

pub use analysis::{
    AnalysisMode, AnalysisModeResult, AnalysisResults, ErrorEnvelope, ErrorKind, ModePayload,
    UnknownMode,
};
pub use document::{ChatRole, ChatTurn, DocumentRecord};
pub use obligation::{Enforceability, ObligationRecord, Phase};
pub use progress::{ProgressEvent, ProgressStatus};

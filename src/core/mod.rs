pub mod analysis;
pub mod enhance;
pub mod excerpt;
pub mod morphology;
pub mod records;
pub mod segmentation;
pub mod text;

pub use crate::domain::model::{DocumentAnalysisResponse, StageOutcome};
pub use crate::domain::ports::{AnalysisBackend, LanguageDetector, Storage};
pub use crate::utils::error::Result;

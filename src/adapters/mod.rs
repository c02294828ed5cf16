pub mod http;
pub mod language;
pub mod poppler;
pub mod storage;
pub mod tesseract;

pub use http::{HttpAnalysisBackend, RouterClient};
pub use language::WhatlangDetector;
pub use poppler::PopplerTools;
pub use storage::LocalStorage;
pub use tesseract::TesseractEngine;

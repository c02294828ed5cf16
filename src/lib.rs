pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::PhototypeConfig;
pub use core::analysis::AnalysisEngine;
pub use utils::error::{PhototypeError, Result};

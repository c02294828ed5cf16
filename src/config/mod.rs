pub mod toml_config;

pub use toml_config::PhototypeConfig;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "phototype")]
#[command(about = "PDF language detection, segmentation and OCR services")]
pub struct CliConfig {
    #[arg(long, default_value = "phototype.toml", help = "Path to the TOML configuration")]
    pub config: PathBuf,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory usage")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start every enabled service (default)
    Run,
    /// Start a single service by name, e.g. `router` or `ocr-ru`
    Serve { name: String },
    /// Enhance every PDF in a directory into page images
    Enhance {
        dir: PathBuf,
        #[arg(long, help = "Output directory, defaults to paths.processed_dir")]
        out: Option<PathBuf>,
        #[arg(long, help = "Rasterisation DPI, defaults to preprocessor.enhance_dpi")]
        dpi: Option<u32>,
    },
    /// Report whether poppler can be found and run
    CheckPoppler,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    /// 載入設定檔 (不存在時使用預設值)
    pub fn load(&self) -> crate::Result<PhototypeConfig> {
        PhototypeConfig::load_or_default(&self.config)
    }
}

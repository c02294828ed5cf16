use clap::Parser;
use phototype::adapters::poppler::{find_poppler_path, PopplerTools};
use phototype::app::controller;
use phototype::config::Command;
use phototype::core::enhance::process_all_pdfs;
use phototype::utils::error::ErrorSeverity;
use phototype::utils::monitor::ProcessMonitor;
use phototype::utils::{logger, validation::Validate};
use phototype::{CliConfig, PhototypeConfig, PhototypeError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose);
            exit_with(e);
        }
    };

    let command = cli.command();
    match &command {
        Command::Run | Command::Serve { .. } => {
            match logger::init_service_logger(cli.verbose, &config.paths.logs_dir) {
                Ok(log_file) => tracing::debug!("Logging to {}", log_file.display()),
                Err(e) => {
                    logger::init_cli_logger(cli.verbose);
                    tracing::warn!("⚠️ File logging unavailable: {}", e);
                }
            }
        }
        Command::Enhance { .. } | Command::CheckPoppler => logger::init_cli_logger(cli.verbose),
    }

    if cli.verbose {
        tracing::debug!("CLI: {:?}", cli);
        tracing::debug!("Config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let result = match command {
        Command::Run => {
            let monitor = ProcessMonitor::new(cli.monitor);
            if monitor.is_enabled() {
                tracing::info!("🔍 Process monitoring enabled");
            }
            controller::run_all(&config, monitor).await
        }
        Command::Serve { name } => controller::serve_one(&config, &name).await,
        Command::Enhance { dir, out, dpi } => run_enhance(&config, dir, out, dpi).await,
        Command::CheckPoppler => check_poppler(&config),
    };

    if let Err(e) = result {
        exit_with(e);
    }
    Ok(())
}

async fn run_enhance(
    config: &PhototypeConfig,
    dir: std::path::PathBuf,
    out: Option<std::path::PathBuf>,
    dpi: Option<u32>,
) -> phototype::Result<()> {
    let out = out.unwrap_or_else(|| config.paths.processed_dir.clone());
    let dpi = dpi.unwrap_or(config.preprocessor.enhance_dpi);
    let poppler = PopplerTools::discover(config.paths.poppler_path.as_deref());

    tracing::info!("🚀 Enhancing PDFs in {} at {} DPI", dir.display(), dpi);
    let summary = tokio::task::spawn_blocking(move || process_all_pdfs(&poppler, &dir, &out, dpi))
        .await
        .map_err(|e| PhototypeError::ProcessingError {
            message: format!("Enhancement task failed: {}", e),
        })??;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    tracing::info!("✅ Enhanced {} files", summary.len());
    Ok(())
}

fn check_poppler(config: &PhototypeConfig) -> phototype::Result<()> {
    let found = find_poppler_path(config.paths.poppler_path.as_deref());
    match &found {
        Some(dir) => println!("📁 poppler directory: {}", dir.display()),
        None => println!("📁 poppler directory: not found, relying on PATH"),
    }
    let version = PopplerTools::new(found).check_pdfinfo()?;
    println!("✅ pdfinfo OK: {}", version);
    Ok(())
}

fn exit_with(e: PhototypeError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

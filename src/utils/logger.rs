use crate::utils::error::{PhototypeError, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::field::{Field, Visit};
use tracing::{span, Event, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 沒有服務 span 時使用的名稱
const DEFAULT_LOGGER_NAME: &str = "controller";
/// 各服務執行時所在的 span 名稱，`name` 欄位為顯示名稱
const SERVICE_SPAN: &str = "service";

/// 將 logger 名稱轉成顯示用名稱
///
/// `__main__` 變成 `MAIN`，帶點的名稱取最後一段，其餘首字母大寫。
pub fn display_name(name: &str) -> String {
    if name.starts_with("__") {
        return name.to_uppercase().replace("__", "");
    }
    let last = name.rsplit('.').next().unwrap_or(name);
    let mut chars = last.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 服務 span 的顯示名稱，存放於 span extensions
struct ServiceName(String);

#[derive(Default)]
struct NameVisitor(Option<String>);

impl Visit for NameVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "name" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "name" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

/// 在服務 span 建立時記下未經格式化的名稱
struct ServiceNameLayer;

impl<S> Layer<S> for ServiceNameLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != SERVICE_SPAN {
            return;
        }
        let mut visitor = NameVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(name), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(ServiceName(name));
        }
    }
}

/// `[HH:MM:SS] [Name/LEVEL]: message`
struct ServiceFormat;

impl<S, N> FormatEvent<S, N> for ServiceFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let name = ctx
            .event_scope()
            .and_then(|scope| {
                scope.from_root().find_map(|span| {
                    let extensions = span.extensions();
                    extensions.get::<ServiceName>().map(|name| name.0.clone())
                })
            })
            .unwrap_or_else(|| display_name(DEFAULT_LOGGER_NAME));

        write!(
            writer,
            "[{}] [{}/{}]: ",
            chrono::Local::now().format("%H:%M:%S"),
            name,
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose {
        "phototype=debug,tower_http=debug,info"
    } else {
        "phototype=info,tower_http=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// 初始化主控程式與各服務共用的日誌
///
/// 同時輸出到終端與 `<log_directory>/YYYY-MM-DD.log`，並把未捕捉的 panic 寫入日誌。
pub fn init_service_logger(verbose: bool, log_directory: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(log_directory)?;
    let log_file = log_directory.join(format!("{}.log", chrono::Local::now().format("%Y-%m-%d")));
    let file = OpenOptions::new().create(true).append(true).open(&log_file)?;

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(ServiceNameLayer)
        .with(tracing_subscriber::fmt::layer().event_format(ServiceFormat))
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(ServiceFormat)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| PhototypeError::ConfigError {
            message: format!("Logger already initialised: {}", e),
        })?;

    install_panic_hook();
    Ok(log_file)
}

/// 單次指令 (例如 enhance) 使用的精簡日誌
pub fn init_cli_logger(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("Uncaught panic: {}", info);
        default_hook(info);
    }));
}

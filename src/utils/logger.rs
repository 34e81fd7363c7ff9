use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sorting_monitor=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sorting_monitor=info"))
    }
}

/// 建立背景執行緒寫入的日誌檔；目錄或檔案無法建立時回傳 `None`
fn file_writer(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path.file_name()?;

    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("⚠️ 無法建立日誌目錄 {}: {}", dir.display(), e);
        return None;
    }

    match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
    {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(e) => {
            eprintln!("⚠️ 無法開啟日誌檔 {}: {}", path.display(), e);
            None
        }
    }
}

pub fn init_cli_logger(verbose: bool) {
    let _ = init_logger(verbose, None);
}

/// 初始化日誌；若提供 `log_file`，同時寫入純文字日誌檔。
///
/// 回傳的 guard 必須存活到程式結束，drop 時才會把緩衝中的日誌寫完。
#[must_use = "dropping the guard stops the log file writer"]
pub fn init_logger(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact();

    let (file_layer, guard) = match log_file.and_then(file_writer) {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(console)
        .with(file_layer)
        .init();

    guard
}

use chrono::Local;
use clap::Parser;
use sorting_monitor::config::cli::{Cli, Command};
use sorting_monitor::core::baseline::load_configured;
use sorting_monitor::domain::model::CollectionStatus;
use sorting_monitor::utils::{logger, validation::Validate};
use sorting_monitor::{
    dashboard, AppConfig, Collector, DashboardState, LocalStorage, MonitorError, ProgressChecker,
    ProgressRecorder, Result, SortingApiClient,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose);
            std::process::exit(report_error(&e));
        }
    };

    // 只有採集模式寫日誌檔
    let log_file = matches!(cli.command, Command::Collect { .. }).then(|| config.log_file_path());
    let log_guard = logger::init_logger(cli.verbose, log_file.as_deref());

    tracing::info!("Starting sorting-monitor");
    if cli.verbose {
        tracing::debug!("CLI: {:?}", cli);
        tracing::debug!("Config: {:?}", config);
    }

    let code = match config.validate() {
        Ok(()) => {
            let is_check = matches!(cli.command, Command::Check { .. });
            match run(cli.command, &config).await {
                Ok(code) => code,
                Err(e) => {
                    let code = report_error(&e);
                    if is_check {
                        2
                    } else {
                        code
                    }
                }
            }
        }
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            report_error(&e)
        }
    };

    // process::exit 不會執行 Drop，先讓日誌檔寫完
    drop(log_guard);
    std::process::exit(code);
}

fn report_error(e: &MonitorError) -> i32 {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    e.exit_code()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("無法監聽 Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run(command: Command, config: &AppConfig) -> Result<i32> {
    match command {
        Command::Collect { once } => collect(config, once).await,
        Command::Check {
            debug,
            watch,
            interval_seconds,
        } => check(config, debug, watch, interval_seconds).await,
        Command::Dashboard {
            port,
            bind,
            no_browser,
        } => serve_dashboard(config, port, bind, no_browser).await.map(|_| 0),
    }
}

async fn collect(config: &AppConfig, once: bool) -> Result<i32> {
    let client = SortingApiClient::new(config)?;
    let storage = LocalStorage::new(&config.collection.data_dir);
    let recorder = ProgressRecorder::new(storage, config.collection.json_filename.clone());
    let collector = Collector::new(
        client,
        recorder,
        &config.schedule,
        Duration::from_secs(config.collection.interval_minutes * 60),
    )?;

    tracing::info!("📁 資料目錄: {}", config.collection.data_dir);

    if once {
        let report = collector.collect_once(Local::now().naive_local()).await;
        return Ok(match report.status {
            CollectionStatus::Success => {
                println!("✅ 採集完成");
                0
            }
            CollectionStatus::PartialSuccess => {
                println!("⚠️ 採集部分失敗，詳見 {}", config.log_file_path().display());
                1
            }
        });
    }

    println!("按 Ctrl+C 停止採集");
    collector.run_scheduled(shutdown_signal()).await;
    Ok(0)
}

async fn check(config: &AppConfig, debug: bool, watch: bool, interval_seconds: u64) -> Result<i32> {
    let (baseline, _) = load_configured(config)?;
    let checker = ProgressChecker::new(
        SortingApiClient::new(config)?,
        baseline,
        config.monitor.alert_threshold_percent,
        config.schedule.rollover_hour,
    );

    if !watch {
        let report = checker.check_once(Local::now().naive_local()).await?;
        print!("{}", report.render(debug));
        return Ok(report.exit_code());
    }

    let interval = interval_seconds.max(1);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        print!("\x1B[2J\x1B[H");
        match checker.check_once(Local::now().naive_local()).await {
            Ok(report) => print!("{}", report.render(debug)),
            Err(e) => eprintln!("❌ {}", e.user_friendly_message()),
        }
        println!("\n已開啟持續模式，每 {} 秒刷新一次。按 Ctrl+C 停止。", interval);

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
        }
    }

    println!("已停止持續模式。");
    Ok(0)
}

async fn serve_dashboard(
    config: &AppConfig,
    port: Option<u16>,
    bind: Option<String>,
    no_browser: bool,
) -> Result<()> {
    let (baseline, category_baseline) = load_configured(config)?;
    let state = Arc::new(DashboardState::new(
        Arc::new(SortingApiClient::new(config)?),
        baseline,
        category_baseline,
        config.monitor.alert_threshold_percent,
        config.schedule.rollover_hour,
        Duration::from_secs(config.dashboard.refresh_seconds),
    ));

    let bind = bind.unwrap_or_else(|| config.dashboard.bind.clone());
    let listener = dashboard::bind_first_free(
        &bind,
        port.unwrap_or(config.dashboard.port),
        config.dashboard.port_search_span,
    )
    .await?;
    let port = listener.local_addr()?.port();

    let local_url = format!("http://localhost:{}", port);
    println!("🌐 看板已啟動");
    println!("   本機: {}", local_url);
    println!("   區網: http://{}:{}", dashboard::lan_ip(), port);
    println!("按 Ctrl+C 停止服務");

    if config.dashboard.open_browser && !no_browser {
        if let Err(e) = dashboard::open_browser(&local_url) {
            tracing::warn!("⚠️ 無法開啟瀏覽器: {}", e);
        }
    }

    dashboard::serve(listener, state, shutdown_signal()).await?;
    tracing::info!("🛑 看板已停止");
    Ok(())
}

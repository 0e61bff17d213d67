mod cli;
mod commands;
mod device;
mod error_fmt;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use dispenser_core::DispenserError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tracing_appender::non_blocking::WorkerGuard;

use crate::cli::{Cli, Commands, JSON_MODE};

/// Console on stderr (pretty or JSON), plus an optional JSON-lines file.
/// The returned guard flushes the file writer when dropped.
fn init_tracing(
    json: bool,
    level: &str,
    logging: Option<&dispenser_config::Logging>,
) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut guard = None;
    let file_layer = logging
        .and_then(|l| l.file.as_deref().map(|f| (f, l.rotation.as_deref())))
        .map(|(file, rotation)| {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or(path.as_os_str());
            let appender = match rotation.unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            fmt::layer().json().with_writer(writer)
        });

    let pretty = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let jsonl = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(jsonl)
        .with(file_layer)
        .try_init();
    guard
}

fn load_config(path: &Path) -> dispenser_core::Result<dispenser_config::Config> {
    dispenser_config::load_file(path)
        .map_err(|e| DispenserError::Config(format!("{}: {e}", path.display())).into())
}

fn execute(cli: &Cli, cfg: &dispenser_config::Config) -> dispenser_core::Result<()> {
    let json = cli.json;
    match &cli.cmd {
        Commands::Run => commands::run(cfg),
        Commands::Simulate {
            duration_ms,
            request_id,
            count,
            color,
            timeout_ms,
        } => {
            let args = commands::SimulateArgs {
                duration_ms: *duration_ms,
                request_id: request_id.clone(),
                count: *count,
                color: color.clone(),
                timeout: Duration::from_millis(*timeout_ms),
            };
            let reported = commands::simulate(cfg, &args)?;
            if json {
                println!("{reported}");
            } else {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&reported).unwrap_or_else(|_| reported.to_string())
                );
            }
            Ok(())
        }
        Commands::SelfCheck => {
            commands::self_check(cfg)?;
            if json {
                println!("{}", serde_json::json!({"status": "ok"}));
            } else {
                println!("ok");
            }
            Ok(())
        }
    }
}

fn report_error(err: &eyre::Report, guard: Option<WorkerGuard>) -> ! {
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", error_fmt::format_error_json(err));
    } else {
        eprintln!("{}", error_fmt::humanize(err));
    }
    let code = error_fmt::exit_code_for_error(err);
    drop(guard);
    std::process::exit(code);
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = load_config(&cli.config);
    let level = cli
        .log_level
        .clone()
        .or_else(|| cfg.as_ref().ok().and_then(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let guard = init_tracing(cli.json, &level, cfg.as_ref().ok().map(|c| &c.logging));

    let result = cfg.and_then(|cfg| execute(&cli, &cfg));
    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        report_error(&e, guard);
    }
}

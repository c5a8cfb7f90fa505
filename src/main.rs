//! WhyBot — console entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the model invoker and response pipeline
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Answer `-m` once, or run the console until EOF / shutdown

use std::path::PathBuf;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::info;

use whybot::console::{self, OutputFormat};
use whybot::pipeline::{ModelInvoker, ResponsePipeline};
use whybot::{config, error, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let log_file = args.log_file.as_deref().or(config.log_file.as_deref());
    logger::init(effective_log_level, args.log_level.is_some(), log_file)?;

    info!(
        bot_name = %config.bot_name,
        preset = %config.pipeline.preset,
        policy = %config.pipeline.policy,
        provider = %config.llm.provider,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let invoker = ModelInvoker::from_config(&config.llm, config.llm_api_key.clone())?;
    let pipeline = ResponsePipeline::new(config.bot_name.clone(), &config.pipeline, invoker);

    let conversation_id = uuid::Uuid::new_v4().to_string();
    info!(%conversation_id, provider = pipeline.invoker().provider_name(), "pipeline ready");

    let mut stdout = tokio::io::stdout();

    if let Some(message) = args.message {
        console::answer_once(&pipeline, &conversation_id, &message, args.format, &mut stdout).await?;
        return Ok(());
    }

    // Ctrl-C handler — cancels the token so the console loop exits.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let answered =
        console::run_console(&pipeline, &conversation_id, args.format, stdin, &mut stdout, shutdown).await?;

    info!(answered, "shutdown complete");
    Ok(())
}

struct CliArgs {
    log_level: Option<&'static str>,
    log_file: Option<PathBuf>,
    config_path: Option<String>,
    message: Option<String>,
    format: OutputFormat,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut log_file = None;
    let mut message = None;
    let mut format = OutputFormat::Text;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: whybot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -m, --message <TEXT>       Answer one message and exit");
                println!("      --json                 Print replies as JSON");
                println!("      --log-file <PATH>      Append logs to a file instead of stderr");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--log-file" => {
                if let Some(path) = iter.next() {
                    log_file = Some(PathBuf::from(path));
                } else {
                    eprintln!("error: --log-file requires a path argument");
                    std::process::exit(1);
                }
            }
            "-m" | "--message" => {
                if let Some(text) = iter.next() {
                    message = Some(text);
                } else {
                    eprintln!("error: -m/--message requires a text argument");
                    std::process::exit(1);
                }
            }
            "--json" => format = OutputFormat::Json,
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    CliArgs { log_level: logger::verbosity_level(verbosity), log_file, config_path, message, format }
}

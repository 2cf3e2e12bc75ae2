//! quotediff — compare two versions of an infrastructure quote.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quotediff_core::{DiffConfig, RawDocument};
use quotediff_diff::render_markdown;
use quotediff_extract::{create_backend, LlmConfig};
use quotediff_runtime::Comparator;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use state::AppState;

const DEFAULT_PORT: u16 = 3030;
const DEFAULT_LLM_CONFIG: &str = "llm-config.json";

/// Flags shared by the subcommands.
#[derive(Debug, Default)]
struct Options {
    positional: Vec<String>,
    json: bool,
    config: Option<PathBuf>,
    llm_config: Option<PathBuf>,
    port: Option<u16>,
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut opts = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => opts.json = true,
            "--config" => opts.config = Some(next_value(&mut iter, arg)?.into()),
            "--llm-config" => opts.llm_config = Some(next_value(&mut iter, arg)?.into()),
            "--port" => opts.port = Some(next_value(&mut iter, arg)?.parse()?),
            flag if flag.starts_with("--") => anyhow::bail!("Unknown option: {}", flag),
            _ => opts.positional.push(arg.clone()),
        }
    }
    Ok(opts)
}

fn next_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> anyhow::Result<&'a str> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} needs a value", flag))
}

fn load_configs(opts: &Options) -> anyhow::Result<(DiffConfig, LlmConfig)> {
    let config = match &opts.config {
        Some(path) => DiffConfig::load(path)?,
        None => DiffConfig::from_env()?,
    };
    let llm_path = opts
        .llm_config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LLM_CONFIG));
    Ok((config, LlmConfig::load(&llm_path)))
}

fn read_document(path: &Path) -> anyhow::Result<RawDocument> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let version = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(RawDocument::from_text(version, &text))
}

async fn run_compare(opts: Options) -> anyhow::Result<()> {
    let [old_path, new_path] = opts.positional.as_slice() else {
        anyhow::bail!("Usage: quotediff compare <old> <new> [--json] [--config FILE] [--llm-config FILE]");
    };
    let old = read_document(Path::new(old_path))?;
    let new = read_document(Path::new(new_path))?;

    let (config, llm) = load_configs(&opts)?;
    let comparator = Comparator::new(config.clone(), create_backend(&llm, &config));
    let report = comparator.compare(&old, &new).await?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_markdown(&report));
    }
    Ok(())
}

async fn run_server(opts: Options) -> anyhow::Result<()> {
    let (config, llm) = load_configs(&opts)?;
    let port = match opts.port {
        Some(port) => port,
        None => std::env::var("QUOTEDIFF_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT),
    };

    let state = Arc::new(AppState::new(config, llm));
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("quotediff server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn print_help() {
    println!("quotediff — compare two versions of an infrastructure quote");
    println!();
    println!("Usage: quotediff <command> [options]");
    println!();
    println!("Commands:");
    println!("  compare <old> <new>      Compare two text files (pages split on form feed)");
    println!("  serve                    Start the HTTP API");
    println!("  help                     Show this help message");
    println!();
    println!("Options:");
    println!("  --json                   Print the report as JSON instead of Markdown");
    println!("  --config FILE            Engine config (JSON); QUOTEDIFF_* env vars override");
    println!("  --llm-config FILE        Provider config (default: {})", DEFAULT_LLM_CONFIG);
    println!("  --port N                 Server port (default: {})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs on stderr; stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_help();
        return Ok(());
    };
    let opts = parse_options(&args[2..])?;

    match command.as_str() {
        "compare" => run_compare(opts).await,
        "serve" => run_server(opts).await,
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}. Use 'quotediff help' for usage.", other);
            std::process::exit(1);
        }
    }
}

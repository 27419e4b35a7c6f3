//! anyrdf - Convert structured data to RDF
//!
//! Runs RML mapping rules over JSON, CSV or XML input with RMLMapper and prints
//! the resulting Turtle. The engine jar is downloaded automatically when missing.

use clap::Parser;
use std::io::Write;
use tracing::error;
use tracing_subscriber::EnvFilter;

use anyrdf::cli::{Cli, Command, ConvertArgs, EngineArgs};
use anyrdf::dependency::{DependencyManager, DependencyProvider};
use anyrdf::{ConversionRequest, Converter};

/// Sets up log output on stderr, honouring `RUST_LOG`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Converts every input through one converter so repeated inputs hit the cache
async fn run_convert(args: ConvertArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.converter_config()?;
    let converter = Converter::new(&config);
    let mut stdout = std::io::stdout();

    let mut result: Result<(), Box<dyn std::error::Error>> = Ok(());
    for input in &args.inputs {
        let request = match (tokio::fs::read(input).await, args.content_type_for(input)) {
            (Ok(data), Ok(content_type)) => ConversionRequest {
                data,
                content_type: Some(content_type),
                correlation_id: Some(input.display().to_string()),
            },
            (Err(e), _) => {
                result = Err(format!("{}: {}", input.display(), e).into());
                break;
            }
            (_, Err(e)) => {
                result = Err(e.into());
                break;
            }
        };

        match converter.handle(request).await {
            Ok(output) => {
                stdout.write_all(output.body.as_bytes())?;
                stdout.flush()?;
            }
            Err(e) => {
                error!(input = %input.display(), error = %e, "Conversion failed");
                result = Err(e.into());
                break;
            }
        }
    }

    converter.stop();
    result
}

/// Installs the latest engine release and prints its version
async fn run_fetch_engine(args: EngineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.engine_config();
    let manager = DependencyManager::new(config.jar_path);
    let version = manager.ensure_available().await?;
    println!("{} installed at {}", version, manager.target_path().display());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Command::Convert(args) => run_convert(args).await,
        Command::FetchEngine(args) => run_fetch_engine(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

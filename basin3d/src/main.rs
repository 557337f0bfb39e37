//! Entrypoint of the basin3d binary

use dotenvy::dotenv;
use trogging::{
    TroggingGuard,
    cli::LoggingConfigBuilderExt,
    tracing_subscriber::{Registry, prelude::*},
};

mod commands {
    pub(crate) mod init;
    pub(crate) mod show;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "basin3d",
    version,
    about = "BASIN-3D variable catalog tools",
    long_about = r#"BASIN-3D variable catalog tools

Examples:
    # Synthesize the catalog from the plugins in a manifest and save it
    basin3d init --plugin-manifest plugins.json --catalog-file catalog.json

    # Show every observed property of the Alpha datasource
    basin3d show properties --catalog-file catalog.json --datasource Alpha

    # Show the canonical variables for some prefixed canonical ids
    basin3d show variables --catalog-file catalog.json --names A-ACT,USGS-Hg --from-canonical

    # Run init with full debug logging specified with LOG_FILTER
    LOG_FILTER=debug basin3d init --plugin-manifest plugins.json
"#
)]
struct Config {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// Initialize the catalog from the registered plugins
    Init(commands::init::Config),

    /// Print catalog records from a catalog file as JSON lines
    Show(commands::show::Config),
}

fn main() {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    match config.command {
        None => println!("command required, -h/--help for help"),
        Some(Command::Init(config)) => {
            let _tracing_guard = handle_init_logs(init_logs_and_tracing(&config.logging_config));
            if let Err(e) = commands::init::command(config) {
                eprintln!("Init command failed: {e:#}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
        Some(Command::Show(config)) => {
            if let Err(e) = commands::show::command(config) {
                eprintln!("Show command failed: {e:#}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
    }
}

fn handle_init_logs(r: Result<TroggingGuard, trogging::Error>) -> TroggingGuard {
    match r {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Initializing logs failed: {e}");
            std::process::exit(ReturnCode::Failure as _);
        }
    }
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // a missing env file is not an error
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}

fn init_logs_and_tracing(
    config: &trogging::cli::LoggingConfig,
) -> Result<TroggingGuard, trogging::Error> {
    let log_layer = trogging::Builder::new()
        .with_default_log_filter("info")
        .with_logging_config(config)
        .build()?;

    let subscriber = Registry::default().with(log_layer);
    trogging::install_global(subscriber)
}

use clap::Parser;
use repcheck::app::App;
use repcheck::cli::{Args, Command};
use repcheck::config::Config;
use repcheck::logging::setup_logging;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Config is loaded before App::new() so startup logs are never silently dropped.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_HASH"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting repcheck"
    );

    let app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "Failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => return app.serve().await,
        Command::Run { task, force } => app.run_task(task, force).await,
        Command::Sweep => app.sweep().await,
        Command::SeedSessions => app.seed_sessions().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "command failed");
            ExitCode::FAILURE
        }
    }
}

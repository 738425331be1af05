use clap::Parser;

use metronome::cli::{Cli, Commands};
use metronome::config::ConfigLoader;
use metronome::logger::init_logger;
use metronome::server::Server;
use metronome::{db, worker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loader = match cli.config.as_deref() {
        Some(path) => match ConfigLoader::with_config_file(path) {
            Ok(loader) => loader,
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        },
        None => ConfigLoader::new(),
    };

    let settings = match loader.load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize the logger before any command runs
    let _handle = match init_logger(settings.logger.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Logger initialization error: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Migrate) => {
            if let Err(e) = db::run_migrations(&settings.database.url).await {
                tracing::error!(error = %e, "Migration failed");
                std::process::exit(1);
            }
            tracing::info!("Migrations completed successfully");
            Ok(())
        }
        Some(Commands::Work) => match worker::run(settings).await {
            Ok(()) => {
                tracing::info!("Worker shutdown completed successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Worker error");
                std::process::exit(1);
            }
        },
        Some(Commands::Serve) | None => match Server::new(settings).run().await {
            Ok(()) => {
                tracing::info!("Server shutdown completed successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Server error");
                std::process::exit(1);
            }
        },
    }
}

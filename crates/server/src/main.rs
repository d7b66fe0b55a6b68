use std::path::PathBuf;

use clap::{Parser, Subcommand};

use garage_server::commands::{self, VerifyOutcome};
use garage_server::{AppConfig, AppState, build_app, storage};

#[derive(Parser)]
#[command(name = "garage-server", about = "Garage - track your cars and their modifications")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Mark a user's email address as verified
    VerifyEmail {
        /// Email address of the user
        email: String,
    },

    /// Upsert tracks, organizers and events from a JSON file
    ImportEvents {
        /// Path to the JSON document
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "garage_server=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    tracing::info!("data directory: {}", config.data_dir.display());
    let db = storage::init_db(&config.data_dir)?;
    tracing::info!("database initialized");

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(AppState::new(db, config)).await,
        Commands::VerifyEmail { email } => {
            match commands::verify_email(&db, &email)? {
                VerifyOutcome::Verified => println!("Verified {email}."),
                VerifyOutcome::AlreadyVerified => println!("{email} was already verified."),
            }
            Ok(())
        }
        Commands::ImportEvents { file } => {
            let summary = commands::import_events_file(&db, &file)?;
            println!(
                "Imported {} tracks, {} organizers and {} events.",
                summary.tracks, summary.organizers, summary.events
            );
            Ok(())
        }
    }
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let port = state.config.port;
    let base_url = state.config.base_url.clone();
    let app = build_app(state);

    tracing::info!("starting server at {base_url}");
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

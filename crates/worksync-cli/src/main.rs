use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use worksync_core::{ApiResponse, Settings, SyncContext};

mod commands;

#[derive(Parser)]
#[command(name = "worksync", version, about = "Sync Upwork records into a Notion database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronization
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Upwork OAuth authorization
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// GET an Upwork API path with the stored token
    Fetch(commands::fetch::FetchArgs),
    /// Send a GraphQL query to Upwork
    Gql(commands::gql::GqlArgs),
    /// Upsert demo records into the Notion database
    Seed(commands::seed::SeedArgs),
    /// Liveness check
    Ping,
}

/// Logs go to stderr so stdout carries only the JSON response.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn dispatch(command: Commands) -> Result<ApiResponse, Box<dyn std::error::Error>> {
    let ctx = SyncContext::builder(Settings::load()?).build()?;
    let response = match command {
        Commands::Sync { action } => commands::sync::run(&ctx, action).await,
        Commands::Auth { action } => commands::auth::run(&ctx, action).await,
        Commands::Fetch(args) => commands::fetch::run(&ctx, args).await,
        Commands::Gql(args) => commands::gql::run(&ctx, args).await,
        Commands::Seed(args) => commands::seed::run(&ctx, args).await,
        Commands::Ping => ctx.ping(),
    };
    Ok(response)
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let result = runtime
        .block_on(dispatch(cli.command))
        .and_then(|response| {
            commands::print_response(&response)?;
            if let Some(location) = &response.location {
                eprintln!("Open this URL to authorize:\n  {location}");
            }
            Ok(response.is_success())
        });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

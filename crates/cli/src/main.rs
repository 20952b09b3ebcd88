//! ChairTime CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! chairtime migrate
//!
//! # Seed a demo tenant with services and customers
//! chairtime seed --tenant demo_shop --name "Demo Barbershop"
//!
//! # Print a tenant's dashboard snapshot
//! chairtime stats demo_shop
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "chairtime")]
#[command(author, version, about = "ChairTime CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Seed a demo tenant with services and customers
    Seed {
        /// Tenant identifier to create
        #[arg(short, long)]
        tenant: String,

        /// Display name of the shop
        #[arg(short, long, default_value = "Demo Barbershop")]
        name: String,

        /// Shop-local UTC offset in minutes
        #[arg(long)]
        utc_offset_minutes: Option<i32>,
    },
    /// Print a tenant's dashboard snapshot as JSON
    Stats {
        /// Tenant identifier
        tenant: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed {
            tenant,
            name,
            utc_offset_minutes,
        } => commands::seed::run(&tenant, &name, utc_offset_minutes).await?,
        Commands::Stats { tenant } => commands::stats::run(&tenant).await?,
    }
    Ok(())
}

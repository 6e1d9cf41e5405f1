//! Riptide CLI - Database migrations and store management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run shop schema and session store migrations
//! riptide migrate
//!
//! # Create admin user (password from RIPTIDE_ADMIN_PASSWORD)
//! riptide admin create -e ops@riptideswim.com -n "Ops" -r super_admin
//!
//! # Load or refresh the catalog from YAML
//! riptide seed products catalog.yaml
//!
//! # Re-check pending orders older than 30 minutes with Square
//! riptide reconcile --older-than-minutes 30
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string (all commands)
//! - `RIPTIDE_ADMIN_PASSWORD` - Password for `admin create`
//! - `SQUARE_ACCESS_TOKEN`, `SQUARE_LOCATION_ID`, `SQUARE_ENVIRONMENT` - `reconcile`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "riptide")]
#[command(author, version, about = "Riptide Swim CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations (shop schema and session store)
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Re-verify stale pending orders with Square
    Reconcile {
        /// Only check orders created at least this many minutes ago
        #[arg(long, default_value_t = 30)]
        older_than_minutes: i64,

        /// Maximum number of orders to check in one run
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Admin role (`super_admin`, `admin`, `viewer`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create or update products from a YAML catalog (matched by title)
    Products {
        /// Path to the YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "riptide=info,riptide_admin=info,riptide_db=info,riptide_storefront=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { email, name, role } => {
                commands::admin::create_user(&email, &name, &role).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::Reconcile {
            older_than_minutes,
            limit,
        } => commands::reconcile::run(older_than_minutes, limit).await?,
    }
    Ok(())
}

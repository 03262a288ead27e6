//! Operator CLI for tenant schemas and migrations.
//!
//! Usage: schema-admin <COMMAND>
//!   provision <ID> [--name NAME]   register a business and create its tables
//!   drop <ID>                      drop a tenant's tables and unregister it
//!   status <ID> | repair <ID>      inspect / fill missing tables
//!   fleet                          health of every tenant
//!   run --name N --sql S (--tenant ID | --all | --common)
//!   log [--page P --limit L]       migration log, newest first
//!   common status | common up      file-based shared-schema migrations
//!
//! Reads the same environment as the API (DATABASE_URL, STATEMENT_TIMEOUT_MS, ...).
//! Results are printed as JSON on stdout.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use randevu_api::{
    config::Config,
    db::{self, ident::TenantId, store::PgStore, tenant::TemplateRegistry},
    models::migration_log::LogQuery,
    services::{common_migrations::CommonMigrations, tenant::TenantService},
};

const OPERATOR: &str = "cli";

#[derive(Parser)]
#[command(name = "schema-admin", about = "Manage tenant schemas and migrations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a business and create its tables
    Provision {
        id: String,
        /// Display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,
    },
    /// Drop a tenant's tables and remove it from the directory
    Drop { id: String },
    /// Per-table status of one tenant
    Status { id: String },
    /// Recreate missing tables of one tenant
    Repair { id: String },
    /// Health of every tenant
    Fleet,
    /// Run a migration statement
    Run(RunArgs),
    /// Migration log, newest first
    Log {
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// File-based shared-schema migrations
    Common {
        #[command(subcommand)]
        action: CommonAction,
    },
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["tenant", "all", "common"])))]
struct RunArgs {
    /// Migration name recorded in the log
    #[arg(long)]
    name: String,
    /// Statement; `{tenant}` or `{isletme_id}` is replaced with each tenant id
    #[arg(long)]
    sql: String,
    #[arg(long)]
    tenant: Option<String>,
    #[arg(long)]
    all: bool,
    #[arg(long)]
    common: bool,
}

#[derive(Subcommand)]
enum CommonAction {
    Status,
    Up,
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let engine_config = config.engine();
    let store = Arc::new(PgStore::new(pool, engine_config.statement_timeout));
    let engine = Arc::new(TenantService::new(
        store,
        Arc::new(TemplateRegistry::standard()),
        engine_config,
    ));

    match cli.command {
        Command::Provision { id, name } => {
            let name = name.unwrap_or_else(|| id.clone());
            let (business, tables) = engine.onboard(&id, &name, OPERATOR).await?;
            print(&serde_json::json!({ "business": business, "tables": tables }))?;
        }
        Command::Drop { id } => {
            let tenant = TenantId::new(&id)?;
            let (tables, unregistered) = engine.decommission(&tenant, OPERATOR).await?;
            print(&serde_json::json!({ "unregistered": unregistered, "tables": tables }))?;
        }
        Command::Status { id } => {
            let tenant = TenantId::new(&id)?;
            print(&engine.status(&tenant).await)?;
        }
        Command::Repair { id } => {
            let tenant = TenantId::new(&id)?;
            print(&engine.repair(&tenant, OPERATOR).await?)?;
        }
        Command::Fleet => print(&engine.all_status().await?)?,
        Command::Run(args) => {
            if let Some(id) = args.tenant {
                let tenant = TenantId::new(&id)?;
                print(&engine.run_one(&tenant, &args.name, &args.sql, OPERATOR).await?)?;
            } else if args.all {
                let results = engine.run_all(&args.name, &args.sql, OPERATOR).await?;
                let failed = results.iter().filter(|r| !r.success).count();
                print(&results)?;
                if failed > 0 {
                    tracing::warn!("{failed}/{} tenant(s) failed", results.len());
                }
            } else {
                print(&engine.run_common(&args.name, &args.sql, OPERATOR).await?)?;
            }
        }
        Command::Log { page, limit } => {
            let query = LogQuery {
                page,
                limit,
                ..Default::default()
            };
            print(&engine.log().list(&query).await?)?;
        }
        Command::Common { action } => {
            let common = CommonMigrations::new(engine.clone(), config.common_migrations_dir.clone());
            match action {
                CommonAction::Status => print(&common.status().await?)?,
                CommonAction::Up => print(&common.up(OPERATOR).await?)?,
            }
        }
    }

    Ok(())
}

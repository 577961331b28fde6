//! Prisma Cloud CLI - query the Prisma Cloud REST API with SQL

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datafusion::arrow::util::pretty::pretty_format_batches;
use prismacloud_client::{ConnectionConfig, ConnectionPool};
use prismacloud_tables::{ConnectionSource, Requirement, SessionContext, TableDescriptor, TableRegistry};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "prismacloud")]
#[command(about = "Query Prisma Cloud resources with SQL")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON connection config; PRISMACLOUD_* environment variables are used when absent
    #[arg(short, long, global = true, env = "PRISMACLOUD_CONFIG")]
    config: Option<PathBuf>,

    /// Connection name used as the pool key
    #[arg(long, global = true, default_value = "prismacloud")]
    connection: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SQL query against the registered tables
    Query {
        /// SQL text, e.g. "SELECT name FROM prismacloud_policy WHERE severity = 'high'"
        sql: String,
    },

    /// List the available tables
    Tables,

    /// Show the columns and key columns of a table
    Describe {
        /// Table name
        table: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG overrides --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = TableRegistry::new();

    match cli.command {
        Commands::Query { sql } => {
            let config = load_config(cli.config.as_deref())?;
            run_query(&registry, &cli.connection, config, &sql).await?;
        }
        Commands::Tables => list_tables(&registry),
        Commands::Describe { table } => {
            let descriptor = registry.lookup(&table)?;
            describe_table(&descriptor);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ConnectionConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading connection config from {:?}", path);
            ConnectionConfig::from_json_file(path)
                .with_context(|| format!("reading connection config {:?}", path))?
        }
        None => {
            debug!("Loading connection config from PRISMACLOUD_* environment variables");
            ConnectionConfig::from_env().context("reading PRISMACLOUD_* environment")?
        }
    };
    // Fail fast on bad settings before any table is scanned.
    config.validate().context("invalid connection config")?;
    Ok(config)
}

async fn run_query(
    registry: &TableRegistry,
    connection: &str,
    config: ConnectionConfig,
    sql: &str,
) -> Result<()> {
    let ctx = SessionContext::new();
    let source = ConnectionSource {
        pool: Arc::new(ConnectionPool::new()),
        name: connection.to_string(),
        config: Arc::new(config),
    };
    registry.register_all(&ctx, &source)?;

    debug!("Executing: {}", sql);
    let batches = ctx.sql(sql).await?.collect().await?;
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();

    println!("{}", pretty_format_batches(&batches)?);
    info!("{} row(s)", rows);
    Ok(())
}

fn list_tables(registry: &TableRegistry) {
    let width = registry.list().map(|t| t.name.len()).max().unwrap_or(0);
    for table in registry.list() {
        println!("{:width$}  {}", table.name, table.description, width = width);
    }
}

fn describe_table(table: &TableDescriptor) {
    println!("{}", table.name);
    println!("  {}", table.description);
    println!();

    let width = table.columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in &table.columns {
        println!(
            "  {:width$}  {:9}  {}",
            column.name,
            column.kind.as_str(),
            column.description,
            width = width
        );
    }

    if !table.list_keys.is_empty() {
        println!();
        println!("  Key columns:");
        for key in &table.list_keys {
            let operators: Vec<&str> = key.operators.iter().map(|op| op.symbol()).collect();
            let require = match key.require {
                Requirement::Required => "required",
                Requirement::Optional => "optional",
            };
            println!("    {} ({}; {})", key.name, require, operators.join(" "));
        }
    }
    if let Some(key) = table.get_key {
        println!();
        println!("  Get key: {} =", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_with_globals() {
        let cli = Cli::parse_from([
            "prismacloud",
            "--verbose",
            "--connection",
            "prod",
            "query",
            "SELECT 1",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.connection, "prod");
        assert!(matches!(cli.command, Commands::Query { sql } if sql == "SELECT 1"));
    }

    #[test]
    fn test_parse_describe() {
        let cli = Cli::parse_from(["prismacloud", "describe", "prismacloud_alert"]);
        assert!(matches!(cli.command, Commands::Describe { table } if table == "prismacloud_alert"));
    }
}

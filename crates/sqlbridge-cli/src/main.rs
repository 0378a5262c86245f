use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sqlbridge_core::{Config, LdmType, Schema};
use sqlbridge_engine::{
    CsvFileSink, CsvSink, ExtractParams, ExtractRequest, Extractor, InferenceParams, InferenceRequest,
    LdmTransformer, PassthroughTransformer, RowSink, RowTransformer, SchemaInferrer, SqlConnector,
};

const CONFIG_FILE: &str = "sqlbridge.toml";
const PASSWORD_ENV: &str = "SQLBRIDGE_PASSWORD";

/// SQLBridge - Load relational query results into analytical datasets
#[derive(Parser)]
#[command(name = "sqlbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: sqlbridge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Source database connection
#[derive(Args)]
struct SourceArgs {
    /// Driver identifier (e.g. postgres, org.postgresql.Driver)
    #[arg(short, long)]
    driver: String,

    /// Connection URL
    #[arg(short, long)]
    url: String,

    /// Database user
    #[arg(long)]
    username: Option<String>,

    /// Database password (falls back to SQLBRIDGE_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Connect over TLS
    #[arg(long)]
    tls: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer a dataset schema from a query
    GenerateConfig {
        #[command(flatten)]
        source: SourceArgs,

        /// Dataset name
        #[arg(short, long)]
        name: String,

        /// Probe query
        #[arg(short, long)]
        query: String,

        /// Output file for the schema
        #[arg(short, long, default_value = "schema.json")]
        output: PathBuf,

        /// Turn primary and foreign keys into connection points and references
        #[arg(long)]
        guess_keys: bool,

        /// Shared date dimension for date columns
        #[arg(long)]
        date_dimension: Option<String>,
    },

    /// Extract query results to CSV
    Extract {
        #[command(flatten)]
        source: SourceArgs,

        /// Schema file produced by generate-config
        #[arg(short, long)]
        schema: PathBuf,

        /// Query text
        #[arg(short, long, conflicts_with = "query_file")]
        query: Option<String>,

        /// File holding the query text
        #[arg(short = 'f', long)]
        query_file: Option<PathBuf>,

        /// Rows per round trip; a negative value streams row by row
        #[arg(long, allow_hyphen_values = true)]
        fetch_size: Option<String>,

        /// Output CSV file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write values as read, without dataset formatting
        #[arg(long)]
        dump: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env is optional
    let _ = dotenvy::dotenv();

    let default_level = if cli.verbose { "sqlbridge=debug" } else { "sqlbridge=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::GenerateConfig {
            source,
            name,
            query,
            output,
            guess_keys,
            date_dimension,
        } => {
            let params = InferenceParams {
                driver: Some(source.driver),
                url: Some(source.url),
                username: source.username,
                password: password(source.password),
                query: Some(query),
                name: Some(name),
                guess_keys,
                date_dimension,
                tls: source.tls,
            };
            generate_config_command(&config, params, &output, cli.verbose).await
        }
        Commands::Extract {
            source,
            schema,
            query,
            query_file,
            fetch_size,
            output,
            dump,
        } => {
            let params = ExtractParams {
                driver: Some(source.driver),
                url: Some(source.url),
                username: source.username,
                password: password(source.password),
                query,
                query_file,
                fetch_size,
                tls: source.tls,
            };
            extract_command(&config, params, &schema, output.as_deref(), dump, cli.verbose).await
        }
    }
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)?
    } else if Path::new(CONFIG_FILE).exists() {
        Config::from_file(Path::new(CONFIG_FILE))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    tracing::debug!(
        fetch_size = %config.default_fetch_size,
        drivers = config.drivers.len(),
        "Configuration loaded"
    );
    if verbose {
        eprintln!("{} fetch size: {}", "Using".cyan(), config.default_fetch_size);
    }
    Ok(config)
}

fn password(explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| std::env::var(PASSWORD_ENV).ok())
}

fn connector_for(driver: &str) -> SqlConnector {
    let mut connector = SqlConnector::with_builtin_drivers();
    // An unknown driver is reported again when connecting
    let _ = connector.load_driver(driver);
    connector
}

/// Generate-config command - infer a schema and save it as JSON
async fn generate_config_command(
    config: &Config,
    params: InferenceParams,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    let request = InferenceRequest::from_params(params, config)?;

    if verbose {
        eprintln!("{} {}...", "Connecting with".cyan(), request.driver);
    }

    let connector = connector_for(&request.driver);
    let schema = connector.infer_schema(&request).await?;

    schema
        .save_to_file(output)
        .with_context(|| format!("Cannot write schema to {}", output.display()))?;

    print_schema(&schema);
    println!("\n{} {}", "✓ Schema written to".green(), output.display());

    Ok(())
}

/// Extract command - stream query results into CSV
async fn extract_command(
    config: &Config,
    params: ExtractParams,
    schema_path: &Path,
    output: Option<&Path>,
    dump: bool,
    verbose: bool,
) -> Result<()> {
    let request = ExtractRequest::from_params(params, config)?;
    let schema = Schema::from_file(schema_path)
        .with_context(|| format!("Cannot load schema from {}", schema_path.display()))?;

    if verbose {
        eprintln!(
            "{} {} ({} columns, fetch size {})",
            "Extracting dataset".cyan(),
            schema.name,
            schema.len(),
            request.fetch_size
        );
    }

    let transformer: Box<dyn RowTransformer> = if dump {
        Box::new(PassthroughTransformer)
    } else {
        Box::new(LdmTransformer::new(config.datetime_format.clone()))
    };

    // The file only appears once the query has produced its header
    let mut sink: Box<dyn RowSink> = match output {
        Some(path) => Box::new(CsvFileSink::new(path)),
        None => Box::new(CsvSink::from_writer(std::io::stdout())),
    };

    let connector = connector_for(&request.driver);
    let rows = connector
        .extract(&request, &schema, transformer.as_ref(), sink.as_mut())
        .await
        .with_context(|| match output {
            Some(path) => format!("Extraction to {} failed", path.display()),
            None => "Extraction failed".to_string(),
        })?;

    if let Some(path) = output {
        eprintln!("{} {} rows to {}", "✓ Wrote".green(), rows, path.display());
    } else if verbose {
        eprintln!("{} {} rows", "✓ Wrote".green(), rows);
    }

    Ok(())
}

fn print_schema(schema: &Schema) {
    println!("{} {}", "Dataset:".bold(), schema.name);

    for column in &schema.columns {
        let role = match column.ldm_type {
            LdmType::ConnectionPoint => column.ldm_type.to_string().magenta(),
            LdmType::Reference => column.ldm_type.to_string().blue(),
            LdmType::Fact => column.ldm_type.to_string().green(),
            LdmType::Date => column.ldm_type.to_string().yellow(),
            LdmType::Attribute => column.ldm_type.to_string().normal(),
        };

        let mut line = format!("  {:<32} {}", column.name, role);
        if let Some(target) = &column.reference {
            line.push_str(&format!(" -> {}.{}", target.table, target.column));
        }
        if let Some(format) = &column.date_format {
            line.push_str(&format!(" ({})", format));
        }
        if let Some(hint) = &column.dimension_hint {
            line.push_str(&format!(" [{}]", hint).dimmed().to_string());
        }
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_accepts_negative_fetch_size() {
        let cli = Cli::try_parse_from([
            "sqlbridge",
            "extract",
            "--driver",
            "postgres",
            "--url",
            "postgres://localhost/shop",
            "--schema",
            "orders.json",
            "--query",
            "SELECT 1",
            "--fetch-size",
            "-2147483648",
        ])
        .unwrap();

        match cli.command {
            Commands::Extract { fetch_size, .. } => {
                assert_eq!(fetch_size.as_deref(), Some("-2147483648"));
            }
            _ => panic!("Expected extract command"),
        }
    }

    #[test]
    fn test_query_conflicts_with_query_file() {
        let result = Cli::try_parse_from([
            "sqlbridge",
            "extract",
            "-d",
            "postgres",
            "-u",
            "postgres://localhost/shop",
            "-s",
            "orders.json",
            "-q",
            "SELECT 1",
            "-f",
            "orders.sql",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_password_wins() {
        assert_eq!(password(Some("secret".to_string())).as_deref(), Some("secret"));
    }
}

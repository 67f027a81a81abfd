use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Bucket used when neither CLI nor environment provides one.
const DEFAULT_BUCKET: &str = "admin-docs";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub bucket: String,
    pub admin_token: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Document management API with secure download proxy")]
pub struct Args {
    /// Host to bind to (overrides DOC_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DOC_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where blobs are stored (overrides DOC_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides DOC_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket documents are written into (overrides DOC_STORE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Administrator bearer token (overrides DOC_STORE_ADMIN_TOKEN)
    #[arg(long)]
    pub admin_token: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("DOC_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("DOC_STORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing DOC_STORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading DOC_STORE_PORT"),
        };
        let env_storage =
            env::var("DOC_STORE_STORAGE_DIR").unwrap_or_else(|_| "./data/blobs".into());
        let env_db = env::var("DOC_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/doc_store.db".into());
        let env_bucket = env::var("DOC_STORE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.into());

        let admin_token = match args.admin_token {
            Some(token) => token,
            None => env::var("DOC_STORE_ADMIN_TOKEN")
                .context("DOC_STORE_ADMIN_TOKEN must be set (or pass --admin-token)")?,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            bucket: args.bucket.unwrap_or(env_bucket),
            admin_token,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

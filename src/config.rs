use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    /// Root directory holding every bucket directory and the global
    /// metadata documents.
    pub storage_root: PathBuf,

    /// Upload ceiling in whole megabytes.
    pub max_file_size_mb: u64,

    /// User seeded as system administrator on first start.
    pub bootstrap_admin: String,

    /// How long a writer waits for a busy metadata lock before giving up.
    pub lock_timeout_secs: u64,

    /// Marker age after which a lock is treated as abandoned and reclaimed.
    pub lock_lease_secs: u64,

    /// Token claim carrying the caller's username.
    pub identity_claim: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-tenant bucket file storage API")]
pub struct Args {
    /// Host to bind to (overrides BUCKET_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKET_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where buckets are stored (overrides FILE_STORAGE_LOCATION)
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    /// Maximum upload size in MB (overrides MAXIMUM_FILE_SIZE)
    #[arg(long)]
    pub max_file_size_mb: Option<u64>,

    /// Bootstrap system administrator (overrides DEFAULT_ADMIN)
    #[arg(long)]
    pub bootstrap_admin: Option<String>,

    /// Lock wait timeout in seconds (overrides BUCKET_STORE_LOCK_TIMEOUT_SECS)
    #[arg(long)]
    pub lock_timeout_secs: Option<u64>,

    /// Lock lease in seconds (overrides BUCKET_STORE_LOCK_LEASE_SECS)
    #[arg(long)]
    pub lock_lease_secs: Option<u64>,

    /// Username claim in bearer tokens (overrides BUCKET_STORE_IDENTITY_CLAIM)
    #[arg(long)]
    pub identity_claim: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("BUCKET_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("BUCKET_STORE_PORT") {
            Ok(value) => Some(
                value
                    .parse::<u16>()
                    .with_context(|| format!("parsing BUCKET_STORE_PORT value `{}`", value))?,
            ),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading BUCKET_STORE_PORT"),
        };
        let env_storage = env::var("FILE_STORAGE_LOCATION").ok().map(PathBuf::from);
        let env_max_size = match env::var("MAXIMUM_FILE_SIZE") {
            Ok(value) => Some(
                value
                    .parse::<u64>()
                    .with_context(|| format!("parsing MAXIMUM_FILE_SIZE value `{}`", value))?,
            ),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading MAXIMUM_FILE_SIZE"),
        };
        let env_admin = env::var("DEFAULT_ADMIN").ok();
        let env_lock_timeout = parse_secs_var("BUCKET_STORE_LOCK_TIMEOUT_SECS")?;
        let env_lock_lease = parse_secs_var("BUCKET_STORE_LOCK_LEASE_SECS")?;
        let env_claim = env::var("BUCKET_STORE_IDENTITY_CLAIM").ok();

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.or(env_port).unwrap_or(3000),
            storage_root: args
                .storage_root
                .or(env_storage)
                .context("FILE_STORAGE_LOCATION is not set")?,
            max_file_size_mb: args
                .max_file_size_mb
                .or(env_max_size)
                .context("MAXIMUM_FILE_SIZE is not set")?,
            bootstrap_admin: args
                .bootstrap_admin
                .or(env_admin)
                .context("DEFAULT_ADMIN is not set")?,
            lock_timeout_secs: args.lock_timeout_secs.or(env_lock_timeout).unwrap_or(10),
            lock_lease_secs: args.lock_lease_secs.or(env_lock_lease).unwrap_or(30),
            identity_claim: args
                .identity_claim
                .or(env_claim)
                .unwrap_or_else(|| "unique_name".into()),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_secs(self.lock_lease_secs)
    }
}

fn parse_secs_var(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => Ok(Some(
            value
                .parse::<u64>()
                .with_context(|| format!("parsing {} value `{}`", name, value))?,
        )),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

//! Service configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use paysync_core::{
    InitialSyncConfig, WalletId, WorkspaceId, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY,
};
use paysync_stripe::{DEFAULT_TOLERANCE, WEBHOOK_TOLERANCE_OPTION};
use paysync_sync::Credentials;

use crate::error::{Result, ServiceError};

/// Default `RocksDB` data directory.
pub const DEFAULT_DATA_DIR: &str = "/data/paysync";

/// Where the Stripe secrets file is looked up, in order.
pub const STRIPE_SECRET_PATHS: [&str; 3] = [
    ".secrets/stripe.json",
    "paysync/.secrets/stripe.json",
    "../.secrets/stripe.json",
];

/// Service configuration loaded from environment variables.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Path to the `RocksDB` data directory (default: "/data/paysync").
    pub data_dir: String,

    /// Workspace the initial sync links records to.
    pub workspace_id: Option<WorkspaceId>,

    /// Wallet used for products that carry no `wallet_id` metadata.
    pub wallet_id: Option<WalletId>,

    /// Stripe API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// Stripe API base URL override.
    pub stripe_api_base: Option<String>,

    /// Items per provider page.
    pub batch_size: u32,

    /// Entity types to sync, in order. Empty means the default order.
    pub entity_types: Vec<String>,

    /// Retries per page on transient failures.
    pub max_retries: u32,

    /// Base delay between retries.
    pub retry_delay: Duration,

    /// Accepted webhook timestamp skew. Zero disables the check.
    pub webhook_tolerance: Duration,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Config` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok(), &STRIPE_SECRET_PATHS)
    }

    /// Load configuration from `var` and the first readable secrets file.
    ///
    /// A secrets file takes precedence over the `STRIPE_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Config` if a variable is set but cannot be parsed.
    pub fn load<F, P>(var: F, secret_paths: &[P]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
        P: AsRef<Path>,
    {
        let defaults = Self::default();
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets(&var, secret_paths);

        Ok(Self {
            data_dir: non_empty(&var, "DATA_DIR").unwrap_or(defaults.data_dir),
            workspace_id: parse_var(&var, "PAYSYNC_WORKSPACE_ID")?,
            wallet_id: parse_var(&var, "PAYSYNC_WALLET_ID")?,
            stripe_api_key,
            stripe_webhook_secret,
            stripe_api_base: non_empty(&var, "STRIPE_API_BASE"),
            batch_size: parse_var(&var, "SYNC_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            entity_types: non_empty(&var, "SYNC_ENTITY_TYPES")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            max_retries: parse_var(&var, "SYNC_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_delay: parse_var(&var, "SYNC_RETRY_DELAY_MS")?
                .map_or(defaults.retry_delay, Duration::from_millis),
            webhook_tolerance: parse_var(&var, "WEBHOOK_TOLERANCE_SECONDS")?
                .map_or(defaults.webhook_tolerance, Duration::from_secs),
        })
    }

    /// The initial sync settings this config describes.
    #[must_use]
    pub fn sync_config(&self) -> InitialSyncConfig {
        InitialSyncConfig {
            batch_size: self.batch_size,
            entity_types: self.entity_types.clone(),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            ..InitialSyncConfig::default()
        }
        .with_defaults()
    }

    /// Stripe credentials, if an API key is configured.
    #[must_use]
    pub fn stripe_credentials(&self) -> Option<Credentials> {
        let api_key = self.stripe_api_key.as_ref()?;
        let mut credentials = Credentials::with_api_key(api_key).option(
            WEBHOOK_TOLERANCE_OPTION,
            self.webhook_tolerance.as_secs().to_string(),
        );
        if let Some(secret) = &self.stripe_webhook_secret {
            credentials = credentials.webhook_secret(secret);
        }
        if let Some(base) = &self.stripe_api_base {
            credentials = credentials.api_base(base);
        }
        Some(credentials)
    }

    /// The configured workspace.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Config` if `PAYSYNC_WORKSPACE_ID` was not set.
    pub fn require_workspace(&self) -> Result<WorkspaceId> {
        self.workspace_id
            .ok_or_else(|| ServiceError::config("PAYSYNC_WORKSPACE_ID is not set"))
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("data_dir", &self.data_dir)
            .field("workspace_id", &self.workspace_id)
            .field("wallet_id", &self.wallet_id)
            .field("stripe_api_key", &self.stripe_api_key.as_ref().map(|_| "[redacted]"))
            .field(
                "stripe_webhook_secret",
                &self.stripe_webhook_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("stripe_api_base", &self.stripe_api_base)
            .field("batch_size", &self.batch_size)
            .field("entity_types", &self.entity_types)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("webhook_tolerance", &self.webhook_tolerance)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.into(),
            workspace_id: None,
            wallet_id: None,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: None,
            batch_size: DEFAULT_BATCH_SIZE,
            entity_types: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            webhook_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

fn non_empty<F>(var: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<F, T>(var: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(var, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| ServiceError::config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets<F, P>(var: &F, secret_paths: &[P]) -> (Option<String>, Option<String>)
where
    F: Fn(&str) -> Option<String>,
    P: AsRef<Path>,
{
    for path in secret_paths {
        let path = path.as_ref();
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path.display(), "Loaded Stripe secrets from file");
            let webhook_secret = secrets.webhook_secret.filter(|s| !s.is_empty());
            return (Some(secrets.api_key), webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        non_empty(var, "STRIPE_API_KEY"),
        non_empty(var, "STRIPE_WEBHOOK_SECRET"),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &Path) -> std::io::Result<T> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

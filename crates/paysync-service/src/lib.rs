//! # paysync service
//!
//! Wires configuration, storage and the Stripe adapter together.
//!
//! The `paysync` binary loads [`ServiceConfig`] from the environment, opens
//! the store, verifies the Stripe connection and runs one initial sync for
//! the configured workspace. [`AppState::webhook_processor`] gives an
//! embedding server what it needs to ingest Stripe deliveries.
//!
//! ## Environment
//!
//! | Variable | Meaning |
//! |---|---|
//! | `DATA_DIR` | `RocksDB` directory (with `rocksdb-backend`) |
//! | `PAYSYNC_WORKSPACE_ID` | Workspace records are linked to |
//! | `PAYSYNC_WALLET_ID` | Fallback wallet for products |
//! | `STRIPE_API_KEY`, `STRIPE_WEBHOOK_SECRET`, `STRIPE_API_BASE` | Stripe access |
//! | `SYNC_BATCH_SIZE`, `SYNC_MAX_RETRIES`, `SYNC_RETRY_DELAY_MS` | Sync tuning |
//! | `SYNC_ENTITY_TYPES` | Comma separated entity types, in order |
//! | `WEBHOOK_TOLERANCE_SECONDS` | Signature timestamp tolerance, `0` disables |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod state;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use state::{open_store, AppState};

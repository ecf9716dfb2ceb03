//! Stripe adapter for paysync.
//!
//! [`StripeProvider`] implements [`paysync_sync::PaymentProvider`] against the
//! Stripe REST API:
//!
//! - CRUD and cursor listing for customers, products, prices, subscriptions,
//!   invoices and transactions (payment intents, charges, refunds)
//! - webhook signature verification and event mapping
//! - initial sync through [`paysync_sync::SyncOrchestrator`]
//!
//! Stripe objects are decoded into the wire types in [`types`] and mapped to
//! canonical records in [`mapping`]; they never leave this crate.
//!
//! ```no_run
//! use std::sync::Arc;
//! use paysync_store::MemoryStore;
//! use paysync_stripe::StripeProvider;
//! use paysync_sync::{Credentials, PaymentProvider};
//!
//! # async fn run() -> paysync_sync::Result<()> {
//! let mut stripe = StripeProvider::new(Arc::new(MemoryStore::new()));
//! stripe.configure(&Credentials::with_api_key("sk_test_...").webhook_secret("whsec_..."))?;
//! stripe.check_connection().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod crypto;
pub mod mapping;
pub mod params;
pub mod provider;
pub mod types;
pub mod webhook;

pub use client::{StripeClient, DEFAULT_API_BASE};
pub use provider::{StripeProvider, WEBHOOK_TOLERANCE_OPTION};
pub use webhook::{sign_payload, verify_signature, DEFAULT_TOLERANCE, PROVIDER_NAME};

//! Database schema definitions and column families.
//!
//! Every synced entity kind gets a row family keyed by internal id and an
//! index family keyed by `keys::external_key`, whose value is the row key.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Customer rows, keyed by `customer_id`.
    pub const CUSTOMERS: &str = "customers";

    /// Index: customers by `provider || * || external_id`.
    pub const CUSTOMERS_BY_EXTERNAL: &str = "customers_by_external";

    /// Index: `customer_id || workspace_id`, value is the CBOR link.
    pub const CUSTOMER_WORKSPACES: &str = "customer_workspaces";

    /// Product rows, keyed by `product_id`.
    pub const PRODUCTS: &str = "products";

    /// Index: products by `provider || workspace_id || external_id`.
    pub const PRODUCTS_BY_EXTERNAL: &str = "products_by_external";

    /// Price rows, keyed by `price_id`.
    pub const PRICES: &str = "prices";

    /// Index: prices by `provider || * || external_id`.
    pub const PRICES_BY_EXTERNAL: &str = "prices_by_external";

    /// Subscription rows, keyed by `subscription_id`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Index: subscriptions by `provider || workspace_id || external_id`.
    pub const SUBSCRIPTIONS_BY_EXTERNAL: &str = "subscriptions_by_external";

    /// Invoice rows, keyed by `invoice_id`.
    pub const INVOICES: &str = "invoices";

    /// Index: invoices by `provider || workspace_id || external_id`.
    pub const INVOICES_BY_EXTERNAL: &str = "invoices_by_external";

    /// Transaction rows, keyed by `transaction_id`.
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by `provider || * || external_id`.
    pub const TRANSACTIONS_BY_EXTERNAL: &str = "transactions_by_external";

    /// Webhook event log, keyed by `provider || provider_event_id`.
    pub const WEBHOOK_EVENTS: &str = "webhook_events";

    /// Sync sessions, keyed by `session_id`.
    pub const SYNC_SESSIONS: &str = "sync_sessions";

    /// Index: sessions by workspace, keyed by `workspace_id || session_id`.
    /// Value is empty (index only).
    pub const SYNC_SESSIONS_BY_WORKSPACE: &str = "sync_sessions_by_workspace";

    /// Sync events, keyed by `session_id || event_id` (ULID).
    pub const SYNC_EVENTS: &str = "sync_events";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CUSTOMERS,
        cf::CUSTOMERS_BY_EXTERNAL,
        cf::CUSTOMER_WORKSPACES,
        cf::PRODUCTS,
        cf::PRODUCTS_BY_EXTERNAL,
        cf::PRICES,
        cf::PRICES_BY_EXTERNAL,
        cf::SUBSCRIPTIONS,
        cf::SUBSCRIPTIONS_BY_EXTERNAL,
        cf::INVOICES,
        cf::INVOICES_BY_EXTERNAL,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_EXTERNAL,
        cf::WEBHOOK_EVENTS,
        cf::SYNC_SESSIONS,
        cf::SYNC_SESSIONS_BY_WORKSPACE,
        cf::SYNC_EVENTS,
    ]
}

/// Row and index family of an entity kind.
pub(crate) struct Families {
    pub rows: &'static str,
    pub by_external: &'static str,
}

pub(crate) const CUSTOMER_FAMILIES: Families = Families {
    rows: cf::CUSTOMERS,
    by_external: cf::CUSTOMERS_BY_EXTERNAL,
};

pub(crate) const PRODUCT_FAMILIES: Families = Families {
    rows: cf::PRODUCTS,
    by_external: cf::PRODUCTS_BY_EXTERNAL,
};

pub(crate) const PRICE_FAMILIES: Families = Families {
    rows: cf::PRICES,
    by_external: cf::PRICES_BY_EXTERNAL,
};

pub(crate) const SUBSCRIPTION_FAMILIES: Families = Families {
    rows: cf::SUBSCRIPTIONS,
    by_external: cf::SUBSCRIPTIONS_BY_EXTERNAL,
};

pub(crate) const INVOICE_FAMILIES: Families = Families {
    rows: cf::INVOICES,
    by_external: cf::INVOICES_BY_EXTERNAL,
};

pub(crate) const TRANSACTION_FAMILIES: Families = Families {
    rows: cf::TRANSACTIONS,
    by_external: cf::TRANSACTIONS_BY_EXTERNAL,
};

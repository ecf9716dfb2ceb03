//! Key encoding utilities.
//!
//! Both backends index records by the same byte keys, so a lookup by external
//! id means exactly the same thing regardless of where the data lives.

use paysync_core::{SyncEventId, SyncSessionId, WorkspaceId};

/// Separator between key segments. Never appears in provider ids.
const SEP: u8 = 0x1f;

/// Marker for records that are not scoped to a workspace.
const GLOBAL_SCOPE: &[u8] = b"*";

/// Create a row key from an internal UUID.
#[must_use]
pub fn row_key(id: &uuid::Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Create the external-id index key.
///
/// Format: `provider || SEP || workspace_id (or "*") || SEP || external_id`
#[must_use]
pub fn external_key(provider: &str, scope: Option<&WorkspaceId>, external_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(provider.len() + external_id.len() + 20);
    key.extend_from_slice(provider.as_bytes());
    key.push(SEP);
    match scope {
        Some(workspace_id) => key.extend_from_slice(workspace_id.as_bytes()),
        None => key.extend_from_slice(GLOBAL_SCOPE),
    }
    key.push(SEP);
    key.extend_from_slice(external_id.as_bytes());
    key
}

/// Create a webhook event key.
///
/// Format: `provider || SEP || provider_event_id`
#[must_use]
pub fn webhook_event_key(provider: &str, provider_event_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(provider.len() + provider_event_id.len() + 1);
    key.extend_from_slice(provider.as_bytes());
    key.push(SEP);
    key.extend_from_slice(provider_event_id.as_bytes());
    key
}

/// Create a customer-workspace link key.
///
/// Format: `customer_uuid (16 bytes) || workspace_uuid (16 bytes)`
#[must_use]
pub fn customer_workspace_key(customer_id: &uuid::Uuid, workspace_id: &WorkspaceId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(customer_id.as_bytes());
    key.extend_from_slice(workspace_id.as_bytes());
    key
}

/// Create a session key.
#[must_use]
pub fn session_key(session_id: &SyncSessionId) -> Vec<u8> {
    session_id.as_bytes().to_vec()
}

/// Create a workspace-session index key.
///
/// Format: `workspace_id (16 bytes) || session_id (16 bytes)`
#[must_use]
pub fn workspace_session_key(workspace_id: &WorkspaceId, session_id: &SyncSessionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(workspace_id.as_bytes());
    key.extend_from_slice(session_id.as_bytes());
    key
}

/// Create a sync event key.
///
/// Format: `session_id (16 bytes) || event_id (16 bytes)`
///
/// Event ids are ULIDs, so a session's events iterate in creation order.
#[must_use]
pub fn sync_event_key(session_id: &SyncSessionId, event_id: &SyncEventId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(session_id.as_bytes());
    key.extend_from_slice(&event_id.to_bytes());
    key
}

/// Extract the trailing 16-byte id of a 32-byte composite key.
#[must_use]
pub fn trailing_id(key: &[u8]) -> Option<[u8; 16]> {
    key.get(16..32).and_then(|tail| tail.try_into().ok())
}

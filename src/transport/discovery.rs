//! Endpoint discovery over the HTTP metadata endpoint.
//!
//! The target serves `GET http://{host}:{port}/json`, a list of target
//! descriptors. Only the first entry's `webSocketDebuggerUrl` is used.

// ============================================================================
// Imports
// ============================================================================

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::options::SessionOptions;

// ============================================================================
// TargetInfo
// ============================================================================

/// One entry of the target list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target identifier.
    #[serde(default)]
    pub id: String,

    /// Target kind (`page`, `iframe`, `service_worker`, ...).
    #[serde(default, rename = "type")]
    pub target_type: String,

    /// Document title.
    #[serde(default)]
    pub title: String,

    /// Document URL.
    #[serde(default)]
    pub url: String,

    /// Debugger WebSocket URL. Absent while another client is attached.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

/// Fetches the target list.
///
/// # Errors
///
/// - [`Error::Http`] if the request fails or returns a non-success status
/// - [`Error::Config`] if the HTTP client cannot be built
pub async fn list_targets(options: &SessionOptions) -> Result<Vec<TargetInfo>> {
    let url = options.discovery_url();
    debug!(%url, "Fetching target list");

    let client = Client::builder()
        .timeout(options.connect_timeout)
        .build()
        .map_err(|e| Error::config(format!("HTTP client: {e}")))?;

    let targets: Vec<TargetInfo> = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    debug!(count = targets.len(), "Target list received");
    Ok(targets)
}

/// Picks the debugger URL from the first target.
///
/// # Errors
///
/// Returns [`Error::Discovery`] if the list is empty, the first entry has
/// no debugger URL, or that URL is not a WebSocket URL.
pub fn debugger_url(targets: &[TargetInfo]) -> Result<String> {
    let first = targets
        .first()
        .ok_or_else(|| Error::discovery("target list is empty"))?;

    let raw = first.web_socket_debugger_url.as_deref().ok_or_else(|| {
        Error::discovery(format!(
            "target {:?} has no webSocketDebuggerUrl (another client attached?)",
            first.id
        ))
    })?;

    let parsed = Url::parse(raw)
        .map_err(|e| Error::discovery(format!("invalid debugger URL {raw:?}: {e}")))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(Error::discovery(format!(
            "debugger URL {raw:?} is not a WebSocket URL"
        )));
    }

    Ok(raw.to_string())
}

/// Discovers the debugger URL of the first target.
///
/// # Errors
///
/// See [`list_targets`] and [`debugger_url`].
pub async fn discover(options: &SessionOptions) -> Result<String> {
    let targets = list_targets(options).await?;
    let url = debugger_url(&targets)?;
    info!(%url, "Discovered debugger endpoint");
    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================

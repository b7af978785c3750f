//! Core Page struct and accessors.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::options::SessionOptions;
use crate::protocol::Command;
use crate::transport::{Connection, ConnectionState, discover};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a page.
pub(crate) struct PageInner {
    /// Connection to the target.
    pub connection: Connection,
    /// Debugger URL the connection was opened on.
    pub ws_url: String,
    /// Options the page was opened with.
    pub options: SessionOptions,
}

// ============================================================================
// Page
// ============================================================================

/// A handle to one debuggable target.
///
/// Pages provide script evaluation, network capture and inspection tasks
/// over a single connection. Clones share the connection.
#[derive(Clone)]
pub struct Page {
    pub(crate) inner: Arc<PageInner>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("ws_url", &self.inner.ws_url)
            .field("state", &self.inner.connection.state())
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Discovers the first target and connects to it.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the options are invalid
    /// - [`Error::Discovery`](crate::Error::Discovery) or
    ///   [`Error::Http`](crate::Error::Http) if no debugger URL is found
    /// - [`Error::Connection`](crate::Error::Connection) if the handshake fails
    pub async fn connect(options: SessionOptions) -> Result<Self> {
        options.validate()?;
        let ws_url = discover(&options).await?;
        Self::attach(&ws_url, options).await
    }

    /// Connects to a known debugger URL, skipping discovery.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn attach(ws_url: &str, options: SessionOptions) -> Result<Self> {
        options.validate()?;
        let connection = Connection::connect(ws_url, &options).await?;
        info!(%ws_url, "Page attached");
        Ok(Self::from_connection(connection, ws_url, options))
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn from_connection(
        connection: Connection,
        ws_url: impl Into<String>,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(PageInner {
                connection,
                ws_url: ws_url.into(),
                options,
            }),
        }
    }
}

// ============================================================================
// Page - Accessors
// ============================================================================

impl Page {
    /// Returns the debugger URL.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> &str {
        &self.inner.ws_url
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Returns the options the page was opened with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }
}

// ============================================================================
// Page - Commands & Lifecycle
// ============================================================================

impl Page {
    /// Sends a command and returns its result.
    ///
    /// # Errors
    ///
    /// See [`Connection::send`].
    pub async fn send_command(&self, command: Command) -> Result<Value> {
        self.inner.connection.send(command).await
    }

    /// Waits until the connection ends and returns its final state.
    pub async fn closed(&self) -> ConnectionState {
        self.inner.connection.closed().await
    }

    /// Closes the connection. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Currently infallible; returns `Result` for API stability.
    pub async fn close(&self) -> Result<()> {
        debug!(ws_url = %self.inner.ws_url, "Closing page");
        self.inner.connection.close().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::Page;
    use crate::error::Error;
    use crate::options::SessionOptions;
    use crate::page::testing::fake_page;
    use crate::protocol::Command;
    use crate::transport::ConnectionState;

    use serde_json::json;

    #[test]
    fn test_page_is_clone_and_debug() {
        fn assert_traits<T: Clone + std::fmt::Debug + Send + Sync>() {}
        assert_traits::<Page>();
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_connecting() {
        let result = Page::attach("ws://127.0.0.1:1/x", SessionOptions::new().with_port(0)).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_send_command_and_close() {
        let page = fake_page(|frame| vec![json!({"id": frame["id"], "result": {"echo": frame["method"]}})]).await;

        let value = page
            .send_command(Command::raw("Page.reload", json!({})))
            .await
            .expect("reply");
        assert_eq!(value["echo"], json!("Page.reload"));

        page.close().await.expect("close");
        page.close().await.expect("second close");
        assert_eq!(page.state(), ConnectionState::Closed);
    }
}

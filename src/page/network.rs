//! Network feed, response bodies and live capture.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::NetworkRequestId;
use crate::network::{NetworkMonitor, PromptExtractor};
use crate::options::{NetworkOptions, PromptOptions};
use crate::protocol::{Command, NetworkCommand, ResponseBody};
use crate::transport::CommandSink;

use super::Page;

// ============================================================================
// Page - Network
// ============================================================================

impl Page {
    /// Starts the target's network event feed.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection has ended
    /// - [`Error::Protocol`] if the target rejects the command
    pub async fn enable_network(&self, options: &NetworkOptions) -> Result<()> {
        debug!(max_post_data_size = ?options.max_post_data_size, "Enabling network events");

        let command = Command::Network(NetworkCommand::Enable {
            max_post_data_size: options.max_post_data_size,
        });
        self.send_command(command).await?;
        Ok(())
    }

    /// Stops the target's network event feed.
    ///
    /// # Errors
    ///
    /// See [`enable_network`](Self::enable_network).
    pub async fn disable_network(&self) -> Result<()> {
        debug!("Disabling network events");
        self.send_command(Command::Network(NetworkCommand::Disable {}))
            .await?;
        Ok(())
    }

    /// Fetches the body of a finished response.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the target no longer holds the body
    /// - [`Error::Decode`] if the reply is not a body
    pub async fn get_response_body(&self, request_id: &NetworkRequestId) -> Result<ResponseBody> {
        let command = Command::Network(NetworkCommand::GetResponseBody {
            request_id: request_id.clone(),
        });
        let value = self.send_command(command).await?;
        serde_json::from_value(value).map_err(|e| Error::decode(format!("response body: {e}")))
    }

    /// Starts network capture.
    ///
    /// Handlers are registered before the feed is enabled so no early
    /// event is missed.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut monitor = page.monitor_network(NetworkOptions::new()).await?;
    /// while let Some(update) = monitor.recv().await {
    ///     println!("{update:?}");
    /// }
    /// ```
    pub async fn monitor_network(&self, options: NetworkOptions) -> Result<NetworkMonitor> {
        let connection = self.connection();
        let sink: Arc<dyn CommandSink> = Arc::new(connection.clone());
        let monitor = NetworkMonitor::attach(connection.dispatcher(), sink, &options);

        self.enable_network(&options).await?;
        Ok(monitor)
    }

    /// Starts prompt capture on outgoing completion requests.
    ///
    /// # Errors
    ///
    /// See [`enable_network`](Self::enable_network). The extractor is
    /// detached again when the feed cannot be enabled.
    pub async fn capture_prompts(&self, options: PromptOptions) -> Result<PromptExtractor> {
        let extractor = PromptExtractor::attach(self.connection().dispatcher(), options);

        self.enable_network(&NetworkOptions::new()).await?;
        Ok(extractor)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::identifiers::NetworkRequestId;
    use crate::network::{BodyState, NetworkUpdate};
    use crate::options::{NetworkOptions, PromptOptions};
    use crate::page::testing::fake_page;
    use crate::protocol::methods;

    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::time::timeout;

    fn reply(frame: &Value, result: Value) -> Value {
        json!({"id": frame["id"], "result": result})
    }

    #[tokio::test]
    async fn test_monitor_sees_events_pushed_right_after_enable() {
        let page = fake_page(|frame| match frame["method"].as_str() {
            Some("Network.enable") => vec![
                reply(frame, json!({})),
                json!({
                    "method": methods::REQUEST_WILL_BE_SENT,
                    "params": {"requestId": "5", "request": {"method": "GET", "url": "https://a.com/api", "headers": {}}}
                }),
                json!({
                    "method": methods::RESPONSE_RECEIVED,
                    "params": {"requestId": "5", "response": {"url": "https://a.com/api", "status": 200, "headers": {}, "mimeType": "application/json"}}
                }),
            ],
            Some("Network.getResponseBody") => {
                assert_eq!(frame["params"]["requestId"], json!("5"));
                vec![reply(frame, json!({"body": "[]", "base64Encoded": false}))]
            }
            _ => vec![reply(frame, json!({}))],
        })
        .await;

        let mut monitor = page
            .monitor_network(NetworkOptions::new())
            .await
            .expect("monitor");

        let mut updates = Vec::new();
        while updates.len() < 3 {
            let update = timeout(Duration::from_secs(2), monitor.recv())
                .await
                .expect("in time")
                .expect("open");
            updates.push(update);
        }

        assert!(matches!(updates[0], NetworkUpdate::Request { .. }));
        assert!(matches!(updates[1], NetworkUpdate::Response { .. }));
        match &updates[2] {
            NetworkUpdate::Completed(exchange) => {
                assert_eq!(exchange.body, BodyState::Available("[]".to_string()));
                assert_eq!(exchange.response.as_ref().map(|r| r.status), Some(200));
            }
            other => panic!("expected completion, got {other:?}"),
        }

        page.close().await.expect("close");
        let end = timeout(Duration::from_secs(2), monitor.recv()).await.expect("in time");
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_body_burst_is_fetched_in_full() {
        const BURST: usize = 300;

        let page = fake_page(|frame| match frame["method"].as_str() {
            Some("Network.enable") => {
                let mut frames = vec![reply(frame, json!({}))];
                for i in 0..BURST {
                    let url = format!("https://a.com/app{i}.js");
                    frames.push(json!({
                        "method": methods::REQUEST_WILL_BE_SENT,
                        "params": {"requestId": i.to_string(), "request": {"method": "GET", "url": url, "headers": {}}}
                    }));
                    frames.push(json!({
                        "method": methods::RESPONSE_RECEIVED,
                        "params": {"requestId": i.to_string(), "response": {"url": url, "status": 200, "headers": {}, "mimeType": "text/javascript"}}
                    }));
                }
                frames
            }
            Some("Network.getResponseBody") => {
                let body = format!("// {}", frame["params"]["requestId"].as_str().unwrap_or_default());
                vec![reply(frame, json!({"body": body, "base64Encoded": false}))]
            }
            _ => vec![reply(frame, json!({}))],
        })
        .await;

        let mut monitor = page
            .monitor_network(NetworkOptions::new())
            .await
            .expect("monitor");

        let mut bodies = Vec::new();
        while bodies.len() < BURST {
            let update = timeout(Duration::from_secs(10), monitor.recv())
                .await
                .expect("in time")
                .expect("open");
            if let NetworkUpdate::Completed(exchange) = update {
                bodies.push((exchange.request_id.clone(), exchange.body.clone()));
            }
        }

        for (request_id, body) in &bodies {
            assert_eq!(body, &BodyState::Available(format!("// {request_id}")));
        }
        assert_eq!(page.connection().pending_count(), 0);

        page.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_capture_prompts_end_to_end() {
        let page = fake_page(|frame| match frame["method"].as_str() {
            Some("Network.enable") => {
                let event = json!({
                    "method": methods::REQUEST_WILL_BE_SENT,
                    "params": {
                        "requestId": "42",
                        "request": {
                            "method": "POST",
                            "url": "https://a.com/completion",
                            "hasPostData": true,
                            "postDataEntries": [{"bytes": "eyJwcm9tcHQiOiJoaSJ9"}]
                        }
                    }
                });
                vec![reply(frame, json!({})), event.clone(), event]
            }
            _ => vec![reply(frame, json!({}))],
        })
        .await;

        let mut prompts = page
            .capture_prompts(PromptOptions::new())
            .await
            .expect("capture");

        let capture = timeout(Duration::from_secs(2), prompts.recv())
            .await
            .expect("in time")
            .expect("capture");
        assert_eq!(capture.text(), "hi");

        page.close().await.expect("close");
        assert!(prompts.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_body_is_protocol_error() {
        let page = fake_page(|frame| {
            vec![json!({"id": frame["id"], "error": {"code": -32000, "message": "No resource with given identifier found"}})]
        })
        .await;

        let result = page.get_response_body(&NetworkRequestId::new("404")).await;
        assert!(matches!(result, Err(Error::Protocol { code: -32000, .. })));
        page.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_disable_network() {
        let page = fake_page(|frame| {
            assert_eq!(frame["method"], json!("Network.disable"));
            vec![reply(frame, json!({}))]
        })
        .await;

        page.disable_network().await.expect("disable");
        page.close().await.expect("close");
    }
}

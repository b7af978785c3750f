//! In-process fake target for page tests.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::options::SessionOptions;

use super::Page;

/// Starts a fake target and attaches a page to it.
///
/// `respond` maps each received command frame to the frames written back,
/// in order; return events alongside the reply to simulate pushes.
pub(crate) async fn fake_page<F>(respond: F) -> Page
where
    F: Fn(&Value) -> Vec<Value> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("upgrade");

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                if message.is_close() {
                    break;
                }
                continue;
            };

            let frame: Value = serde_json::from_str(text.as_str()).expect("command json");
            for reply in respond(&frame) {
                if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                    return;
                }
            }
        }
    });

    let options = SessionOptions::new().with_command_timeout(Duration::from_secs(5));
    Page::attach(&format!("ws://127.0.0.1:{port}"), options)
        .await
        .expect("attach")
}

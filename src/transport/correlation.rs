//! Command identity allocation and reply correlation.
//!
//! The table owns a per-connection counter and one pending completion per
//! in-flight command. A completion is removed the instant its reply is
//! matched, so a second reply with the same identity finds nothing and is
//! dropped.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::Response;

// ============================================================================
// Types
// ============================================================================

/// Receiving half of a pending completion.
pub type CompletionReceiver = oneshot::Receiver<Result<Value>>;

/// An in-flight command awaiting its reply.
struct PendingCompletion {
    /// Method, kept for diagnostics.
    method: String,
    /// Resolves the caller exactly once.
    tx: oneshot::Sender<Result<Value>>,
}

// ============================================================================
// CorrelationTable
// ============================================================================

/// Map of command identities to pending completions.
pub struct CorrelationTable {
    /// Next identity to hand out. Starts at 1.
    next_id: u64,
    /// Pending completions by identity.
    pending: FxHashMap<CommandId, PendingCompletion>,
    /// Set once the connection has ended; rejects new registrations.
    closed: bool,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: FxHashMap::default(),
            closed: false,
        }
    }

    /// Allocates the next identity and registers its pending completion.
    ///
    /// Any number of commands may be in flight at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection has ended.
    pub fn register(&mut self, method: &str) -> Result<(CommandId, CompletionReceiver)> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }

        let id = CommandId::new(self.next_id);
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingCompletion {
                method: method.to_string(),
                tx,
            },
        );

        Ok((id, rx))
    }

    /// Resolves the completion matching a reply.
    ///
    /// Returns `false` if no completion is pending for the reply's identity
    /// (stale or duplicate reply).
    pub fn resolve(&mut self, response: Response) -> bool {
        let Some(pending) = self.pending.remove(&response.id) else {
            warn!(id = %response.id, "Reply for unknown command dropped");
            return false;
        };

        let id = response.id;
        let result = response.into_result();
        if let Err(ref e) = result {
            debug!(%id, method = %pending.method, error = %e, "Command failed");
        }

        if pending.tx.send(result).is_err() {
            trace!(%id, method = %pending.method, "Caller stopped waiting");
        }

        true
    }

    /// Fails one pending completion with `error`.
    ///
    /// Returns `false` if nothing was pending under `id`.
    pub fn fail(&mut self, id: CommandId, error: Error) -> bool {
        match self.pending.remove(&id) {
            Some(pending) => {
                let _ = pending.tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Removes a pending completion without resolving it.
    pub fn remove(&mut self, id: CommandId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Fails every pending completion with [`Error::ConnectionClosed`] and
    /// rejects further registrations.
    ///
    /// Returns the number of completions failed.
    pub fn close(&mut self) -> usize {
        self.closed = true;

        let count = self.pending.len();
        for (_, pending) in self.pending.drain() {
            let _ = pending.tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending commands on close");
        }
        count
    }

    /// Returns the number of pending completions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    fn reply(id: CommandId, result: Value) -> Response {
        serde_json::from_value(json!({"id": id, "result": result})).expect("reply")
    }

    #[test]
    fn test_identities_start_at_one_and_increase() {
        let mut table = CorrelationTable::new();
        let (a, _ra) = table.register("A.a").expect("register");
        let (b, _rb) = table.register("B.b").expect("register");
        assert_eq!(a, CommandId::new(1));
        assert_eq!(b, CommandId::new(2));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_identities_not_reused_after_resolution() {
        let mut table = CorrelationTable::new();
        let (a, _ra) = table.register("A.a").expect("register");
        assert!(table.resolve(reply(a, json!({}))));
        let (b, _rb) = table.register("A.a").expect("register");
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve_delivers_result() {
        let mut table = CorrelationTable::new();
        let (id, mut rx) = table.register("Runtime.evaluate").expect("register");

        assert!(table.resolve(reply(id, json!({"result": {"value": 2}}))));
        let value = rx.try_recv().expect("resolved").expect("ok");
        assert_eq!(value["result"]["value"], json!(2));
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_reply_is_dropped() {
        let mut table = CorrelationTable::new();
        let (id, mut rx) = table.register("A.a").expect("register");

        assert!(table.resolve(reply(id, json!({"n": 1}))));
        assert!(!table.resolve(reply(id, json!({"n": 2}))));

        let value = rx.try_recv().expect("resolved").expect("ok");
        assert_eq!(value["n"], json!(1));
    }

    #[test]
    fn test_unknown_reply_is_dropped() {
        let mut table = CorrelationTable::new();
        assert!(!table.resolve(reply(CommandId::new(99), json!({}))));
    }

    #[test]
    fn test_error_reply_fails_completion() {
        let mut table = CorrelationTable::new();
        let (id, mut rx) = table.register("Network.getResponseBody").expect("register");
        let response: Response = serde_json::from_value(
            json!({"id": id, "error": {"code": -32000, "message": "No resource"}}),
        )
        .expect("reply");

        assert!(table.resolve(response));
        let result = rx.try_recv().expect("resolved");
        assert!(matches!(result, Err(Error::Protocol { code: -32000, .. })));
    }

    #[test]
    fn test_close_fails_all_pending() {
        let mut table = CorrelationTable::new();
        let (_a, mut ra) = table.register("A.a").expect("register");
        let (_b, mut rb) = table.register("B.b").expect("register");

        assert_eq!(table.close(), 2);
        assert!(matches!(ra.try_recv(), Ok(Err(Error::ConnectionClosed))));
        assert!(matches!(rb.try_recv(), Ok(Err(Error::ConnectionClosed))));
        assert!(matches!(
            table.register("C.c"),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_large_burst_registers_and_resolves() {
        let mut table = CorrelationTable::new();
        let mut waiting: Vec<(CommandId, CompletionReceiver)> = (0..1000)
            .map(|i| table.register(&format!("Network.m{i}")).expect("register"))
            .collect();
        assert_eq!(table.len(), 1000);

        for (id, _) in waiting.iter().rev() {
            assert!(table.resolve(reply(*id, json!({"id": id}))));
        }
        for (id, rx) in &mut waiting {
            let value = rx.try_recv().expect("resolved").expect("ok");
            assert_eq!(value["id"].as_u64(), Some(id.as_u64()));
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_fail_and_remove() {
        let mut table = CorrelationTable::new();
        let (a, mut ra) = table.register("A.a").expect("register");
        let (b, _rb) = table.register("B.b").expect("register");

        assert!(table.fail(a, Error::connection("write failed")));
        assert!(matches!(ra.try_recv(), Ok(Err(Error::Connection { .. }))));
        assert!(!table.fail(a, Error::ConnectionClosed));

        assert!(table.remove(b));
        assert!(!table.remove(b));
        assert!(table.is_empty());
    }

    proptest! {
        #[test]
        fn prop_replies_resolve_by_identity_not_order(
            order in (1usize..40).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        ) {
            let mut table = CorrelationTable::new();
            let mut waiting: Vec<(CommandId, CompletionReceiver)> = (0..order.len())
                .map(|i| table.register(&format!("Test.m{i}")).expect("register"))
                .collect();

            for &index in &order {
                let id = waiting[index].0;
                let resolved = table.resolve(reply(id, json!({"echo": id})));
                prop_assert!(resolved);
            }

            for (id, rx) in &mut waiting {
                let value = rx.try_recv().expect("resolved").expect("ok");
                prop_assert_eq!(value["echo"].as_u64(), Some(id.as_u64()));
            }
            prop_assert!(table.is_empty());
        }
    }
}

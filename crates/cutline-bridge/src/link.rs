// crates/cutline-bridge/src/link.rs
//
// The channel pair between the engine's frame loop and the host side.
//
// Both directions are bounded crossbeam channels drained in full once per
// frame — the engine never blocks mid-gesture on a slow host, and the host
// thread never blocks on a busy render loop. Channel loss (the other side
// went away) downgrades to a log line; the engine keeps operating on its
// replica, which is also how the demo binary runs with no host at all.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde_json::Value;
use uuid::Uuid;

use crate::calls::HostCall;
use crate::requests::{DispatchError, HostRequest};

/// Outbound capacity: a busy gesture emits a handful of calls per frame;
/// 512 rides out a host that stalls for a second or two.
const CALL_CAPACITY: usize = 512;
const REQUEST_CAPACITY: usize = 256;

/// Fresh transaction id for one gesture. Opaque to the engine; the host
/// groups all `update_*` calls bearing the same id into one undo step.
pub fn transaction_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Engine side: emit calls, drain requests at frame start.
pub struct EngineLink {
    calls_tx: Sender<HostCall>,
    requests_rx: Receiver<HostRequest>,
}

/// Host side: invoke methods by name, drain the engine's calls.
pub struct HostHandle {
    calls_rx: Receiver<HostCall>,
    requests_tx: Sender<HostRequest>,
}

/// Build a connected engine/host pair.
pub fn pair() -> (EngineLink, HostHandle) {
    let (calls_tx, calls_rx) = bounded(CALL_CAPACITY);
    let (requests_tx, requests_rx) = bounded(REQUEST_CAPACITY);
    (
        EngineLink { calls_tx, requests_rx },
        HostHandle { calls_rx, requests_tx },
    )
}

impl EngineLink {
    /// Fire one outbound call. Never blocks: a full or disconnected channel
    /// drops the call with a log line, and the host resyncs from its own
    /// authoritative state on the next load.
    pub fn call(&self, call: HostCall) {
        match self.calls_tx.try_send(call) {
            Ok(()) => {}
            Err(TrySendError::Full(call)) => {
                log::warn!("[bridge] host call channel full, dropping {call:?}");
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("[bridge] no host attached, call dropped");
            }
        }
    }

    /// Everything the host asked for since the last frame, in order.
    pub fn drain_requests(&self) -> Vec<HostRequest> {
        self.requests_rx.try_iter().collect()
    }
}

impl HostHandle {
    /// Typed send, for hosts (and tests) that already hold a request.
    pub fn send(&self, request: HostRequest) {
        if self.requests_tx.send(request).is_err() {
            log::warn!("[bridge] engine side gone, request dropped");
        }
    }

    /// Named invocation — the host's RPC entry point.
    pub fn invoke(&self, method: &str, args: Value) -> Result<(), DispatchError> {
        let request = HostRequest::parse(method, args)?;
        self.send(request);
        Ok(())
    }

    /// Everything the engine emitted since the last drain, in order.
    pub fn drain_calls(&self) -> Vec<HostCall> {
        self.calls_rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn calls_and_requests_cross_in_order() {
        let (engine, host) = pair();
        host.invoke("movePlayhead", json!([1.5])).unwrap();
        host.invoke("setRazorMode", json!([true])).unwrap();
        assert_eq!(
            engine.drain_requests(),
            vec![HostRequest::MovePlayhead(1.5), HostRequest::SetRazorMode(true)]
        );

        engine.call(HostCall::PageReady);
        engine.call(HostCall::PlayheadMoved { frame: 37 });
        assert_eq!(
            host.drain_calls(),
            vec![HostCall::PageReady, HostCall::PlayheadMoved { frame: 37 }]
        );
    }

    #[test]
    fn invoke_rejects_unknown_methods_without_sending() {
        let (engine, host) = pair();
        assert!(host.invoke("noSuchMethod", json!([])).is_err());
        assert!(engine.drain_requests().is_empty());
    }

    #[test]
    fn dropped_host_never_blocks_the_engine() {
        let (engine, host) = pair();
        drop(host);
        engine.call(HostCall::PageReady); // must not panic or block
    }

    #[test]
    fn transaction_ids_are_unique_and_opaque() {
        let a = transaction_id();
        let b = transaction_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

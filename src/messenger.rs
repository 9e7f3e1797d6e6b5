//! The transport boundary: a binary messenger routes opaque byte buffers
//! between the host and the remote runtime, multiplexed by channel name.

use std::{collections::HashMap, error::Error, sync::Arc};

use log::warn;
use parking_lot::RwLock;

use crate::error::MessengerError;

/// Outcome of one inbound dispatch. `Ok(None)` means the dispatch succeeded
/// but produced nothing to send back.
pub type ChannelHandlerResult = Result<Option<Vec<u8>>, Box<dyn Error + Send + Sync>>;

/// The inbound dispatch entry point a channel registers for its name.
pub type ChannelHandler = Arc<dyn Fn(&[u8]) -> ChannelHandlerResult + Send + Sync>;

/// Byte-oriented send/receive primitives over some concrete transport.
///
/// One implementation exists per transport; channels are layered on top and
/// only ever see this contract.
pub trait BinaryMessenger: Send + Sync {
    /// Send a message to the remote side of `channel` and block until the
    /// reply arrives or the transport fails. An empty reply buffer means the
    /// remote produced no meaningful reply.
    fn send(&self, channel: &str, message: &[u8]) -> Result<Vec<u8>, MessengerError>;

    /// Register the inbound dispatch entry point for `channel`. Registering
    /// again under the same name replaces the previous handler.
    fn set_channel_handler(&self, channel: &str, handler: ChannelHandler);
}

#[derive(Default)]
struct HandlerTable {
    handlers: RwLock<HashMap<String, ChannelHandler>>,
}

/// A messenger that short-circuits the transport: `send` on one endpoint
/// synchronously invokes the handler the linked endpoint registered for the
/// channel name. Useful for tests and for hosting two runtimes in one
/// process.
pub struct InProcessMessenger {
    local: Arc<HandlerTable>,
    peer: Arc<HandlerTable>,
}

impl InProcessMessenger {
    /// Two linked endpoints; what one sends, the other dispatches.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let left = Arc::new(HandlerTable::default());
        let right = Arc::new(HandlerTable::default());
        (
            Arc::new(Self {
                local: Arc::clone(&left),
                peer: Arc::clone(&right),
            }),
            Arc::new(Self {
                local: right,
                peer: left,
            }),
        )
    }

    /// An endpoint linked to itself: sends dispatch to its own handlers.
    pub fn loopback() -> Arc<Self> {
        let table = Arc::new(HandlerTable::default());
        Arc::new(Self {
            local: Arc::clone(&table),
            peer: table,
        })
    }
}

impl BinaryMessenger for InProcessMessenger {
    fn send(&self, channel: &str, message: &[u8]) -> Result<Vec<u8>, MessengerError> {
        let handler = self.peer.handlers.read().get(channel).cloned();
        let handler = match handler {
            Some(handler) => handler,
            None => {
                warn!("no handler registered for messages on channel '{}'", channel);
                return Err(MessengerError::UnknownChannel(channel.to_owned()));
            }
        };
        match handler(message) {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Ok(Vec::new()),
            Err(err) => Err(MessengerError::DispatchFailed(err)),
        }
    }

    fn set_channel_handler(&self, channel: &str, handler: ChannelHandler) {
        self.local
            .handlers
            .write()
            .insert(channel.to_owned(), handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_routes_by_channel_name() {
        let (host, remote) = InProcessMessenger::pair();
        remote.set_channel_handler("app/echo", Arc::new(|message: &[u8]| Ok(Some(message.to_vec()))));
        remote.set_channel_handler("app/quiet", Arc::new(|_: &[u8]| Ok(None)));

        assert_eq!(host.send("app/echo", b"ping").expect("send failed"), b"ping");
        assert_eq!(host.send("app/quiet", b"ping").expect("send failed"), b"");
    }

    #[test]
    fn test_send_is_directional() {
        let (host, remote) = InProcessMessenger::pair();
        host.set_channel_handler("app/echo", Arc::new(|message: &[u8]| Ok(Some(message.to_vec()))));

        // The handler lives on the host side, so only the remote can reach it.
        assert!(host.send("app/echo", b"ping").is_err());
        assert!(remote.send("app/echo", b"ping").is_ok());
    }

    #[test]
    fn test_unknown_channel() {
        let (host, _remote) = InProcessMessenger::pair();
        match host.send("app/missing", b"ping") {
            Err(MessengerError::UnknownChannel(name)) => assert_eq!(name, "app/missing"),
            other => panic!("expected an unknown channel error, got {:?}", other),
        }
    }

    #[test]
    fn test_reregistration_replaces_handler() {
        let messenger = InProcessMessenger::loopback();
        messenger.set_channel_handler("app/version", Arc::new(|_: &[u8]| Ok(Some(b"1".to_vec()))));
        messenger.set_channel_handler("app/version", Arc::new(|_: &[u8]| Ok(Some(b"2".to_vec()))));

        assert_eq!(messenger.send("app/version", b"").expect("send failed"), b"2");
    }

    #[test]
    fn test_dispatch_failure_surfaces_to_sender() {
        let messenger = InProcessMessenger::loopback();
        messenger.set_channel_handler(
            "app/broken",
            Arc::new(|_: &[u8]| Err("malformed message".into())),
        );
        match messenger.send("app/broken", b"") {
            Err(MessengerError::DispatchFailed(err)) => {
                assert_eq!(err.to_string(), "malformed message");
            }
            other => panic!("expected a dispatch failure, got {:?}", other),
        }
    }
}

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::{error, trace, warn};
use parking_lot::RwLock;

use crate::{
    channel::{panic_message, HandlerResult},
    codec::{MessageCodec, Value},
    error::MessageError,
    messenger::{BinaryMessenger, ChannelHandlerResult},
};

/// Processes the inbound messages of one channel.
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, message: Value) -> HandlerResult;
}

impl<F> MessageHandler for F
where
    F: Fn(Value) -> HandlerResult + Send + Sync,
{
    fn handle_message(&self, message: Value) -> HandlerResult {
        self(message)
    }
}

/// A named conduit for plain messages, without method names or error
/// envelopes. One handler per channel; the message protocol has no way to
/// report a handler failure, so failures degrade to an empty reply.
pub struct MessageChannel {
    name: String,
    messenger: Arc<dyn BinaryMessenger>,
    codec: &'static dyn MessageCodec,
    handler: RwLock<Option<Arc<dyn MessageHandler>>>,
}

impl MessageChannel {
    pub fn new<N>(
        messenger: Arc<dyn BinaryMessenger>,
        name: N,
        codec: &'static dyn MessageCodec,
    ) -> Arc<Self>
    where
        N: AsRef<str>,
    {
        let channel = Arc::new(Self {
            name: name.as_ref().to_owned(),
            messenger,
            codec,
            handler: RwLock::new(None),
        });
        let dispatcher = Arc::clone(&channel);
        channel.messenger.set_channel_handler(
            &channel.name,
            Arc::new(move |message: &[u8]| dispatcher.dispatch(message)),
        );
        channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install the handler for this channel, replacing any existing one.
    pub fn handle<H>(&self, handler: H)
    where
        H: MessageHandler + 'static,
    {
        *self.handler.write() = Some(Arc::new(handler));
    }

    /// Shorthand for installing a plain closure as the handler.
    pub fn handle_fn<F>(&self, f: F)
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle(f);
    }

    pub fn unregister(&self) {
        *self.handler.write() = None;
    }

    /// Send a message and block until the reply arrives. An absent reply
    /// reads as null.
    pub fn send(&self, message: &Value) -> Result<Value, MessageError> {
        let buf = self
            .codec
            .encode_message(message)
            .map_err(MessageError::EncodeError)?;
        let reply = self
            .messenger
            .send(&self.name, &buf)
            .map_err(MessageError::SendError)?;
        if reply.is_empty() {
            return Ok(Value::Null);
        }
        self.codec
            .decode_message(&reply)
            .map_err(MessageError::DecodeError)
    }

    fn dispatch(&self, message: &[u8]) -> ChannelHandlerResult {
        let message = self
            .codec
            .decode_message(message)
            .map_err(MessageError::DecodeError)?;
        trace!("on channel '{}', got message", self.name);

        let handler = self.handler.read().clone();
        let handler = match handler {
            Some(handler) => handler,
            None => {
                warn!("no message handler registered on channel '{}'", self.name);
                return Ok(None);
            }
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler.handle_message(message)))
        {
            Ok(outcome) => outcome,
            Err(cause) => {
                error!(
                    "recovered from panic while handling message on channel '{}': {}",
                    self.name,
                    panic_message(&*cause)
                );
                return Ok(None);
            }
        };

        match outcome {
            Ok(reply) => {
                let buf = self
                    .codec
                    .encode_message(&reply)
                    .map_err(MessageError::EncodeError)?;
                Ok(Some(buf))
            }
            Err(err) => {
                error!(
                    "message handler on channel '{}' returned an error: {}",
                    self.name, err
                );
                Ok(None)
            }
        }
    }
}

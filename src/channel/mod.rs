//! Channels pair a name with a codec on top of a binary messenger.
//! [`MethodChannel`] carries named method calls with success/error reply
//! envelopes; [`MessageChannel`] carries plain messages.

use std::{any::Any, error::Error};

use crate::codec::Value;

pub use self::{
    message_channel::{MessageChannel, MessageHandler},
    method_channel::{MethodChannel, MethodHandler},
};

mod message_channel;
mod method_channel;

/// Outcome of one handler invocation: a reply value or an error.
pub type HandlerResult = Result<Value, Box<dyn Error + Send + Sync>>;

/// Best-effort text of a caught panic payload, for diagnostics.
pub(crate) fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

//! Name-addressed method channels between a host process and an embedded
//! application runtime, carried over an opaque binary transport.
//!
//! A [`MethodChannel`] pairs a channel name with a [`codec::MethodCodec`] and
//! registers itself with a [`BinaryMessenger`]. Outbound calls are encoded,
//! sent and correlated with their reply envelope; inbound calls are decoded
//! and dispatched to per-method handlers with fault isolation, so a
//! misbehaving handler cannot take the channel down.

#[macro_use]
mod macros;

pub mod channel;
pub mod codec;
pub mod error;
pub mod messenger;

pub use crate::{
    channel::{HandlerResult, MessageChannel, MessageHandler, MethodChannel, MethodHandler},
    codec::{MethodCall, MethodCallResult, Value},
    messenger::{BinaryMessenger, InProcessMessenger},
};

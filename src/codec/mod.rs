//! Codecs turn method calls and their reply envelopes into transport bytes.
//!
//! Two wire formats are provided: [`json_codec`] for a textual encoding and
//! [`standard_codec`] for the compact type-tagged binary encoding. Plain
//! (non-method) messages go through a [`MessageCodec`]; [`string_codec`] and
//! [`binary_codec`] cover the degenerate cases.

use serde::{Deserialize, Serialize};

pub use self::value::Value;

pub mod binary_codec;
pub mod json_codec;
pub mod standard_codec;
pub mod string_codec;
pub mod value;

pub use self::{
    binary_codec::CODEC as BINARY_CODEC,
    json_codec::{CODEC as JSON_CODEC, MESSAGE_CODEC as JSON_MESSAGE_CODEC},
    standard_codec::{CODEC as STANDARD_CODEC, MESSAGE_CODEC as STANDARD_MESSAGE_CODEC},
    string_codec::CODEC as STRING_CODEC,
};

use crate::error::CodecError;

/// One method invocation as carried on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

/// The reply envelope of a method call. Exactly one variant is ever active;
/// `NotImplemented` travels as an empty reply buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodCallResult {
    Ok(Value),
    Err {
        code: String,
        message: String,
        details: Value,
    },
    NotImplemented,
}

pub trait MethodCodec: Send + Sync {
    /// Methods for handling an inbound call
    fn decode_method_call(&self, buf: &[u8]) -> Result<MethodCall, CodecError>;
    fn encode_success_envelope(&self, value: &Value) -> Result<Vec<u8>, CodecError>;
    fn encode_error_envelope(
        &self,
        code: &str,
        message: &str,
        details: &Value,
    ) -> Result<Vec<u8>, CodecError>;

    /// Methods for calling into the remote runtime
    fn encode_method_call(&self, call: &MethodCall) -> Result<Vec<u8>, CodecError>;
    fn decode_envelope(&self, buf: &[u8]) -> Result<MethodCallResult, CodecError>;
}

pub trait MessageCodec: Send + Sync {
    /// Methods for plain messages
    fn encode_message(&self, message: &Value) -> Result<Vec<u8>, CodecError>;
    fn decode_message(&self, buf: &[u8]) -> Result<Value, CodecError>;
}

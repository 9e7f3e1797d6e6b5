use std::{error, fmt, str::Utf8Error};

use crate::codec::Value;

/// Failure to encode or decode a call, envelope or message.
#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
    Utf8(Utf8Error),
    UnexpectedEndOfData,
    UnknownTypeTag(u8),
    InvalidMethodCall,
    InvalidEnvelope,
    UnsupportedMessage(&'static str),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodecError::Json(err) => write!(f, "json error: {}", err),
            CodecError::Utf8(err) => write!(f, "invalid utf-8: {}", err),
            CodecError::UnexpectedEndOfData => write!(f, "unexpected end of data"),
            CodecError::UnknownTypeTag(tag) => write!(f, "unknown type tag {}", tag),
            CodecError::InvalidMethodCall => write!(f, "buffer does not contain a method call"),
            CodecError::InvalidEnvelope => write!(f, "buffer does not contain a reply envelope"),
            CodecError::UnsupportedMessage(what) => write!(f, "message not representable: {}", what),
        }
    }
}

impl error::Error for CodecError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            CodecError::Json(err) => Some(err),
            CodecError::Utf8(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Json(err)
    }
}

impl From<Utf8Error> for CodecError {
    fn from(err: Utf8Error) -> Self {
        CodecError::Utf8(err)
    }
}

/// Failure reported by a binary messenger while sending.
#[derive(Debug)]
pub enum MessengerError {
    UnknownChannel(String),
    DispatchFailed(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for MessengerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MessengerError::UnknownChannel(channel) => {
                write!(f, "no handler registered for channel '{}'", channel)
            }
            MessengerError::DispatchFailed(err) => write!(f, "inbound dispatch failed: {}", err),
        }
    }
}

impl error::Error for MessengerError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MessengerError::DispatchFailed(err) => Some(&**err),
            _ => None,
        }
    }
}

/// Failure of an outbound method invocation.
///
/// `CustomError` is the structured error a remote handler reported; the other
/// variants are infrastructural. Callers branch on the variant to tell "the
/// remote handled the call and said no" apart from transport or codec
/// trouble.
#[derive(Debug)]
pub enum MethodCallError {
    NotImplemented,
    EncodeError(CodecError),
    DecodeError(CodecError),
    SendError(MessengerError),
    CustomError {
        code: String,
        message: String,
        details: Value,
    },
}

impl fmt::Display for MethodCallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MethodCallError::NotImplemented => write!(f, "method not implemented"),
            MethodCallError::EncodeError(err) => write!(f, "failed to encode method call: {}", err),
            MethodCallError::DecodeError(err) => {
                write!(f, "failed to decode reply envelope: {}", err)
            }
            MethodCallError::SendError(err) => write!(f, "failed to send method call: {}", err),
            MethodCallError::CustomError {
                code,
                message,
                details,
            } => write!(f, "{} ({})\ndetails: {:?}", message, code, details),
        }
    }
}

impl error::Error for MethodCallError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MethodCallError::EncodeError(err) | MethodCallError::DecodeError(err) => Some(err),
            MethodCallError::SendError(err) => Some(err),
            _ => None,
        }
    }
}

/// Failure of an outbound basic message send.
#[derive(Debug)]
pub enum MessageError {
    EncodeError(CodecError),
    DecodeError(CodecError),
    SendError(MessengerError),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MessageError::EncodeError(err) => write!(f, "failed to encode message: {}", err),
            MessageError::DecodeError(err) => write!(f, "failed to decode reply: {}", err),
            MessageError::SendError(err) => write!(f, "failed to send message: {}", err),
        }
    }
}

impl error::Error for MessageError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MessageError::EncodeError(err) | MessageError::DecodeError(err) => Some(err),
            MessageError::SendError(err) => Some(err),
        }
    }
}

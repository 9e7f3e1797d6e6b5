use serde_json::json;

use super::{MessageCodec, MethodCall, MethodCallResult, MethodCodec, Value};
use crate::error::CodecError;

/// JSON wire format: a call is `{"method": ..., "args": ...}`, a success
/// envelope is the one-element array `[value]` and an error envelope is
/// `[code, message, details]`.
pub struct JsonMethodCodec;

pub const CODEC: JsonMethodCodec = JsonMethodCodec;

impl MethodCodec for JsonMethodCodec {
    fn decode_method_call(&self, buf: &[u8]) -> Result<MethodCall, CodecError> {
        let s = std::str::from_utf8(buf)?;
        Ok(serde_json::from_str(s)?)
    }

    fn decode_envelope(&self, buf: &[u8]) -> Result<MethodCallResult, CodecError> {
        if buf.is_empty() {
            return Ok(MethodCallResult::NotImplemented);
        }
        let s = std::str::from_utf8(buf)?;
        let envelope: Value = serde_json::from_str(s)?;
        if let Value::List(mut items) = envelope {
            if items.len() == 1 {
                return Ok(MethodCallResult::Ok(items.swap_remove(0)));
            }
            if items.len() == 3 {
                let details = items.swap_remove(2);
                let message = match items.swap_remove(1) {
                    Value::String(s) => s,
                    _ => return Err(CodecError::InvalidEnvelope),
                };
                let code = match items.swap_remove(0) {
                    Value::String(s) => s,
                    _ => return Err(CodecError::InvalidEnvelope),
                };
                return Ok(MethodCallResult::Err {
                    code,
                    message,
                    details,
                });
            }
        }
        Err(CodecError::InvalidEnvelope)
    }

    fn encode_method_call(&self, call: &MethodCall) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(call)?)
    }

    fn encode_success_envelope(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&json!([value]))?)
    }

    fn encode_error_envelope(
        &self,
        code: &str,
        message: &str,
        details: &Value,
    ) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&json!([code, message, details]))?)
    }
}

/// A bare JSON value per message.
pub struct JsonMessageCodec;

pub const MESSAGE_CODEC: JsonMessageCodec = JsonMessageCodec;

impl MessageCodec for JsonMessageCodec {
    fn encode_message(&self, message: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(message)?)
    }

    fn decode_message(&self, buf: &[u8]) -> Result<Value, CodecError> {
        let s = std::str::from_utf8(buf)?;
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_call_round_trip() {
        let call = MethodCall {
            method: "setClient".into(),
            args: json_value!([17, { "inputAction": "done" }]),
        };
        let buf = CODEC.encode_method_call(&call).expect("encode failed");
        let decoded = CODEC.decode_method_call(&buf).expect("decode failed");
        assert_eq!(decoded, call);
    }

    #[test]
    fn test_method_call_args_default_to_null() {
        let decoded = CODEC
            .decode_method_call(br#"{"method":"popRoute"}"#)
            .expect("decode failed");
        assert_eq!(decoded.method, "popRoute");
        assert_eq!(decoded.args, Value::Null);
    }

    #[test]
    fn test_success_envelope_round_trip() {
        let buf = CODEC
            .encode_success_envelope(&json_value!({ "ok": true }))
            .expect("encode failed");
        let envelope = CODEC.decode_envelope(&buf).expect("decode failed");
        assert_eq!(envelope, MethodCallResult::Ok(json_value!({ "ok": true })));
    }

    #[test]
    fn test_error_envelope_round_trip() {
        let buf = CODEC
            .encode_error_envelope("bad_args", "expected a map", &json_value!([1, 2]))
            .expect("encode failed");
        let envelope = CODEC.decode_envelope(&buf).expect("decode failed");
        assert_eq!(
            envelope,
            MethodCallResult::Err {
                code: "bad_args".into(),
                message: "expected a map".into(),
                details: json_value!([1, 2]),
            }
        );
    }

    #[test]
    fn test_empty_reply_is_not_implemented() {
        let envelope = CODEC.decode_envelope(&[]).expect("decode failed");
        assert_eq!(envelope, MethodCallResult::NotImplemented);
    }

    #[test]
    fn test_invalid_envelope() {
        assert!(CODEC.decode_envelope(br#"{"not":"a list"}"#).is_err());
        assert!(CODEC.decode_envelope(br#"[1, 2]"#).is_err());
        assert!(CODEC.decode_envelope(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_message_round_trip() {
        let message = json_value!({ "platformBrightness": "dark", "textScaleFactor": 1.5 });
        let buf = MESSAGE_CODEC.encode_message(&message).expect("encode failed");
        let decoded = MESSAGE_CODEC.decode_message(&buf).expect("decode failed");
        assert_eq!(decoded, message);
    }
}

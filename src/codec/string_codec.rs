use super::{MessageCodec, Value};
use crate::error::CodecError;

/// UTF-8 strings, nothing else.
pub struct StringCodec;

pub const CODEC: StringCodec = StringCodec;

impl MessageCodec for StringCodec {
    fn encode_message(&self, message: &Value) -> Result<Vec<u8>, CodecError> {
        match message {
            Value::String(s) => Ok(s.clone().into_bytes()),
            _ => Err(CodecError::UnsupportedMessage(
                "string codec carries only string values",
            )),
        }
    }

    fn decode_message(&self, buf: &[u8]) -> Result<Value, CodecError> {
        Ok(Value::String(std::str::from_utf8(buf)?.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        let buf = CODEC
            .encode_message(&Value::String("AppLifecycleState.paused".into()))
            .expect("encode failed");
        assert_eq!(buf, b"AppLifecycleState.paused");
        assert_eq!(
            CODEC.decode_message(&buf).expect("decode failed"),
            Value::String("AppLifecycleState.paused".into())
        );
    }

    #[test]
    fn test_rejects_non_strings() {
        assert!(CODEC.encode_message(&Value::I64(3)).is_err());
        assert!(CODEC.decode_message(&[0xff]).is_err());
    }
}

use super::{MessageCodec, Value};
use crate::error::CodecError;

/// Pass-through for raw byte buffers.
pub struct BinaryCodec;

pub const CODEC: BinaryCodec = BinaryCodec;

impl MessageCodec for BinaryCodec {
    fn encode_message(&self, message: &Value) -> Result<Vec<u8>, CodecError> {
        match message {
            Value::U8List(buf) => Ok(buf.clone()),
            _ => Err(CodecError::UnsupportedMessage(
                "binary codec carries only byte buffers",
            )),
        }
    }

    fn decode_message(&self, buf: &[u8]) -> Result<Value, CodecError> {
        Ok(Value::U8List(buf.to_vec()))
    }
}

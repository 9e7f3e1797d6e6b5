use super::{MessageCodec, MethodCall, MethodCallResult, MethodCodec, Value};
use crate::error::CodecError;

// Wire tags, one byte ahead of every value. Tags 5 (big integer) and 9..=11
// (typed int/float lists) are reserved by the wire format and not produced
// by this codec; decoding one is an error.
const VALUE_NULL: u8 = 0;
const VALUE_TRUE: u8 = 1;
const VALUE_FALSE: u8 = 2;
const VALUE_INT32: u8 = 3;
const VALUE_INT64: u8 = 4;
const VALUE_FLOAT64: u8 = 6;
const VALUE_STRING: u8 = 7;
const VALUE_UINT8LIST: u8 = 8;
const VALUE_LIST: u8 = 12;
const VALUE_MAP: u8 = 13;

const ENVELOPE_SUCCESS: u8 = 0;
const ENVELOPE_ERROR: u8 = 1;

/// Type-tagged little-endian binary wire format.
///
/// This is the one codec whose representable set is the whole of [`Value`]:
/// integer widths and byte buffers survive a round trip unchanged.
pub struct StandardMethodCodec;

pub const CODEC: StandardMethodCodec = StandardMethodCodec;

/// The value encoding of [`StandardMethodCodec`], for plain messages.
pub struct StandardMessageCodec;

pub const MESSAGE_CODEC: StandardMessageCodec = StandardMessageCodec;

impl MethodCodec for StandardMethodCodec {
    fn decode_method_call(&self, buf: &[u8]) -> Result<MethodCall, CodecError> {
        let mut reader = Reader::new(buf);
        let method = match read_value(&mut reader)? {
            Value::String(method) => method,
            _ => return Err(CodecError::InvalidMethodCall),
        };
        let args = read_value(&mut reader)?;
        Ok(MethodCall { method, args })
    }

    fn encode_method_call(&self, call: &MethodCall) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::new();
        write_string(&mut writer, &call.method)?;
        write_value(&mut writer, &call.args)?;
        Ok(writer.into_inner())
    }

    fn encode_success_envelope(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::new();
        writer.write_u8(ENVELOPE_SUCCESS);
        write_value(&mut writer, value)?;
        Ok(writer.into_inner())
    }

    fn encode_error_envelope(
        &self,
        code: &str,
        message: &str,
        details: &Value,
    ) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::new();
        writer.write_u8(ENVELOPE_ERROR);
        write_string(&mut writer, code)?;
        write_string(&mut writer, message)?;
        write_value(&mut writer, details)?;
        Ok(writer.into_inner())
    }

    fn decode_envelope(&self, buf: &[u8]) -> Result<MethodCallResult, CodecError> {
        if buf.is_empty() {
            return Ok(MethodCallResult::NotImplemented);
        }
        let mut reader = Reader::new(buf);
        match reader.read_u8()? {
            ENVELOPE_SUCCESS => Ok(MethodCallResult::Ok(read_value(&mut reader)?)),
            ENVELOPE_ERROR => {
                let code = match read_value(&mut reader)? {
                    Value::String(code) => code,
                    _ => return Err(CodecError::InvalidEnvelope),
                };
                let message = match read_value(&mut reader)? {
                    Value::String(message) => message,
                    _ => return Err(CodecError::InvalidEnvelope),
                };
                let details = read_value(&mut reader)?;
                Ok(MethodCallResult::Err {
                    code,
                    message,
                    details,
                })
            }
            _ => Err(CodecError::InvalidEnvelope),
        }
    }
}

impl MessageCodec for StandardMessageCodec {
    fn encode_message(&self, message: &Value) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::new();
        write_value(&mut writer, message)?;
        Ok(writer.into_inner())
    }

    fn decode_message(&self, buf: &[u8]) -> Result<Value, CodecError> {
        let mut reader = Reader::new(buf);
        read_value(&mut reader)
    }
}

fn write_value(writer: &mut Writer, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Null => writer.write_u8(VALUE_NULL),
        Value::Boolean(true) => writer.write_u8(VALUE_TRUE),
        Value::Boolean(false) => writer.write_u8(VALUE_FALSE),
        Value::I32(n) => {
            writer.write_u8(VALUE_INT32);
            writer.write_i32(*n);
        }
        Value::I64(n) => {
            writer.write_u8(VALUE_INT64);
            writer.write_i64(*n);
        }
        Value::F64(n) => {
            writer.write_u8(VALUE_FLOAT64);
            writer.align_to(8);
            writer.write_f64(*n);
        }
        Value::String(s) => write_string(writer, s)?,
        Value::U8List(list) => {
            writer.write_u8(VALUE_UINT8LIST);
            writer.write_size(list.len())?;
            writer.write_bytes(list);
        }
        Value::List(list) => {
            writer.write_u8(VALUE_LIST);
            writer.write_size(list.len())?;
            for item in list {
                write_value(writer, item)?;
            }
        }
        Value::Map(map) => {
            writer.write_u8(VALUE_MAP);
            writer.write_size(map.len())?;
            for (key, item) in map {
                write_string(writer, key)?;
                write_value(writer, item)?;
            }
        }
    }
    Ok(())
}

fn write_string(writer: &mut Writer, s: &str) -> Result<(), CodecError> {
    writer.write_u8(VALUE_STRING);
    writer.write_size(s.len())?;
    writer.write_bytes(s.as_bytes());
    Ok(())
}

fn read_value(reader: &mut Reader) -> Result<Value, CodecError> {
    Ok(match reader.read_u8()? {
        VALUE_NULL => Value::Null,
        VALUE_TRUE => Value::Boolean(true),
        VALUE_FALSE => Value::Boolean(false),
        VALUE_INT32 => Value::I32(reader.read_i32()?),
        VALUE_INT64 => Value::I64(reader.read_i64()?),
        VALUE_FLOAT64 => {
            reader.align_to(8);
            Value::F64(reader.read_f64()?)
        }
        VALUE_STRING => {
            let len = reader.read_size()?;
            Value::String(std::str::from_utf8(reader.take(len)?)?.to_owned())
        }
        VALUE_UINT8LIST => {
            let len = reader.read_size()?;
            Value::U8List(reader.take(len)?.to_vec())
        }
        VALUE_LIST => {
            let len = reader.read_size()?;
            let mut list = Vec::with_capacity(len.min(reader.remaining()));
            for _ in 0..len {
                list.push(read_value(reader)?);
            }
            Value::List(list)
        }
        VALUE_MAP => {
            let len = reader.read_size()?;
            let mut map = std::collections::HashMap::new();
            for _ in 0..len {
                let key = match read_value(reader)? {
                    Value::String(key) => key,
                    _ => return Err(CodecError::UnsupportedMessage("non-string map key")),
                };
                map.insert(key, read_value(reader)?);
            }
            Value::Map(map)
        }
        tag => return Err(CodecError::UnknownTypeTag(tag)),
    })
}

struct Writer(Vec<u8>);

impl Writer {
    fn new() -> Self {
        Writer(Vec::new())
    }

    fn into_inner(self) -> Vec<u8> {
        self.0
    }

    fn write_u8(&mut self, n: u8) {
        self.0.push(n);
    }

    fn write_u16(&mut self, n: u16) {
        self.0.extend_from_slice(&n.to_le_bytes());
    }

    fn write_u32(&mut self, n: u32) {
        self.0.extend_from_slice(&n.to_le_bytes());
    }

    fn write_i32(&mut self, n: i32) {
        self.0.extend_from_slice(&n.to_le_bytes());
    }

    fn write_i64(&mut self, n: i64) {
        self.0.extend_from_slice(&n.to_le_bytes());
    }

    fn write_f64(&mut self, n: f64) {
        self.0.extend_from_slice(&n.to_le_bytes());
    }

    // Sizes use the expanding encoding: one byte below 254, marker 254 plus
    // u16, marker 255 plus u32. Larger buffers do not fit the wire format.
    fn write_size(&mut self, n: usize) -> Result<(), CodecError> {
        if n < 254 {
            self.write_u8(n as u8);
        } else if n <= u16::MAX as usize {
            self.write_u8(254);
            self.write_u16(n as u16);
        } else if u32::try_from(n).is_ok() {
            self.write_u8(255);
            self.write_u32(n as u32);
        } else {
            return Err(CodecError::UnsupportedMessage("length exceeds u32"));
        }
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) {
        self.0.extend_from_slice(buf);
    }

    fn align_to(&mut self, alignment: usize) {
        while self.0.len() % alignment != 0 {
            self.0.push(0);
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEndOfData);
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, CodecError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, CodecError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_f64(&mut self) -> Result<f64, CodecError> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_size(&mut self) -> Result<usize, CodecError> {
        match self.read_u8()? {
            254 => Ok(self.read_u16()? as usize),
            255 => Ok(self.read_u32()? as usize),
            n => Ok(n as usize),
        }
    }

    fn align_to(&mut self, alignment: usize) {
        let m = self.pos % alignment;
        if m != 0 {
            self.pos += alignment - m;
        }
    }
}

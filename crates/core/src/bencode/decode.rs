use super::error::BencodeError;
use super::value::{Dict, Value};

const MAX_DEPTH: usize = 64;

/// Decodes a single bencoded value spanning the whole input.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut pos = 0;
    let value = decode_value(data, &mut pos, 0)?;

    if pos != data.len() {
        return Err(BencodeError::TrailingData(pos));
    }

    Ok(value)
}

fn decode_value(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    if depth > MAX_DEPTH {
        return Err(BencodeError::NestingTooDeep(MAX_DEPTH));
    }

    match data.get(*pos) {
        None => Err(BencodeError::UnexpectedEof(*pos)),
        Some(b'i') => decode_integer(data, pos),
        Some(b'l') => decode_list(data, pos, depth),
        Some(b'd') => decode_dict(data, pos, depth),
        Some(b'0'..=b'9') => decode_bytes(data, pos).map(Value::Bytes),
        Some(&byte) => Err(BencodeError::UnexpectedByte {
            byte,
            position: *pos,
        }),
    }
}

fn decode_integer(data: &[u8], pos: &mut usize) -> Result<Value, BencodeError> {
    let position = *pos;
    *pos += 1;

    let start = *pos;
    while *pos < data.len() && data[*pos] != b'e' {
        *pos += 1;
    }
    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof(*pos));
    }

    let invalid = |reason: &str| BencodeError::InvalidInteger {
        position,
        reason: reason.to_string(),
    };

    let digits = std::str::from_utf8(&data[start..*pos]).map_err(|_| invalid("not ascii"))?;
    if digits.is_empty() {
        return Err(invalid("empty"));
    }
    if digits == "-0" {
        return Err(invalid("negative zero"));
    }
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.len() > 1 && unsigned.starts_with('0') {
        return Err(invalid("leading zeros"));
    }

    let value: i64 = digits.parse().map_err(|_| invalid(digits))?;

    *pos += 1;
    Ok(Value::Integer(value))
}

fn decode_bytes(data: &[u8], pos: &mut usize) -> Result<Vec<u8>, BencodeError> {
    let position = *pos;
    while *pos < data.len() && data[*pos] != b':' {
        *pos += 1;
    }
    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof(*pos));
    }

    let len_str = std::str::from_utf8(&data[position..*pos])
        .map_err(|_| BencodeError::InvalidStringLength(position))?;
    if len_str.len() > 1 && len_str.starts_with('0') {
        return Err(BencodeError::InvalidStringLength(position));
    }
    let len: usize = len_str
        .parse()
        .map_err(|_| BencodeError::InvalidStringLength(position))?;

    *pos += 1;
    let end = pos
        .checked_add(len)
        .ok_or(BencodeError::InvalidStringLength(position))?;
    if end > data.len() {
        return Err(BencodeError::UnexpectedEof(data.len()));
    }

    let bytes = data[*pos..end].to_vec();
    *pos = end;
    Ok(bytes)
}

fn decode_list(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    *pos += 1;
    let mut items = Vec::new();

    loop {
        match data.get(*pos) {
            None => return Err(BencodeError::UnexpectedEof(*pos)),
            Some(b'e') => {
                *pos += 1;
                return Ok(Value::List(items));
            }
            Some(_) => items.push(decode_value(data, pos, depth + 1)?),
        }
    }
}

fn decode_dict(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    *pos += 1;
    let mut entries = Vec::new();

    loop {
        match data.get(*pos) {
            None => return Err(BencodeError::UnexpectedEof(*pos)),
            Some(b'e') => {
                *pos += 1;
                return Ok(Value::Dict(Dict::from_entries(entries)));
            }
            Some(b'0'..=b'9') => {
                let key = decode_bytes(data, pos)?;
                let value = decode_value(data, pos, depth + 1)?;
                entries.push((key, value));
            }
            Some(_) => return Err(BencodeError::NonStringKey(*pos)),
        }
    }
}

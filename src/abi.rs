//! Ledger call-data codec.
//!
//! Function selectors are the first four bytes of the Keccak-256 hash of the
//! canonical signature. Arguments use the standard 32-byte word layout: static
//! values inline in the head, dynamic values (bytes, string, arrays) as an
//! offset in the head and their content in the tail. Tuples are not supported.

use crate::domain::{keccak256, Address, U256};
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Uint(usize),
    Bool,
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<AbiType>),
    FixedArray(Box<AbiType>, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    /// Elements of either a dynamic or a fixed-size array.
    Array(Vec<AbiValue>),
}

impl AbiType {
    pub fn parse(s: &str) -> Result<AbiType, PipelineError> {
        let s = s.trim();
        if let Some(stripped) = s.strip_suffix(']') {
            let open = stripped
                .rfind('[')
                .ok_or_else(|| encoding(format!("unbalanced array type {}", s)))?;
            let inner = AbiType::parse(&stripped[..open])?;
            let size = &stripped[open + 1..];
            return if size.is_empty() {
                Ok(AbiType::Array(Box::new(inner)))
            } else {
                let n = size
                    .parse::<usize>()
                    .map_err(|_| encoding(format!("invalid array size in {}", s)))?;
                Ok(AbiType::FixedArray(Box::new(inner), n))
            };
        }
        match s {
            "address" => Ok(AbiType::Address),
            "bool" => Ok(AbiType::Bool),
            "string" => Ok(AbiType::String),
            "bytes" => Ok(AbiType::Bytes),
            "uint" => Ok(AbiType::Uint(256)),
            _ => {
                if let Some(bits) = s.strip_prefix("uint") {
                    let bits = bits
                        .parse::<usize>()
                        .map_err(|_| encoding(format!("unsupported type {}", s)))?;
                    if bits == 0 || bits > 256 || bits % 8 != 0 {
                        return Err(encoding(format!("invalid integer width {}", s)));
                    }
                    Ok(AbiType::Uint(bits))
                } else if let Some(len) = s.strip_prefix("bytes") {
                    let len = len
                        .parse::<usize>()
                        .map_err(|_| encoding(format!("unsupported type {}", s)))?;
                    if len == 0 || len > 32 {
                        return Err(encoding(format!("invalid fixed bytes width {}", s)));
                    }
                    Ok(AbiType::FixedBytes(len))
                } else {
                    Err(encoding(format!("unsupported type {}", s)))
                }
            }
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(inner, _) => inner.is_dynamic(),
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            _ if self.is_dynamic() => 32,
            AbiType::FixedArray(inner, n) => n * inner.head_size(),
            _ => 32,
        }
    }
}

/// Parse a comma-separated type list, with or without surrounding parentheses.
pub fn parse_types(list: &str) -> Result<Vec<AbiType>, PipelineError> {
    let trimmed = list.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    if inner.contains('(') {
        return Err(encoding(format!("tuple types are not supported: {}", list)));
    }
    inner.split(',').map(AbiType::parse).collect()
}

pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Canonical ledger method signature, e.g. `"batchRegister(bytes4[],address[])"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSignature(&'static str);

impl MethodSignature {
    pub const fn new(signature: &'static str) -> Self {
        MethodSignature(signature)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn name(&self) -> &'static str {
        self.0.split('(').next().unwrap_or(self.0)
    }

    pub fn selector(&self) -> [u8; 4] {
        function_selector(self.0)
    }

    pub fn params(&self) -> Result<Vec<AbiType>, PipelineError> {
        let open = self
            .0
            .find('(')
            .ok_or_else(|| encoding(format!("malformed signature {}", self.0)))?;
        parse_types(&self.0[open..])
    }

    /// Selector followed by the encoded arguments, checked against the
    /// declared parameter types.
    pub fn encode_call(&self, args: &[AbiValue]) -> Result<Vec<u8>, PipelineError> {
        let params = self.params()?;
        let mut data = self.selector().to_vec();
        data.extend(encode(&params, args).map_err(|e| match e {
            PipelineError::Encoding(msg) => encoding(format!("{}: {}", self.0, msg)),
            other => other,
        })?);
        Ok(data)
    }
}

impl std::fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

pub fn encode(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, PipelineError> {
    if types.len() != values.len() {
        return Err(encoding(format!(
            "expected {} arguments, got {}",
            types.len(),
            values.len()
        )));
    }
    let head_len: usize = types.iter().map(AbiType::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend_from_slice(&word(U256::from(head_len + tail.len())));
            tail.extend(encode_single(ty, value)?);
        } else {
            head.extend(encode_single(ty, value)?);
        }
    }
    head.extend(tail);
    Ok(head)
}

fn encode_single(ty: &AbiType, value: &AbiValue) -> Result<Vec<u8>, PipelineError> {
    match (ty, value) {
        (AbiType::Address, AbiValue::Address(addr)) => {
            let mut out = vec![0u8; 12];
            out.extend_from_slice(addr.as_bytes());
            Ok(out)
        }
        (AbiType::Uint(bits), AbiValue::Uint(n)) => {
            if n.bits() > *bits {
                return Err(encoding(format!("{} does not fit uint{}", n, bits)));
            }
            Ok(word(*n).to_vec())
        }
        (AbiType::Bool, AbiValue::Bool(b)) => Ok(word(U256::from(u8::from(*b))).to_vec()),
        (AbiType::FixedBytes(len), AbiValue::FixedBytes(bytes)) => {
            if bytes.len() != *len {
                return Err(encoding(format!(
                    "expected bytes{}, got {} bytes",
                    len,
                    bytes.len()
                )));
            }
            Ok(pad_right(bytes))
        }
        (AbiType::Bytes, AbiValue::Bytes(bytes)) => {
            let mut out = word(U256::from(bytes.len())).to_vec();
            out.extend(pad_right(bytes));
            Ok(out)
        }
        (AbiType::String, AbiValue::String(s)) => {
            let mut out = word(U256::from(s.len())).to_vec();
            out.extend(pad_right(s.as_bytes()));
            Ok(out)
        }
        (AbiType::Array(inner), AbiValue::Array(items)) => {
            let mut out = word(U256::from(items.len())).to_vec();
            let types = vec![(**inner).clone(); items.len()];
            out.extend(encode(&types, items)?);
            Ok(out)
        }
        (AbiType::FixedArray(inner, n), AbiValue::Array(items)) => {
            if items.len() != *n {
                return Err(encoding(format!(
                    "expected {} array elements, got {}",
                    n,
                    items.len()
                )));
            }
            let types = vec![(**inner).clone(); *n];
            encode(&types, items)
        }
        (ty, value) => Err(encoding(format!("cannot encode {:?} as {:?}", value, ty))),
    }
}

pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, PipelineError> {
    decode_sequence(types, data, 0)
}

fn decode_sequence(
    types: &[AbiType],
    data: &[u8],
    start: usize,
) -> Result<Vec<AbiValue>, PipelineError> {
    let mut values = Vec::with_capacity(types.len());
    let mut cursor = start;
    for ty in types {
        if ty.is_dynamic() {
            let offset = read_offset(data, cursor)?;
            let at = start
                .checked_add(offset)
                .ok_or_else(|| decode_error("offset overflow"))?;
            values.push(decode_single(ty, data, at)?);
        } else {
            values.push(decode_single(ty, data, cursor)?);
        }
        cursor += ty.head_size();
    }
    Ok(values)
}

fn decode_single(ty: &AbiType, data: &[u8], at: usize) -> Result<AbiValue, PipelineError> {
    match ty {
        AbiType::Address => {
            let w = read_word(data, at)?;
            Ok(AbiValue::Address(
                Address::from_slice(&w[12..]).map_err(|e| decode_error(e.to_string()))?,
            ))
        }
        AbiType::Uint(_) => Ok(AbiValue::Uint(U256::from_big_endian(read_word(data, at)?))),
        AbiType::Bool => {
            let n = U256::from_big_endian(read_word(data, at)?);
            Ok(AbiValue::Bool(!n.is_zero()))
        }
        AbiType::FixedBytes(len) => Ok(AbiValue::FixedBytes(read_word(data, at)?[..*len].to_vec())),
        AbiType::Bytes => Ok(AbiValue::Bytes(read_dynamic_bytes(data, at)?)),
        AbiType::String => {
            let bytes = read_dynamic_bytes(data, at)?;
            String::from_utf8(bytes)
                .map(AbiValue::String)
                .map_err(|e| decode_error(format!("invalid UTF-8 string: {}", e)))
        }
        AbiType::Array(inner) => {
            let len = read_offset(data, at)?;
            let types = vec![(**inner).clone(); len];
            Ok(AbiValue::Array(decode_sequence(&types, data, at + 32)?))
        }
        AbiType::FixedArray(inner, n) => {
            let types = vec![(**inner).clone(); *n];
            Ok(AbiValue::Array(decode_sequence(&types, data, at)?))
        }
    }
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], PipelineError> {
    data.get(at..at.saturating_add(32)).ok_or_else(|| {
        decode_error(format!(
            "response too short: need 32 bytes at {}, have {}",
            at,
            data.len()
        ))
    })
}

fn read_offset(data: &[u8], at: usize) -> Result<usize, PipelineError> {
    let n = U256::from_big_endian(read_word(data, at)?);
    if n > U256::from(data.len()) {
        return Err(decode_error(format!("offset {} beyond response length", n)));
    }
    Ok(n.as_usize())
}

fn read_dynamic_bytes(data: &[u8], at: usize) -> Result<Vec<u8>, PipelineError> {
    let len = read_offset(data, at)?;
    data.get(at + 32..at + 32 + len)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| decode_error("dynamic bytes exceed response length"))
}

fn word(n: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    n.to_big_endian(&mut out);
    out
}

fn pad_right(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let rem = out.len() % 32;
    if rem != 0 {
        out.resize(out.len() + 32 - rem, 0);
    }
    out
}

fn encoding(msg: impl Into<String>) -> PipelineError {
    PipelineError::Encoding(msg.into())
}

fn decode_error(msg: impl Into<String>) -> PipelineError {
    PipelineError::Decode(msg.into())
}

/// Fetch the output at `index` from a decoded result list.
pub fn output(values: &[AbiValue], index: usize) -> Result<&AbiValue, PipelineError> {
    values
        .get(index)
        .ok_or_else(|| decode_error(format!("missing output #{}", index)))
}

impl AbiValue {
    pub fn as_address(&self) -> Result<Address, PipelineError> {
        match self {
            AbiValue::Address(a) => Ok(*a),
            other => Err(decode_error(format!("expected address, got {:?}", other))),
        }
    }

    pub fn as_uint(&self) -> Result<U256, PipelineError> {
        match self {
            AbiValue::Uint(n) => Ok(*n),
            other => Err(decode_error(format!("expected uint, got {:?}", other))),
        }
    }

    pub fn as_u64(&self) -> Result<u64, PipelineError> {
        let n = self.as_uint()?;
        if n > U256::from(u64::MAX) {
            return Err(decode_error(format!("{} does not fit u64", n)));
        }
        Ok(n.as_u64())
    }

    pub fn as_bool(&self) -> Result<bool, PipelineError> {
        match self {
            AbiValue::Bool(b) => Ok(*b),
            other => Err(decode_error(format!("expected bool, got {:?}", other))),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], PipelineError> {
        match self {
            AbiValue::FixedBytes(b) | AbiValue::Bytes(b) => Ok(b),
            other => Err(decode_error(format!("expected bytes, got {:?}", other))),
        }
    }

    pub fn as_str(&self) -> Result<&str, PipelineError> {
        match self {
            AbiValue::String(s) => Ok(s),
            other => Err(decode_error(format!("expected string, got {:?}", other))),
        }
    }

    pub fn as_array(&self) -> Result<&[AbiValue], PipelineError> {
        match self {
            AbiValue::Array(items) => Ok(items),
            other => Err(decode_error(format!("expected array, got {:?}", other))),
        }
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        AbiValue::Address(value)
    }
}

impl From<U256> for AbiValue {
    fn from(value: U256) -> Self {
        AbiValue::Uint(value)
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        AbiValue::Bool(value)
    }
}

/// Decode a zero-padded `bytes32` as UTF-8 text.
pub fn bytes32_to_utf8(bytes: &[u8]) -> Result<String, PipelineError> {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|e| decode_error(format!("invalid UTF-8 in bytes32: {}", e)))
}

pub fn utf8_to_bytes32(text: &str) -> Result<AbiValue, PipelineError> {
    utf8_to_fixed(text, 32)
}

/// Right-pad UTF-8 text with zeros into a `bytes<width>` value.
pub fn utf8_to_fixed(text: &str, width: usize) -> Result<AbiValue, PipelineError> {
    if text.len() > width {
        return Err(encoding(format!("{:?} exceeds {} bytes", text, width)));
    }
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(width, 0);
    Ok(AbiValue::FixedBytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(function_selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(function_selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(function_selector("approve(address,uint256)")), "095ea7b3");
    }

    #[test]
    fn test_encode_transfer_call() {
        let to = Address::from_bytes([0x11; 20]);
        let method = MethodSignature::new("transfer(address,uint256)");
        let data = method
            .encode_call(&[AbiValue::Address(to), AbiValue::Uint(U256::from(1000u64))])
            .unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &method.selector());
        assert_eq!(&data[4 + 12..4 + 32], to.as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(1000u64));
        assert_eq!(method.name(), "transfer");
    }

    #[test]
    fn test_encode_parallel_dynamic_arrays() {
        let types = parse_types("(bytes4[],address[])").unwrap();
        let sigs = AbiValue::Array(vec![
            AbiValue::FixedBytes(vec![1, 2, 3, 4]),
            AbiValue::FixedBytes(vec![5, 6, 7, 8]),
        ]);
        let addrs = AbiValue::Array(vec![
            AbiValue::Address(Address::from_bytes([0xaa; 20])),
            AbiValue::Address(Address::from_bytes([0xbb; 20])),
        ]);
        let data = encode(&types, &[sigs.clone(), addrs.clone()]).unwrap();
        // head: two offsets; first array: len + 2 words; second array: len + 2 words
        assert_eq!(data.len(), 32 * 2 + 32 * 3 + 32 * 3);
        assert_eq!(U256::from_big_endian(&data[0..32]), U256::from(64u64));
        assert_eq!(U256::from_big_endian(&data[32..64]), U256::from(64u64 + 96));
        assert_eq!(decode(&types, &data).unwrap(), vec![sigs, addrs]);
    }

    #[test]
    fn test_decode_string_and_fixed_array() {
        let types = parse_types("string,uint256[2],bool").unwrap();
        let values = vec![
            AbiValue::String("Melon Fund".to_string()),
            AbiValue::Array(vec![
                AbiValue::Uint(U256::from(1u64)),
                AbiValue::Uint(U256::from(2u64)),
            ]),
            AbiValue::Bool(true),
        ];
        let data = encode(&types, &values).unwrap();
        assert_eq!(decode(&types, &data).unwrap(), values);
    }

    #[test]
    fn test_arity_mismatch_is_encoding_error() {
        let method = MethodSignature::new("transfer(address,uint256)");
        let err = method
            .encode_call(&[AbiValue::Address(Address::ZERO)])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Encoding(_)));
    }

    #[test]
    fn test_narrow_uint_overflow() {
        let err = encode(&[AbiType::Uint(8)], &[AbiValue::Uint(U256::from(256u64))]).unwrap_err();
        assert!(matches!(err, PipelineError::Encoding(_)));
    }

    #[test]
    fn test_type_mismatch() {
        let err = encode(&[AbiType::Address], &[AbiValue::Bool(true)]).unwrap_err();
        assert!(matches!(err, PipelineError::Encoding(_)));
    }

    #[test]
    fn test_truncated_response_is_decode_error() {
        let err = decode(&[AbiType::Uint(256)], &[0u8; 16]).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_parse_types() {
        assert_eq!(
            parse_types("address[6],uint256[8],bytes32,bytes").unwrap(),
            vec![
                AbiType::FixedArray(Box::new(AbiType::Address), 6),
                AbiType::FixedArray(Box::new(AbiType::Uint(256)), 8),
                AbiType::FixedBytes(32),
                AbiType::Bytes,
            ]
        );
        assert!(parse_types("()").unwrap().is_empty());
        assert!(parse_types("(uint256,(address,bool))").is_err());
        assert!(AbiType::parse("uint7").is_err());
    }

    #[test]
    fn test_bytes32_utf8() {
        let encoded = utf8_to_bytes32("Fund One").unwrap();
        let text = bytes32_to_utf8(encoded.as_bytes().unwrap()).unwrap();
        assert_eq!(text, "Fund One");
        assert!(utf8_to_bytes32(&"x".repeat(33)).is_err());
    }
}

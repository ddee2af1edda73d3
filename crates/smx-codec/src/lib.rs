// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SMARTX CHAIN - CODEC MODULE
//
// The single symmetric envelope used for persistence, wire messages, and
// contract state: JSON -> DEFLATE -> base64, and back.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    Base64(String),
    Decompress(String),
    Json(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CodecError::Base64(e) => write!(f, "base64 decode failed: {e}"),
            CodecError::Decompress(e) => write!(f, "deflate decompress failed: {e}"),
            CodecError::Json(e) => write!(f, "json parse failed: {e}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Serializes `value` to JSON, deflates it, and base64-encodes the result.
///
/// Panics only if `value`'s `Serialize` impl itself fails, which does not
/// happen for the plain-data types this codec is used with (spec §4.1).
pub fn encode<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_vec(value).expect("value must be JSON-serializable");
    let mut encoder = DeflateEncoder::new(json.as_slice(), Compression::default());
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .expect("in-memory deflate never fails");
    B64.encode(compressed)
}

/// Inverse of [`encode`]. Each failure mode surfaces as a distinct
/// [`CodecError`] variant (spec §4.1).
pub fn decode<T: DeserializeOwned>(envelope: &str) -> Result<T, CodecError> {
    let compressed = B64
        .decode(envelope)
        .map_err(|e| CodecError::Base64(e.to_string()))?;
    let mut decoder = DeflateDecoder::new(compressed.as_slice());
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| CodecError::Decompress(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| CodecError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        amount: u64,
        tags: Vec<String>,
    }

    #[test]
    fn round_trips_a_struct() {
        let value = Sample {
            name: "smartXabc".to_string(),
            amount: 42,
            tags: vec!["a".into(), "b".into()],
        };
        let encoded = encode(&value);
        let decoded: Sample = decode(&encoded).expect("decode should succeed");
        assert_eq!(value, decoded);
    }

    #[test]
    fn round_trips_empty_string() {
        let value = String::new();
        let encoded = encode(&value);
        let decoded: String = decode(&encoded).expect("decode should succeed");
        assert_eq!(value, decoded);
    }

    #[test]
    fn bad_base64_surfaces_base64_error() {
        let err = decode::<Sample>("not valid base64 !!!").unwrap_err();
        assert!(matches!(err, CodecError::Base64(_)));
    }

    #[test]
    fn valid_base64_bad_deflate_surfaces_decompress_error() {
        let garbage = B64.encode(b"not deflate data at all");
        let err = decode::<Sample>(&garbage).unwrap_err();
        assert!(matches!(err, CodecError::Decompress(_)));
    }

    #[test]
    fn valid_deflate_bad_json_surfaces_json_error() {
        let mut encoder = DeflateEncoder::new(&b"not json"[..], Compression::default());
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).unwrap();
        let envelope = B64.encode(compressed);
        let err = decode::<Sample>(&envelope).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    proptest! {
        #[test]
        fn prop_round_trip(name in ".*", amount in 0u64..1_000_000, tags in proptest::collection::vec(".*", 0..5)) {
            let value = Sample { name, amount, tags };
            let encoded = encode(&value);
            let decoded: Sample = decode(&encoded).unwrap();
            prop_assert_eq!(value, decoded);
        }
    }
}

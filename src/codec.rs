// Sealstore — Attribute Codec Interface
//
// Token objects persist their attribute bag as a single text column. The
// encoding format belongs to the dispatch layer, not to the store; the store
// only requires that one encode/decode cycle round-trips byte-for-byte.
//
// A JSON-backed implementation is provided so the crate is usable (and
// testable) standalone.

use thiserror::Error;

use crate::store::models::{Attribute, AttributeBag};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Could not encode attribute bag: {0}")]
    Encode(String),

    #[error("Could not decode attribute text: {0}")]
    Decode(String),
}

/// Bag-to-text and text-to-bag conversion consumed by the token object
/// repository.
pub trait AttributeCodec {
    fn encode(&self, bag: &AttributeBag) -> Result<String, CodecError>;
    fn decode(&self, text: &str) -> Result<AttributeBag, CodecError>;
}

/// Default codec: a JSON array of `{ "type": ..., "value": [...] }` entries,
/// preserving bag order.
pub struct JsonAttributeCodec;

impl AttributeCodec for JsonAttributeCodec {
    fn encode(&self, bag: &AttributeBag) -> Result<String, CodecError> {
        serde_json::to_string(bag.entries()).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<AttributeBag, CodecError> {
        let entries: Vec<Attribute> =
            serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))?;
        AttributeBag::from_entries(entries).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::attr_type;

    fn sample_bag() -> AttributeBag {
        let mut bag = AttributeBag::new();
        bag.put(Attribute::new(0x0000_0001, b"CKO_SECRET_KEY".to_vec()))
            .unwrap();
        bag.put(Attribute::new(attr_type::PUB_BLOB, vec![0xde, 0xad]))
            .unwrap();
        bag.put(Attribute::new(attr_type::PRIV_BLOB, vec![0xbe, 0xef]))
            .unwrap();
        bag
    }

    #[test]
    fn test_encode_decode_round_trips() {
        let codec = JsonAttributeCodec;
        let bag = sample_bag();

        let text = codec.encode(&bag).unwrap();
        let decoded = codec.decode(&text).unwrap();
        assert_eq!(decoded, bag);

        // A second cycle must reproduce the exact same text.
        let text2 = codec.encode(&decoded).unwrap();
        assert_eq!(text2, text);
    }

    #[test]
    fn test_decode_preserves_order() {
        let codec = JsonAttributeCodec;
        let bag = sample_bag();

        let decoded = codec.decode(&codec.encode(&bag).unwrap()).unwrap();
        let types: Vec<u64> = decoded.entries().iter().map(|a| a.attr_type).collect();
        assert_eq!(types, vec![0x0000_0001, attr_type::PUB_BLOB, attr_type::PRIV_BLOB]);
    }

    #[test]
    fn test_decode_rejects_duplicate_types() {
        let codec = JsonAttributeCodec;
        let text = r#"[{"type":1,"value":[1]},{"type":1,"value":[2]}]"#;
        assert!(codec.decode(text).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = JsonAttributeCodec;
        assert!(codec.decode("not json").is_err());
    }
}

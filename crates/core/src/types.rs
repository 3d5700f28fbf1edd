use serde::{Deserialize, Serialize};

/// 32-byte SHA-256 digest (leaves, internal nodes, roots)
pub type Digest = [u8; 32];

/// 32-byte public key of an entitled identity
pub type Identity = [u8; 32];

/// 32-byte asset identifier (token mint / contract address)
pub type AssetRef = [u8; 32];

/// Monotonic epoch counter assigned by the ledger
pub type EpochId = u64;

/// All-zero digest, never a valid root
pub const ZERO_DIGEST: Digest = [0u8; 32];

/// Errors from parsing hex-encoded 32-byte values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHexError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Parse a 32-byte value from hex, accepting an optional `0x` prefix.
pub fn parse_hex32(s: &str) -> Result<[u8; 32], ParseHexError> {
    let trimmed = s.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(stripped).map_err(|e| ParseHexError::InvalidHex(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| ParseHexError::InvalidLength(len))
}

/// Serde adapter: `[u8; 32]` as lowercase hex string
pub mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hex32(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: `Vec<[u8; 32]>` as a list of lowercase hex strings
pub mod hex32_vec {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(values: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&hex::encode(value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .iter()
            .map(|s| super::parse_hex32(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// A right to withdraw `amount` of a pooled asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entitlement {
    /// Who may claim
    #[serde(with = "hex32")]
    pub identity: Identity,
    /// Amount in the asset's smallest unit
    pub amount: u64,
}

impl Entitlement {
    pub fn new(identity: Identity, amount: u64) -> Self {
        Self { identity, amount }
    }
}

/// A right to register under `label` with a reputation `score`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Registration {
    /// Who may register
    #[serde(with = "hex32")]
    pub identity: Identity,
    /// Free-form handle (e.g. an account name)
    pub label: String,
    /// Score assigned by the entitlement source
    pub score: u64,
}

impl Registration {
    pub fn new(identity: Identity, label: impl Into<String>, score: u64) -> Self {
        Self {
            identity,
            label: label.into(),
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex32_plain() {
        let hex_str = "11".repeat(32);
        assert_eq!(parse_hex32(&hex_str).unwrap(), [0x11; 32]);
    }

    #[test]
    fn test_parse_hex32_prefixed_and_padded() {
        let hex_str = format!("  0x{}\n", "ab".repeat(32));
        assert_eq!(parse_hex32(&hex_str).unwrap(), [0xAB; 32]);
    }

    #[test]
    fn test_parse_hex32_wrong_length() {
        assert_eq!(parse_hex32("abcd"), Err(ParseHexError::InvalidLength(2)));
    }

    #[test]
    fn test_parse_hex32_invalid_chars() {
        assert!(matches!(
            parse_hex32(&"zz".repeat(32)),
            Err(ParseHexError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_entitlement_json_shape() {
        let e = Entitlement::new([1u8; 32], 100);
        let json = serde_json::to_value(e).unwrap();
        assert_eq!(json["identity"], "01".repeat(32));
        assert_eq!(json["amount"], 100);

        let back: Entitlement = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_registration_json_shape() {
        let r = Registration::new([2u8; 32], "octocat", 42);
        let json = serde_json::to_string(&r).unwrap();
        let back: Registration = serde_json::from_str(&json).unwrap();
        assert_eq!(back.label, "octocat");
        assert_eq!(back.score, 42);
        assert_eq!(back.identity, [2u8; 32]);
    }

    #[test]
    fn test_zero_digest() {
        assert_eq!(ZERO_DIGEST, [0u8; 32]);
    }
}

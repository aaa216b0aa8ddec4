use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Defines a 32-byte BLAKE3 content hash newtype with the shared helpers.
macro_rules! content_hash {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Compute the hash of raw bytes.
            pub fn from_bytes(data: &[u8]) -> Self {
                Self(*blake3::hash(data).as_bytes())
            }

            /// Wrap a pre-computed hash.
            pub const fn from_hash(hash: [u8; 32]) -> Self {
                Self(hash)
            }

            /// The all-zero hash.
            pub const fn zero() -> Self {
                Self([0u8; 32])
            }

            /// Returns `true` if every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// The raw 32-byte hash.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Hex-encoded string representation.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Short hex representation (first 8 characters).
            pub fn short_hex(&self) -> String {
                hex::encode(&self.0[..4])
            }

            /// Parse from a hex string.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
                let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    TypeError::InvalidLength {
                        expected: 32,
                        actual: bytes.len(),
                    }
                })?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; 32] {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

content_hash! {
    /// Content-addressed identifier of a transaction: the BLAKE3 hash of its
    /// encoded bytes.
    ///
    /// The zero ref never names a real transaction. Walks started from it
    /// begin at the roots of the graph, so it doubles as the "start of
    /// history" marker.
    TransactionRef
}

content_hash! {
    /// BLAKE3 hash of a payload blob, linking a transaction to its payload.
    PayloadHash
}

impl TransactionRef {
    /// The "start of history" marker.
    pub const fn start_of_history() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_bytes_is_deterministic() {
        let a = TransactionRef::from_bytes(b"hello world");
        let b = TransactionRef::from_bytes(b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, TransactionRef::from_bytes(b"hello"));
    }

    #[test]
    fn start_of_history_is_zero() {
        let start = TransactionRef::start_of_history();
        assert!(start.is_zero());
        assert_eq!(start.as_bytes(), &[0u8; 32]);
        assert!(!TransactionRef::from_bytes(b"tx").is_zero());
    }

    #[test]
    fn payload_hash_matches_ref_of_same_bytes() {
        let data = b"payload";
        assert_eq!(
            PayloadHash::from_bytes(data).as_bytes(),
            TransactionRef::from_bytes(data).as_bytes()
        );
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(PayloadHash::from_bytes(b"x").short_hex().len(), 8);
    }

    #[test]
    fn debug_names_the_type() {
        let r = TransactionRef::from_hash([0xab; 32]);
        assert_eq!(format!("{r:?}"), "TransactionRef(abababab)");
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = TransactionRef::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
        assert!(matches!(
            PayloadHash::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn serde_json_roundtrip() {
        let r = TransactionRef::from_bytes(b"serde");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(serde_json::from_str::<TransactionRef>(&json).unwrap(), r);
    }

    proptest! {
        #[test]
        fn hex_parse_inverts_display(bytes in proptest::array::uniform32(any::<u8>())) {
            let r = TransactionRef::from_hash(bytes);
            prop_assert_eq!(TransactionRef::from_hex(&r.to_string()).unwrap(), r);
        }
    }
}

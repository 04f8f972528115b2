//! Base64 for key envelopes and confirmation values.
//!
//! Standard alphabet. Output is padded; input padding is optional and
//! trailing ASCII whitespace is ignored. Any other non-alphabet byte is an
//! error.

use crate::error::{CryptoError, Result};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as padded standard base64
pub fn base64_encode(data: &[u8]) -> String {
    ENGINE.encode(data)
}

/// Decode standard base64
pub fn base64_decode(text: &[u8]) -> Result<Vec<u8>> {
    let end = text
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |p| p + 1);
    ENGINE
        .decode(&text[..end])
        .map_err(|e| CryptoError::Base64(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_and_iv_lengths() {
        assert_eq!(base64_encode(&[0u8; 32]).len(), 44);
        assert_eq!(base64_encode(&[0u8; 16]).len(), 24);
    }

    #[test]
    fn test_decode_lenient_padding_and_whitespace() {
        assert_eq!(base64_decode(b"UGFzcyBiYWNr").unwrap(), b"Pass back");
        assert_eq!(base64_decode(b"UmVjZWl2ZWQ=").unwrap(), b"Received");
        assert_eq!(base64_decode(b"UmVjZWl2ZWQ").unwrap(), b"Received");
        assert_eq!(base64_decode(b"UmVjZWl2ZWQ=\r\n").unwrap(), b"Received");
        assert_eq!(base64_decode(b"").unwrap(), b"");
    }

    #[test]
    fn test_decode_rejects_invalid() {
        assert!(matches!(base64_decode(b"UG*zcyBiYWNr"), Err(CryptoError::Base64(_))));
        assert!(matches!(base64_decode(b"UGFz cyBiYWNr"), Err(CryptoError::Base64(_))));
        assert!(matches!(base64_decode(b"UGFz-_Bi"), Err(CryptoError::Base64(_))));
    }

    proptest! {
        #[test]
        fn prop_encode_then_decode(data in prop::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(base64_decode(base64_encode(&data).as_bytes()).unwrap(), data);
        }

        #[test]
        fn prop_decode_arbitrary_input(text in prop::collection::vec(any::<u8>(), 0..256)) {
            match base64_decode(&text) {
                Ok(decoded) => {
                    let reencoded = base64_encode(&decoded);
                    prop_assert_eq!(base64_decode(reencoded.as_bytes()).unwrap(), decoded);
                }
                Err(e) => prop_assert!(matches!(e, CryptoError::Base64(_))),
            }
        }

        #[test]
        fn prop_decode_base64_shaped_input(text in "[A-Za-z0-9+/]{0,64}={0,2}") {
            if let Ok(decoded) = base64_decode(text.as_bytes()) {
                let reencoded = base64_encode(&decoded);
                prop_assert_eq!(reencoded.trim_end_matches('='), text.trim_end_matches('='));
            }
        }
    }
}

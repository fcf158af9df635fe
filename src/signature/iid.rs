//! IID derivation from signature strings.
//!
//! The runtime derives the IID of a parameterized type by hashing its
//! signature string into the parameterized-interface namespace with SHA-1
//! and stamping RFC 4122 version/variant bits - a name-based (version 5)
//! UUID. [`create_iid`] reproduces that derivation bit for bit; the whole
//! correctness contract of the patcher rests on it.

use sha1::{Digest, Sha1};
use uguid::{guid, Guid};

/// The parameterized-interface namespace GUID the runtime seeds the hash
/// with.
pub const PINTERFACE_NAMESPACE: Guid = guid!("11f47ad5-7b73-42c0-abae-878b1e16adee");

/// The canonical field layout of `guid` in network (big-endian) order, as
/// RFC 4122 hashing requires.
#[must_use]
fn network_order_bytes(guid: Guid) -> [u8; 16] {
    let mut bytes = guid.to_bytes();
    bytes.swap(0, 3);
    bytes.swap(1, 2);
    bytes.swap(4, 5);
    bytes.swap(6, 7);
    bytes
}

/// Hash a signature string into its IID.
///
/// SHA-1 over the namespace bytes followed by the UTF-8 signature, first 16
/// digest bytes, version nibble forced to 5 and variant bits to `10`, then
/// reinterpreted in the canonical little-endian field layout.
#[must_use]
pub fn create_iid(signature: &str) -> Guid {
    let mut hasher = Sha1::new();
    hasher.update(network_order_bytes(PINTERFACE_NAMESPACE));
    hasher.update(signature.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes[6] = (bytes[6] & 0x0f) | 0x50;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    // Back from network order into the canonical little-endian layout.
    bytes.swap(0, 3);
    bytes.swap(1, 2);
    bytes.swap(4, 5);
    bytes.swap(6, 7);
    Guid::from_bytes(bytes)
}

/// The 16-byte blob embedded for `guid` - the canonical little-endian
/// field layout.
#[must_use]
pub fn iid_bytes(guid: Guid) -> [u8; 16] {
    guid.to_bytes()
}

/// Braced uppercase-hex rendering, the form literal GUIDs take inside
/// signature strings.
#[must_use]
pub fn braced(guid: Guid) -> String {
    format!("{{{}}}", guid.to_string().to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_network_order() {
        let bytes = network_order_bytes(PINTERFACE_NAMESPACE);
        assert_eq!(
            bytes,
            [
                0x11, 0xf4, 0x7a, 0xd5, 0x7b, 0x73, 0x42, 0xc0, 0xab, 0xae, 0x87, 0x8b, 0x1e,
                0x16, 0xad, 0xee
            ]
        );
    }

    #[test]
    fn iid_has_v5_version_and_variant() {
        let iid = create_iid("pinterface({faa585ea-6214-4217-afda-7f46de5869b3};string)");
        let network = network_order_bytes(iid);
        assert_eq!(network[6] >> 4, 5, "version nibble must be 5");
        assert_eq!(network[8] & 0xC0, 0x80, "variant bits must be 10");
    }

    #[test]
    fn iid_is_deterministic_and_input_sensitive() {
        let a = create_iid("pinterface({11111111-2222-3333-4444-555555555555};string)");
        let b = create_iid("pinterface({11111111-2222-3333-4444-555555555555};string)");
        let c = create_iid("pinterface({11111111-2222-3333-4444-555555555555};i4)");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn braced_is_uppercase() {
        let guid = guid!("faa585ea-6214-4217-afda-7f46de5869b3");
        assert_eq!(braced(guid), "{FAA585EA-6214-4217-AFDA-7F46DE5869B3}");
    }

    #[test]
    fn blob_layout_is_little_endian_fields() {
        let guid = guid!("11111111-2222-3333-4444-555555555555");
        assert_eq!(
            iid_bytes(guid),
            [
                0x11, 0x11, 0x11, 0x11, 0x22, 0x22, 0x33, 0x33, 0x44, 0x44, 0x55, 0x55, 0x55,
                0x55, 0x55, 0x55
            ]
        );
    }
}

use base64::Engine;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Deterministic hex fingerprint of a ConfigMap's data.
///
/// String values are hashed as-is; binary values are base64-encoded first, matching how
/// a ConfigMap's `binaryData` is represented over the wire.
pub fn hash_configmap(string_data: &BTreeMap<String, String>, binary_data: &BTreeMap<String, Vec<u8>>) -> String {
    let mut entries: Vec<String> = Vec::with_capacity(string_data.len() + binary_data.len());
    for (key, value) in string_data {
        entries.push(format!("{key}={value}"));
    }
    for (key, value) in binary_data {
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);
        entries.push(format!("{key}={encoded}"));
    }
    hash_entries(entries)
}

/// Deterministic hex fingerprint of a Secret's data.
///
/// Secret values are raw bytes already; unlike ConfigMap binary data, they are hashed as
/// raw string bytes rather than base64-encoded (they are not meant to travel as text).
pub fn hash_secret(data: &BTreeMap<String, Vec<u8>>) -> String {
    let mut entries: Vec<String> = Vec::with_capacity(data.len());
    for (key, value) in data {
        let value = String::from_utf8_lossy(value);
        entries.push(format!("{key}={value}"));
    }
    hash_entries(entries)
}

/// Sentinel fingerprint for a deleted resource. Never produced by `hash_entries` for any
/// non-empty input, since a SHA-1 digest of the empty string collides with nothing else a
/// caller deliberately constructs (the deletion case short-circuits before hashing).
pub const DELETION_FINGERPRINT: &str = "";

fn hash_entries(mut entries: Vec<String>) -> String {
    if entries.is_empty() {
        return DELETION_FINGERPRINT.to_string();
    }
    entries.sort_unstable();
    let joined = entries.join(";");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for byte in bytes.as_ref() {
            write!(out, "{byte:02x}").expect("writing to a String never fails");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn binary_map(pairs: &[(&str, &[u8])]) -> BTreeMap<String, Vec<u8>> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect()
    }

    #[test]
    fn empty_configmap_hashes_to_deletion_sentinel() {
        let h = hash_configmap(&BTreeMap::new(), &BTreeMap::new());
        assert_eq!(h, DELETION_FINGERPRINT);
    }

    #[test]
    fn deterministic_across_calls() {
        let data = string_map(&[("a", "1"), ("b", "2")]);
        let h1 = hash_configmap(&data, &BTreeMap::new());
        let h2 = hash_configmap(&data, &BTreeMap::new());
        assert_eq!(h1, h2);
        assert_ne!(h1, DELETION_FINGERPRINT);
    }

    #[test]
    fn insertion_order_independent() {
        let a = string_map(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let b = string_map(&[("c", "3"), ("a", "1"), ("b", "2")]);
        assert_eq!(
            hash_configmap(&a, &BTreeMap::new()),
            hash_configmap(&b, &BTreeMap::new())
        );
    }

    #[test]
    fn any_byte_change_flips_the_hash() {
        let a = string_map(&[("a", "1")]);
        let b = string_map(&[("a", "2")]);
        assert_ne!(
            hash_configmap(&a, &BTreeMap::new()),
            hash_configmap(&b, &BTreeMap::new())
        );
    }

    #[test]
    fn configmap_binary_data_is_base64_encoded() {
        let binary = binary_map(&[("blob", b"\x00\x01\xff")]);
        let h = hash_configmap(&BTreeMap::new(), &binary);
        let expected_entry = format!(
            "blob={}",
            base64::engine::general_purpose::STANDARD.encode(b"\x00\x01\xff")
        );
        let mut hasher = Sha1::new();
        hasher.update(expected_entry.as_bytes());
        assert_eq!(h, hex::encode(hasher.finalize()));
    }

    #[test]
    fn secret_data_is_hashed_raw_not_base64() {
        let data = binary_map(&[("token", b"hunter2")]);
        let h = hash_secret(&data);
        let mut hasher = Sha1::new();
        hasher.update(b"token=hunter2");
        assert_eq!(h, hex::encode(hasher.finalize()));
    }

    #[test]
    fn empty_secret_hashes_to_deletion_sentinel() {
        assert_eq!(hash_secret(&BTreeMap::new()), DELETION_FINGERPRINT);
    }
}

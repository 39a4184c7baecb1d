//! Cache entry filename codec.
//!
//! The blobs directory carries no index: a cache entry IS its file, and the
//! file name IS the record. `encode` maps a (container, blob name, cache
//! key) tuple to a single filesystem-safe name; `decode` inverts it
//! exactly. Anything `decode` rejects — other people's files, editor
//! droppings, `.part` temporaries — is simply not a cache entry.
//!
//! The escaping keeps only `[A-Za-z0-9_]` literal and percent-escapes every
//! other byte, so the `-` component separator and the `.` of temporary-file
//! suffixes can never occur inside an encoded component. That is what makes
//! the codec collision-free: distinct tuples always produce distinct names,
//! and a name splits unambiguously back into its three components.

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Encode a (container, blob name, cache key) tuple into a file name.
pub fn encode(container: &str, blob_name: &str, cache_key: &str) -> String {
    let mut out = String::with_capacity(container.len() + blob_name.len() + cache_key.len() + 2);
    escape_into(&mut out, container);
    out.push('-');
    escape_into(&mut out, blob_name);
    out.push('-');
    escape_into(&mut out, cache_key);
    out
}

/// Decode a file name back into its (container, blob name, cache key)
/// tuple. Returns `None` for any name this codec didn't produce.
pub fn decode(file_name: &str) -> Option<(String, String, String)> {
    let parts: Vec<&str> = file_name.split('-').collect();
    let [container, blob_name, cache_key] = parts.as_slice() else {
        return None;
    };
    let container = unescape(container)?;
    let blob_name = unescape(blob_name)?;
    let cache_key = unescape(cache_key)?;
    if container.is_empty() || blob_name.is_empty() || cache_key.is_empty() {
        return None;
    }
    Some((container, blob_name, cache_key))
}

fn escape_into(out: &mut String, component: &str) {
    for byte in component.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' => out.push(byte as char),
            _ => {
                out.push('%');
                out.push(HEX[(byte >> 4) as usize] as char);
                out.push(HEX[(byte & 0x0F) as usize] as char);
            },
        }
    }
}

fn unescape(component: &str) -> Option<String> {
    let bytes = component.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = hex_value(*bytes.get(i + 1)?)?;
                let lo = hex_value(*bytes.get(i + 2)?)?;
                out.push(hi << 4 | lo);
                i += 3;
            },
            byte @ (b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_') => {
                out.push(byte);
                i += 1;
            },
            // Anything else ('.', '~', spaces...) is a byte the encoder
            // would have escaped: not one of our names.
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("reports", "daily/2026-08-07.csv", "etag:0x8DC1")]
    #[case("c", "n", "k")]
    #[case("my-container", "a b/c.d", "etag:\"quoted\"")]
    #[case("container", "unicode/ünïcödé.txt", "mod:1754000000:42")]
    #[case("x", "100%.txt", "etag:a-b-c")]
    fn test_round_trip(#[case] container: &str, #[case] blob_name: &str, #[case] cache_key: &str) {
        let encoded = encode(container, blob_name, cache_key);
        let decoded = decode(&encoded).expect("encoded name must decode");
        assert_eq!(decoded, (container.to_string(), blob_name.to_string(), cache_key.to_string()));
    }

    #[test]
    fn test_encoded_names_are_filesystem_safe() {
        let encoded = encode("my-container", "dir/sub\\file name?.csv", "etag:\"0x8DC\"");
        assert!(
            encoded.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'%' || b == b'-'),
            "unexpected byte in {encoded}"
        );
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('.'));
    }

    #[test]
    fn test_distinct_tuples_encode_distinctly() {
        // The separator-shuffling cases a lossy scheme would collapse.
        let pairs = [
            encode("ab", "c", "k"),
            encode("a", "bc", "k"),
            encode("a", "b-c", "k"),
            encode("a-b", "c", "k"),
            encode("a", "b", "c-k"),
            encode("a", "b/c", "k"),
            encode("a", "b", "k"),
        ];
        for (i, left) in pairs.iter().enumerate() {
            for right in &pairs[i + 1..] {
                assert_ne!(left, right);
            }
        }
    }

    #[rstest]
    #[case("README.md")]
    #[case("not ours at all")]
    #[case("only-two")]
    #[case("one-two-three-four")]
    #[case("a-b-")]
    #[case("a-%ZZ-c")]
    #[case("a-%4-c")]
    #[case("")]
    fn test_foreign_names_do_not_decode(#[case] file_name: &str) {
        assert_eq!(decode(file_name), None);
    }

    #[test]
    fn test_temporaries_do_not_decode() {
        let temp = format!("{}.Xy1Z.part", encode("c", "blob", "etag:1"));
        assert_eq!(decode(&temp), None);
    }
}

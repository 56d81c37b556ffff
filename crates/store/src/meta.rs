//! Reserved meta keys.
//!
//! Meta records live in the same physical file as data records. Their keys
//! begin with a space, a byte that never starts a tag name or a canonical
//! path, so the two key spaces cannot collide.

pub const META_PREFIX: u8 = b' ';

/// Build the physical key for the meta record `name`.
pub fn meta_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + 1);
    key.push(META_PREFIX);
    key.extend_from_slice(name.as_bytes());
    key
}

pub fn is_meta_key(key: &[u8]) -> bool {
    key.first() == Some(&META_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_keys_are_recognized() {
        let key = meta_key("__.VERSION");
        assert_eq!(key, b" __.VERSION");
        assert!(is_meta_key(&key));
        assert!(!is_meta_key(b"main"));
        assert!(!is_meta_key(b"./src/main.c"));
        assert!(!is_meta_key(b""));
    }

    #[test]
    fn meta_keys_sort_before_data_keys() {
        assert!(meta_key("__.NEXTKEY") < b"./a".to_vec());
        assert!(meta_key("__.NEXTKEY") < b"1".to_vec());
        assert!(meta_key("__.NEXTKEY") < b"A".to_vec());
    }
}

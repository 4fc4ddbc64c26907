use ulid::Ulid;

pub fn generate_ulid() -> String {
    Ulid::new().to_string()
}

/// Returns at most `max_bytes` of `content` for log output, cut back to a char boundary.
pub fn preview(content: &str, max_bytes: usize) -> &str {
    if content.len() <= max_bytes {
        return content;
    }

    let mut end = max_bytes;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }

    &content[..end]
}

/// Second `:`-separated segment of a Stream call id such as `default:abc123`.
pub fn call_id_from_cid(cid: &str) -> Option<&str> {
    cid.split(':').nth(1).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_content_unchanged() {
        assert_eq!(preview("hello", 200), "hello");
        assert_eq!(preview("", 10), "");
    }

    #[test]
    fn test_preview_cuts_at_limit() {
        assert_eq!(preview("hello world", 5), "hello");
    }

    #[test]
    fn test_preview_backs_off_mid_char() {
        // \u{00E9} is 2 bytes, spanning bytes 3..5
        let content = "caf\u{00E9}!";
        assert_eq!(preview(content, 4), "caf");
    }

    #[test]
    fn test_call_id_from_cid() {
        assert_eq!(call_id_from_cid("default:abc123"), Some("abc123"));
        assert_eq!(call_id_from_cid("abc123"), None);
        assert_eq!(call_id_from_cid("default:"), None);
    }
}

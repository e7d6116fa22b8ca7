/// Number of trailing token characters left visible by `mask_token`
const VISIBLE_TOKEN_CHARS: usize = 4;

/// Mask a bearer token for display, keeping only its last few characters
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= VISIBLE_TOKEN_CHARS * 2 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - VISIBLE_TOKEN_CHARS).collect();
    format!("****{}", tail)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.abcd"), "****abcd");
        assert_eq!(mask_token("tkn-123"), "*******");
        assert_eq!(mask_token(""), "");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }
}

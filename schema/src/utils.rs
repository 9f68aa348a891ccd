/// Renders `text` as a double-quoted string literal with JSON escaping.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{:?}", text))
}

/// Inverse of [`quote`]. Returns `None` when `literal` is not a complete,
/// correctly escaped string literal.
pub fn unquote(literal: &str) -> Option<String> {
    if !literal.starts_with('"') {
        return None;
    }
    serde_json::from_str::<String>(literal).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_and_unquote() {
        assert_eq!(quote("AUTO"), "\"AUTO\"");
        assert_eq!(quote("a\"b\n"), "\"a\\\"b\\n\"");
        assert_eq!(unquote("\"a\\\"b\\n\""), Some("a\"b\n".to_owned()));
        assert_eq!(unquote("\"open"), None);
        assert_eq!(unquote("\"escaped end\\\""), None);
        assert_eq!(unquote("bare"), None);
    }
}

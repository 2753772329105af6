//! Email address extraction and light validation for MAIL FROM / RCPT TO
//! arguments.
//!
//! Ported in spirit from `rsmtpd/core/validation.py` in the original Python
//! implementation: angle-bracket extraction, a trailing ` SMTPUTF8` marker
//! that both switches the line's decoding to UTF-8 and is stripped from the
//! address itself, and the same permissive local-part/domain syntax checks.

/// The result of parsing a `MAIL FROM:<...>` or `RCPT TO:<...>` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// The argument exactly as given, after the ` SMTPUTF8` marker (if any)
    /// was stripped.
    pub input: String,
    /// The address without angle brackets.
    pub email_address: String,
    pub local_part: String,
    pub domain: Option<String>,
    pub is_utf8: bool,
    pub contained_rfc_brackets: bool,
    pub is_valid: bool,
}

impl ParsedAddress {
    /// Case-insensitive address equality, used as the key for
    /// `SharedState::recipients`.
    pub fn address_key(&self) -> String {
        self.email_address.to_lowercase()
    }
}

/// Parses the text following `MAIL FROM:` or `RCPT TO:` (i.e. everything
/// after the colon, not including the colon itself).
pub fn parse_address(input: &str) -> ParsedAddress {
    let mut is_utf8 = false;
    let mut input = input.trim();
    let stripped;
    if let Some(rest) = input.strip_suffix(" SMTPUTF8") {
        is_utf8 = true;
        stripped = rest.trim().to_string();
        input = &stripped;
    }

    let trimmed_input = input.to_string();

    let (email_address, contained_rfc_brackets) = match (input.find('<'), input.rfind('>')) {
        (Some(start), Some(end)) if start < end => (input[start + 1..end].to_string(), true),
        _ => (input.trim().to_string(), false),
    };

    let (local_part, domain) = match email_address.rfind('@') {
        Some(at) => (
            email_address[..at].to_string(),
            Some(email_address[at + 1..].to_string()),
        ),
        None => (email_address.clone(), None),
    };

    let is_valid = match &domain {
        Some(domain) => validate_domain(domain) && validate_local_part(&local_part),
        // A bare null reverse-path (`MAIL FROM:<>`) is valid and means the
        // bounced-message case; anything else without an `@` is not.
        None => email_address.is_empty(),
    };

    ParsedAddress {
        input: trimmed_input,
        email_address,
        local_part,
        domain,
        is_utf8,
        contained_rfc_brackets,
        is_valid,
    }
}

fn validate_domain(domain: &str) -> bool {
    if domain.contains("..") || domain.contains('_') || domain.is_empty() {
        return false;
    }
    let bytes = domain.as_bytes();
    let first_ok = bytes[0].is_ascii_alphanumeric() || bytes[0] == b'_';
    let last_ok = bytes[bytes.len() - 1].is_ascii_alphanumeric();
    first_ok
        && last_ok
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

fn validate_local_part(local_part: &str) -> bool {
    if local_part.is_empty() || local_part == "\"\"" {
        return false;
    }
    if local_part.starts_with('"') && local_part.ends_with('"') {
        return true;
    }
    if local_part.contains("..") {
        return false;
    }
    !local_part.contains(['@', '\\', ' '])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bracketed_address() {
        let parsed = parse_address("<alice@example.com>");
        assert_eq!(parsed.email_address, "alice@example.com");
        assert_eq!(parsed.local_part, "alice");
        assert_eq!(parsed.domain.as_deref(), Some("example.com"));
        assert!(parsed.contained_rfc_brackets);
        assert!(parsed.is_valid);
    }

    #[test]
    fn parses_null_reverse_path() {
        let parsed = parse_address("<>");
        assert_eq!(parsed.email_address, "");
        assert!(parsed.is_valid);
    }

    #[test]
    fn smtputf8_marker_is_stripped_and_flagged() {
        let parsed = parse_address("<bjorn@exämple.com> SMTPUTF8");
        assert!(parsed.is_utf8);
        assert_eq!(parsed.email_address, "bjorn@exämple.com");
    }

    #[test]
    fn rejects_double_dot_domain() {
        let parsed = parse_address("<a@exa..mple.com>");
        assert!(!parsed.is_valid);
    }

    #[test]
    fn rejects_unbracketed_local_at_with_space() {
        let parsed = parse_address("a b@example.com");
        assert!(!parsed.is_valid);
    }

    #[test]
    fn quoted_local_part_is_accepted() {
        let parsed = parse_address("<\"a b\"@example.com>");
        assert!(parsed.is_valid);
    }
}

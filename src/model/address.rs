//! Sender address parsing (RFC 5322 §3.4).

use serde::Serialize;

/// A `From` header split into display name and bare address.
///
/// Either part may be empty when the header is missing or unusual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    pub name: String,
    pub address: String,
}

impl EmailAddress {
    /// Parse one address from a (decoded) header value.
    ///
    /// Understands `addr`, `<addr>`, `Name <addr>`, `"Quoted, Name" <addr>`
    /// and the old `addr (Name)` comment form. Anything else is kept whole
    /// as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: strip_quotes(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        if let Some(open) = trimmed.find('(') {
            if trimmed.ends_with(')') && trimmed[..open].contains('@') {
                return Self {
                    name: strip_quotes(&trimmed[open + 1..trimmed.len() - 1]),
                    address: trimmed[..open].trim().to_string(),
                };
            }
        }

        Self {
            name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// The display name, or the address when there is none.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.address
        } else {
            &self.name
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.name, "");
        assert_eq!(addr.label(), "user@example.com");
    }

    #[test]
    fn test_parse_angle_address() {
        let addr = EmailAddress::parse(" <user@example.com> ");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>");
        assert_eq!(addr.name, "Last, First");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.to_string(), "Last, First <user@example.com>");
    }

    #[test]
    fn test_parse_comment_form() {
        let addr = EmailAddress::parse("jross@example.org (Justin Ross)");
        assert_eq!(addr.name, "Justin Ross");
        assert_eq!(addr.address, "jross@example.org");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(EmailAddress::parse(""), EmailAddress::default());
    }
}

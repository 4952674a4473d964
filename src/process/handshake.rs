//! Readiness-handshake parsing.
//!
//! A sidecar announces readiness by printing exactly one line of fixed
//! grammar to stdout:
//!
//! ```text
//! READY:<port>:<token>
//! ```
//!
//! where `<port>` is decimal digits and `<token>` is `[A-Za-z0-9_-]+` — an
//! opaque credential reserved for future authenticated shutdown requests.
//! The controller feeds *whole lines* to [`Handshake::parse`], so the grammar
//! is anchored structurally: `READY:` buried in the middle of an unrelated
//! line, or split across chunks, can never forge a match. Everything that is
//! not a handshake line is diagnostics noise and is never parsed for control
//! meaning.
//!
//! The token must never be logged in full; use [`Handshake::redacted_token`]
//! for diagnostics.

/// A parsed readiness handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// The port the child reports having bound.
    pub port: u16,
    /// Opaque shutdown credential (reserved capability; keep out of logs).
    pub token: String,
}

impl Handshake {
    /// Parses one stdout line; returns `None` unless the entire line matches
    /// `READY:<digits>:<token>` exactly (a trailing `\r` is tolerated).
    ///
    /// # Example
    /// ```
    /// use sidevisor::Handshake;
    ///
    /// let hs = Handshake::parse("READY:9001:abc123").unwrap();
    /// assert_eq!(hs.port, 9001);
    /// assert_eq!(hs.token, "abc123");
    ///
    /// assert!(Handshake::parse("NOT_READY:8080:xyz").is_none());
    /// assert!(Handshake::parse("foo READY:80:bar baz").is_none());
    /// ```
    pub fn parse(line: &str) -> Option<Handshake> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let rest = line.strip_prefix("READY:")?;
        let (port_part, token) = rest.split_once(':')?;

        if port_part.is_empty() || !port_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let port: u16 = port_part.parse().ok()?;

        if token.is_empty()
            || !token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return None;
        }

        Some(Handshake {
            port,
            token: token.to_string(),
        })
    }

    /// First four characters of the token followed by an ellipsis, for
    /// diagnostic logging.
    pub fn redacted_token(&self) -> String {
        let head: String = self.token.chars().take(4).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_line() {
        let hs = Handshake::parse("READY:9001:abc123").unwrap();
        assert_eq!(hs.port, 9001);
        assert_eq!(hs.token, "abc123");
    }

    #[test]
    fn tolerates_trailing_carriage_return() {
        let hs = Handshake::parse("READY:8080:tok_-1\r").unwrap();
        assert_eq!(hs.port, 8080);
        assert_eq!(hs.token, "tok_-1");
    }

    #[test]
    fn rejects_prefixed_noise() {
        assert!(Handshake::parse("NOT_READY:8080:xyz").is_none());
        assert!(Handshake::parse(" READY:8080:xyz").is_none());
    }

    #[test]
    fn rejects_ready_inside_unrelated_line() {
        assert!(Handshake::parse("foo READY:80:bar baz").is_none());
        assert!(Handshake::parse("log: saw READY:80:bar").is_none());
    }

    #[test]
    fn rejects_trailing_garbage_after_token() {
        // A space after the token puts the line outside the grammar.
        assert!(Handshake::parse("READY:80:bar baz").is_none());
        // So does an extra colon-separated field.
        assert!(Handshake::parse("READY:80:bar:extra").is_none());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Handshake::parse("READY::token").is_none());
        assert!(Handshake::parse("READY:abc:token").is_none());
        assert!(Handshake::parse("READY:-1:token").is_none());
        // Out of u16 range.
        assert!(Handshake::parse("READY:70000:token").is_none());
    }

    #[test]
    fn rejects_empty_or_invalid_token() {
        assert!(Handshake::parse("READY:8080:").is_none());
        assert!(Handshake::parse("READY:8080:has space").is_none());
        assert!(Handshake::parse("READY:8080:emoji✨").is_none());
    }

    #[test]
    fn redacts_token_for_logs() {
        let hs = Handshake::parse("READY:9001:secretvalue").unwrap();
        assert_eq!(hs.redacted_token(), "secr…");
        assert!(!hs.redacted_token().contains("secretvalue"));
    }
}

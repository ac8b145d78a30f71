//! Key paths.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ordered sequence of key segments addressing a node in a tree.
///
/// The textual form joins segments with `.`; a segment that itself contains a
/// dot or a double quote (or is empty) is written in double quotes, e.g.
/// `"htaccess.RewriteBase"` or `user_oidc.use_pkce`. Inside quotes, `"` and
/// `\` are escaped with a backslash.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPath(Vec<String>);

/// Errors produced when parsing the textual form of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyPathError {
    #[error("key path is empty")]
    Empty,

    #[error("empty segment at offset {0}")]
    EmptySegment(usize),

    #[error("unterminated quoted segment starting at offset {0}")]
    UnterminatedQuote(usize),

    #[error("invalid escape in quoted segment at offset {0}")]
    InvalidEscape(usize),

    #[error("expected '.' after quoted segment at offset {0}")]
    MissingSeparator(usize),
}

impl KeyPath {
    /// Build a path from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The empty path (the tree root).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// True if `prefix` equals this path or is one of its ancestors.
    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// All non-empty prefixes, shortest first, ending with the path itself.
    pub fn prefixes(&self) -> impl Iterator<Item = KeyPath> + '_ {
        (1..=self.0.len()).map(move |n| KeyPath(self.0[..n].to_vec()))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if segment.is_empty() || segment.contains('.') || segment.contains('"') {
                f.write_str("\"")?;
                for c in segment.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")?;
            } else {
                f.write_str(segment)?;
            }
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = KeyPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyPathError::Empty);
        }

        let bytes = s.as_bytes();
        let mut segments = Vec::new();
        let mut pos = 0;

        loop {
            if bytes.get(pos) == Some(&b'"') {
                let (segment, next) = quoted_segment(s, pos)?;
                segments.push(segment);
                pos = next;
                match bytes.get(pos) {
                    None => break,
                    Some(b'.') => pos += 1,
                    Some(_) => return Err(KeyPathError::MissingSeparator(pos)),
                }
            } else {
                let end = s[pos..].find('.').map(|i| pos + i).unwrap_or(s.len());
                if end == pos {
                    return Err(KeyPathError::EmptySegment(pos));
                }
                segments.push(s[pos..end].to_string());
                if end == s.len() {
                    break;
                }
                pos = end + 1;
            }
            if pos == s.len() {
                return Err(KeyPathError::EmptySegment(pos));
            }
        }

        Ok(Self(segments))
    }
}

/// Read the quoted segment opening at `start`; returns it unescaped together
/// with the offset just past the closing quote.
fn quoted_segment(s: &str, start: usize) -> Result<(String, usize), KeyPathError> {
    let mut segment = String::new();
    let mut chars = s[start + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((segment, start + 1 + i + 1)),
            '\\' => match chars.next() {
                Some((_, escaped @ ('"' | '\\'))) => segment.push(escaped),
                Some((j, _)) => return Err(KeyPathError::InvalidEscape(start + 1 + j)),
                None => break,
            },
            c => segment.push(c),
        }
    }
    Err(KeyPathError::UnterminatedQuote(start))
}

impl From<&[&str]> for KeyPath {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted() {
        let path: KeyPath = "user_oidc.use_pkce".parse().unwrap();
        assert_eq!(path.segments(), &["user_oidc", "use_pkce"]);
    }

    #[test]
    fn test_parse_quoted_segment() {
        let path: KeyPath = "\"htaccess.RewriteBase\"".parse().unwrap();
        assert_eq!(path.segments(), &["htaccess.RewriteBase"]);

        let path: KeyPath = "a.\"b.c\".d".parse().unwrap();
        assert_eq!(path.segments(), &["a", "b.c", "d"]);
    }

    #[test]
    fn test_display_round_trips_dots() {
        let path = KeyPath::new(["auth.bruteforce.protection.enabled"]);
        assert_eq!(path.to_string(), "\"auth.bruteforce.protection.enabled\"");
        assert_eq!(path.to_string().parse::<KeyPath>().unwrap(), path);
    }

    #[test]
    fn test_display_round_trips_quotes_and_backslashes() {
        let path = KeyPath::new(["say \"hi\"", "C:\\tmp.d", "plain\\seg"]);
        assert_eq!(path.to_string(), r#""say \"hi\""."C:\\tmp.d".plain\seg"#);
        assert_eq!(path.to_string().parse::<KeyPath>().unwrap(), path);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<KeyPath>(), Err(KeyPathError::Empty));
        assert_eq!("a..b".parse::<KeyPath>(), Err(KeyPathError::EmptySegment(2)));
        assert_eq!("a.".parse::<KeyPath>(), Err(KeyPathError::EmptySegment(2)));
        assert_eq!("\"abc".parse::<KeyPath>(), Err(KeyPathError::UnterminatedQuote(0)));
        assert_eq!("\"a\"b".parse::<KeyPath>(), Err(KeyPathError::MissingSeparator(3)));
        assert_eq!("\"a\\xb\"".parse::<KeyPath>(), Err(KeyPathError::InvalidEscape(3)));
        assert_eq!("\"a\\".parse::<KeyPath>(), Err(KeyPathError::UnterminatedQuote(0)));
    }

    #[test]
    fn test_prefixes_and_starts_with() {
        let path = KeyPath::new(["a", "b", "c"]);
        let prefixes: Vec<_> = path.prefixes().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["a", "a.b", "a.b.c"]);
        assert!(path.starts_with(&KeyPath::new(["a", "b"])));
        assert!(!path.starts_with(&KeyPath::new(["b"])));
        assert!(path.starts_with(&KeyPath::root()));
    }
}

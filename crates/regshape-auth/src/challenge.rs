//! `WWW-Authenticate` challenge parsing.
//!
//! Accepts the RFC 7235 form used by OCI registries:
//!
//! ```text
//! Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/alpine:pull"
//! Basic realm="Registry"
//! ```
//!
//! Parsing is pure: no network or process I/O happens here.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};

/// Authentication scheme named by a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheme {
    Basic,
    Bearer,
    /// Any other scheme; carries the raw token for diagnostics.
    Unknown(String),
}

impl Scheme {
    fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("bearer") {
            Self::Bearer
        } else if token.eq_ignore_ascii_case("basic") {
            Self::Basic
        } else {
            Self::Unknown(token.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Basic => "Basic",
            Self::Bearer => "Bearer",
            Self::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `WWW-Authenticate` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    scheme: Scheme,
    params: HashMap<String, String>,
    raw_params: String,
}

impl Challenge {
    /// Parse a raw header value.
    ///
    /// Parameter names are case-insensitive and stored lowercased; values keep
    /// their exact bytes once surrounding quotes are removed. A repeated name
    /// overwrites the earlier value.
    pub fn parse(header: &str) -> AuthResult<Self> {
        let trimmed = header.trim();
        if trimmed.is_empty() {
            return Err(malformed(header, "empty header"));
        }

        let (token, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest.trim()),
            None => (trimmed, ""),
        };

        if token.contains(['=', '"', ',']) {
            return Err(malformed(header, "missing scheme token"));
        }

        let scheme = Scheme::from_token(token);
        let params = match scheme {
            Scheme::Basic | Scheme::Bearer => parse_params(rest).map_err(|r| malformed(header, r))?,
            Scheme::Unknown(_) => parse_params_lenient(rest),
        };

        Ok(Self {
            scheme,
            params,
            raw_params: rest.to_string(),
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Look up a parameter by (case-insensitive) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Parameter text after the scheme token, as received.
    pub fn raw_params(&self) -> &str {
        &self.raw_params
    }

    pub fn realm(&self) -> Option<&str> {
        self.param("realm")
    }

    pub fn service(&self) -> Option<&str> {
        self.param("service")
    }

    pub fn scope(&self) -> Option<&str> {
        self.param("scope")
    }
}

impl FromStr for Challenge {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn malformed(header: &str, reason: &str) -> AuthError {
    AuthError::MalformedChallenge {
        header: header.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_params(rest: &str) -> Result<HashMap<String, String>, &'static str> {
    let mut params = HashMap::new();
    for segment in split_segments(rest)? {
        let (key, value) = parse_segment(segment)?;
        params.insert(key, value);
    }
    Ok(params)
}

fn parse_params_lenient(rest: &str) -> HashMap<String, String> {
    let segments = match split_segments(rest) {
        Ok(segments) => segments,
        Err(_) => return HashMap::new(),
    };
    segments
        .into_iter()
        .filter_map(|segment| parse_segment(segment).ok())
        .collect()
}

/// Split on commas that are not inside a quoted value. Empty elements are dropped.
fn split_segments(rest: &str) -> Result<Vec<&str>, &'static str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in rest.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                segments.push(&rest[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err("unterminated quoted value");
    }
    segments.push(&rest[start..]);

    Ok(segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect())
}

fn parse_segment(segment: &str) -> Result<(String, String), &'static str> {
    let (key, value) = segment
        .split_once('=')
        .ok_or("parameter is not a key=value pair")?;

    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err("parameter has an invalid name");
    }

    Ok((key.to_ascii_lowercase(), unquote(value.trim())?))
}

/// Strip a quoted-string's quotes and resolve `\x` escapes. The closing quote
/// must end the segment.
fn unquote(value: &str) -> Result<String, &'static str> {
    let Some(inner) = value.strip_prefix('"') else {
        return Ok(value.to_string());
    };

    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => unquoted.push(escaped),
                None => break,
            },
            '"' if chars.as_str().is_empty() => return Ok(unquoted),
            '"' => return Err("unexpected text after quoted value"),
            _ => unquoted.push(c),
        }
    }
    Err("unterminated quoted value")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_with_realm() {
        let challenge = Challenge::parse("Basic realm=\"registry\"").unwrap();
        assert_eq!(challenge.scheme(), &Scheme::Basic);
        assert_eq!(challenge.realm(), Some("registry"));
    }

    #[test]
    fn test_parse_basic_without_params() {
        let challenge = Challenge::parse("Basic").unwrap();
        assert_eq!(challenge.scheme(), &Scheme::Basic);
        assert!(challenge.params().is_empty());
    }

    #[test]
    fn test_parse_bearer_strips_quotes() {
        let challenge = Challenge::parse(
            "Bearer realm=\"https://auth.example/token\",service=\"registry.example\",scope=\"repository:foo:pull\"",
        )
        .unwrap();

        assert_eq!(challenge.scheme(), &Scheme::Bearer);
        assert_eq!(challenge.params().len(), 3);
        assert_eq!(challenge.realm(), Some("https://auth.example/token"));
        assert_eq!(challenge.service(), Some("registry.example"));
        assert_eq!(challenge.scope(), Some("repository:foo:pull"));
    }

    #[test]
    fn test_parse_bearer_without_scope() {
        let challenge =
            Challenge::parse("Bearer realm=\"https://auth.example/token\",service=\"svc\"").unwrap();
        assert_eq!(challenge.scope(), None);
        assert_eq!(challenge.service(), Some("svc"));
    }

    #[test]
    fn test_parse_scheme_is_case_insensitive() {
        let challenge = Challenge::parse("bearer realm=\"r\",service=\"s\"").unwrap();
        assert_eq!(challenge.scheme(), &Scheme::Bearer);

        let challenge = Challenge::parse("BASIC").unwrap();
        assert_eq!(challenge.scheme(), &Scheme::Basic);
    }

    #[test]
    fn test_parse_empty_is_malformed() {
        assert!(matches!(
            Challenge::parse(""),
            Err(AuthError::MalformedChallenge { .. })
        ));
        assert!(matches!(
            Challenge::parse("   "),
            Err(AuthError::MalformedChallenge { .. })
        ));
    }

    #[test]
    fn test_parse_missing_scheme_is_malformed() {
        let result = Challenge::parse("realm=\"https://auth.example/token\"");
        assert!(matches!(result, Err(AuthError::MalformedChallenge { .. })));
    }

    #[test]
    fn test_parse_segment_without_equals_is_malformed() {
        let result = Challenge::parse("Bearer realm=\"https://auth.example/token\",service");
        assert!(matches!(result, Err(AuthError::MalformedChallenge { .. })));
    }

    #[test]
    fn test_parse_unterminated_quote_is_malformed() {
        let result = Challenge::parse("Bearer realm=\"https://auth.example/token");
        assert!(matches!(result, Err(AuthError::MalformedChallenge { .. })));
    }

    #[test]
    fn test_parse_missing_comma_is_malformed() {
        let result = Challenge::parse("Bearer realm=\"https://a/token\" service=\"svc\"");
        assert!(matches!(result, Err(AuthError::MalformedChallenge { .. })));
    }

    #[test]
    fn test_parse_unescapes_quoted_pairs() {
        let challenge =
            Challenge::parse("Bearer realm=\"a\\\"b\",service=\"c\\\\d\"").unwrap();
        assert_eq!(challenge.realm(), Some("a\"b"));
        assert_eq!(challenge.service(), Some("c\\d"));
    }

    #[test]
    fn test_parse_duplicate_key_last_wins() {
        let challenge = Challenge::parse("Bearer realm=\"first\",realm=\"second\"").unwrap();
        assert_eq!(challenge.realm(), Some("second"));
    }

    #[test]
    fn test_parse_comma_inside_quoted_scope() {
        let challenge = Challenge::parse(
            "Bearer realm=\"https://auth.example/token\",service=\"svc\",scope=\"repository:foo:pull,push\"",
        )
        .unwrap();
        assert_eq!(challenge.scope(), Some("repository:foo:pull,push"));
    }

    #[test]
    fn test_parse_tolerates_spaces_and_trailing_comma() {
        let challenge =
            Challenge::parse("Bearer  realm=\"r\", service=\"s\" ,").unwrap();
        assert_eq!(challenge.realm(), Some("r"));
        assert_eq!(challenge.service(), Some("s"));
    }

    #[test]
    fn test_parse_param_names_case_insensitive() {
        let challenge = Challenge::parse("Bearer Realm=\"r\",SERVICE=\"s\"").unwrap();
        assert_eq!(challenge.realm(), Some("r"));
        assert_eq!(challenge.param("Service"), Some("s"));
    }

    #[test]
    fn test_parse_unknown_scheme_keeps_raw_params() {
        let challenge =
            Challenge::parse("Digest realm=\"x\", nonce=\"abc\", qop").unwrap();
        assert_eq!(challenge.scheme(), &Scheme::Unknown("Digest".to_string()));
        assert_eq!(challenge.param("nonce"), Some("abc"));
        assert_eq!(challenge.param("qop"), None);
        assert_eq!(challenge.raw_params(), "realm=\"x\", nonce=\"abc\", qop");
    }

    #[test]
    fn test_from_str() {
        let challenge: Challenge = "Basic realm=\"Registry\"".parse().unwrap();
        assert_eq!(challenge.realm(), Some("Registry"));
    }
}

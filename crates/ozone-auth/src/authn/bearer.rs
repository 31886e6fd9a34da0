use crate::AuthResult;
use crate::error::GatewayError;

pub const BEARER_ABSENT: &str = "Bearer token absent";
pub const BEARER_MALFORMED: &str = "Authorization header format is not valid";

const SCHEME: &str = "bearer ";

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. An absent or empty header and a
/// header with the wrong scheme are both `Unauthorized`, never a server error.
pub fn parse_bearer(header: Option<&str>) -> AuthResult<&str> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => return Err(GatewayError::unauthorized(BEARER_ABSENT)),
    };

    let scheme_matches = header
        .get(..SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SCHEME));
    if !scheme_matches {
        return Err(GatewayError::unauthorized(BEARER_MALFORMED));
    }

    let token = header[SCHEME.len()..].trim();
    if token.is_empty() {
        return Err(GatewayError::unauthorized(BEARER_MALFORMED));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_bearer() {
        assert_eq!(parse_bearer(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(parse_bearer(Some("bearer abc")).unwrap(), "abc");
        assert_eq!(parse_bearer(Some("BEARER abc")).unwrap(), "abc");
    }

    #[test]
    fn test_absent_header() {
        let err = parse_bearer(None).unwrap_err();
        assert_eq!(err, GatewayError::unauthorized(BEARER_ABSENT));

        let err = parse_bearer(Some("")).unwrap_err();
        assert_eq!(err.message(), BEARER_ABSENT);
    }

    #[test]
    fn test_wrong_scheme() {
        for header in ["Basic dXNlcjpwYXNz", "Bearerabc", "Token abc", "abc"] {
            let err = parse_bearer(Some(header)).unwrap_err();
            assert_eq!(err.message(), BEARER_MALFORMED, "header: {header}");
            assert_eq!(err.status_code(), 401);
        }
    }

    #[test]
    fn test_empty_token_is_malformed() {
        let err = parse_bearer(Some("Bearer   ")).unwrap_err();
        assert_eq!(err.message(), BEARER_MALFORMED);
    }

    #[test]
    fn test_multibyte_header_does_not_panic() {
        let err = parse_bearer(Some("Béarer abc")).unwrap_err();
        assert_eq!(err.message(), BEARER_MALFORMED);
    }
}

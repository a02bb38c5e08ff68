//! SASL PLAIN token decode. Pure function, no I/O: TLS gating and the
//! actual credential check both live with the caller.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SaslError {
    #[error("invalid SASL argument")]
    BadArgument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCredentials {
    pub authzid: String,
    pub authcid: String,
    pub password: String,
}

/// Decodes a base64 SASL PLAIN initial response: `authzid NUL authcid NUL
/// password`. `authzid` may be empty; `authcid` may not.
pub fn decode_plain(token: &str) -> Result<PlainCredentials, SaslError> {
    let raw = STANDARD.decode(token).map_err(|_| SaslError::BadArgument)?;
    let parts: Vec<&[u8]> = raw.split(|b| *b == 0).collect();
    if parts.len() != 3 {
        return Err(SaslError::BadArgument);
    }
    let (authzid, authcid, password) = (parts[0], parts[1], parts[2]);

    let authcid = std::str::from_utf8(authcid).map_err(|_| SaslError::BadArgument)?;
    if authcid.is_empty() {
        return Err(SaslError::BadArgument);
    }

    Ok(PlainCredentials {
        authzid: std::str::from_utf8(authzid).map_err(|_| SaslError::BadArgument)?.to_string(),
        authcid: authcid.to_string(),
        password: std::str::from_utf8(password).map_err(|_| SaslError::BadArgument)?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        STANDARD.encode(s.as_bytes())
    }

    #[test]
    fn decodes_a_well_formed_token_with_empty_authzid() {
        let token = b64("\0alice\0hunter2");
        let creds = decode_plain(&token).unwrap();
        assert_eq!(creds.authzid, "");
        assert_eq!(creds.authcid, "alice");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn decodes_a_token_carrying_a_distinct_authzid() {
        let token = b64("admin\0alice\0hunter2");
        let creds = decode_plain(&token).unwrap();
        assert_eq!(creds.authzid, "admin");
        assert_eq!(creds.authcid, "alice");
    }

    #[test]
    fn rejects_malformed_base64() {
        assert_eq!(decode_plain("AAA"), Err(SaslError::BadArgument));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(decode_plain(&b64("alice\0hunter2")), Err(SaslError::BadArgument));
        assert_eq!(decode_plain(&b64("\0alice\0hunter2\0extra")), Err(SaslError::BadArgument));
    }

    #[test]
    fn rejects_empty_authcid() {
        assert_eq!(decode_plain(&b64("\0\0hunter2")), Err(SaslError::BadArgument));
    }
}

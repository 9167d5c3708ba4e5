use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{GestaoError, Result};
use crate::settings::Settings;

/// Per-process authentication context, handed explicitly to each command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    authenticated: bool,
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

impl Session {
    /// Check `candidate` against the configured hash. The candidate buffer is
    /// wiped before returning.
    pub fn establish(settings: &Settings, candidate: Option<String>) -> Result<Self> {
        let Some(expected) = settings.password_sha256.as_deref() else {
            return Ok(Self { authenticated: true });
        };
        let Some(mut candidate) = candidate else {
            return Ok(Self { authenticated: false });
        };
        let matches = hash_password(&candidate) == expected;
        candidate.zeroize();
        if matches {
            Ok(Self { authenticated: true })
        } else {
            tracing::warn!("password rejected");
            Err(GestaoError::InvalidPassword)
        }
    }

    /// Like `establish`, but prompts on the terminal when a password is
    /// configured and none was supplied.
    pub fn establish_interactive(settings: &Settings, candidate: Option<String>) -> Result<Self> {
        let candidate = match candidate {
            Some(c) => Some(c),
            None if settings.password_sha256.is_some() => Some(rpassword::prompt_password("Password: ")?),
            None => None,
        };
        Self::establish(settings, candidate)
    }

    pub fn require_auth(&self) -> Result<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(GestaoError::AuthRequired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protected(password: &str) -> Settings {
        Settings {
            password_sha256: Some(hash_password(password)),
            ..Settings::default()
        }
    }

    #[test]
    fn test_open_when_no_password_configured() {
        let s = Session::establish(&Settings::default(), None).unwrap();
        assert!(s.require_auth().is_ok());
    }

    #[test]
    fn test_correct_password_authenticates() {
        let s = Session::establish(&protected("segredo"), Some("segredo".into())).unwrap();
        assert!(s.require_auth().is_ok());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let err = Session::establish(&protected("segredo"), Some("chute".into())).unwrap_err();
        assert!(matches!(err, GestaoError::InvalidPassword));
    }

    #[test]
    fn test_missing_password_is_unauthenticated() {
        let s = Session::establish(&protected("segredo"), None).unwrap();
        assert!(matches!(s.require_auth(), Err(GestaoError::AuthRequired)));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

//! Indirection references.
//!
//! Two forms are understood:
//! - `env:NAME` reads a process environment variable at resolve time
//! - `secret://STORE/KEY` fetches `KEY` from the secret store named `STORE`

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::loader::{Origin, SourceKind};

/// Why a reference string could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("malformed reference {0:?}")]
    Malformed(String),

    #[error("unsupported reference scheme {scheme:?} in {reference:?} (expected env: or secret://)")]
    UnsupportedScheme { reference: String, scheme: String },

    #[error("invalid environment variable name in {0:?}")]
    InvalidVariable(String),

    #[error("secret reference {0:?} must name a store and a key")]
    MissingStoreOrKey(String),
}

/// A parsed indirection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Env { var: String },
    Secret { store: String, key: String },
}

impl Reference {
    /// Text-only origin that a resolved value is attributed to.
    pub fn origin(&self) -> Origin {
        match self {
            Reference::Env { var } => Origin::new(SourceKind::Environment, var.clone()),
            Reference::Secret { store, key } => Origin::secret_store(store, key),
        }
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(text).map_err(|_| ReferenceError::Malformed(text.to_string()))?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ReferenceError::Malformed(text.to_string()));
        }

        match url.scheme() {
            "env" => {
                let var = url.path();
                if url.has_host() || !is_variable_name(var) {
                    return Err(ReferenceError::InvalidVariable(text.to_string()));
                }
                Ok(Reference::Env {
                    var: var.to_string(),
                })
            }
            "secret" => {
                let store = url.host_str().unwrap_or_default();
                let key = url.path().trim_start_matches('/');
                if store.is_empty() || key.is_empty() {
                    return Err(ReferenceError::MissingStoreOrKey(text.to_string()));
                }
                Ok(Reference::Secret {
                    store: store.to_string(),
                    key: key.to_string(),
                })
            }
            other => Err(ReferenceError::UnsupportedScheme {
                reference: text.to_string(),
                scheme: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Env { var } => write!(f, "env:{}", var),
            Reference::Secret { store, key } => write!(f, "secret://{}/{}", store, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_reference() {
        let reference: Reference = "env:PASSWORD_SALT".parse().unwrap();
        assert_eq!(
            reference,
            Reference::Env {
                var: "PASSWORD_SALT".into()
            }
        );
        assert_eq!(reference.to_string(), "env:PASSWORD_SALT");
        assert_eq!(reference.origin().kind(), SourceKind::Environment);
    }

    #[test]
    fn test_parse_secret_reference() {
        let reference: Reference = "secret://vault/nextcloud/secret".parse().unwrap();
        assert_eq!(
            reference,
            Reference::Secret {
                store: "vault".into(),
                key: "nextcloud/secret".into()
            }
        );
        assert_eq!(reference.origin().to_string(), "secret:vault/nextcloud/secret");
    }

    #[test]
    fn test_rejects_bad_references() {
        assert!(matches!(
            "PASSWORD_SALT".parse::<Reference>(),
            Err(ReferenceError::Malformed(_))
        ));
        assert!(matches!(
            "env:1BAD".parse::<Reference>(),
            Err(ReferenceError::InvalidVariable(_))
        ));
        assert!(matches!(
            "secret://vault".parse::<Reference>(),
            Err(ReferenceError::MissingStoreOrKey(_))
        ));
        assert!(matches!(
            "https://example.com/x".parse::<Reference>(),
            Err(ReferenceError::UnsupportedScheme { .. })
        ));
    }
}

//! Credentials supplied through the process environment

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// A credential could not be found
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Environment variable {0} is not set")]
pub struct MissingCredential(pub String);

/// A secret read from a named environment variable; may be absent
#[derive(Clone)]
pub struct EnvCredential {
    var: String,
    value: Option<SecretString>,
}

impl EnvCredential {
    /// Read `var` now; unset and blank values count as absent
    pub fn from_env(var: impl Into<String>) -> Self {
        let var = var.into();
        let value = std::env::var(&var)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| SecretString::new(value.into()));
        Self { var, value }
    }

    /// A credential with a known value
    pub fn new(var: impl Into<String>, value: SecretString) -> Self {
        Self {
            var: var.into(),
            value: Some(value),
        }
    }

    /// An absent credential, for offline wiring and tests
    pub fn missing(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            value: None,
        }
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// The secret, or an error naming the variable
    pub fn require(&self) -> Result<&SecretString, MissingCredential> {
        self.value
            .as_ref()
            .ok_or_else(|| MissingCredential(self.var.clone()))
    }

    /// Exposed value, or an error naming the variable
    pub fn expose(&self) -> Result<&str, MissingCredential> {
        self.require().map(|secret| secret.expose_secret())
    }
}

impl std::fmt::Debug for EnvCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredential")
            .field("var", &self.var)
            .field("set", &self.is_set())
            .finish()
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared-secret registration handshake

/// Environment variable consulted when no key is configured
pub const KEY_ENV: &str = "BROOD_KEY";

/// Key used when neither configuration nor environment provide one
pub const DEFAULT_KEY: &str = "brood shared secret: change me";

pub const CLIENT_PREFIX: &str = "Client speaking, I am here. ";
pub const SUCCESS_PREFIX: &str = "Master speaking, everything fine. ";
pub const WRONG_SERVER: &str = "Master speaking, you are contacting the wrong server.";
pub const WRONG_KEY: &str = "Master speaking, absolutely wrong key.";

/// The shared secret a master expects and a client presents
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Explicit value, else `BROOD_KEY`, else the built-in default
    pub fn resolve(explicit: Option<&str>) -> Self {
        if let Some(secret) = explicit {
            return Self::new(secret);
        }
        match std::env::var(KEY_ENV) {
            Ok(secret) if !secret.is_empty() => Self::new(secret),
            _ => Self::new(DEFAULT_KEY),
        }
    }

    /// The registration key a client sends
    pub fn client_key(&self) -> String {
        format!("{}{}", CLIENT_PREFIX, self.0)
    }

    /// The reply a master sends on success
    pub fn success_reply(&self) -> String {
        format!("{}{}", SUCCESS_PREFIX, self.0)
    }

    /// Judge a presented key. Exact match only.
    pub fn check(&self, key: &str) -> KeyVerdict {
        match key.strip_prefix(CLIENT_PREFIX) {
            Some(presented) if presented == self.0 => KeyVerdict::Accepted,
            Some(_) => KeyVerdict::WrongServer,
            None => KeyVerdict::WrongKey,
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVerdict {
    Accepted,
    /// Right handshake, different secret
    WrongServer,
    WrongKey,
}

impl KeyVerdict {
    /// Reply text for a rejected key
    pub fn rejection(self) -> Option<&'static str> {
        match self {
            KeyVerdict::Accepted => None,
            KeyVerdict::WrongServer => Some(WRONG_SERVER),
            KeyVerdict::WrongKey => Some(WRONG_KEY),
        }
    }
}

use std::sync::RwLock;

/// Supplies the bearer token used to authenticate channel connections.
///
/// The client reads the token before every attempt — initial and retry —
/// so a token refreshed elsewhere in the app is picked up without
/// rebuilding the client. Returning `None` aborts the attempt.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Credential provider backed by an in-memory slot.
///
/// Useful for smoke runs and tests; production callers typically adapt
/// their session/preferences storage to [`CredentialProvider`] instead.
#[derive(Debug, Default)]
pub struct StaticCredentialProvider {
    token: RwLock<Option<String>>,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Provider that yields no token.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace (or remove) the stored token.
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|slot| slot.clone())
    }
}

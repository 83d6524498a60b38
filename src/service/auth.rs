//! Shared-secret request authorization

/// Allow-list check against one configured secret
#[derive(Clone)]
pub struct SharedSecret {
    secret: String,
}

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// A blank configured secret authorizes nobody
    pub fn is_authorized(&self, token: Option<&str>) -> bool {
        match token {
            Some(token) => !self.secret.is_empty() && token == self.secret,
            None => false,
        }
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret").finish_non_exhaustive()
    }
}

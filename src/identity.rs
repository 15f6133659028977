use parking_lot::RwLock;

/// Who is signed in. Token handling lives with the host; the core only needs these facts.
pub trait Identity: Send + Sync {
    fn current_user_id(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.current_user_id().is_some()
    }
}

#[derive(Debug, Default)]
pub struct SessionIdentity {
    user_id: RwLock<Option<String>>,
}

impl SessionIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let identity = Self::default();
        identity.sign_in(user_id);
        identity
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let user_id = user_id.trim();
        *self.user_id.write() = if user_id.is_empty() {
            None
        } else {
            Some(user_id.to_string())
        };
    }

    pub fn sign_out(&self) {
        *self.user_id.write() = None;
    }
}

impl Identity for SessionIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }
}

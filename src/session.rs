//! Per-context request identity: namespace and logged-in user.
//!
//! The emulator reads these as `X-AppEngine-*` headers, so the state is kept
//! as a typed key/value map and rendered into a [`HeaderMap`] for every
//! outbound call.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Keys of the session mapping. Absence of a key means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionKey {
    CurrentNamespace,
    DefaultNamespace,
    UserEmail,
    UserId,
    UserFederatedIdentity,
    UserIsAdmin,
}

impl SessionKey {
    /// Header carrying this key, in the lowercase form `http` expects.
    pub fn header_name(&self) -> &'static str {
        match self {
            SessionKey::CurrentNamespace => "x-appengine-current-namespace",
            SessionKey::DefaultNamespace => "x-appengine-default-namespace",
            SessionKey::UserEmail => "x-appengine-internal-user-email",
            SessionKey::UserId => "x-appengine-internal-user-id",
            SessionKey::UserFederatedIdentity => "x-appengine-internal-user-federated-identity",
            SessionKey::UserIsAdmin => "x-appengine-internal-user-is-admin",
        }
    }
}

const USER_KEYS: [SessionKey; 4] = [
    SessionKey::UserEmail,
    SessionKey::UserId,
    SessionKey::UserFederatedIdentity,
    SessionKey::UserIsAdmin,
];

/// The emulated signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub id: String,
    pub federated_identity: String,
    pub admin: bool,
}

/// Stable numeric user id derived from an email (CRC-32, IEEE).
pub fn derive_user_id(email: &str) -> String {
    crc32fast::hash(email.as_bytes()).to_string()
}

/// Mutable "current request" state owned by one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    values: BTreeMap<SessionKey, String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SessionKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    fn set(&mut self, key: SessionKey, value: &str) {
        if value.is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value.to_string());
        }
    }

    /// Set the current namespace. An empty string restores the default.
    pub fn set_namespace(&mut self, namespace: &str) {
        self.set(SessionKey::CurrentNamespace, namespace);
    }

    /// Current namespace, or `""` if none is set.
    pub fn namespace(&self) -> &str {
        self.get(SessionKey::CurrentNamespace).unwrap_or_default()
    }

    pub fn set_default_namespace(&mut self, namespace: &str) {
        self.set(SessionKey::DefaultNamespace, namespace);
    }

    pub fn default_namespace(&self) -> &str {
        self.get(SessionKey::DefaultNamespace).unwrap_or_default()
    }

    /// Sign in as `email`. Replaces any previous login.
    ///
    /// An empty email signs out instead.
    pub fn login(&mut self, email: &str, admin: bool) {
        if email.is_empty() {
            self.logout();
            return;
        }
        self.values.insert(SessionKey::UserEmail, email.to_string());
        self.values.insert(SessionKey::UserId, derive_user_id(email));
        self.values
            .insert(SessionKey::UserFederatedIdentity, email.to_string());
        self.values.insert(
            SessionKey::UserIsAdmin,
            if admin { "1" } else { "0" }.to_string(),
        );
    }

    /// Clear exactly the four user keys.
    pub fn logout(&mut self) {
        for key in USER_KEYS {
            self.values.remove(&key);
        }
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        let email = self.get(SessionKey::UserEmail).filter(|e| !e.is_empty())?;
        Some(User {
            email: email.to_string(),
            id: self
                .get(SessionKey::UserId)
                .map(str::to_string)
                .unwrap_or_else(|| derive_user_id(email)),
            federated_identity: self
                .get(SessionKey::UserFederatedIdentity)
                .unwrap_or_default()
                .to_string(),
            admin: self.get(SessionKey::UserIsAdmin) == Some("1"),
        })
    }

    /// Render the state as request headers.
    ///
    /// Values that are not valid header bytes are percent-encoded.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(self.values.len());
        for (key, value) in &self.values {
            let header_value = HeaderValue::from_bytes(value.as_bytes()).or_else(|_| {
                tracing::warn!(
                    "Session value for {} is not a valid header, percent-encoding it",
                    key.header_name()
                );
                HeaderValue::from_str(&urlencoding::encode(value))
            });
            match header_value {
                Ok(v) => {
                    headers.insert(HeaderName::from_static(key.header_name()), v);
                }
                Err(e) => tracing::warn!("Dropping session header {}: {}", key.header_name(), e),
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_namespace_round_trip() {
        let mut session = SessionState::new();
        assert_eq!(session.namespace(), "");

        session.set_namespace("private");
        assert_eq!(session.namespace(), "private");

        session.set_namespace("");
        assert_eq!(session.namespace(), "");
        assert_eq!(session, SessionState::new());
    }

    #[test]
    fn test_login_sets_identity() {
        let mut session = SessionState::new();
        session.login("test@example.com", true);

        let user = session.current_user().unwrap();
        assert_eq!(user.email, "test@example.com");
        assert_eq!(user.federated_identity, "test@example.com");
        assert_eq!(user.id, derive_user_id("test@example.com"));
        assert!(user.admin);
        assert_eq!(session.get(SessionKey::UserIsAdmin), Some("1"));
    }

    #[test]
    fn test_logout_clears_only_user_keys() {
        let mut session = SessionState::new();
        session.set_namespace("ns");
        session.login("user@host.com", false);
        assert_eq!(session.get(SessionKey::UserIsAdmin), Some("0"));

        session.logout();

        assert!(session.current_user().is_none());
        for key in USER_KEYS {
            assert!(session.get(key).is_none());
        }
        assert_eq!(session.namespace(), "ns");
    }

    #[test]
    fn test_empty_email_login_means_no_user() {
        let mut session = SessionState::new();
        session.login("user@host.com", true);
        session.login("", true);

        assert!(session.current_user().is_none());
        for key in USER_KEYS {
            assert!(session.get(key).is_none());
            assert!(session.headers().get(key.header_name()).is_none());
        }
    }

    #[test]
    fn test_derived_ids_stable_and_distinct() {
        let mut session = SessionState::new();
        session.login("user@host.com", false);
        let first = session.current_user().unwrap().id;
        session.logout();
        session.login("user@host.com", false);
        assert_eq!(session.current_user().unwrap().id, first);

        session.login("differentuser@host.com", false);
        assert_ne!(session.current_user().unwrap().id, first);
    }

    #[test]
    fn test_derive_user_id_is_crc32_decimal() {
        // CRC-32/IEEE of "123456789" is the standard check value.
        assert_eq!(derive_user_id("123456789"), "3421780262");
    }

    #[test]
    fn test_repeated_login_replaces() {
        let mut session = SessionState::new();
        session.login("a@x.com", true);
        session.login("b@x.com", false);
        let user = session.current_user().unwrap();
        assert_eq!(user.email, "b@x.com");
        assert!(!user.admin);
        assert_eq!(
            session
                .headers()
                .get_all(SessionKey::UserEmail.header_name())
                .iter()
                .count(),
            1
        );
    }

    #[test]
    fn test_headers_render_every_key() {
        let mut session = SessionState::new();
        session.set_namespace("private");
        session.set_default_namespace("fallback");
        session.login("user@host.com", true);

        let headers = session.headers();
        assert_eq!(headers.len(), 6);
        assert_eq!(
            headers.get("X-AppEngine-Current-Namespace").unwrap(),
            "private"
        );
        assert_eq!(
            headers.get("x-appengine-internal-user-is-admin").unwrap(),
            "1"
        );
    }

    #[test]
    fn test_any_email_accepted() {
        let mut session = SessionState::new();
        session.login("not an email\n", false);
        assert_eq!(session.current_user().unwrap().email, "not an email\n");
        let headers = session.headers();
        assert_eq!(
            headers.get(SessionKey::UserEmail.header_name()).unwrap(),
            "not%20an%20email%0A"
        );
    }
}

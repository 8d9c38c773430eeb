use applyflow_core::{CoreError, CoreResult, Principal};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A stored account. Emails are kept lower-cased.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl UserRecord {
    pub fn principal(&self) -> Principal {
        Principal {
            subject: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// Normalises an email for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory account store keyed by normalised email.
#[derive(Debug, Default)]
pub struct UserStore {
    users: DashMap<String, UserRecord>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account, failing if the email is taken.
    pub fn insert(&self, name: &str, email: &str, password_hash: &str) -> CoreResult<UserRecord> {
        let email = normalize_email(email);
        match self.users.entry(email.clone()) {
            Entry::Occupied(_) => Err(CoreError::Duplicate(
                "Email is already registered".to_string(),
            )),
            Entry::Vacant(slot) => {
                let record = UserRecord {
                    name: name.trim().to_string(),
                    email,
                    password_hash: password_hash.to_string(),
                };
                slot.insert(record.clone());
                tracing::debug!(email = %record.email, "user registered");
                Ok(record)
            }
        }
    }

    pub fn find(&self, email: &str) -> Option<UserRecord> {
        self.users
            .get(&normalize_email(email))
            .map(|entry| entry.clone())
    }

    pub fn contains(&self, email: &str) -> bool {
        self.users.contains_key(&normalize_email(email))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_find_ignores_case() {
        let store = UserStore::new();
        store.insert("John Doe", "John@Example.com", "hash").unwrap();

        let user = store.find("  john@EXAMPLE.com ").unwrap();
        assert_eq!(user.email, "john@example.com");
        assert_eq!(user.name, "John Doe");
        assert!(store.contains("JOHN@example.com"));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = UserStore::new();
        store.insert("John", "john@example.com", "hash").unwrap();
        let err = store.insert("Other", "JOHN@example.com", "hash2").unwrap_err();
        assert!(matches!(err, CoreError::Duplicate(_)));
        assert_eq!(store.find("john@example.com").unwrap().name, "John");
    }

    #[test]
    fn unknown_email_is_none() {
        let store = UserStore::new();
        assert!(store.find("nobody@example.com").is_none());
    }

    #[test]
    fn principal_uses_email_as_subject() {
        let store = UserStore::new();
        let user = store.insert("Jane", "jane@example.com", "hash").unwrap();
        let principal = user.principal();
        assert_eq!(principal.subject, "jane@example.com");
        assert_eq!(principal.name, "Jane");
    }
}

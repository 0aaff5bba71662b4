//! Who is submitting.
//!
//! Token handling lives elsewhere; submissions only need the backend user id.

use crate::config::UserConfig;

pub trait IdentityProvider: Send + Sync {
    fn user_id(&self) -> Option<String>;
}

/// User id taken from configuration (`[user] user_id` or `CITIZEN_REPORT_USER_ID`).
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
    user_id: Option<String>,
}

impl ConfiguredIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: user_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        }
    }

    pub fn from_config(user: &UserConfig) -> Self {
        Self::new(user.user_id.clone())
    }
}

impl IdentityProvider for ConfiguredIdentity {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

impl<F> IdentityProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn user_id(&self) -> Option<String> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_configured_id_counts_as_missing() {
        assert_eq!(ConfiguredIdentity::new(Some("  ".to_string())).user_id(), None);
        assert_eq!(
            ConfiguredIdentity::from_config(&UserConfig {
                user_id: Some(" u-42 ".to_string())
            })
            .user_id()
            .as_deref(),
            Some("u-42")
        );
    }

    #[test]
    fn closures_are_providers() {
        let provider = || Some("abc".to_string());
        assert_eq!(IdentityProvider::user_id(&provider).as_deref(), Some("abc"));
    }
}

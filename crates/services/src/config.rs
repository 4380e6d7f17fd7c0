use std::env;

use learn_core::model::UserId;
use storage::remote::HttpProgressApi;
use storage::{AccessToken, Backend, SessionAuth};

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_DB_URL: &str = "sqlite://guest.sqlite3";
pub const GUEST_USER_ID: &str = "guest";

/// Runtime settings for one engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub access_token: Option<AccessToken>,
    pub guest: bool,
    pub user_id: Option<String>,
    pub db_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            access_token: None,
            guest: false,
            user_id: None,
            db_url: DEFAULT_DB_URL.into(),
        }
    }
}

impl EngineConfig {
    /// Read `LEARN_*` variables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        Self {
            api_base_url: non_blank("LEARN_API_BASE_URL").unwrap_or(defaults.api_base_url),
            access_token: non_blank("LEARN_ACCESS_TOKEN").and_then(AccessToken::new),
            guest: non_blank("LEARN_GUEST").is_some_and(|value| parse_flag(&value)),
            user_id: non_blank("LEARN_USER_ID"),
            db_url: non_blank("LEARN_DB_URL").unwrap_or(defaults.db_url),
        }
    }

    /// The two facts backend selection branches on.
    #[must_use]
    pub fn session(&self) -> SessionAuth {
        SessionAuth::new(self.access_token.clone(), self.guest)
    }

    /// The learner a session on `backend` tracks progress for.
    ///
    /// A guest session without an explicit id falls back to `guest`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingUserId` for a credentialed session without
    /// `LEARN_USER_ID`, `ConfigError::InvalidUserId` for a malformed id.
    pub fn user_id(&self, backend: &Backend) -> Result<UserId, ConfigError> {
        match (&self.user_id, backend) {
            (Some(raw), _) => Ok(raw.parse()?),
            (None, Backend::Local) => Ok(UserId::new(GUEST_USER_ID)),
            (None, Backend::Remote(_)) => Err(ConfigError::MissingUserId),
        }
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidApiBaseUrl` if the base url does not parse.
    pub fn http_api(&self) -> Result<HttpProgressApi, ConfigError> {
        HttpProgressApi::new(&self.api_base_url).map_err(|source| ConfigError::InvalidApiBaseUrl {
            raw: self.api_base_url.clone(),
            source,
        })
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg, EngineConfig::default());
        assert!(cfg.session().access_token().is_none());
        assert!(!cfg.session().is_guest());
    }

    #[test]
    fn guest_flag_accepts_common_spellings() {
        for raw in ["1", "true", "YES", " yes "] {
            assert!(config(&[("LEARN_GUEST", raw)]).guest, "{raw}");
        }
        for raw in ["0", "no", "", "guest"] {
            assert!(!config(&[("LEARN_GUEST", raw)]).guest, "{raw}");
        }
    }

    #[test]
    fn blank_token_is_ignored() {
        let cfg = config(&[("LEARN_ACCESS_TOKEN", "  ")]);
        assert!(cfg.access_token.is_none());
    }

    #[test]
    fn guest_session_defaults_user_id() {
        let cfg = config(&[("LEARN_GUEST", "1")]);
        let backend = Backend::select(&cfg.session()).unwrap();
        assert_eq!(cfg.user_id(&backend).unwrap(), UserId::new(GUEST_USER_ID));

        let cfg = config(&[("LEARN_GUEST", "1"), ("LEARN_USER_ID", "ada")]);
        assert_eq!(cfg.user_id(&backend).unwrap(), UserId::new("ada"));
    }

    #[test]
    fn authenticated_session_requires_user_id() {
        let cfg = config(&[("LEARN_ACCESS_TOKEN", "tok"), ("LEARN_GUEST", "1")]);
        let backend = Backend::select(&cfg.session()).unwrap();
        assert!(matches!(backend, Backend::Remote(_)));
        assert!(matches!(cfg.user_id(&backend), Err(ConfigError::MissingUserId)));

        let cfg = config(&[("LEARN_ACCESS_TOKEN", "tok"), ("LEARN_USER_ID", "u-1")]);
        assert_eq!(cfg.user_id(&backend).unwrap(), UserId::new("u-1"));
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let cfg = config(&[("LEARN_API_BASE_URL", "not a url")]);
        assert!(matches!(
            cfg.http_api(),
            Err(ConfigError::InvalidApiBaseUrl { .. })
        ));
        assert!(config(&[]).http_api().is_ok());
    }
}

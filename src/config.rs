use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use uuid::Uuid;

use crate::db::Database;

/// Where rows are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// SQLite file on this machine.
    Local { path: PathBuf },
    /// Hosted PostgREST backend, signed in with an existing access token.
    Hosted {
        url: String,
        anon_key: String,
        access_token: String,
        user_id: Uuid,
        email: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| anyhow!("{} must be set when APPLYTRACK_URL is set", key))
        };

        let backend = match get("APPLYTRACK_URL") {
            Some(url) => {
                let user_id = require("APPLYTRACK_USER_ID")?;
                Backend::Hosted {
                    url,
                    anon_key: require("APPLYTRACK_ANON_KEY")?,
                    access_token: require("APPLYTRACK_ACCESS_TOKEN")?,
                    user_id: Uuid::parse_str(&user_id)
                        .with_context(|| format!("APPLYTRACK_USER_ID is not a UUID: {}", user_id))?,
                    email: get("APPLYTRACK_USER_EMAIL").unwrap_or_default(),
                }
            }
            None => {
                let path = match get("APPLYTRACK_DB") {
                    Some(path) => PathBuf::from(path),
                    None => Database::default_path()?,
                };
                Backend::Local { path }
            }
        };
        Ok(Self { backend })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_local_path_from_env() {
        let config = config(&[("APPLYTRACK_DB", "/tmp/track.db")]).unwrap();
        assert_eq!(
            config.backend,
            Backend::Local {
                path: PathBuf::from("/tmp/track.db")
            }
        );
    }

    #[test]
    fn test_hosted_requires_credentials() {
        let err = config(&[("APPLYTRACK_URL", "https://demo.example.co")]).unwrap_err();
        assert!(err.to_string().contains("APPLYTRACK_USER_ID"));

        let user = Uuid::new_v4().to_string();
        let config = config(&[
            ("APPLYTRACK_URL", "https://demo.example.co"),
            ("APPLYTRACK_ANON_KEY", "anon"),
            ("APPLYTRACK_ACCESS_TOKEN", "jwt"),
            ("APPLYTRACK_USER_ID", user.as_str()),
        ])
        .unwrap();
        match config.backend {
            Backend::Hosted { url, email, .. } => {
                assert_eq!(url, "https://demo.example.co");
                assert_eq!(email, "");
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_bad_user_id_is_reported() {
        let err = config(&[
            ("APPLYTRACK_URL", "https://demo.example.co"),
            ("APPLYTRACK_ANON_KEY", "anon"),
            ("APPLYTRACK_ACCESS_TOKEN", "jwt"),
            ("APPLYTRACK_USER_ID", "not-a-uuid"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("not a UUID"));
    }
}

//! Connection settings for a MongoDB deployment.
//!
//! Transactions need a replica set, so the rendered URI always names one. A
//! single-node deployment started with `--replSet rs0` satisfies the default.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::MongoDbStoreBuilder;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    /// Database name.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub replica_set: String,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            name: "docmodel".to_string(),
            host: "localhost".to_string(),
            port: 27017,
            user: None,
            password: None,
            replica_set: "rs0".to_string(),
        }
    }
}

impl fmt::Debug for MongoDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("replica_set", &self.replica_set)
            .finish()
    }
}

impl MongoDbConfig {
    /// Renders the connection URI. Credentials are never part of it.
    pub fn uri(&self) -> String {
        format!(
            "mongodb://{}:{}/?replicaSet={}",
            self.host, self.port, self.replica_set
        )
    }

    /// Returns a store builder for this configuration.
    ///
    /// Credentials are only applied when a user is set.
    pub fn builder(&self) -> MongoDbStoreBuilder {
        let builder = MongoDbStoreBuilder::new(&self.uri(), &self.name);

        match &self.user {
            Some(user) => builder.with_credential(
                user.clone(),
                self.password.clone().unwrap_or_default(),
            ),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uri() {
        assert_eq!(
            MongoDbConfig::default().uri(),
            "mongodb://localhost:27017/?replicaSet=rs0"
        );
    }

    #[test]
    fn test_uri_excludes_credentials() {
        let config = MongoDbConfig {
            host: "db.internal".to_string(),
            port: 27018,
            user: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };

        let uri = config.uri();

        assert_eq!(uri, "mongodb://db.internal:27018/?replicaSet=rs0");
        assert!(!uri.contains("hunter2"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: MongoDbConfig =
            serde_json::from_str(r#"{ "name": "blog", "port": 27100 }"#).unwrap();

        assert_eq!(config.name, "blog");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 27100);
        assert_eq!(config.replica_set, "rs0");
        assert!(config.user.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = MongoDbConfig {
            user: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };

        let rendered = format!("{config:?}");

        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection settings for driver-backed stores.

use super::keys;
use crate::core::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Reported to the server in the connection handshake
    pub app_name: Option<String>,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigurationError> {
        let get = |key: &str| {
            properties
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let config = Self {
            url: get(keys::URL).ok_or_else(|| ConfigurationError::missing_parameter(keys::URL))?,
            database: get(keys::DATABASE)
                .ok_or_else(|| ConfigurationError::missing_parameter(keys::DATABASE))?,
            username: get(keys::USERNAME),
            password: get(keys::PASSWORD),
            app_name: get(keys::APP_NAME),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.url.trim().is_empty() {
            return Err(ConfigurationError::missing_parameter("url"));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigurationError::missing_parameter("database"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigurationError::invalid_value(
                "password",
                "a password requires a username",
            ));
        }
        Ok(())
    }
}

// Keeps the password out of logs
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("app_name", &self.app_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_properties() {
        let mut properties = HashMap::new();
        properties.insert(keys::URL.to_string(), "mongodb://localhost:27017".to_string());
        properties.insert(keys::DATABASE.to_string(), "shop".to_string());
        properties.insert(keys::USERNAME.to_string(), "svc".to_string());
        properties.insert(keys::PASSWORD.to_string(), "hunter2".to_string());

        let config = ConnectionConfig::from_properties(&properties).unwrap();
        assert_eq!(config.database, "shop");
        assert_eq!(config.username.as_deref(), Some("svc"));
        assert_eq!(config.app_name, None);

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_missing_and_inconsistent_values() {
        let mut properties = HashMap::new();
        properties.insert(keys::URL.to_string(), "mongodb://localhost".to_string());
        let err = ConnectionConfig::from_properties(&properties).unwrap_err();
        assert!(err.to_string().contains(keys::DATABASE));

        let mut config = ConnectionConfig::new("mongodb://localhost", "db");
        config.password = Some("secret".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
        assert!(config.with_credentials("u", "p").with_app_name("etl").validate().is_ok());
    }
}

use super::error::{CouchDaoError, CouchResult};

/// Database used when `COUCH_DB` is not set. One database holds every
/// game's board and name documents; games are separated by document id.
pub const DEFAULT_DATABASE: &str = "rink-board";

/// Runtime configuration describing how to connect to CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server base URL, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding the scoreboard documents.
    pub database: String,
    /// Basic-auth user, when the server requires one.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
}

impl CouchConfig {
    /// Configuration against the default scoreboard database.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: DEFAULT_DATABASE.to_string(),
            username: None,
            password: None,
        }
    }

    /// Point the configuration at a different database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Attach basic-auth credentials to the configuration.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Build a configuration from the environment. `COUCH_BASE_URL` is
    /// required; `COUCH_DB` and the credential pair are optional.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;

        let mut config = Self::new(base_url);

        if let Ok(database) = std::env::var("COUCH_DB") {
            config = config.with_database(database);
        }

        if let (Some(username), Some(password)) = (
            std::env::var("COUCH_USERNAME").ok(),
            std::env::var("COUCH_PASSWORD").ok(),
        ) {
            config = config.with_credentials(username, password);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_scoreboard_database() {
        let config = CouchConfig::new("http://localhost:5984");
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert_eq!(config.username, None);
    }

    #[test]
    fn builders_override_database_and_credentials() {
        let config = CouchConfig::new("http://couch:5984")
            .with_database("league-finals")
            .with_credentials("admin", "hunter2");

        assert_eq!(config.database, "league-finals");
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }
}

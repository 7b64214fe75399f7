use serde::Deserialize;

/// PostgreSQL connection config from pipeline YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Upper bound of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> usize {
    10
}

impl Config {
    /// Check fields serde can't.
    ///
    /// # Errors
    ///
    /// Returns every problem found, joined into one message.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        if self.host.trim().is_empty() {
            errors.push("host must not be empty".to_string());
        }
        if self.user.trim().is_empty() {
            errors.push("user must not be empty".to_string());
        }
        if self.database.trim().is_empty() {
            errors.push("database must not be empty".to_string());
        }
        if self.schema.trim().is_empty() {
            errors.push("schema must not be empty".to_string());
        }
        if self.max_connections == 0 {
            errors.push(format!(
                "Invalid max_connections: {}. Must be at least 1",
                self.max_connections
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    /// Human-readable target, without credentials.
    #[must_use]
    pub fn target(&self) -> String {
        format!(
            "{}:{}/{} (schema: {})",
            self.host, self.port, self.database, self.schema
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config: Config =
            serde_yaml::from_str("host: db\nuser: etl\ndatabase: defi\n").unwrap();
        assert_eq!(config.port, 5432);
        assert_eq!(config.schema, "public");
        assert_eq!(config.max_connections, 10);
        assert!(config.password.is_empty());
        assert!(config.validate().is_ok());
        assert_eq!(config.target(), "db:5432/defi (schema: public)");
    }

    #[test]
    fn validate_reports_all_problems() {
        let config: Config = serde_yaml::from_str(
            "host: ''\nuser: etl\ndatabase: ''\nmax_connections: 0\n",
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("host"), "{err}");
        assert!(err.contains("database"), "{err}");
        assert!(err.contains("max_connections"), "{err}");
    }
}

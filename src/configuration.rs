/// Application configuration
///
/// Loaded from an optional `configuration.yaml` in the working directory,
/// then overridden by `APP_`-prefixed environment variables using `__` as
/// the nesting separator (e.g. `APP_JWT__SECRET`).

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    /// sqlx connection URL, e.g. `sqlite://shoply.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// JWT signing settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    /// HMAC algorithm name: HS256, HS384 or HS512
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
}

// Keeps the secret out of debug logs
impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("refresh_token_expire_days", &self.refresh_token_expire_days)
            .finish()
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000_i64)?
        .set_default("database.url", "sqlite://shoply.db")?
        .set_default("database.max_connections", 5_i64)?
        .set_default("jwt.secret", "")?
        .set_default("jwt.algorithm", "HS256")?
        .set_default("jwt.access_token_expire_minutes", 15_i64)?
        .set_default("jwt.refresh_token_expire_days", 30_i64)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_settings_debug_redacts_secret() {
        let settings = JwtSettings {
            secret: "super-secret-value".to_string(),
            algorithm: "HS256".to_string(),
            access_token_expire_minutes: 15,
            refresh_token_expire_days: 30,
        };

        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("HS256"));
    }

    #[test]
    fn in_memory_urls_are_detected() {
        let memory = DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        };
        let file = DatabaseSettings {
            url: "sqlite://shoply.db".to_string(),
            max_connections: 5,
        };

        assert!(memory.is_in_memory());
        assert!(!file.is_in_memory());
    }
}

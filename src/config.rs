use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Server settings, read from `IMAGE_COMPRESSOR_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JSON body limit; uploads arrive base64 encoded.
    pub max_upload_bytes: usize,
    pub cors_max_age: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8002,
            max_upload_bytes: 64 * 1024 * 1024,
            cors_max_age: 3600,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            host: lookup("IMAGE_COMPRESSOR_HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "IMAGE_COMPRESSOR_PORT")?.unwrap_or(defaults.port),
            max_upload_bytes: match parse::<usize>(&lookup, "IMAGE_COMPRESSOR_MAX_UPLOAD_MB")? {
                None => defaults.max_upload_bytes,
                Some(mb) => mb.checked_mul(1024 * 1024).ok_or_else(|| ConfigError::InvalidValue {
                    key: "IMAGE_COMPRESSOR_MAX_UPLOAD_MB",
                    value: mb.to_string(),
                })?,
            },
            cors_max_age: parse(&lookup, "IMAGE_COMPRESSOR_CORS_MAX_AGE")?.unwrap_or(defaults.cors_max_age),
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_address(), ("0.0.0.0".to_string(), 8002));
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("IMAGE_COMPRESSOR_HOST", "127.0.0.1"),
            ("IMAGE_COMPRESSOR_PORT", "9000"),
            ("IMAGE_COMPRESSOR_MAX_UPLOAD_MB", "8"),
        ]))
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_upload_bytes, 8 * 1024 * 1024);
        assert_eq!(config.cors_max_age, 3600);
    }

    #[test]
    fn rejects_upload_limit_that_overflows() {
        let huge = (usize::MAX / 1024).to_string();
        let err = ServerConfig::from_lookup(lookup_from(&[("IMAGE_COMPRESSOR_MAX_UPLOAD_MB", huge.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "IMAGE_COMPRESSOR_MAX_UPLOAD_MB", .. }));
    }

    #[test]
    fn rejects_bad_port() {
        let err = ServerConfig::from_lookup(lookup_from(&[("IMAGE_COMPRESSOR_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "IMAGE_COMPRESSOR_PORT", .. }));
    }
}

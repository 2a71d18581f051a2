use std::env;

use super::types::{ConfigError, Environment};

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:3000", "http://127.0.0.1:3000", "http://localhost:5173"];

pub(super) fn env_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(_) => None,
    }
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

/// Accepts either a JSON array of origins or a comma-separated list; an
/// empty or missing value falls back to the localhost development origins.
pub(super) fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let raw = match value {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(default_cors_origins()),
    };

    let origins = if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        parsed.into_iter().map(|item| item.trim().to_string()).filter(|item| !item.is_empty()).collect()
    } else {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect::<Vec<String>>()
    };

    if origins.is_empty() {
        return Ok(default_cors_origins());
    }
    Ok(origins)
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    let Some(raw) = value else {
        return Environment::Development;
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "production" | "prod" => Environment::Production,
        "staging" => Environment::Staging,
        "test" | "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins_accept_a_json_array() {
        let parsed =
            parse_cors_origins(Some("[\"http://a\", \" http://b \"]".to_string())).expect("json");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn cors_origins_accept_a_comma_list() {
        let parsed = parse_cors_origins(Some("http://a, http://b,,".to_string())).expect("csv");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn cors_origins_fall_back_to_localhost_defaults() {
        assert_eq!(parse_cors_origins(None).expect("none"), default_cors_origins());
        assert_eq!(parse_cors_origins(Some(" ".to_string())).expect("blank"), default_cors_origins());
        assert_eq!(parse_cors_origins(Some("[]".to_string())).expect("empty"), default_cors_origins());
    }

    #[test]
    fn cors_origins_reject_malformed_json() {
        assert!(parse_cors_origins(Some("[\"http://a\"".to_string())).is_err());
    }

    #[test]
    fn parse_bool_variants() {
        for value in ["1", "true", "TRUE", "yes", "on", " On "] {
            assert!(parse_bool(value), "{value} should parse as true");
        }
        for value in ["0", "false", "off", "", "definitely"] {
            assert!(!parse_bool(value), "{value} should parse as false");
        }
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment(Some("prod".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("Production".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("staging".to_string())), Environment::Staging);
        assert_eq!(parse_environment(Some("testing".to_string())), Environment::Test);
        assert_eq!(parse_environment(Some("weird".to_string())), Environment::Development);
        assert_eq!(parse_environment(None), Environment::Development);
    }

    #[test]
    fn parse_u64_rejects_garbage() {
        assert!(parse_u64("SUPABASE_TIMEOUT_SECONDS", "ten".to_string()).is_err());
        assert_eq!(parse_u64("SUPABASE_TIMEOUT_SECONDS", "10".to_string()).unwrap(), 10);
    }
}

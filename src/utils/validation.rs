use crate::utils::error::{ConsoleError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub const HTTP_SCHEMES: &[&str] = &["http", "https"];
pub const WS_SCHEMES: &[&str] = &["ws", "wss"];

pub fn validate_url(field_name: &str, url_str: &str, allowed_schemes: &[&str]) -> Result<Url> {
    if url_str.is_empty() {
        return Err(ConsoleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => {
            if allowed_schemes.contains(&url.scheme()) {
                Ok(url)
            } else {
                Err(ConsoleError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: url_str.to_string(),
                    reason: format!(
                        "Unsupported URL scheme: {}. Allowed schemes: {}",
                        url.scheme(),
                        allowed_schemes.join(", ")
                    ),
                })
            }
        }
        Err(e) => Err(ConsoleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(ConsoleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConsoleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN 不會落在任何區間內
    if !(value >= min && value <= max) {
        return Err(ConsoleError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api_base_url", "https://example.com", HTTP_SCHEMES).is_ok());
        assert!(validate_url("api_base_url", "http://localhost:5000", HTTP_SCHEMES).is_ok());
        assert!(validate_url("api_base_url", "", HTTP_SCHEMES).is_err());
        assert!(validate_url("api_base_url", "invalid-url", HTTP_SCHEMES).is_err());
        assert!(validate_url("api_base_url", "ws://localhost:5000", HTTP_SCHEMES).is_err());
        assert!(validate_url("stream_base_url", "wss://stream.example.com/ws", WS_SCHEMES).is_ok());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("buffer_capacity", 10_000, 1).is_ok());
        assert!(validate_positive_number("buffer_capacity", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range_rejects_nan() {
        assert!(validate_range("min_months", 1.0, 0.0, 120.0).is_ok());
        assert!(validate_range("min_months", f64::NAN, 0.0, 120.0).is_err());
        assert!(validate_range("min_months", -1.0, 0.0, 120.0).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("channel.key", "TRAINING").is_ok());
        assert!(validate_non_empty_string("channel.key", "   ").is_err());
    }
}

//! Configuration validation
//!
//! Validates FollowGraph configuration for correctness:
//! - The API base URL is an http(s) URL
//! - Sizes and counts that drive loops are non-zero
//! - Retry delays are ordered
//! - Graph size parameters are finite and positive

use super::followgraph_config::FollowGraphConfig;
use crate::FollowGraphError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a FollowGraph configuration
pub fn validate_config(config: &FollowGraphConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let base_url = &config.api.base_url;
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        errors.push(ValidationError::new(
            "api.base_url",
            format!("Invalid API URL: {}", base_url),
        ));
    }

    if config.api.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "api.timeout_secs",
            "Timeout must be greater than 0",
        ));
    }

    if config.fetch.page_size == 0 {
        errors.push(ValidationError::new(
            "fetch.page_size",
            "Page size must be greater than 0",
        ));
    }

    if config.fetch.batch_size == 0 {
        errors.push(ValidationError::new(
            "fetch.batch_size",
            "Batch size must be greater than 0",
        ));
    }

    if config.fetch.page_progress_every == 0 || config.fetch.progress_milestone == 0 {
        errors.push(ValidationError::new(
            "fetch",
            "Progress cadence must be greater than 0",
        ));
    }

    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            format!(
                "Base delay ({}ms) exceeds max delay ({}ms)",
                config.retry.base_delay_ms, config.retry.max_delay_ms
            ),
        ));
    }

    if let Err(e) = config.graph.size.validate() {
        errors.push(ValidationError::new("graph.size", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and convert errors into a single [`FollowGraphError::Config`]
pub fn validate_config_result(config: &FollowGraphConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        FollowGraphError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}

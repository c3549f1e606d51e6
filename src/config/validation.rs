use crate::config::types::{Config, DelayConfig, OutputConfig, ScraperConfig, SessionConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on the retry budget; beyond this a page is clearly not coming back
const MAX_RETRY_BUDGET: u32 = 20;

/// Longest delay accepted for either range (one day)
const MAX_DELAY_SECONDS: f64 = 86_400.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_delay_config(&config.delay)?;
    validate_session_config(&config.session)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates target site and HTTP client settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    // Page paths are appended to the base path; a query or fragment would swallow them
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must not carry a query or fragment; use path-template instead",
            config.base_url
        )));
    }

    if config.save_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "save-path cannot be empty".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.max_retries > MAX_RETRY_BUDGET {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= {}, got {}",
            MAX_RETRY_BUDGET, config.max_retries
        )));
    }

    Ok(())
}

/// Validates both delay ranges
fn validate_delay_config(config: &DelayConfig) -> Result<(), ConfigError> {
    validate_range("delay", config.page_range())?;
    validate_range("retry delay", config.retry_range())?;
    Ok(())
}

fn validate_range(label: &str, (min, max): (f64, f64)) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() || min < 0.0 || max < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} bounds must be finite and non-negative, got ({}, {})",
            label, min, max
        )));
    }

    if max > MAX_DELAY_SECONDS {
        return Err(ConfigError::Validation(format!(
            "{} maximum ({}) exceeds the {} second limit",
            label, max, MAX_DELAY_SECONDS
        )));
    }

    if min > max {
        return Err(ConfigError::Validation(format!(
            "{} minimum ({}) exceeds maximum ({})",
            label, min, max
        )));
    }

    Ok(())
}

/// Validates templates and stop conditions
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.path_template.is_empty() {
        return Err(ConfigError::Validation(
            "path-template cannot be empty".to_string(),
        ));
    }

    if config.path_template.contains('#') {
        return Err(ConfigError::Validation(format!(
            "path-template '{}' must not contain a fragment",
            config.path_template
        )));
    }

    // Unmatched parameters become the query string
    if config.param_path_template.contains('?') || config.param_path_template.contains('#') {
        return Err(ConfigError::Validation(format!(
            "param-path-template '{}' must be a plain path",
            config.param_path_template
        )));
    }

    validate_filename_template("filename-template", &config.filename_template, "{page}")?;
    validate_filename_template(
        "param-filename-template",
        &config.param_filename_template,
        "{index}",
    )?;

    if config.stop_after_failures == Some(0) {
        return Err(ConfigError::Validation(
            "stop-after-failures must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_filename_template(
    label: &str,
    template: &str,
    placeholder: &str,
) -> Result<(), ConfigError> {
    if template.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", label)));
    }

    if !template.contains(placeholder) {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must contain {}",
            label, template, placeholder
        )));
    }

    if template.contains('/') || template.contains('\\') {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must be a bare filename",
            label, template
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.export_name.is_empty() {
        return Err(ConfigError::Validation(
            "export-name cannot be empty".to_string(),
        ));
    }

    Ok(())
}

use crate::config::types::{Config, CrawlerConfig, MarketplaceConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_marketplace_config(&config.marketplace)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl scheduling and retry configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // fetch_limit 0 means unlimited, any value is acceptable

    if !config.recrawl_hours.is_finite() || config.recrawl_hours < 0.0 {
        return Err(ConfigError::Validation(format!(
            "recrawl-hours must be a finite value >= 0, got {}",
            config.recrawl_hours
        )));
    }

    if config.rate_limit_wait_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "rate-limit-wait-seconds must be >= 1, got {}",
            config.rate_limit_wait_seconds
        )));
    }

    if config.rate_limit_max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "rate-limit-max-attempts must be >= 1, got {}",
            config.rate_limit_max_attempts
        )));
    }

    if config.fetch_timeout_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch-timeout-seconds must be >= 1, got {}",
            config.fetch_timeout_seconds
        )));
    }

    if config.max_search_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-search-pages must be >= 1, got {}",
            config.max_search_pages
        )));
    }

    Ok(())
}

/// Validates the marketplace traversal configuration
fn validate_marketplace_config(config: &MarketplaceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url must use an http(s) scheme, got '{}'",
            url.scheme()
        )));
    }

    if config.categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one category is required".to_string(),
        ));
    }

    for slug in &config.categories {
        validate_category_slug(slug)?;
    }

    Ok(())
}

/// Validates a category slug as it appears in search page URLs
fn validate_category_slug(slug: &str) -> Result<(), ConfigError> {
    if slug.is_empty() {
        return Err(ConfigError::Validation(
            "category slug cannot be empty".to_string(),
        ));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "category slug '{}' must contain only alphanumeric characters and hyphens",
            slug
        )));
    }

    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(ConfigError::Validation(format!(
            "category slug '{}' cannot start or end with '-'",
            slug
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            crawler: CrawlerConfig::default(),
            marketplace: MarketplaceConfig {
                base_url: "https://www.marktplaats.nl".to_string(),
                categories: vec!["fietsen-en-brommers".to_string()],
            },
            output: OutputConfig {
                data_dir: "./data".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&create_test_config()).is_ok());
    }

    #[test]
    fn test_negative_recrawl_hours_rejected() {
        let mut config = create_test_config();
        config.crawler.recrawl_hours = -1.0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_nan_recrawl_hours_rejected() {
        let mut config = create_test_config();
        config.crawler.recrawl_hours = f64::NAN;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_recrawl_hours_allowed() {
        let mut config = create_test_config();
        config.crawler.recrawl_hours = 0.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = create_test_config();
        config.crawler.rate_limit_max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = create_test_config();
        config.crawler.fetch_timeout_seconds = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut config = create_test_config();
        config.marketplace.base_url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let mut config = create_test_config();
        config.marketplace.base_url = "ftp://marktplaats.nl".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_categories_rejected() {
        let mut config = create_test_config();
        config.marketplace.categories.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_category_slug_rules() {
        assert!(validate_category_slug("fietsen-en-brommers").is_ok());
        assert!(validate_category_slug("audio-tv-en-foto").is_ok());

        assert!(validate_category_slug("").is_err());
        assert!(validate_category_slug("-leading").is_err());
        assert!(validate_category_slug("trailing-").is_err());
        assert!(validate_category_slug("spaced slug").is_err());
    }

    #[test]
    fn test_empty_data_dir_rejected() {
        let mut config = create_test_config();
        config.output.data_dir = String::new();
        assert!(validate(&config).is_err());
    }
}

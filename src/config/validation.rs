use crate::config::types::{CategoryConfig, Config, DelayPolicy};
use crate::resume::ResumeMode;
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
///
/// Every problem found here is fatal and reported before any network
/// activity takes place.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.site.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "site.name cannot be empty".to_string(),
        ));
    }

    if config.output.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output.path cannot be empty".to_string(),
        ));
    }

    validate_delay(&config.crawl.delay)?;

    if config.categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[category]] is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for category in &config.categories {
        if !names.insert(category.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category name '{}'",
                category.name
            )));
        }
        validate_category(category)?;
    }

    Ok(())
}

fn validate_delay(delay: &DelayPolicy) -> Result<(), ConfigError> {
    match *delay {
        DelayPolicy::Fixed(secs) if secs < 0.0 => Err(ConfigError::Validation(format!(
            "delay must be non-negative, got {}",
            secs
        ))),
        DelayPolicy::Range(min, max) if min < 0.0 || max < min => {
            Err(ConfigError::Validation(format!(
                "delay range must satisfy 0 <= min <= max, got [{}, {}]",
                min, max
            )))
        }
        _ => Ok(()),
    }
}

fn validate_category(category: &CategoryConfig) -> Result<(), ConfigError> {
    if category.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "category name cannot be empty".to_string(),
        ));
    }

    // The archive URL must be a list/category page, not the site root:
    // a root URL almost always means the item selector will match nav
    // chrome instead of articles.
    let url = Url::parse(&category.archive_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", category.archive_url, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "archive-url must be http(s), got '{}'",
            category.archive_url
        )));
    }
    if url.path().len() <= 1 && url.query().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "archive-url '{}' looks like a site root; point it at a category/archive page",
            category.archive_url
        )));
    }

    validate_selector(&category.name, "item-selector", &category.item_selector)?;
    validate_selector(
        &category.name,
        "content-selector",
        &category.content_selector,
    )?;
    validate_selector(
        &category.name,
        "thumbnail-selector",
        &category.thumbnail_selector,
    )?;

    match category.pagination.as_str() {
        "none" => Ok(()),
        "queryparam" => {
            let template = category.pagination_param.as_deref().unwrap_or("");
            if !template.contains("{n}") {
                return Err(ConfigError::Validation(format!(
                    "category '{}': queryparam pagination needs a pagination-param containing {{n}}, e.g. \"?page={{n}}\"",
                    category.name
                )));
            }
            Ok(())
        }
        "click" => {
            let button = category.pagination_param.as_deref().unwrap_or("");
            if button.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "category '{}': click pagination needs the button selector as pagination-param",
                    category.name
                )));
            }
            validate_selector(&category.name, "pagination-param", button)
        }
        "scroll" => Err(ConfigError::UnsupportedPagination("scroll".to_string())),
        other => Err(ConfigError::Validation(format!(
            "category '{}': unknown pagination strategy '{}'",
            category.name, other
        ))),
    }
}

fn validate_selector(category: &str, field: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        field: format!("category '{}' {}", category, field),
        selector: selector.to_string(),
    })?;
    Ok(())
}

/// Validates a resume request against the configuration
///
/// Cursor resume only composes with queryparam pagination: that is the one
/// strategy whose page identity does not depend on interaction history.
pub fn validate_resume(config: &Config, resume: &ResumeMode) -> Result<(), ConfigError> {
    let ResumeMode::Cursor { category, page } = resume else {
        return Ok(());
    };

    if *page < 1 {
        return Err(ConfigError::IncompatibleResume(
            "resume page index must be >= 1".to_string(),
        ));
    }

    let Some(target) = config.categories.iter().find(|c| &c.name == category) else {
        return Err(ConfigError::IncompatibleResume(format!(
            "resume category '{}' is not in the configuration",
            category
        )));
    };

    if target.pagination != "queryparam" {
        return Err(ConfigError::IncompatibleResume(format!(
            "cursor resume requires queryparam pagination, but category '{}' uses '{}'",
            category, target.pagination
        )));
    }

    Ok(())
}

//! Domain-specific shared validations and formatting utilities

use regex::Regex;

use crate::errors::AppError;

pub const DEFAULT_PUBMED_RESULTS: u32 = 5;
pub const DEFAULT_TRIALS_RESULTS: u32 = 10;
pub const DEFAULT_ICD_RESULTS: u32 = 10;
pub const MAX_RESULTS_LIMIT: u32 = 50;

pub const VALID_SEARCH_TYPES: [&str; 3] = ["general", "label", "adverse_events"];
pub const VALID_LANGUAGES: [&str; 2] = ["en", "es"];
pub const VALID_TRIAL_STATUSES: [&str; 5] =
    ["recruiting", "completed", "active", "not_recruiting", "all"];

const ICD10_CODE_FORMAT: &str = r"^[A-TV-Z][0-9][0-9A-Z](\.[0-9A-Z]{1,4})?$";

pub fn require_text(
    value: &str,
    code: &'static str,
    message: &'static str,
) -> Result<String, AppError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(AppError::bad_request(code, message));
    }
    Ok(normalized.to_string())
}

pub fn normalize_search_type(search_type: Option<String>) -> Result<String, AppError> {
    let Some(value) = search_type else {
        return Ok("general".to_string());
    };

    let normalized = value.trim().to_ascii_lowercase();
    if !VALID_SEARCH_TYPES.contains(&normalized.as_str()) {
        return Err(AppError::bad_request(
            "invalid_search_type",
            "search_type must be one of: general, label, adverse_events",
        ));
    }

    Ok(normalized)
}

pub fn normalize_language(language: Option<String>) -> Result<String, AppError> {
    let Some(value) = language else {
        return Ok("en".to_string());
    };

    let normalized = value.trim().to_ascii_lowercase();
    if !VALID_LANGUAGES.contains(&normalized.as_str()) {
        return Err(AppError::bad_request(
            "invalid_language",
            "language must be one of: en, es",
        ));
    }

    Ok(normalized)
}

pub fn normalize_trial_status(status: Option<String>) -> Result<String, AppError> {
    let Some(value) = status else {
        return Ok("recruiting".to_string());
    };

    let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    if !VALID_TRIAL_STATUSES.contains(&normalized.as_str()) {
        return Err(AppError::bad_request(
            "invalid_status",
            "status must be one of: recruiting, completed, active, not_recruiting, all",
        ));
    }

    Ok(normalized)
}

pub fn normalize_max_results(value: Option<u32>, default: u32) -> Result<u32, AppError> {
    let resolved = value.unwrap_or(default);
    if resolved == 0 || resolved > MAX_RESULTS_LIMIT {
        return Err(AppError::bad_request(
            "invalid_max_results",
            "max_results must be between 1 and 50",
        ));
    }
    Ok(resolved)
}

/// `date_range` limits results to articles from the last N years.
pub fn normalize_date_range(date_range: Option<String>) -> Result<Option<String>, AppError> {
    let Some(value) = date_range else {
        return Ok(None);
    };

    let normalized = value.trim();
    if normalized.is_empty() {
        return Ok(None);
    }

    if normalized.len() > 3 || !normalized.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::bad_request(
            "invalid_date_range",
            "date_range must be a number of years, e.g. '5'",
        ));
    }

    Ok(Some(normalized.to_string()))
}

pub fn normalize_icd_code(code: Option<String>) -> Result<Option<String>, AppError> {
    let Some(value) = code else {
        return Ok(None);
    };

    let normalized = value.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Ok(None);
    }

    let format = Regex::new(ICD10_CODE_FORMAT).expect("valid icd-10 pattern");
    if !format.is_match(&normalized) {
        return Err(AppError::bad_request(
            "invalid_icd_code",
            "code must be an ICD-10 code such as E11 or E11.9",
        ));
    }

    Ok(Some(normalized))
}

//! Validation Traits
//!
//! Input checks shared by the conversion handlers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{MAX_CURRENCY_CODE_LEN, MIN_CURRENCY_CODE_LEN};
use crate::error::{ApiError, ApiResult};

static CURRENCY_CODE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(&format!(
        "^[A-Za-z0-9]{{{},{}}}$",
        MIN_CURRENCY_CODE_LEN, MAX_CURRENCY_CODE_LEN
    ))
    .ok()
});

/// Trait for validating non-empty strings.
///
/// # Example
/// ```ignore
/// use fxrate_api::validation::ValidateNonEmpty;
///
/// fn convert(from: Option<String>) -> ApiResult<()> {
///     from.validate_non_empty("from")?;
///     // ... rest of logic
/// }
/// ```
pub trait ValidateNonEmpty {
    /// Returns `ApiError::missing_field` if the value is absent, empty or
    /// whitespace-only.
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        if self.trim().is_empty() {
            return Err(ApiError::missing_field(field_name));
        }
        Ok(())
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        self.as_str().validate_non_empty(field_name)
    }
}

impl<T: ValidateNonEmpty> ValidateNonEmpty for Option<T> {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        match self {
            Some(value) => value.validate_non_empty(field_name),
            None => Err(ApiError::missing_field(field_name)),
        }
    }
}

/// Trait for validating currency codes.
///
/// Codes are 3 to 10 ASCII alphanumerics, any case. Surrounding whitespace
/// is ignored.
pub trait ValidateCurrencyCode {
    fn validate_currency_code(&self, field_name: &str) -> ApiResult<()>;
}

impl ValidateCurrencyCode for str {
    fn validate_currency_code(&self, field_name: &str) -> ApiResult<()> {
        self.validate_non_empty(field_name)?;
        let matches = CURRENCY_CODE
            .as_ref()
            .map(|re| re.is_match(self.trim()))
            .unwrap_or(false);
        if !matches {
            return Err(ApiError::invalid_format(
                field_name,
                &format!(
                    "{}-{} alphanumeric characters",
                    MIN_CURRENCY_CODE_LEN, MAX_CURRENCY_CODE_LEN
                ),
            ));
        }
        Ok(())
    }
}

impl ValidateCurrencyCode for String {
    fn validate_currency_code(&self, field_name: &str) -> ApiResult<()> {
        self.as_str().validate_currency_code(field_name)
    }
}

/// Trait for validating floating point inputs.
pub trait ValidateFinite {
    /// Reject NaN and infinities.
    fn validate_finite(&self, field_name: &str) -> ApiResult<()>;
}

macro_rules! impl_validate_finite {
    ($($t:ty),*) => {
        $(
            impl ValidateFinite for $t {
                fn validate_finite(&self, field_name: &str) -> ApiResult<()> {
                    if !self.is_finite() {
                        return Err(ApiError::validation_failed(format!(
                            "Field '{}' must be a finite number",
                            field_name
                        ))
                        .with_details(serde_json::json!({ "field": field_name })));
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_validate_finite!(f32, f64);

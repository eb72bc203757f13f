//! Validation Traits
//!
//! Input checks shared by the route handlers and the service layer. Failures
//! are reported as [`GoodsError::Validation`], which the HTTP layer maps to
//! `400 Bad Request`.

use goods_core::{GoodsError, GoodsResult};

/// Trait for validating non-empty strings.
///
/// # Example
/// ```ignore
/// use goods_api::validation::ValidateNonEmpty;
///
/// fn create(name: &str) -> GoodsResult<()> {
///     name.validate_non_empty("name")?;
///     // ... rest of logic
/// }
/// ```
pub trait ValidateNonEmpty {
    /// Fails when the value is empty or whitespace-only.
    fn validate_non_empty(&self, field_name: &str) -> GoodsResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> GoodsResult<()> {
        if self.trim().is_empty() {
            return Err(GoodsError::validation(field_name, "must not be empty"));
        }
        Ok(())
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> GoodsResult<()> {
        self.as_str().validate_non_empty(field_name)
    }
}

/// Trait for validating numeric ranges.
pub trait ValidateRange {
    /// Validate that the value is positive (> 0).
    fn validate_positive(&self, field_name: &str) -> GoodsResult<()>;

    /// Validate that the value is within an inclusive range.
    fn validate_range(&self, field_name: &str, min: Self, max: Self) -> GoodsResult<()>
    where
        Self: Sized;
}

macro_rules! impl_validate_range {
    ($($t:ty),*) => {
        $(
            impl ValidateRange for $t {
                fn validate_positive(&self, field_name: &str) -> GoodsResult<()> {
                    if *self <= 0 as $t {
                        return Err(GoodsError::validation(field_name, "must be positive"));
                    }
                    Ok(())
                }

                fn validate_range(&self, field_name: &str, min: Self, max: Self) -> GoodsResult<()> {
                    if *self < min || *self > max {
                        return Err(GoodsError::validation(
                            field_name,
                            format!("must be between {} and {}", min, max),
                        ));
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_validate_range!(i32, i64);
impl_validate_range!(u32, u64);

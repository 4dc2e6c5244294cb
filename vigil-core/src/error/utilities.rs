use crate::{
    Error,
    error::{StorageError, ValidationError},
};

/// Extension trait for Result types to simplify database error mapping
///
/// Storage backends use this to turn driver errors into vigil storage errors
/// without repeating the same `map_err` closure on every query.
///
/// # Example
///
/// ```rust,ignore
/// use vigil_core::error::utilities::DatabaseResultExt;
///
/// sqlx::query("SELECT 1").execute(&pool).await.map_db_err_with_context("Health check failed")?;
/// ```
pub trait DatabaseResultExt<T> {
    /// Convert a database error to a vigil storage error prefixed with `context`
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> DatabaseResultExt<T> for Result<T, E> {
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(format!("{context}: {e}"))))
    }
}

/// Extension trait for turning absent or blank input into a missing-field error.
///
/// ```rust
/// use vigil_core::error::utilities::RequiredFieldExt;
///
/// let ip = Some("10.0.0.50").require_field("ipAddress").unwrap();
/// assert_eq!(ip, "10.0.0.50");
/// assert!("  ".require_field("id").is_err());
/// ```
pub trait RequiredFieldExt<T> {
    fn require_field(self, field_name: &str) -> Result<T, ValidationError>;
}

impl<T> RequiredFieldExt<T> for Option<T> {
    fn require_field(self, field_name: &str) -> Result<T, ValidationError> {
        self.ok_or_else(|| ValidationError::MissingField(field_name.to_string()))
    }
}

/// Blank strings count as missing.
impl<'a> RequiredFieldExt<&'a str> for &'a str {
    fn require_field(self, field_name: &str) -> Result<&'a str, ValidationError> {
        let trimmed = self.trim();
        if trimmed.is_empty() {
            Err(ValidationError::MissingField(field_name.to_string()))
        } else {
            Ok(trimmed)
        }
    }
}

/// Log a driver error and replace it with a storage error carrying only `context`.
///
/// The driver message goes to the log, not to the caller. Extra
/// `name = value` pairs become fields on the log event.
///
/// ```rust,ignore
/// use vigil_core::map_storage_err;
///
/// map_storage_err!(query.execute(&pool).await, "Failed to block IP", ip = ip_address)?;
/// ```
#[macro_export]
macro_rules! map_storage_err {
    ($result:expr, $context:expr $(, $field:ident = $value:expr)* $(,)?) => {
        $result.map_err(|e| {
            ::tracing::error!(error = %e, $($field = %$value,)* "{}", $context);
            $crate::Error::Storage($crate::error::StorageError::Database(
                ::std::string::ToString::to_string(&$context),
            ))
        })
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_result_ext_with_context() {
        let error_result: Result<i32, &str> = Err("timeout");
        match error_result
            .map_db_err_with_context("Failed to append security log")
            .unwrap_err()
        {
            Error::Storage(StorageError::Database(msg)) => {
                assert_eq!(msg, "Failed to append security log: timeout");
            }
            _ => panic!("Expected storage database error"),
        }
    }

    #[test]
    fn test_required_field_option() {
        assert_eq!(Some(7).require_field("userId").unwrap(), 7);

        let none: Option<String> = None;
        match none.require_field("email").unwrap_err() {
            ValidationError::MissingField(field) => assert_eq!(field, "email"),
            _ => panic!("Expected missing field error"),
        }
    }

    #[test]
    fn test_required_field_blank_str() {
        assert_eq!(" 10.0.0.50 ".require_field("ipAddress").unwrap(), "10.0.0.50");
        assert!("".require_field("id").is_err());
        assert!("\t ".require_field("id").is_err());
    }

    #[test]
    fn test_map_storage_err_hides_driver_message() {
        let ip_address = "10.0.0.50";
        let result: Result<(), &str> = Err("UNIQUE constraint failed: blocked_ips.ip_address");

        match map_storage_err!(result, "Failed to block IP", ip = ip_address).unwrap_err() {
            Error::Storage(StorageError::Database(msg)) => {
                assert_eq!(msg, "Failed to block IP");
            }
            _ => panic!("Expected storage database error"),
        }
    }

    #[test]
    fn test_map_storage_err_passes_ok_through() {
        let result: Result<u64, &str> = Ok(3);
        assert_eq!(map_storage_err!(result, "Failed to purge").unwrap(), 3);
    }
}

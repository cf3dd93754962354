//! Column conversions and error mapping shared by the repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Wrap a failure that happened outside diesel (e.g. opening the file).
pub fn connection_error(e: impl std::fmt::Display) -> DieselError {
    DieselError::DatabaseError(DatabaseErrorKind::UnableToSendCommand, Box::new(e.to_string()))
}

/// SQLite has no boolean type; flags are stored as 0/1.
pub fn flag(value: bool) -> i32 {
    i32::from(value)
}

/// Clamp a non-negative counter into an INTEGER column.
pub fn to_db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Read an INTEGER column back as a non-negative counter.
pub fn from_db_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

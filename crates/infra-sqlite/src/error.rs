// sqlx::Error -> AppError

use keyrelay_core::domain::UniqueField;
use keyrelay_core::error::AppError;

/// Convert sqlx::Error to AppError with structured information
///
/// Unique violations on `users` become `AppError::Conflict` carrying the
/// user-facing "has already been taken" message for the offending column.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            match db_err.code().as_deref() {
                // SQLite extended result codes: https://www.sqlite.org/rescode.html
                Some("2067") | Some("1555") => match violated_user_column(message) {
                    Some(field) => AppError::Conflict(field.taken_message()),
                    None => AppError::Conflict(format!("Unique constraint violation: {}", message)),
                },
                Some("5") => AppError::Database(format!("Database locked (SQLITE_BUSY): {}", message)),
                Some("13") => AppError::Database(format!("Database full: {}", message)),
                Some(code) => AppError::Database(format!("Database error [{}]: {}", code, message)),
                None => AppError::Database(format!("Database error: {}", message)),
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

/// "UNIQUE constraint failed: users.email" -> Email
fn violated_user_column(message: &str) -> Option<UniqueField> {
    let columns = message.split("UNIQUE constraint failed:").nth(1)?;
    let first = columns.split(',').next()?.trim();
    let column = first.strip_prefix("users.")?;
    UniqueField::from_column(column)
}

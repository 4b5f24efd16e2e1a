// sqlx::Error -> AppError mapping

use eqsans_core::error::AppError;

/// Convert sqlx::Error to AppError with structured information.
///
/// Unique violations become `Conflict`; they mean a duplicate remote id and
/// are never retried.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Conflict(format!(
                        "Unique constraint violation: {}",
                        db_err.message()
                    )),
                    "787" | "3850" => AppError::Database(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

pub(crate) fn decode_json(column: &str, raw: &str) -> Result<serde_json::Value, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Database(format!("corrupt JSON in column {}: {}", column, e)))
}

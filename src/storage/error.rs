use std::fmt;

use thiserror::Error;

/// Which storage constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    NotNull,
    Check,
    Other,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Unique => "unique",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
            ConstraintKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("constraint violation ({kind}): {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },

    /// The database stayed locked by another writer past the busy timeout.
    #[error("database busy: {0}")]
    Conflict(String),

    #[error("transaction cancelled")]
    Cancelled,

    #[error("tx error: {error}, rollback error: {rollback}")]
    RollbackFailed {
        error: Box<StoreError>,
        #[source]
        rollback: sqlx::Error,
    },

    #[error("invalid row: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_CONSTRAINT: i32 = 19;

/// Primary SQLite result code of an (extended) result code string.
fn primary_code(code: &str) -> Option<i32> {
    code.parse::<i32>().ok().map(|extended| extended & 0xff)
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let sqlx::Error::Database(db) = &err {
            let message = db.message().to_string();
            let constraint = match db.kind() {
                ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                ErrorKind::CheckViolation => Some(ConstraintKind::Check),
                _ => None,
            };
            if let Some(kind) = constraint {
                return StoreError::Constraint { kind, message };
            }

            match db.code().as_deref().and_then(primary_code) {
                Some(SQLITE_BUSY | SQLITE_LOCKED) => return StoreError::Conflict(message),
                Some(SQLITE_CONSTRAINT) => {
                    return StoreError::Constraint {
                        kind: ConstraintKind::Other,
                        message,
                    };
                }
                _ => {}
            }
        }

        StoreError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_code_strips_extended_bits() {
        assert_eq!(primary_code("5"), Some(SQLITE_BUSY));
        assert_eq!(primary_code("517"), Some(SQLITE_BUSY)); // SQLITE_BUSY_SNAPSHOT
        assert_eq!(primary_code("262"), Some(SQLITE_LOCKED)); // SQLITE_LOCKED_SHAREDCACHE
        assert_eq!(primary_code("787"), Some(SQLITE_CONSTRAINT)); // SQLITE_CONSTRAINT_FOREIGNKEY
        assert_eq!(primary_code("XX000"), None);
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_rollback_failure_reports_both_errors() {
        let err = StoreError::RollbackFailed {
            error: Box::new(StoreError::Cancelled),
            rollback: sqlx::Error::PoolClosed,
        };
        let message = err.to_string();
        assert!(message.contains("transaction cancelled"));
        assert!(message.contains("rollback error"));
    }
}

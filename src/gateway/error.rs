use thiserror::Error;

/// SQLSTATE reported by Postgres for an unknown relation.
pub const UNDEFINED_TABLE_CODE: &str = "42P01";
/// SQLSTATE reported by Postgres for an unknown column.
pub const UNDEFINED_COLUMN_CODE: &str = "42703";
/// SQLSTATE reported by Postgres for a unique constraint violation.
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("auth error: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode rows: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no rows returned from {table}")]
    NoRows { table: String },
}

impl GatewayError {
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        GatewayError::Api {
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn relation_missing(table: &str) -> Self {
        Self::api(
            404,
            Some(UNDEFINED_TABLE_CODE),
            format!("relation \"public.{}\" does not exist", table),
        )
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            GatewayError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// True when the backend says the table (or a column of it) is not
    /// provisioned yet. Callers treat this as "feature not available" rather
    /// than as a fault.
    pub fn is_relation_missing(&self) -> bool {
        if self.code() == Some(UNDEFINED_TABLE_CODE) {
            return true;
        }
        self.to_string().contains("does not exist")
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_missing_relation_by_code_and_message() {
        assert!(GatewayError::relation_missing("profiles").is_relation_missing());
        assert!(GatewayError::api(400, None, "relation \"x\" does not exist").is_relation_missing());
        assert!(
            GatewayError::api(400, Some(UNDEFINED_COLUMN_CODE), "column music.mood_id does not exist")
                .is_relation_missing()
        );
        assert!(!GatewayError::api(409, Some(UNIQUE_VIOLATION_CODE), "duplicate key").is_relation_missing());
        assert!(!GatewayError::Auth("Invalid login credentials".to_string()).is_relation_missing());
    }

    #[test]
    fn api_error_displays_backend_message() {
        let err = GatewayError::api(400, Some("PGRST100"), "failed to parse filter");
        assert_eq!(err.to_string(), "failed to parse filter");
        assert_eq!(err.code(), Some("PGRST100"));
    }
}

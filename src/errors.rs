use thiserror::Error;

/// Every failure a command can produce.
///
/// Handlers never let anything else escape: I/O problems, poisoned locks and
/// collaborator refusals are all folded into one of these variants before
/// control returns to the REPL, which prints the message and keeps going.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HarnessError {
    /// Wrong argument count, empty argument, or a non-number where one is required.
    #[error("{reason}. Usage: {usage}")]
    Parse { reason: String, usage: String },

    /// Direction token or coordinate that maps to no container.
    #[error("cannot route to '{0}': not a valid direction")]
    Routing(String),

    /// Non-operator running an operator-only command.
    #[error("permission denied: {0}")]
    Permission(String),

    /// New item key rejected because the container has no free slot.
    #[error("{container} is full ({capacity} item types)")]
    Capacity { container: String, capacity: usize },

    /// Unknown command name, unknown ware, or item absent from a container.
    #[error("{0}")]
    NotFound(String),

    /// The market collaborator refused the request (funds, stock, access).
    #[error("{0}")]
    Market(String),

    /// Save or reload failed, or the collaborator lock was poisoned.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl HarnessError {
    pub fn parse(reason: impl Into<String>, usage: impl Into<String>) -> Self {
        HarnessError::Parse {
            reason: reason.into(),
            usage: usage.into(),
        }
    }

    pub fn unknown_command(name: &str) -> Self {
        HarnessError::NotFound(format!(
            "Unknown command '{}'. Type 'help' for a list of commands.",
            name
        ))
    }

    /// Short category label used in debug logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Parse { .. } => "parse",
            HarnessError::Routing(_) => "routing",
            HarnessError::Permission(_) => "permission",
            HarnessError::Capacity { .. } => "capacity",
            HarnessError::NotFound(_) => "not_found",
            HarnessError::Market(_) => "market",
            HarnessError::Persistence(_) => "persistence",
        }
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(e: std::io::Error) -> Self {
        HarnessError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(e: serde_json::Error) -> Self {
        HarnessError::Persistence(format!("snapshot format: {}", e))
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_usage() {
        let err = HarnessError::parse("missing ware id", "give <ware_id> [quantity] [direction]");
        assert_eq!(
            err.to_string(),
            "missing ware id. Usage: give <ware_id> [quantity] [direction]"
        );
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn io_errors_become_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: HarnessError = io.into();
        assert_eq!(err.kind(), "persistence");
        assert!(err.to_string().contains("read-only"));
    }
}

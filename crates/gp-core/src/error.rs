use std::fmt;

/// Recoverable failures of the path engine and event log.
///
/// None of these are fatal: the caller reports them and retries with
/// corrected input. A failed operation leaves all state untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// An appended event did not carry a step strictly greater than the last one.
    OrderingViolation { last: u64, attempted: u64 },
    /// A focus or view index outside `[0, len)`.
    IndexOutOfRange { index: usize, len: usize },
    InvalidConfig(String),
    /// Malformed import/export payload.
    Wire(String),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::OrderingViolation { last, attempted } => write!(
                f,
                "ordering violation: step {attempted} is not greater than last step {last}"
            ),
            GridError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for log of length {len}")
            }
            GridError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            GridError::Wire(msg) => write!(f, "wire format error: {msg}"),
        }
    }
}

impl std::error::Error for GridError {}

impl From<serde_json::Error> for GridError {
    fn from(e: serde_json::Error) -> Self {
        GridError::Wire(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = GridError::OrderingViolation {
            last: 2,
            attempted: 2,
        };
        assert_eq!(
            e.to_string(),
            "ordering violation: step 2 is not greater than last step 2"
        );

        let e = GridError::IndexOutOfRange { index: 5, len: 3 };
        assert_eq!(e.to_string(), "index 5 out of range for log of length 3");
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(matches!(GridError::from(err), GridError::Wire(_)));
    }
}

//! Error types for timeline operations

/// Errors raised by validation and interactive timeline operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    /// Month window outside the accepted range
    #[error("monthsToShow must be between {min} and {max}, got {value}")]
    InvalidMonthsToShow { value: i64, min: u32, max: u32 },

    /// Month token not in `mon-yyyy` form
    #[error("invalid month token: '{0}'")]
    InvalidMonthToken(String),

    /// Zero-based month index outside `0..12`
    #[error("month index must be between 0 and 11, got {0}")]
    InvalidMonthIndex(u32),

    /// Required field empty
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// Too many proof links on a row
    #[error("at most {max} proofs allowed, got {count}")]
    TooManyProofs { count: usize, max: usize },

    /// Drag events for a pointer that has no session
    #[error("no active drag for pointer {0}")]
    NoActiveDrag(u32),

    /// A second drag started on a pointer that is already dragging
    #[error("pointer {0} is already dragging a card")]
    PointerBusy(u32),

    /// Node index outside the generated node list
    #[error("node index {index} out of range (len {len})")]
    NodeOutOfRange { index: usize, len: usize },
}

impl TimelineError {
    /// Name of the offending field, for validation errors
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidMonthsToShow { .. } => Some("monthsToShow"),
            Self::InvalidMonthToken(_) => Some("officialDate"),
            Self::InvalidMonthIndex(_) => Some("monthIndex"),
            Self::MissingField { field } => Some(field),
            Self::TooManyProofs { .. } => Some("proofs"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_name_their_field() {
        let err = TimelineError::MissingField { field: "Summary" };
        assert_eq!(err.field(), Some("Summary"));
        assert_eq!(err.to_string(), "Summary is required");
        assert_eq!(TimelineError::NoActiveDrag(1).field(), None);
    }
}

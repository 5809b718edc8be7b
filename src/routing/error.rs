//! Error types for the routing core

use thiserror::Error;

/// Coarse classification of a [`RoutingError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Geometry,
    SearchExhausted,
    GridIndex,
    InvariantViolation,
}

/// Errors raised by routing operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    /// Missing or unattached layer, connection or endpoint
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// Geometry that admits no anchor pair, such as overlapping boxes
    #[error("geometry error: {reason}")]
    Geometry { reason: String },

    /// The pathfinder hit its iteration cap or ran out of cells
    #[error("no route from ({},{}) to ({},{}) after {iterations} iterations", start.0, start.1, goal.0, goal.1)]
    SearchExhausted {
        iterations: usize,
        start: (i64, i64),
        goal: (i64, i64),
    },

    /// A row/column outside the built grid
    #[error("grid cell (row {row}, col {col}) is outside the grid")]
    GridIndex { row: i64, col: i64 },

    /// A connection's polyline broke one of its invariants
    #[error("invariant violated on connection {connection}: {reason}")]
    InvariantViolation { connection: usize, reason: String },
}

impl RoutingError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a geometry error
    pub fn geometry(reason: impl Into<String>) -> Self {
        Self::Geometry {
            reason: reason.into(),
        }
    }

    /// Create a search exhausted error
    pub fn exhausted(iterations: usize, start: (i64, i64), goal: (i64, i64)) -> Self {
        Self::SearchExhausted {
            iterations,
            start,
            goal,
        }
    }

    /// Create a grid index error
    pub fn grid_index(row: i64, col: i64) -> Self {
        Self::GridIndex { row, col }
    }

    /// Create an invariant violation for a connection
    pub fn invariant(connection: usize, reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            connection,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Geometry { .. } => ErrorKind::Geometry,
            Self::SearchExhausted { .. } => ErrorKind::SearchExhausted,
            Self::GridIndex { .. } => ErrorKind::GridIndex,
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = RoutingError::configuration("unknown layer 'db'");
        assert_eq!(err.to_string(), "configuration error: unknown layer 'db'");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_search_exhausted_display() {
        let err = RoutingError::exhausted(10, (0, 5), (20, 25));
        assert_eq!(
            err.to_string(),
            "no route from (0,5) to (20,25) after 10 iterations"
        );
        assert_eq!(err.kind(), ErrorKind::SearchExhausted);
    }

    #[test]
    fn test_grid_index_display() {
        let err = RoutingError::grid_index(-5, 10);
        assert!(err.to_string().contains("row -5"));
        assert_eq!(err.kind(), ErrorKind::GridIndex);
    }

    #[test]
    fn test_invariant_kind() {
        let err = RoutingError::invariant(3, "lopsided line");
        assert!(err.to_string().contains("connection 3"));
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }
}

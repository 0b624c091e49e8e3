use std::fmt;

/// Machine-readable error codes for simulation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    GraphCycle,
    UnknownNode,
    DuplicateNode,
    MissingParentState,
    MissingState,
    InvalidDistribution,
    InvalidLocusFilter,
    InvalidParameter,
    EmptyStrainPool,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::GraphCycle => "E1001",
            Self::UnknownNode => "E1002",
            Self::DuplicateNode => "E2001",
            Self::MissingParentState => "E2002",
            Self::MissingState => "E2003",
            Self::InvalidDistribution => "E3001",
            Self::InvalidLocusFilter => "E3002",
            Self::InvalidParameter => "E3003",
            Self::EmptyStrainPool => "E4001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::GraphCycle => "Transmission graph contains a cycle",
            Self::UnknownNode => "Node not registered in the graph",
            Self::DuplicateNode => "Node record written twice",
            Self::MissingParentState => "Parent state read before it was written",
            Self::MissingState => "Node state read before it was written",
            Self::InvalidDistribution => "Invalid allele-frequency distribution",
            Self::InvalidLocusFilter => "Locus filter names an absent locus",
            Self::InvalidParameter => "Process parameter out of range",
            Self::EmptyStrainPool => "Parents carry no strains",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::GraphCycle => Some("Remove edges so every infection has an acyclic ancestry."),
            Self::UnknownNode => None,
            Self::DuplicateNode | Self::MissingParentState | Self::MissingState => {
                Some("Use a fresh EntityStore per run and traverse in topological order.")
            }
            Self::InvalidDistribution => {
                Some("Allele frequencies must be in [0, 1] and sum to 1 for every locus.")
            }
            Self::InvalidLocusFilter => {
                Some("Restrict the filter to loci present in the allele-frequency table.")
            }
            Self::InvalidParameter => {
                Some("Rates must be non-negative and probabilities must lie in [0, 1].")
            }
            Self::EmptyStrainPool => Some("Source infections must carry at least one strain."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by graph construction, simulation passes and distance queries.
///
/// Every variant is fatal for the run: callers should discard the partially
/// populated store rather than try to continue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// Topological sort could not order every node.
    #[error("cycle detected among nodes: {}", nodes.join(", "))]
    GraphCycle { nodes: Vec<String> },

    /// A query named a label that was never registered.
    #[error("node not found in graph: {0}")]
    UnknownNode(String),

    /// A write-once table received a second record for the same node.
    #[error("duplicate {table} record for node '{node}'")]
    DuplicateNode { table: &'static str, node: String },

    /// A non-root node was processed before one of its parents.
    #[error("node '{node}' read parent '{parent}' before its {table} was written")]
    MissingParentState {
        table: &'static str,
        node: String,
        parent: String,
    },

    /// A pass needed a node's own record from an earlier pass.
    #[error("node '{node}' has no {table} record yet")]
    MissingState { table: &'static str, node: String },

    /// An allele-frequency vector is negative, empty, or does not sum to 1.
    #[error("invalid allele distribution at locus '{locus}': {reason}")]
    InvalidDistribution { locus: String, reason: String },

    /// A requested locus is missing for one of the compared subjects.
    #[error("locus '{locus}' is absent for '{subject}'")]
    InvalidLocusFilter { locus: String, subject: String },

    /// A process or configuration parameter is out of its valid range.
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A propagation rule was handed parents that carry no strains.
    #[error("cannot propagate an infection from an empty strain pool")]
    EmptyStrainPool,
}

impl SimError {
    /// Map this error to its stable [`ErrorCode`].
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::GraphCycle { .. } => ErrorCode::GraphCycle,
            Self::UnknownNode(_) => ErrorCode::UnknownNode,
            Self::DuplicateNode { .. } => ErrorCode::DuplicateNode,
            Self::MissingParentState { .. } => ErrorCode::MissingParentState,
            Self::MissingState { .. } => ErrorCode::MissingState,
            Self::InvalidDistribution { .. } => ErrorCode::InvalidDistribution,
            Self::InvalidLocusFilter { .. } => ErrorCode::InvalidLocusFilter,
            Self::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            Self::EmptyStrainPool => ErrorCode::EmptyStrainPool,
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Check that `value` is a probability.
pub(crate) fn ensure_probability(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::InvalidParameter {
            name,
            value,
            reason: "must be within [0, 1]",
        })
    }
}

/// Check that `value` is finite and non-negative.
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidParameter {
            name,
            value,
            reason: "must be finite and non-negative",
        })
    }
}

/// Check that `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidParameter {
            name,
            value,
            reason: "must be finite and positive",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, SimError, ensure_probability};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::GraphCycle,
            ErrorCode::UnknownNode,
            ErrorCode::DuplicateNode,
            ErrorCode::MissingParentState,
            ErrorCode::MissingState,
            ErrorCode::InvalidDistribution,
            ErrorCode::InvalidLocusFilter,
            ErrorCode::InvalidParameter,
            ErrorCode::EmptyStrainPool,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::MissingParentState.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn cycle_error_lists_members() {
        let err = SimError::GraphCycle {
            nodes: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "cycle detected among nodes: a, b");
        assert_eq!(err.code(), ErrorCode::GraphCycle);
    }

    #[test]
    fn probability_bounds() {
        assert!(ensure_probability("p", 0.0).is_ok());
        assert!(ensure_probability("p", 1.0).is_ok());
        assert!(ensure_probability("p", -0.1).is_err());
        assert!(ensure_probability("p", f64::NAN).is_err());
    }
}

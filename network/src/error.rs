use gtfs::{LineID, StopID};

use crate::NodeID;

/// Why one line couldn't be matched or registered. None of these stop the other lines.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LineError {
    #[error("line {line}: malformed input: {reason}")]
    MalformedInput { line: LineID, reason: String },

    #[error("line {line}: only {remaining} stop(s) left inside the bounding box")]
    EmptyLine { line: LineID, remaining: usize },

    #[error("line {line}: stop {stop} has no road element within {radius}m{}", nearest_suffix(.nearest))]
    MapMatchFailure {
        line: LineID,
        stop: StopID,
        radius: f64,
        nearest: Option<f64>,
    },

    #[error("line {line}: no path from node {from} to node {to}")]
    NoRoute {
        line: LineID,
        from: NodeID,
        to: NodeID,
    },

    #[error("line {line}: {id} already names a different element")]
    IdentifierCollision { line: LineID, id: String },

    #[error("line {line}: inconsistent registration: {reason}")]
    Inconsistent { line: LineID, reason: String },
}

impl LineError {
    pub fn line(&self) -> &LineID {
        match self {
            LineError::MalformedInput { line, .. }
            | LineError::EmptyLine { line, .. }
            | LineError::MapMatchFailure { line, .. }
            | LineError::NoRoute { line, .. }
            | LineError::IdentifierCollision { line, .. }
            | LineError::Inconsistent { line, .. } => line,
        }
    }

    /// Dropped lines are expected when clipping a feed to an area; everything else is a failure.
    pub fn is_drop(&self) -> bool {
        matches!(self, LineError::EmptyLine { .. })
    }

    pub(crate) fn malformed<S: Into<String>>(line: &LineID, reason: S) -> Self {
        LineError::MalformedInput {
            line: line.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn inconsistent<S: Into<String>>(line: &LineID, reason: S) -> Self {
        LineError::Inconsistent {
            line: line.clone(),
            reason: reason.into(),
        }
    }
}

fn nearest_suffix(nearest: &Option<f64>) -> String {
    match nearest {
        Some(dist) => format!(" (nearest is {dist:.1}m away)"),
        None => String::new(),
    }
}

//! Unified error handling for TALON
//!
//! This module provides a centralized error type for the entire TALON system,
//! ensuring consistent error handling across all components. Construction and
//! graph errors propagate out of `init`/`apply_config` and leave the node or
//! graph in its previous valid state; runtime errors are recovered locally by
//! emitting unhealthy samples and bumping the owning node's error counter.

use thiserror::Error;

/// Main error type for TALON operations
#[derive(Debug, Error)]
pub enum TalonError {
    // ------------------------------------------------------------------
    // Construction errors (type registry / values)
    // ------------------------------------------------------------------
    /// A value was assigned or matched against an incompatible type kind
    #[error("kind mismatch: expected {expected}, got {got}")]
    KindMismatch { expected: String, got: String },

    /// Wrong number of elements for a fixed-arity kind
    #[error("arity mismatch: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// A variant branch index was outside the declared arity
    #[error("variant branch {branch} out of range (arity {arity})")]
    VariantOutOfRange { branch: usize, arity: usize },

    /// A record field required at deserialization time was absent
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// A user string or neutral tree could not be parsed into a value
    #[error("parse error: {0}")]
    Parse(String),

    // ------------------------------------------------------------------
    // Graph errors
    // ------------------------------------------------------------------
    /// The node catalog has no factory for the requested kind
    #[error("unknown node kind '{0}'")]
    UnknownNodeKind(String),

    /// A binding referenced a stream id that is not in the graph
    #[error("unknown stream '{0}'")]
    UnknownStream(String),

    /// A bound stream's rate differs from the port's required rate
    #[error("rate mismatch on '{stream}': port wants {expected}Hz, stream is {got}Hz")]
    RateMismatch {
        stream: String,
        expected: u32,
        got: u32,
    },

    /// A bound stream's element type differs from the port's required type
    #[error("type mismatch on '{stream}': port wants {expected}, stream is {got}")]
    TypeMismatch {
        stream: String,
        expected: String,
        got: String,
    },

    /// The binding digraph has a cycle outside the designated plant
    #[error("cycle detected through node '{0}'")]
    CycleDetected(String),

    /// Two nodes were registered under the same instance name
    #[error("duplicate node name '{0}'")]
    DuplicateNodeName(String),

    // ------------------------------------------------------------------
    // Runtime errors (non-fatal, recovered locally)
    // ------------------------------------------------------------------
    /// A sample was synthesized without fresh backing data
    #[error("stale sample on stream '{0}'")]
    StaleSample(String),

    /// Accumulated multi-input buffers diverged beyond the drift limit
    #[error("buffer drift of {drift} samples (limit {limit})")]
    BufferDrift { drift: usize, limit: usize },

    /// A bus transfer failed
    #[error("bus '{bus}' transfer failed: {message}")]
    BusTransfer { bus: String, message: String },

    // ------------------------------------------------------------------
    // Geometry errors
    // ------------------------------------------------------------------
    /// Motor layout failed the mass-center or torque symmetry check
    #[error("asymmetric geometry: {0}")]
    AsymmetricGeometry(String),

    /// Motor geometry changed shape after node initialization
    #[error("geometry changed: {0}")]
    GeometryChanged(String),

    // ------------------------------------------------------------------
    // Fatal errors
    // ------------------------------------------------------------------
    /// The topological execution order was violated mid-tick
    #[error("scheduler invariant broken: {0}")]
    SchedulerInvariant(String),

    // ------------------------------------------------------------------
    // Ambient
    // ------------------------------------------------------------------
    /// I/O related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration validation errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Node-scoped errors that don't fit a more specific variant
    #[error("node '{node}' error: {message}")]
    Node { node: String, message: String },

    /// Invalid input/argument errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Generic internal errors (use sparingly)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using TalonError
pub type TalonResult<T> = Result<T, TalonError>;

impl From<serde_json::Error> for TalonError {
    fn from(err: serde_json::Error) -> Self {
        TalonError::Parse(err.to_string())
    }
}

impl From<anyhow::Error> for TalonError {
    fn from(err: anyhow::Error) -> Self {
        TalonError::Internal(err.to_string())
    }
}

// Helper constructors, mirroring the error kinds callers build most often
impl TalonError {
    /// Create a kind-mismatch error from the two kind names
    pub fn kind_mismatch<S: Into<String>, T: Into<String>>(expected: S, got: T) -> Self {
        TalonError::KindMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a parse error with a custom message
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        TalonError::Parse(msg.into())
    }

    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TalonError::Config(msg.into())
    }

    /// Create a node error with node name and message
    pub fn node<S: Into<String>, T: Into<String>>(node: S, message: T) -> Self {
        TalonError::Node {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create a bus transfer error with bus name and message
    pub fn bus<S: Into<String>, T: Into<String>>(bus: S, message: T) -> Self {
        TalonError::BusTransfer {
            bus: bus.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        TalonError::InvalidInput(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        TalonError::Internal(msg.into())
    }

    /// Check if this is a construction error (value/type system)
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            TalonError::KindMismatch { .. }
                | TalonError::ArityMismatch { .. }
                | TalonError::VariantOutOfRange { .. }
                | TalonError::MissingField(_)
                | TalonError::Parse(_)
        )
    }

    /// Check if this is a graph wiring error
    pub fn is_graph(&self) -> bool {
        matches!(
            self,
            TalonError::UnknownNodeKind(_)
                | TalonError::UnknownStream(_)
                | TalonError::RateMismatch { .. }
                | TalonError::TypeMismatch { .. }
                | TalonError::CycleDetected(_)
                | TalonError::DuplicateNodeName(_)
        )
    }

    /// Check if this error must abort the scheduler
    pub fn is_fatal(&self) -> bool {
        matches!(self, TalonError::SchedulerInvariant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TalonError::RateMismatch {
            stream: "gen/out".to_string(),
            expected: 100,
            got: 50,
        };
        assert_eq!(
            err.to_string(),
            "rate mismatch on 'gen/out': port wants 100Hz, stream is 50Hz"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(TalonError::kind_mismatch("f32", "bool").is_construction());
        assert!(TalonError::UnknownStream("x".into()).is_graph());
        assert!(TalonError::SchedulerInvariant("order".into()).is_fatal());
        assert!(!TalonError::StaleSample("x".into()).is_fatal());
    }
}

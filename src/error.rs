use thiserror::Error;

use crate::settings::MAX_POLYGON_VERTICES;

/// Errors reported for caller-side contract violations at the public API
/// boundary. None of these are recoverable mid-simulation; they indicate
/// invalid construction input, not numerical trouble. Numerical
/// non-convergence never surfaces as an error.
#[derive(Debug, Error, PartialEq)]
pub enum PhysicsError {
    #[error("polygon requires 3..={MAX_POLYGON_VERTICES} vertices, got {0}")]
    InvalidPolygonVertexCount(usize),

    #[error("polygon vertices are degenerate (collinear or coincident)")]
    DegeneratePolygon,

    #[error("shape radius must be positive, got {0}")]
    InvalidRadius(f32),

    #[error("fixture density must be non-negative and finite, got {0}")]
    InvalidDensity(f32),

    #[error("chain shape requires at least {required} vertices, got {got}")]
    InvalidChain { required: usize, got: usize },

    #[error("body handle is stale or was destroyed")]
    StaleBodyHandle,

    #[error("joint handle is stale or was destroyed")]
    StaleJointHandle,

    #[error("gear joint requires existing revolute or prismatic joints")]
    InvalidGearJoint,

    #[error("joint cannot connect a body to itself")]
    SelfJoint,
}

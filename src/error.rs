use std::fmt;

use thiserror::Error;

/// Pipeline stage that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    ReferenceLocation,
    PerspectiveNormalization,
    Calibration,
    ObjectLocation,
    DimensionExtraction,
    ErrorReport,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::ReferenceLocation => "reference location",
            Stage::PerspectiveNormalization => "perspective normalization",
            Stage::Calibration => "calibration",
            Stage::ObjectLocation => "object location",
            Stage::DimensionExtraction => "dimension extraction",
            Stage::ErrorReport => "error report",
        };
        f.write_str(name)
    }
}

/// Typed failures of a single measurement run.
///
/// Every variant aborts the current frame. None of them is retried
/// internally; the caller decides whether to reacquire, retune or give up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasureError {
    #[error("{stage}: thresholding left no usable contours")]
    NoContoursFound { stage: Stage },

    #[error("no four-sided contour with area >= {min_area:.0} px² found")]
    ReferenceNotFound { min_area: f64 },

    #[error("{candidates} reference candidates tied at {area:.1} px²")]
    AmbiguousReference { candidates: usize, area: f64 },

    #[error("{stage}: degenerate reference: {reason}")]
    DegenerateReference { stage: Stage, reason: String },

    #[error("no object found: {candidates} candidate(s) excluded or below {min_area:.0} px²")]
    NoObjectFound { candidates: usize, min_area: f64 },

    #[error("object outline spans {width:.2} x {height:.2} px, too thin to measure")]
    DegenerateObject { width: f64, height: f64 },

    #[error("invalid ground truth {axis} = {value}, must be > 0")]
    InvalidGroundTruth { axis: &'static str, value: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MeasureError {
    /// The stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            MeasureError::NoContoursFound { stage }
            | MeasureError::DegenerateReference { stage, .. } => *stage,
            MeasureError::ReferenceNotFound { .. } | MeasureError::AmbiguousReference { .. } => {
                Stage::ReferenceLocation
            }
            MeasureError::NoObjectFound { .. } => Stage::ObjectLocation,
            MeasureError::DegenerateObject { .. } => Stage::DimensionExtraction,
            MeasureError::InvalidGroundTruth { .. } => Stage::ErrorReport,
            MeasureError::InvalidConfig(_) => Stage::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, MeasureError>;

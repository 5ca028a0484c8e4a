pub mod calibration;
pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod error_report;
pub mod geometry;
pub mod measure;
pub mod pipeline;
pub mod preprocess;
pub mod reference;
pub mod render;
pub mod transform;

pub use calibration::{calibrate, CalibrationFactor};
pub use cli::Cli;
pub use config::{MeasureConfig, PhysicalSize, ReferenceSource};
pub use detection::locate_object;
pub use error::{MeasureError, Stage};
pub use error_report::{report_error, ErrorReport};
pub use geometry::{Quadrilateral, RotatedRect};
pub use measure::{extract_dimensions, MeasurementResult};
pub use pipeline::{measure, PipelineOutput};
pub use preprocess::{preprocess, Polarity, PreprocessOptions, ThresholdMode};
pub use reference::locate_reference;
pub use render::{annotate, caption};
pub use transform::{normalize_perspective, warp_perspective};

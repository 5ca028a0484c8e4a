use crate::error::{MeasureError, Result};
use crate::preprocess::{Polarity, PreprocessOptions};

/// Standard A4 sheet, portrait
pub const A4_WIDTH_CM: f64 = 21.0;
pub const A4_HEIGHT_CM: f64 = 29.7;

pub const DEFAULT_MIN_REFERENCE_AREA: f64 = 1000.0;
pub const DEFAULT_MIN_OBJECT_AREA: f64 = 100.0;
/// 40 px/cm for an A4 sheet
pub const DEFAULT_CANONICAL_WIDTH: u32 = 840;
pub const DEFAULT_AXIS_TOLERANCE: f64 = 0.02;
pub const DEFAULT_BORDER_MARGIN: u32 = 3;
pub const DEFAULT_DISPLAY_DECIMALS: u32 = 1;

/// Physical width and height of something, in centimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalSize {
    pub width: f64,
    pub height: f64,
}

impl PhysicalSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn a4() -> Self {
        Self::new(A4_WIDTH_CM, A4_HEIGHT_CM)
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Reorders the sides so the orientation matches `landscape`
    pub fn oriented(&self, landscape: bool) -> Self {
        if self.is_landscape() == landscape {
            *self
        } else {
            self.transposed()
        }
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// How the scale reference appears in the photo.
///
/// Both variants yield a quadrilateral plus known physical dimensions; they
/// differ only in whether the frame is rectified before measuring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceSource {
    /// A sheet the object lies on. The sheet is warped to an upright
    /// canonical rectangle and the object is measured inside it.
    FixedAspectSheet(PhysicalSize),
    /// A rectangular item lying next to the object. No warp; scale comes
    /// from the item's rotated bounding rectangle in the original frame.
    UserSuppliedDimensions(PhysicalSize),
}

impl ReferenceSource {
    pub fn physical_size(&self) -> PhysicalSize {
        match self {
            ReferenceSource::FixedAspectSheet(size)
            | ReferenceSource::UserSuppliedDimensions(size) => *size,
        }
    }
}

impl Default for ReferenceSource {
    fn default() -> Self {
        ReferenceSource::FixedAspectSheet(PhysicalSize::a4())
    }
}

/// Options for one measurement run
#[derive(Debug, Clone)]
pub struct MeasureConfig {
    pub reference: ReferenceSource,
    pub ground_truth: Option<PhysicalSize>,
    /// Contours smaller than this are never considered as the reference
    pub min_reference_area: f64,
    /// Floor for object candidates, in pixels of the measured frame
    pub min_object_area: f64,
    /// Width of the rectified sheet; height follows the sheet's aspect ratio
    pub canonical_width: u32,
    /// Relative per-axis disagreement tolerated before warning
    pub axis_tolerance: f64,
    /// Fail with `AmbiguousReference` on tied candidates instead of taking the first
    pub strict_reference: bool,
    /// Object candidates this close to the rectified frame edge are ignored
    pub border_margin: u32,
    pub display_decimals: u32,
    pub label: String,
    pub reference_preprocess: PreprocessOptions,
    pub object_preprocess: PreprocessOptions,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            reference: ReferenceSource::default(),
            ground_truth: None,
            min_reference_area: DEFAULT_MIN_REFERENCE_AREA,
            min_object_area: DEFAULT_MIN_OBJECT_AREA,
            canonical_width: DEFAULT_CANONICAL_WIDTH,
            axis_tolerance: DEFAULT_AXIS_TOLERANCE,
            strict_reference: false,
            border_margin: DEFAULT_BORDER_MARGIN,
            display_decimals: DEFAULT_DISPLAY_DECIMALS,
            label: "object".to_string(),
            reference_preprocess: PreprocessOptions::new(Polarity::BrightForeground),
            object_preprocess: PreprocessOptions::new(Polarity::DarkForeground),
        }
    }
}

impl MeasureConfig {
    /// Sheet mode with a custom sheet size
    pub fn with_sheet(size: PhysicalSize) -> Self {
        Self {
            reference: ReferenceSource::FixedAspectSheet(size),
            ..Self::default()
        }
    }

    /// Reference-object mode. Reference and object are both foreground
    /// against the same background, so they share one polarity.
    pub fn with_reference_object(size: PhysicalSize) -> Self {
        let defaults = Self::default();
        Self {
            reference: ReferenceSource::UserSuppliedDimensions(size),
            object_preprocess: defaults.reference_preprocess,
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.reference.physical_size().is_valid() {
            let size = self.reference.physical_size();
            return Err(MeasureError::InvalidConfig(format!(
                "reference size must be positive, got {} x {}",
                size.width, size.height
            )));
        }
        if self.canonical_width == 0 {
            return Err(MeasureError::InvalidConfig(
                "canonical width must be at least 1 px".to_string(),
            ));
        }
        if !(self.min_reference_area >= 0.0) {
            return Err(MeasureError::InvalidConfig(
                "minimum reference area must be non-negative".to_string(),
            ));
        }
        // A zero floor lets single-pixel specks through as objects
        if !(self.min_object_area > 0.0) {
            return Err(MeasureError::InvalidConfig(
                "minimum object area must be positive".to_string(),
            ));
        }
        if !(self.axis_tolerance >= 0.0) {
            return Err(MeasureError::InvalidConfig(
                "axis tolerance must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

//! Color filter array layout
//!
//! Maps a sensor's 2x2 Bayer arrangement to the slot each tensor channel is read from.

use std::fmt;
use std::str::FromStr;

use crate::image_pipeline::common::error::{PipelineError, Result};

/// The four canonical 2x2 Bayer arrangements, labeled in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BayerPattern {
    /// Red at (0,0), Green at (0,1) and (1,0), Blue at (1,1)
    Rggb,
    /// Green at (0,0), Red at (0,1), Blue at (1,0), Green at (1,1)
    Grbg,
    /// Green at (0,0), Blue at (0,1), Red at (1,0), Green at (1,1)
    Gbrg,
    /// Blue at (0,0), Green at (0,1) and (1,0), Red at (1,1)
    Bggr,
}

impl BayerPattern {
    pub const ALL: [BayerPattern; 4] = [
        BayerPattern::Rggb,
        BayerPattern::Grbg,
        BayerPattern::Gbrg,
        BayerPattern::Bggr,
    ];

    /// Decodes the numeric color-filter-arrangement reported by the sensor.
    ///
    /// Only the four Bayer codes are accepted; RGB and monochrome sensors have no 2x2 mosaic.
    pub fn from_arrangement(code: u8) -> Result<Self> {
        match code {
            0 => Ok(BayerPattern::Rggb),
            1 => Ok(BayerPattern::Grbg),
            2 => Ok(BayerPattern::Gbrg),
            3 => Ok(BayerPattern::Bggr),
            other => Err(PipelineError::UnknownPattern(format!("arrangement code {other}"))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BayerPattern::Rggb => "RGGB",
            BayerPattern::Grbg => "GRBG",
            BayerPattern::Gbrg => "GBRG",
            BayerPattern::Bggr => "BGGR",
        }
    }

    pub fn geometry(&self) -> BayerGeometry {
        BayerGeometry::new(*self)
    }
}

impl FromStr for BayerPattern {
    type Err = PipelineError;

    fn from_str(label: &str) -> Result<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "RGGB" => Ok(BayerPattern::Rggb),
            "GRBG" => Ok(BayerPattern::Grbg),
            "GBRG" => Ok(BayerPattern::Gbrg),
            "BGGR" => Ok(BayerPattern::Bggr),
            _ => Err(PipelineError::UnknownPattern(label.to_string())),
        }
    }
}

impl fmt::Display for BayerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Position of one photosite inside a 2x2 tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotOffset {
    pub row: usize,
    pub col: usize,
}

impl SlotOffset {
    const fn from_index(index: usize) -> Self {
        Self {
            row: index >> 1,
            col: index & 1,
        }
    }
}

/// Tile offsets of the R, G1, B and G2 samples for one pattern.
///
/// G1 is the first green in the pattern label and G2 the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BayerGeometry {
    pattern: BayerPattern,
    pub r: SlotOffset,
    pub g1: SlotOffset,
    pub b: SlotOffset,
    pub g2: SlotOffset,
}

impl BayerGeometry {
    pub fn new(pattern: BayerPattern) -> Self {
        // Indices into the tile in reading order: (r, g1, b, g2)
        let (r, g1, b, g2) = match pattern {
            BayerPattern::Rggb => (0, 1, 3, 2),
            BayerPattern::Grbg => (1, 0, 2, 3),
            BayerPattern::Gbrg => (2, 0, 1, 3),
            BayerPattern::Bggr => (3, 1, 0, 2),
        };

        Self {
            pattern,
            r: SlotOffset::from_index(r),
            g1: SlotOffset::from_index(g1),
            b: SlotOffset::from_index(b),
            g2: SlotOffset::from_index(g2),
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        label.parse::<BayerPattern>().map(Self::new)
    }

    pub fn pattern(&self) -> BayerPattern {
        self.pattern
    }

    /// Offsets in tensor channel order `[R, G1, B, G2]`.
    #[inline]
    pub fn channel_offsets(&self) -> [SlotOffset; 4] {
        [self.r, self.g1, self.b, self.g2]
    }
}

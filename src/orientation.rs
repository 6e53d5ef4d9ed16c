//! Orientation strings from the view layer and the rotation constants they map to.

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rotation of the output relative to the sensor's natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Rotation {
    /// Platform surface rotation constant (0..=3)
    pub fn constant(&self) -> u8 {
        match self {
            Rotation::Rotation0 => 0,
            Rotation::Rotation90 => 1,
            Rotation::Rotation180 => 2,
            Rotation::Rotation270 => 3,
        }
    }

    pub fn degrees(&self) -> u16 {
        self.constant() as u16 * 90
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::Rotation0),
            90 => Some(Rotation::Rotation90),
            180 => Some(Rotation::Rotation180),
            270 => Some(Rotation::Rotation270),
            _ => None,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    LandscapeRight,
    PortraitUpsideDown,
    LandscapeLeft,
}

impl Orientation {
    pub fn rotation(&self) -> Rotation {
        match self {
            Orientation::Portrait => Rotation::Rotation0,
            Orientation::LandscapeRight => Rotation::Rotation90,
            Orientation::PortraitUpsideDown => Rotation::Rotation180,
            Orientation::LandscapeLeft => Rotation::Rotation270,
        }
    }
}

impl FromStr for Orientation {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "portrait" => Ok(Orientation::Portrait),
            "landscapeRight" => Ok(Orientation::LandscapeRight),
            "portraitUpsideDown" => Ok(Orientation::PortraitUpsideDown),
            "landscapeLeft" => Ok(Orientation::LandscapeLeft),
            other => Err(CameraError::UnrecognizedOrientationValue(other.to_string())),
        }
    }
}

/// Resolve the rotation applied to outputs.
///
/// An explicit orientation overrides the display rotation; otherwise outputs
/// follow the display.
pub fn output_rotation(
    orientation: Option<&str>,
    display_rotation: Rotation,
) -> Result<Rotation, CameraError> {
    match orientation {
        Some(value) => Ok(value.parse::<Orientation>()?.rotation()),
        None => Ok(display_rotation),
    }
}

use std::{fmt, str::FromStr};

use snafu::prelude::*;

use crate::errors::{ParseColorError, ParseColorSnafu};

/// The order in which a strip expects the colour channels of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorOrder {
    /// Green, red, blue. The WS2812 default.
    #[default]
    Grb,
    /// Blue, red, green.
    Brg,
    /// Blue, green, red.
    Bgr,
    /// Green, blue, red.
    Gbr,
    /// Red, green, blue.
    Rgb,
    /// Red, blue, green.
    Rbg,
    /// Green, red, blue, white.
    Grbw,
}

/// Where each colour channel lives inside one pixel's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOffsets {
    /// Offset of the red byte.
    pub red: usize,
    /// Offset of the green byte.
    pub green: usize,
    /// Offset of the blue byte.
    pub blue: usize,
    /// Offset of the white byte, if the strip has one.
    pub white: Option<usize>,
}

impl ColorOrder {
    /// All colour orders.
    pub const ALL: [ColorOrder; 7] = [
        Self::Grb,
        Self::Brg,
        Self::Bgr,
        Self::Gbr,
        Self::Rgb,
        Self::Rbg,
        Self::Grbw,
    ];

    /// The conventional name, e.g. `"GRB"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Grb => "GRB",
            Self::Brg => "BRG",
            Self::Bgr => "BGR",
            Self::Gbr => "GBR",
            Self::Rgb => "RGB",
            Self::Rbg => "RBG",
            Self::Grbw => "GRBW",
        }
    }

    /// Channel offsets of this order on a strip with the given colour model.
    ///
    /// White always comes last, so it only depends on the model.
    pub fn offsets(self, model: ColorModel) -> ChannelOffsets {
        let (green, red, blue) = match self {
            Self::Grb | Self::Grbw => (0, 1, 2),
            Self::Brg => (2, 1, 0),
            Self::Bgr => (1, 2, 0),
            Self::Gbr => (0, 2, 1),
            Self::Rgb => (1, 0, 2),
            Self::Rbg => (2, 0, 1),
        };
        ChannelOffsets {
            red,
            green,
            blue,
            white: (model.num_colors() == 4).then_some(3),
        }
    }
}

impl fmt::Display for ColorOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorOrder {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|order| order.name().eq_ignore_ascii_case(s))
            .context(ParseColorSnafu {
                kind: "colour order",
                value: s,
            })
    }
}

/// The colour channels each pixel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorModel {
    /// Red, green and blue.
    #[default]
    Rgb,
    /// Red, green, blue and white.
    Rgbw,
}

impl ColorModel {
    /// Bytes per pixel.
    pub fn num_colors(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgbw => 4,
        }
    }
}

impl fmt::Display for ColorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rgb => "RGB",
            Self::Rgbw => "RGBW",
        })
    }
}

impl FromStr for ColorModel {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("rgb") {
            Ok(Self::Rgb)
        } else if s.eq_ignore_ascii_case("rgbw") {
            Ok(Self::Rgbw)
        } else {
            ParseColorSnafu {
                kind: "colour model",
                value: s,
            }
            .fail()
        }
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use snafu::prelude::*;

use crate::errors::{DetectError, ReadModelSnafu, UnknownModelSnafu};

/// Where the kernel exposes the board's model string.
pub const MODEL_PATH: &str = "/proc/device-tree/model";

const PERIPH_BASE_RPI: u32 = 0x2000_0000;
const PERIPH_BASE_RPI2: u32 = 0x3f00_0000;
const PERIPH_BASE_RPI4: u32 = 0xfe00_0000;

const VIDEOCORE_BASE_RPI: u32 = 0x4000_0000;
const VIDEOCORE_BASE_RPI2: u32 = 0xc000_0000;

const OSC_FREQ: u32 = 19_200_000;
const OSC_FREQ_PI4: u32 = 54_000_000;

/// The SoC generation of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFamily {
    /// BCM2835: Pi 1, Zero, Compute Module 1.
    Pi1,
    /// BCM2836/BCM2837: Pi 2, Pi 3, Zero 2, Compute Module 3.
    Pi2,
    /// BCM2711: Pi 4, Pi 400, Compute Module 4.
    Pi4,
}

/// A known Raspberry Pi variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareVariant {
    family: HardwareFamily,
    periph_base: u32,
    videocore_base: u32,
    name: &'static str,
}

impl HardwareVariant {
    const fn pi1(name: &'static str) -> Self {
        Self {
            family: HardwareFamily::Pi1,
            periph_base: PERIPH_BASE_RPI,
            videocore_base: VIDEOCORE_BASE_RPI,
            name,
        }
    }

    const fn pi2(name: &'static str) -> Self {
        Self {
            family: HardwareFamily::Pi2,
            periph_base: PERIPH_BASE_RPI2,
            videocore_base: VIDEOCORE_BASE_RPI2,
            name,
        }
    }

    const fn pi4(name: &'static str) -> Self {
        Self {
            family: HardwareFamily::Pi4,
            periph_base: PERIPH_BASE_RPI4,
            videocore_base: VIDEOCORE_BASE_RPI2,
            name,
        }
    }

    /// The SoC generation.
    pub fn family(&self) -> HardwareFamily {
        self.family
    }

    /// Physical base address of the peripheral register space.
    pub fn peripheral_base(&self) -> u32 {
        self.periph_base
    }

    /// Base of the VideoCore bus alias the GPU uses for SDRAM.
    pub fn videocore_base(&self) -> u32 {
        self.videocore_base
    }

    /// The model name prefix this variant matches.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Frequency of the oscillator the PWM clock is derived from.
    pub fn oscillator_frequency(&self) -> u32 {
        match self.family {
            HardwareFamily::Pi4 => OSC_FREQ_PI4,
            HardwareFamily::Pi1 | HardwareFamily::Pi2 => OSC_FREQ,
        }
    }

    /// Mailbox allocation flags for DMA-coherent memory.
    ///
    /// The Pi 1 needs the L1 non-allocating alias, later boards use the direct
    /// (uncached) alias.
    pub fn mem_flags(&self) -> u32 {
        if self.videocore_base == VIDEOCORE_BASE_RPI {
            0xc
        } else {
            0x4
        }
    }
}

// Longest names first, so that we can match by prefix; equal lengths ordered by
// videocore base.
// https://gist.github.com/jperkin/c37a574379ef71e339361954be96be12
static VARIANTS: [HardwareVariant; 16] = [
    HardwareVariant::pi2("Raspberry Pi Compute Module 3 Plus"),
    HardwareVariant::pi2("Raspberry Pi Compute Module 3"),
    HardwareVariant::pi4("Raspberry Pi Compute Module 4"),
    HardwareVariant::pi1("Raspberry Pi Compute Module"),
    HardwareVariant::pi2("Raspberry Pi 3 Model B Plus"),
    HardwareVariant::pi2("Raspberry Pi 3 Model A Plus"),
    HardwareVariant::pi1("Raspberry Pi Model B Plus"),
    HardwareVariant::pi1("Raspberry Pi Model A Plus"),
    HardwareVariant::pi2("Raspberry Pi 2 Model B"),
    HardwareVariant::pi2("Raspberry Pi 3 Model B"),
    HardwareVariant::pi4("Raspberry Pi 4 Model B"),
    HardwareVariant::pi2("Raspberry Pi Zero 2 W"),
    HardwareVariant::pi1("Raspberry Pi Model B"),
    HardwareVariant::pi1("Raspberry Pi Zero W"),
    HardwareVariant::pi1("Raspberry Pi Zero"),
    HardwareVariant::pi4("Raspberry Pi 400"),
];

/// All known variants, in matching order.
pub fn variants() -> &'static [HardwareVariant] {
    &VARIANTS
}

/// Finds the variant whose name is a prefix of `model`.
pub fn lookup(model: &str) -> Option<&'static HardwareVariant> {
    VARIANTS.iter().find(|v| model.starts_with(v.name))
}

/// Detects which Raspberry Pi we're running on.
pub fn detect() -> Result<&'static HardwareVariant, DetectError> {
    detect_from(MODEL_PATH)
}

/// Detects the Raspberry Pi variant from the given model file.
pub fn detect_from(path: impl AsRef<Path>) -> Result<&'static HardwareVariant, DetectError> {
    let path = path.as_ref();
    let raw = fs::read(path).context(ReadModelSnafu {
        path: PathBuf::from(path),
    })?;
    let model = String::from_utf8_lossy(&raw);

    let variant = lookup(&model).context(UnknownModelSnafu {
        model: model.trim_end_matches('\0').to_owned(),
    })?;

    log::debug!(
        "Detected {:?} ({}): peripherals at {:#010x}, videocore at {:#010x}",
        variant.family,
        variant.name,
        variant.periph_base,
        variant.videocore_base
    );

    Ok(variant)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn catalog_is_sorted_for_prefix_matching() {
        for pair in VARIANTS.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.name.len() > b.name.len()
                    || (a.name.len() == b.name.len() && a.videocore_base <= b.videocore_base),
                "{:?} sorted before {:?}",
                a.name,
                b.name
            );
        }
    }

    #[test]
    fn every_variant_matches_itself() {
        for variant in variants() {
            assert_eq!(lookup(variant.name), Some(variant));
            let with_revision = format!("{} Rev 1.2\0", variant.name);
            assert_eq!(lookup(&with_revision), Some(variant));
        }
    }

    #[test]
    fn longer_names_win() {
        let plus = lookup("Raspberry Pi 3 Model B Plus Rev 1.3").unwrap();
        assert_eq!(plus.name(), "Raspberry Pi 3 Model B Plus");

        let cm4 = lookup("Raspberry Pi Compute Module 4 Rev 1.0").unwrap();
        assert_eq!(cm4.family(), HardwareFamily::Pi4);
        assert_eq!(cm4.peripheral_base(), 0xfe00_0000);

        let cm1 = lookup("Raspberry Pi Compute Module Rev 1.0").unwrap();
        assert_eq!(cm1.family(), HardwareFamily::Pi1);
    }

    #[test]
    fn unknown_models_do_not_match() {
        assert_eq!(lookup("Raspberry Pi 5 Model B Rev 1.0"), None);
        assert_eq!(lookup("raspberry pi 4 model b"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn family_constants() {
        let pi1 = lookup("Raspberry Pi Model B Rev 2").unwrap();
        assert_eq!(pi1.mem_flags(), 0xc);
        assert_eq!(pi1.oscillator_frequency(), 19_200_000);

        let pi3 = lookup("Raspberry Pi 3 Model B Rev 1.2").unwrap();
        assert_eq!(pi3.mem_flags(), 0x4);
        assert_eq!(pi3.videocore_base(), 0xc000_0000);

        let pi4 = lookup("Raspberry Pi 4 Model B Rev 1.4").unwrap();
        assert_eq!(pi4.oscillator_frequency(), 54_000_000);
    }

    #[test]
    fn detect_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Raspberry Pi 4 Model B Rev 1.4\0").unwrap();

        let variant = detect_from(file.path()).unwrap();
        assert_eq!(variant.name(), "Raspberry Pi 4 Model B");
    }

    #[test]
    fn detect_unknown_model() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Some Other Board\0").unwrap();

        match detect_from(file.path()) {
            Err(DetectError::UnknownModel { model }) => assert_eq!(model, "Some Other Board"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn detect_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("model");

        assert!(matches!(
            detect_from(&missing),
            Err(DetectError::ReadModel { path, .. }) if path == missing
        ));
    }
}

use std::fmt;
use std::os::raw::c_int;

use log::warn;
use thiserror::Error;

use crate::sys::SWI_OK;

/// Engine call that produced a result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Compress,
    DecompressBegin,
    DecompressHeader,
    DecompressSubImage,
    LegacyCompress,
    LegacyDecompress,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Compress => "compress",
            Stage::DecompressBegin => "decompressBegin",
            Stage::DecompressHeader => "decompressHeader",
            Stage::DecompressSubImage => "decompressSubImage",
            Stage::LegacyCompress => "legacyCompress",
            Stage::LegacyDecompress => "legacyDecompress",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum SwiError {
    #[error("Unsupported bit depth {bits_per_pixel}: only 8 and 24 bits-per-pixel images are supported")]
    UnsupportedBitDepth { bits_per_pixel: u32 },
    #[error("Unsupported decoded format: color mode {color} with {bits_per_pixel} bits-per-pixel")]
    UnsupportedFormat { color: i32, bits_per_pixel: i32 },
    #[error("WI {stage} failed: Error={code}")]
    Native { stage: Stage, code: i32 },
    #[error("Native engine could not allocate {resource}")]
    ResourceAllocation { resource: &'static str },
    #[error("Engine reported success for {stage} but returned no data")]
    MissingPayload { stage: Stage },
    #[error("Invalid image geometry: {0}")]
    InvalidGeometry(String),
    #[error("Invalid options: {0}")]
    InvalidOptions(&'static str),
    #[error("Unsupported output image format '{extension}'")]
    UnsupportedOutputFormat { extension: String },
    #[error("Unsupported input image format")]
    UnsupportedInputFormat,
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SwiError {
    /// Raw engine result code, when the failure came from the engine.
    pub fn code(&self) -> Option<i32> {
        match self {
            SwiError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Engine call the failure is attributed to.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SwiError::Native { stage, .. } | SwiError::MissingPayload { stage } => Some(*stage),
            _ => None,
        }
    }
}

/// Translate an engine result code. Zero is success; everything else is a
/// terminal failure for the call it came from.
pub fn check(code: c_int, stage: Stage) -> Result<(), SwiError> {
    if code == SWI_OK {
        return Ok(());
    }
    warn!("{stage} returned error code {code}");
    Err(SwiError::Native { stage, code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert!(check(0, Stage::Compress).is_ok());
    }

    #[test]
    fn non_zero_carries_stage_and_code() {
        let err = check(-7, Stage::DecompressHeader).unwrap_err();
        assert_eq!(err.code(), Some(-7));
        assert_eq!(err.stage(), Some(Stage::DecompressHeader));
        assert_eq!(err.to_string(), "WI decompressHeader failed: Error=-7");
    }

    #[test]
    fn non_native_errors_have_no_code() {
        let err = SwiError::UnsupportedBitDepth { bits_per_pixel: 16 };
        assert_eq!(err.code(), None);
        assert_eq!(err.stage(), None);
    }
}

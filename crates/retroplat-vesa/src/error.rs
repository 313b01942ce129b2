use retroplat_dos::DosError;
use retroplat_host::HostError;
use thiserror::Error;

use crate::DRIVER_NAME;

pub type Result<T> = std::result::Result<T, VesaError>;

#[derive(Debug, Error)]
pub enum VesaError {
    #[error("VESA video not supported on this system")]
    NotSupported,

    #[error("Hardware is not VESA 2.0 compatible (VBE {version:#06x})")]
    NotVbe2 { version: u16 },

    #[error("no {w}x{h} {format} display mode")]
    NoSuchMode { w: i32, h: i32, format: String },

    #[error("no display modes available")]
    NoModes,

    #[error("Failed to set VESA video mode {mode:#x}")]
    SetModeFailed { mode: u16 },

    #[error("Failed to map VESA video memory")]
    MapFailed(#[source] DosError),

    #[error("no video mode is set")]
    NoModeSet,

    #[error("window {0} is not the VESA window")]
    UnknownWindow(u32),

    #[error("Couldn't find DOS surface for window {0}")]
    NoFramebuffer(u32),

    #[error("Unsupported vsync type {0}")]
    UnsupportedVsync(i32),

    #[error("cursor pixels do not match a {w}x{h} ARGB8888 image")]
    InvalidCursor { w: u32, h: u32 },

    #[error(transparent)]
    Dos(#[from] DosError),
}

impl From<VesaError> for HostError {
    fn from(err: VesaError) -> Self {
        HostError::driver(DRIVER_NAME, err)
    }
}

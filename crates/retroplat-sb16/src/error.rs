use retroplat_dos::DosError;
use retroplat_host::HostError;
use thiserror::Error;

use crate::DRIVER_NAME;

pub type Result<T> = std::result::Result<T, SbError>;

#[derive(Debug, Error)]
pub enum SbError {
    #[error("No BLASTER environment variable to find Sound Blaster")]
    MissingConfig,

    #[error("BLASTER environment variable is incomplete or incorrect")]
    IncompleteConfig,

    #[error("BLASTER setting {key}{value:X} is out of range")]
    InvalidConfig { key: char, value: u32 },

    #[error("No SoundBlaster detected on port {port:#X}")]
    NotDetected { port: u16 },

    #[error("Not a SoundBlaster at port {port:#X} (reset returned {got:#04x})")]
    BadSignature { port: u16, got: u8 },

    #[error("Sound Blaster detected, but DSP version {major}.{minor} is older than an SB16")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("DSP at port {port:#X} did not respond")]
    DspTimeout { port: u16 },

    #[error("Buffer size {size} is too large (choose smaller audio format and/or less sample frames)")]
    BufferTooLarge { size: usize },

    #[error("BLASTER does not name a 16-bit DMA channel")]
    No16BitDma,

    #[error("a playback device is already open")]
    AlreadyOpen,

    #[error("no playback device is open")]
    NotOpen,

    #[error("Couldn't allocate Sound Blaster DMA buffer: {0}")]
    DmaAllocation(#[source] DosError),

    #[error(transparent)]
    Dos(#[from] DosError),
}

impl From<SbError> for HostError {
    fn from(err: SbError) -> Self {
        HostError::driver(DRIVER_NAME, err)
    }
}

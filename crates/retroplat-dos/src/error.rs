use thiserror::Error;

pub type Result<T> = std::result::Result<T, DosError>;

#[derive(Debug, Error)]
pub enum DosError {
    #[error("out of conventional memory ({paragraphs} paragraphs requested)")]
    OutOfConventionalMemory { paragraphs: u16 },

    #[error("conventional memory request of {len} bytes is too large")]
    TooLarge { len: usize },

    #[error("conventional memory access out of range: {addr:#x}+{len:#x}")]
    OutOfRange { addr: u32, len: usize },

    #[error("failed to set interrupt vector {vector:#04x}")]
    VectorUpdate { vector: u8 },

    #[error("failed to map physical memory {physical:#x}+{len:#x}")]
    MapFailed { physical: u32, len: u32 },

    #[error("argv[0] {0:?} not found on the search path")]
    ProgramNotFound(String),

    #[error("program name is not known yet")]
    NoArgv0,

    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

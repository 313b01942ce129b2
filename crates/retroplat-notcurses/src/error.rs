use retroplat_host::HostError;
use thiserror::Error;

use crate::DRIVER_NAME;

pub type Result<T> = std::result::Result<T, NotcursesError>;

#[derive(Debug, Error)]
pub enum NotcursesError {
    #[error("notcurses support was built without runtime loading")]
    NotBuilt,

    #[error("couldn't load the notcurses library (tried: {tried})")]
    NoLibrary { tried: String },

    #[error("notcurses library lacks symbol {0}")]
    MissingSymbol(&'static str),

    #[error("notcurses_core_init failed")]
    InitFailed,

    #[error("notcurses has no standard plane")]
    NoStdPlane,

    #[error("notcurses has been stopped")]
    Stopped,

    #[error("{0} failed")]
    Call(&'static str),

    #[error("{len} bytes cannot hold a {width}x{height} image with stride {stride}")]
    ShortImage {
        len: usize,
        width: u32,
        height: u32,
        stride: usize,
    },

    #[error("window size {w}x{h} is not usable")]
    InvalidWindowSize { w: i32, h: i32 },

    #[error("window {0} has no framebuffer")]
    NoFramebuffer(u32),
}

impl From<NotcursesError> for HostError {
    fn from(err: NotcursesError) -> Self {
        HostError::driver(DRIVER_NAME, err)
    }
}

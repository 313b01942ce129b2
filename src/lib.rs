//! Platform backends for a multimedia host, collected behind one registry.
//!
//! Audio: Sound Blaster 16 on DOS. Video: VESA on DOS and notcurses in a terminal. The host
//! asks [`select_audio`] and [`select_video`] for a driver; each walks its table in order, or
//! the names from [`DriverHints`], and keeps the first one that initializes.

mod bootstrap;
mod hints;

pub use bootstrap::{
    select_audio, select_video, Platforms, AUDIO_BOOTSTRAPS, VIDEO_BOOTSTRAPS,
};
pub use hints::{parse_hint, DriverHints, AUDIO_DRIVER_ENV, VIDEO_DRIVER_ENV};

pub use retroplat_dos as dos;
pub use retroplat_host as host;
pub use retroplat_notcurses as notcurses;
pub use retroplat_sb16 as sb16;
pub use retroplat_vesa as vesa;

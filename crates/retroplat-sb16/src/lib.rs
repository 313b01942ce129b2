//! Sound Blaster 16 playback driver.
//!
//! The card is found through the `BLASTER` environment variable and must have a DSP of version
//! 4.xx or later. Playback is fixed at 44.1 kHz signed 16-bit stereo, streamed by 16-bit
//! auto-init DMA from a conventional-memory buffer; the mixer runs inside the card's IRQ handler.

pub mod config;
pub mod detect;
pub mod device;
pub mod dma;
mod driver;
pub mod dsp;
mod error;
mod isr;
pub mod lock;
pub mod testing;

pub use config::BlasterConfig;
pub use detect::{DetectedCard, DspVersion};
pub use device::SoundBlaster;
pub use driver::init;
pub use dsp::SpinLimit;
pub use error::{Result, SbError};
pub use isr::sound_blaster_irq;
pub use lock::AudioLock;

pub const DRIVER_NAME: &str = "soundblaster";
pub const DRIVER_DESC: &str = "Sound Blaster";

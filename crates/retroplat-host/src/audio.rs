//! Audio driver callbacks.
//!
//! The host drives a playback device in two ways: either it runs its own thread that repeatedly
//! calls [`AudioDriver::playback_iterate`], or (for drivers that report
//! [`AudioDriver::provides_own_callback_thread`]) the driver calls the mixer itself, typically
//! from an interrupt.

use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    U8,
    S8,
    S16Le,
    S16Be,
    S32Le,
    F32Le,
}

impl AudioFormat {
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::S8 => 1,
            Self::S16Le | Self::S16Be => 2,
            Self::S32Le | Self::F32Le => 4,
        }
    }

    /// Byte value that encodes silence for this format.
    pub const fn silence(self) -> u8 {
        match self {
            Self::U8 => 0x80,
            _ => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioSpec {
    pub format: AudioFormat,
    pub channels: u8,
    pub freq: u32,
}

impl AudioSpec {
    pub const fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }
}

/// Default device buffer length in sample frames for a given rate.
pub fn default_sample_frames(freq: u32) -> u32 {
    if freq <= 22_050 {
        512
    } else if freq <= 48_000 {
        1024
    } else if freq <= 96_000 {
        2048
    } else {
        4096
    }
}

/// Parameters a driver settled on when opening a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceFormat {
    pub spec: AudioSpec,
    pub sample_frames: u32,
    /// Size in bytes of one device buffer (`sample_frames * frame_size`).
    pub buffer_size: usize,
}

impl DeviceFormat {
    pub fn new(spec: AudioSpec, sample_frames: u32) -> Self {
        Self {
            spec,
            sample_frames,
            buffer_size: sample_frames as usize * spec.frame_size(),
        }
    }
}

/// Source of playback data. The host's stream mixer implements this.
pub trait Mixer {
    /// Fill `out` completely with interleaved samples in the device format.
    fn mix(&mut self, out: &mut [u8]);
}

impl<F> Mixer for F
where
    F: FnMut(&mut [u8]),
{
    fn mix(&mut self, out: &mut [u8]) {
        self(out)
    }
}

pub trait AudioDriver {
    fn name(&self) -> &'static str;

    /// Open the default playback device. `mixer` is invoked every time the device needs data.
    fn open_device(&mut self, mixer: Box<dyn Mixer + Send>) -> Result<DeviceFormat>;

    fn close_device(&mut self);

    /// The buffer the next mixer call should fill.
    fn get_device_buffer(&mut self) -> Result<&mut [u8]>;

    /// Fill the current device buffer once.
    fn playback_iterate(&mut self) -> Result<()>;

    /// Keep the driver from calling the mixer until the matching [`Self::unlock_stream`].
    fn lock_stream(&mut self) {}

    /// May run a mixer iteration that was held back while locked.
    fn unlock_stream(&mut self) {}

    fn provides_own_callback_thread(&self) -> bool {
        false
    }

    fn only_has_default_playback_device(&self) -> bool {
        false
    }

    fn has_recording_support(&self) -> bool {
        false
    }
}

/// Registration record for an audio driver.
///
/// `C` is whatever context the embedding passes to driver constructors (the DOS platform shim,
/// for example).
pub struct AudioBootstrap<C> {
    pub name: &'static str,
    pub desc: &'static str,
    pub init: fn(&mut C) -> Result<Box<dyn AudioDriver>>,
    /// Only used when asked for by name.
    pub demand_only: bool,
}

impl<C> Clone for AudioBootstrap<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for AudioBootstrap<C> {}

impl<C> std::fmt::Debug for AudioBootstrap<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBootstrap")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("demand_only", &self.demand_only)
            .finish()
    }
}

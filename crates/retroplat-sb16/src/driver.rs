use retroplat_host::{AudioDriver, DeviceFormat, Mixer};
use tracing::debug;

use crate::{SbError, SoundBlaster, DRIVER_NAME};

impl AudioDriver for SoundBlaster {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn open_device(
        &mut self,
        mixer: Box<dyn Mixer + Send>,
    ) -> retroplat_host::Result<DeviceFormat> {
        Ok(self.open(mixer)?)
    }

    fn close_device(&mut self) {
        if let Err(err) = self.close() {
            debug!(%err, "close_device");
        }
    }

    fn get_device_buffer(&mut self) -> retroplat_host::Result<&mut [u8]> {
        Ok(self.device_buffer()?)
    }

    fn playback_iterate(&mut self) -> retroplat_host::Result<()> {
        Ok(self.iterate()?)
    }

    fn lock_stream(&mut self) {
        self.lock();
    }

    fn unlock_stream(&mut self) {
        self.unlock();
    }

    /// Mixing happens in the card's interrupt handler.
    fn provides_own_callback_thread(&self) -> bool {
        true
    }

    fn only_has_default_playback_device(&self) -> bool {
        true
    }
}

/// Detect a card from `BLASTER` and box it for the host.
pub fn init(platform: retroplat_dos::DosPlatform) -> retroplat_host::Result<Box<dyn AudioDriver>> {
    let sb = SoundBlaster::from_env(platform).map_err(|err: SbError| {
        debug!(%err, "Sound Blaster unavailable");
        err
    })?;
    Ok(Box::new(sb))
}

//! Playback engine: one auto-init DMA transfer over a buffer split in two halves, with the card
//! raising an IRQ each time it finishes a half. The handler refills the half that was just
//! played.

use retroplat_dos::{
    allocate_dma, free_dma, pic, ConventionalMemory, DmaBuffer, DosError, DosPlatform,
    InterruptHandler, InterruptHook, PortIo,
};
use retroplat_host::{default_sample_frames, AudioFormat, AudioSpec, DeviceFormat, Mixer};
use tracing::{debug, info, trace, warn};

use crate::config::{BlasterConfig, ENV_VAR};
use crate::detect::{detect, DetectedCard};
use crate::dma::DmaChannel;
use crate::dsp::{cmd, Dsp, SpinLimit};
use crate::isr;
use crate::lock::AudioLock;
use crate::{Result, SbError};

pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u8 = 2;

/// Largest single device buffer; twice this must still fit one 64KB DMA page.
pub const MAX_BUFFER_SIZE: usize = 32 * 1024;

/// The speaker takes this long to settle after being turned on.
pub const SPEAKER_ON_DELAY_MS: u32 = 112;

pub(crate) struct OpenDevice {
    format: DeviceFormat,
    channel: DmaChannel,
    dma: DmaBuffer,
    hook: Option<InterruptHook>,
    mixer: Box<dyn Mixer + Send>,
}

impl OpenDevice {
    /// Byte offset of the half the card is not currently playing.
    fn idle_half_offset(&self, io: &mut dyn PortIo) -> usize {
        let half = self.format.buffer_size;
        let count = usize::from(self.channel.current_count(io));
        if count < half / self.channel.transfer_width() {
            0
        } else {
            half
        }
    }

    fn idle_half<'m>(
        &self,
        io: &mut dyn PortIo,
        memory: &'m mut dyn ConventionalMemory,
    ) -> Result<&'m mut [u8]> {
        let offset = self.idle_half_offset(io);
        let half = self.format.buffer_size;
        let bytes = self.dma.bytes_mut(memory).ok_or(DosError::OutOfRange {
            addr: self.dma.physical(),
            len: self.dma.len(),
        })?;
        Ok(&mut bytes[offset..offset + half])
    }

    fn iterate(&mut self, io: &mut dyn PortIo, memory: &mut dyn ConventionalMemory) -> Result<()> {
        let offset = self.idle_half_offset(io);
        let half = self.format.buffer_size;
        let bytes = self.dma.bytes_mut(memory).ok_or(DosError::OutOfRange {
            addr: self.dma.physical(),
            len: self.dma.len(),
        })?;
        self.mixer.mix(&mut bytes[offset..offset + half]);
        Ok(())
    }
}

/// A detected Sound Blaster 16 and, while open, its playback device.
pub struct SoundBlaster {
    platform: DosPlatform,
    card: DetectedCard,
    dsp: Dsp,
    irq_handler: InterruptHandler,
    lock: AudioLock,
    device: Option<OpenDevice>,
}

impl SoundBlaster {
    /// Probe the card described by `config`.
    pub fn detect(mut platform: DosPlatform, config: BlasterConfig) -> Result<Self> {
        let dsp = Dsp::new(config.port);
        let card = detect(config, &dsp, &mut *platform.io, &mut *platform.clock)?;
        Ok(Self {
            platform,
            card,
            dsp,
            irq_handler: isr::sound_blaster_irq,
            lock: AudioLock::new(),
            device: None,
        })
    }

    /// Probe the card the `BLASTER` variable describes.
    pub fn from_env(platform: DosPlatform) -> Result<Self> {
        Self::from_env_value(platform, std::env::var(ENV_VAR).ok().as_deref())
    }

    /// Like [`Self::from_env`] with the variable's value given. The ports are only touched once
    /// the value parses.
    pub fn from_env_value(platform: DosPlatform, value: Option<&str>) -> Result<Self> {
        let config = BlasterConfig::from_env_value(value)?;
        Self::detect(platform, config)
    }

    /// Install `handler` instead of the built-in trampoline when the device opens.
    pub fn with_irq_handler(mut self, handler: InterruptHandler) -> Self {
        self.irq_handler = handler;
        self
    }

    pub fn with_spin_limit(mut self, spin: SpinLimit) -> Self {
        self.dsp = self.dsp.with_spin_limit(spin);
        self
    }

    pub fn card(&self) -> &DetectedCard {
        &self.card
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn format(&self) -> Option<DeviceFormat> {
        self.device.as_ref().map(|d| d.format)
    }

    pub fn dma_buffer(&self) -> Option<&DmaBuffer> {
        self.device.as_ref().map(|d| &d.dma)
    }

    pub fn interrupt_hook(&self) -> Option<&InterruptHook> {
        self.device.as_ref().and_then(|d| d.hook.as_ref())
    }

    pub fn audio_lock(&self) -> &AudioLock {
        &self.lock
    }

    pub fn platform_mut(&mut self) -> &mut DosPlatform {
        &mut self.platform
    }

    pub fn open(&mut self, mixer: Box<dyn Mixer + Send>) -> Result<DeviceFormat> {
        if self.device.is_some() {
            return Err(SbError::AlreadyOpen);
        }

        let spec = AudioSpec {
            format: AudioFormat::S16Le,
            channels: CHANNELS,
            freq: SAMPLE_RATE,
        };
        let format = DeviceFormat::new(spec, default_sample_frames(SAMPLE_RATE));
        if format.buffer_size > MAX_BUFFER_SIZE {
            return Err(SbError::BufferTooLarge {
                size: format.buffer_size,
            });
        }
        let channel = self
            .card
            .config
            .dma16
            .and_then(DmaChannel::new)
            .ok_or(SbError::No16BitDma)?;

        self.dsp.reset(&mut *self.platform.io, &mut *self.platform.clock);

        let dma_len = format.buffer_size * 2;
        let dma = allocate_dma(&mut *self.platform.memory, dma_len).map_err(SbError::DmaAllocation)?;
        match dma.bytes_mut(&mut *self.platform.memory) {
            Some(bytes) => bytes.fill(spec.format.silence()),
            None => {
                free_dma(&mut *self.platform.memory, dma);
                return Err(DosError::OutOfRange {
                    addr: dma.physical(),
                    len: dma.len(),
                }
                .into());
            }
        }

        channel.program_autoinit_playback(&mut *self.platform.io, &dma);
        self.device = Some(OpenDevice {
            format,
            channel,
            dma,
            hook: None,
            mixer,
        });
        self.lock.clear_deferred();

        if let Err(err) = self.start(format) {
            self.teardown();
            return Err(err);
        }

        info!(
            port = format_args!("{:#X}", self.card.config.port),
            irq = self.card.config.irq,
            dma = channel.number(),
            physical = dma.physical(),
            buffer_size = format.buffer_size,
            "Sound Blaster playback started"
        );
        Ok(format)
    }

    /// Hook the IRQ and start the DSP transfer.
    fn start(&mut self, format: DeviceFormat) -> Result<()> {
        isr::set_active(self);
        let hook = InterruptHook::hook(
            &mut *self.platform.vectors,
            &mut *self.platform.io,
            self.card.config.irq,
            self.irq_handler,
        )?;
        if let Some(device) = self.device.as_mut() {
            device.hook = Some(hook);
        }

        let io = &mut *self.platform.io;
        self.dsp.write(io, cmd::SPEAKER_ON)?;
        self.platform.clock.delay_ms(SPEAKER_ON_DELAY_MS);

        let [rate_hi, rate_lo] = (format.spec.freq as u16).to_be_bytes();
        self.dsp.write_all(io, &[cmd::SET_OUTPUT_RATE, rate_hi, rate_lo])?;

        // Samples per half, across both channels, minus one.
        let block = (format.buffer_size / 2 - 1) as u16;
        let [block_lo, block_hi] = block.to_le_bytes();
        self.dsp.write_all(
            io,
            &[
                cmd::START_16BIT_AUTOINIT,
                cmd::MODE_STEREO_SIGNED,
                block_lo,
                block_hi,
            ],
        )?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if self.device.is_none() {
            return Err(SbError::NotOpen);
        }
        let io = &mut *self.platform.io;
        if let Err(err) = self
            .dsp
            .write_all(io, &[cmd::EXIT_16BIT_AUTOINIT, cmd::SPEAKER_OFF])
        {
            warn!(%err, "failed to stop DSP playback");
        }
        self.teardown();
        info!("Sound Blaster playback stopped");
        Ok(())
    }

    /// Release everything an open device holds, in reverse order of acquisition.
    fn teardown(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };
        if let Some(hook) = device.hook {
            if let Err(err) = hook.unhook(&mut *self.platform.vectors, &mut *self.platform.io, true)
            {
                warn!(%err, irq = hook.irq(), "failed to restore interrupt vector");
            }
        }
        isr::clear_active(self);
        device.channel.mask(&mut *self.platform.io);
        free_dma(&mut *self.platform.memory, device.dma);
        self.lock.clear_deferred();
        debug!(channel = device.channel.number(), "released DMA channel");
    }

    /// The half of the DMA buffer the card is not playing right now.
    ///
    /// The card may cross into the other half between the count read and the caller's write;
    /// nothing guards against that.
    pub fn device_buffer(&mut self) -> Result<&mut [u8]> {
        let device = self.device.as_ref().ok_or(SbError::NotOpen)?;
        device.idle_half(&mut *self.platform.io, &mut *self.platform.memory)
    }

    /// Run the mixer once over the idle half.
    pub fn iterate(&mut self) -> Result<()> {
        let device = self.device.as_mut().ok_or(SbError::NotOpen)?;
        device.iterate(&mut *self.platform.io, &mut *self.platform.memory)
    }

    pub fn lock(&mut self) {
        self.lock.lock(&*self.platform.cpu);
    }

    /// Drop one lock level, running an iteration the IRQ handler had to skip.
    pub fn unlock(&mut self) {
        let DosPlatform {
            cpu, io, memory, ..
        } = &mut self.platform;
        let device = &mut self.device;
        self.lock.unlock(&**cpu, || {
            if let Some(device) = device.as_mut() {
                if let Err(err) = device.iterate(&mut **io, &mut **memory) {
                    warn!(%err, "deferred audio iteration failed");
                }
            }
        });
    }

    /// Body of the card's interrupt handler.
    pub fn handle_irq(&mut self) {
        if let Some(device) = self.device.as_mut() {
            if self.lock.defer_if_locked() {
                trace!("audio locked, deferring iteration");
            } else if let Err(err) =
                device.iterate(&mut *self.platform.io, &mut *self.platform.memory)
            {
                trace!(%err, "audio iteration failed");
            }
        }
        self.dsp.acknowledge_16bit_irq(&mut *self.platform.io);
        pic::end_of_interrupt(&mut *self.platform.io, self.card.config.irq);
    }
}

impl Drop for SoundBlaster {
    fn drop(&mut self) {
        if self.device.is_some() {
            let _ = self.close();
        }
        isr::clear_active(self);
    }
}

impl std::fmt::Debug for SoundBlaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundBlaster")
            .field("card", &self.card)
            .field("dsp", &self.dsp)
            .field("lock", &self.lock)
            .field("open", &self.device.is_some())
            .finish()
    }
}

//! Card detection: DSP reset handshake and version query.

use std::fmt;

use retroplat_dos::{Delay, PortIo};
use tracing::{debug, info};

use crate::config::BlasterConfig;
use crate::dsp::{cmd, Dsp, RESET_ACK};
use crate::{Result, SbError};

/// A DSP can take up to 100 ms to come out of reset; allow three times that.
pub const PROBE_ATTEMPTS: u32 = 300;
pub const PROBE_INTERVAL_US: u32 = 1000;

/// First DSP generation with 16-bit auto-init DMA (SB16).
pub const MIN_DSP_MAJOR: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DspVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for DspVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// Settings of a card that passed detection. Fixed for the life of the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectedCard {
    pub config: BlasterConfig,
    pub version: DspVersion,
}

/// Reset the DSP and wait for it to report [`RESET_ACK`].
pub fn probe(dsp: &Dsp, io: &mut dyn PortIo, clock: &mut dyn Delay) -> Result<()> {
    dsp.reset(io, clock);

    let ready = (0..PROBE_ATTEMPTS).any(|_| {
        clock.delay_us(PROBE_INTERVAL_US);
        dsp.is_ready(io)
    });
    if !ready {
        return Err(SbError::NotDetected { port: dsp.base() });
    }

    match dsp.read(io)? {
        RESET_ACK => Ok(()),
        got => Err(SbError::BadSignature {
            port: dsp.base(),
            got,
        }),
    }
}

pub fn read_version(dsp: &Dsp, io: &mut dyn PortIo) -> Result<DspVersion> {
    dsp.write(io, cmd::GET_VERSION)?;
    let major = dsp.read(io)?;
    let minor = dsp.read(io)?;
    Ok(DspVersion { major, minor })
}

/// Probe the card described by `config` and check it is at least an SB16.
pub fn detect(
    config: BlasterConfig,
    dsp: &Dsp,
    io: &mut dyn PortIo,
    clock: &mut dyn Delay,
) -> Result<DetectedCard> {
    probe(dsp, io, clock)?;
    let version = read_version(dsp, io)?;
    debug!(port = config.port, %version, "DSP answered");
    if version.major < MIN_DSP_MAJOR {
        return Err(SbError::UnsupportedVersion {
            major: version.major,
            minor: version.minor,
        });
    }

    info!(
        port = format_args!("{:#X}", config.port),
        irq = config.irq,
        dma8 = ?config.dma8,
        dma16 = ?config.dma16,
        %version,
        "Sound Blaster detected"
    );
    Ok(DetectedCard { config, version })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CardBehavior, Sb16Model};
    use retroplat_dos::cpu::SoftClock;
    use retroplat_dos::IoPortBus;

    fn config() -> BlasterConfig {
        "A220 I5 D1 H5".parse().unwrap()
    }

    fn setup(behavior: CardBehavior) -> (IoPortBus, Sb16Model) {
        let card = Sb16Model::with_behavior(0x220, behavior);
        let mut bus = IoPortBus::new();
        card.attach(&mut bus);
        (bus, card)
    }

    #[test]
    fn sb16_is_detected() {
        let (mut bus, _card) = setup(CardBehavior::default());
        let mut clock = SoftClock::new();
        let found = detect(config(), &Dsp::new(0x220), &mut bus, &mut clock).unwrap();
        assert_eq!(found.version, DspVersion { major: 4, minor: 5 });
        assert_eq!(found.config.port, 0x220);
    }

    #[test]
    fn version_four_zero_passes_and_three_fails() {
        let (mut bus, _card) = setup(CardBehavior {
            version: (4, 0),
            ..Default::default()
        });
        let mut clock = SoftClock::new();
        assert!(detect(config(), &Dsp::new(0x220), &mut bus, &mut clock).is_ok());

        let (mut bus, _card) = setup(CardBehavior {
            version: (3, 2),
            ..Default::default()
        });
        assert!(matches!(
            detect(config(), &Dsp::new(0x220), &mut bus, &mut clock),
            Err(SbError::UnsupportedVersion { major: 3, minor: 2 })
        ));
    }

    #[test]
    fn silent_port_gives_up_after_300_polls() {
        let (mut bus, _card) = setup(CardBehavior {
            dead: true,
            ..Default::default()
        });
        let mut clock = SoftClock::new();
        let err = probe(&Dsp::new(0x220), &mut bus, &mut clock).unwrap_err();
        assert!(matches!(err, SbError::NotDetected { port: 0x220 }));
        assert_eq!(
            clock.elapsed_us(),
            u64::from(PROBE_ATTEMPTS * PROBE_INTERVAL_US) + 3
        );
    }

    #[test]
    fn wrong_reset_byte_is_not_a_sound_blaster() {
        let (mut bus, _card) = setup(CardBehavior {
            reset_reply: 0x55,
            ..Default::default()
        });
        let mut clock = SoftClock::new();
        assert!(matches!(
            probe(&Dsp::new(0x220), &mut bus, &mut clock),
            Err(SbError::BadSignature { port: 0x220, got: 0x55 })
        ));
    }

    #[test]
    fn slow_reset_within_budget_still_detects() {
        let (mut bus, _card) = setup(CardBehavior {
            reset_latency_polls: 120,
            ..Default::default()
        });
        let mut clock = SoftClock::new();
        assert!(probe(&Dsp::new(0x220), &mut bus, &mut clock).is_ok());
        assert!(clock.elapsed_us() < 300_000);
    }
}

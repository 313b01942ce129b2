//! Driver registries and the first-that-works selection over them.

use retroplat_dos::DosPlatform;
use retroplat_host::{
    AudioBootstrap, AudioDriver, HostError, Result, VideoBootstrap, VideoDriver,
};
use tracing::{debug, info};

/// Hands each DOS driver its own view of the machine.
pub struct Platforms {
    make: Box<dyn FnMut() -> DosPlatform>,
}

impl Platforms {
    pub fn new<F>(make: F) -> Self
    where
        F: FnMut() -> DosPlatform + 'static,
    {
        Self {
            make: Box::new(make),
        }
    }

    #[cfg(all(feature = "djgpp", any(target_arch = "x86", target_arch = "x86_64")))]
    pub fn native() -> Self {
        Self::new(DosPlatform::native)
    }

    pub fn platform(&mut self) -> DosPlatform {
        (self.make)()
    }
}

impl std::fmt::Debug for Platforms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platforms").finish_non_exhaustive()
    }
}

fn sound_blaster(platforms: &mut Platforms) -> Result<Box<dyn AudioDriver>> {
    retroplat_sb16::init(platforms.platform())
}

fn vesa(platforms: &mut Platforms) -> Result<Box<dyn VideoDriver>> {
    retroplat_vesa::init(platforms.platform())
}

fn notcurses(_platforms: &mut Platforms) -> Result<Box<dyn VideoDriver>> {
    retroplat_notcurses::init()
}

pub const AUDIO_BOOTSTRAPS: [AudioBootstrap<Platforms>; 1] = [AudioBootstrap {
    name: retroplat_sb16::DRIVER_NAME,
    desc: retroplat_sb16::DRIVER_DESC,
    init: sound_blaster,
    demand_only: false,
}];

/// VESA first: on DOS there is no terminal to speak of.
pub const VIDEO_BOOTSTRAPS: [VideoBootstrap<Platforms>; 2] = [
    VideoBootstrap {
        name: retroplat_vesa::DRIVER_NAME,
        desc: retroplat_vesa::DRIVER_DESC,
        create: vesa,
    },
    VideoBootstrap {
        name: retroplat_notcurses::DRIVER_NAME,
        desc: retroplat_notcurses::DRIVER_DESC,
        create: notcurses,
    },
];

/// Try each named entry in `order`, or without names every entry `eligible` allows, and return
/// the first that comes up.
fn select<B, D>(
    kind: &'static str,
    table: &[B],
    hint: &[String],
    name: impl Fn(&B) -> &'static str,
    eligible: impl Fn(&B) -> bool,
    mut create: impl FnMut(&B) -> Result<D>,
) -> Result<D> {
    let candidates: Vec<&B> = if hint.is_empty() {
        table.iter().filter(|b| eligible(b)).collect()
    } else {
        hint.iter()
            .filter_map(|wanted| {
                let found = table.iter().find(|b| name(b).eq_ignore_ascii_case(wanted));
                if found.is_none() {
                    debug!(kind, driver = %wanted, "no such driver");
                }
                found
            })
            .collect()
    };

    for bootstrap in &candidates {
        let driver = name(bootstrap);
        match create(bootstrap) {
            Ok(d) => {
                info!(kind, driver, "driver selected");
                return Ok(d);
            }
            Err(err) => debug!(kind, driver, %err, "driver unavailable"),
        }
    }

    let tried = if hint.is_empty() {
        candidates.iter().map(|b| name(b)).collect::<Vec<_>>().join(", ")
    } else {
        hint.join(", ")
    };
    Err(HostError::NoDriver { tried })
}

/// Bring up an audio driver. Demand-only drivers are only tried when named in `hint`.
pub fn select_audio<C>(
    table: &[AudioBootstrap<C>],
    hint: &[String],
    ctx: &mut C,
) -> Result<Box<dyn AudioDriver>> {
    select(
        "audio",
        table,
        hint,
        |b| b.name,
        |b| !b.demand_only,
        |b| (b.init)(ctx),
    )
}

/// Bring up a video driver, then run its `video_init`.
pub fn select_video<C>(
    table: &[VideoBootstrap<C>],
    hint: &[String],
    ctx: &mut C,
) -> Result<Box<dyn VideoDriver>> {
    select(
        "video",
        table,
        hint,
        |b| b.name,
        |_| true,
        |b| {
            let mut driver = (b.create)(ctx)?;
            driver.video_init()?;
            Ok(driver)
        },
    )
}

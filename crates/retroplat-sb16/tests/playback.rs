use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use retroplat_dos::testing::{SoftMachine, SoftVectorTable};
use retroplat_dos::io::TracingPorts;
use retroplat_dos::{DosError, IoPortBus, VectorTable};
use retroplat_host::{AudioDriver, AudioFormat, Mixer};
use retroplat_sb16::testing::{CardBehavior, DmaControllerModel, Sb16Model};
use retroplat_sb16::{BlasterConfig, SbError, SoundBlaster, SpinLimit};

const IRQ5_VECTOR: u8 = 13;

extern "C" fn unused_handler() {}

struct Rig {
    sb: SoundBlaster,
    machine: SoftMachine,
    card: Sb16Model,
    dma: DmaControllerModel,
}

fn rig_with(blaster: &str, behavior: CardBehavior) -> Rig {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let card = Sb16Model::with_behavior(0x220, behavior);
    let dma = DmaControllerModel::new();
    let mut bus = IoPortBus::new();
    card.attach(&mut bus);
    dma.attach(&mut bus);
    let (platform, machine) = SoftMachine::platform(bus);
    let config: BlasterConfig = blaster.parse().unwrap();
    let sb = SoundBlaster::detect(platform, config)
        .unwrap()
        .with_irq_handler(unused_handler);
    Rig {
        sb,
        machine,
        card,
        dma,
    }
}

fn rig() -> Rig {
    rig_with("A220 I5 D1 H5", CardBehavior::default())
}

/// Mixer that fills with `value` and counts its calls.
fn counting_mixer(value: u8) -> (Box<dyn Mixer + Send>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let mixer = move |out: &mut [u8]| {
        seen.fetch_add(1, Ordering::SeqCst);
        out.fill(value);
    };
    (Box::new(mixer), calls)
}

#[test]
fn open_starts_16bit_stereo_autoinit_playback() {
    let mut rig = rig();
    let (mixer, _) = counting_mixer(0);
    let format = rig.sb.open(mixer).unwrap();

    assert_eq!(format.spec.format, AudioFormat::S16Le);
    assert_eq!(format.spec.channels, 2);
    assert_eq!(format.spec.freq, 44_100);
    assert_eq!(format.sample_frames, 1024);
    assert_eq!(format.buffer_size, 4096);

    assert_eq!(
        rig.card.written(),
        vec![0xE1, 0xD1, 0x41, 0xAC, 0x44, 0xB6, 0x30, 0xFF, 0x07]
    );
    assert!(rig.card.speaker_on());
    assert!(rig.card.auto_init());
    assert_eq!(rig.card.sample_rate(), Some(44_100));
    assert_eq!(rig.card.block_len(), Some(2047));
    assert_eq!(rig.card.resets(), 2);

    let buf = *rig.sb.dma_buffer().unwrap();
    assert_eq!(buf.len(), 8192);
    let ch5 = rig.dma.channel(5);
    assert!(!ch5.masked);
    assert_eq!(ch5.mode, 0x59);
    assert_eq!(ch5.count, 4095);
    assert_eq!(ch5.page, (buf.physical() >> 16) as u8);

    assert_eq!(rig.machine.pic.master_imr() & (1 << 5), 0);
    assert_ne!(
        rig.machine.vectors.get(IRQ5_VECTOR),
        SoftVectorTable::bios_default(IRQ5_VECTOR)
    );
    assert!(rig.machine.clock.elapsed_us() >= 112_000);
    assert_eq!(rig.machine.memory.live_blocks(), 1);
}

#[test]
fn close_restores_dma_vector_and_pic() {
    let mut rig = rig();
    let (mixer, _) = counting_mixer(0);
    rig.sb.open(mixer).unwrap();
    rig.sb.close().unwrap();

    assert!(!rig.sb.is_open());
    assert!(rig.dma.channel(5).masked);
    assert_eq!(
        rig.machine.vectors.get(IRQ5_VECTOR),
        SoftVectorTable::bios_default(IRQ5_VECTOR)
    );
    assert_ne!(rig.machine.pic.master_imr() & (1 << 5), 0);
    assert_eq!(rig.machine.memory.live_blocks(), 0);
    assert!(rig.card.written().ends_with(&[0xDA, 0xD3]));
    assert!(!rig.card.speaker_on());
    assert!(!rig.card.auto_init());
}

#[test]
fn one_device_at_a_time() {
    let mut rig = rig();
    let (mixer, _) = counting_mixer(0);
    rig.sb.open(mixer).unwrap();
    let (again, _) = counting_mixer(0);
    assert!(matches!(rig.sb.open(again), Err(SbError::AlreadyOpen)));

    rig.sb.close().unwrap();
    assert!(matches!(rig.sb.close(), Err(SbError::NotOpen)));
    assert!(matches!(rig.sb.device_buffer(), Err(SbError::NotOpen)));
}

#[test]
fn device_buffer_is_the_half_not_being_played() {
    let mut rig = rig();
    let (mixer, _) = counting_mixer(0);
    rig.sb.open(mixer).unwrap();
    let phys = rig.sb.dma_buffer().unwrap().physical();

    // Fresh transfer: the card is in the first half, so the second half is free.
    rig.dma.set_current_count(5, 4095);
    let half = rig.sb.device_buffer().unwrap();
    assert_eq!(half.len(), 4096);
    half.fill(0x11);
    assert_eq!(rig.sb.platform_mut().memory.peek_u8(phys + 4096), 0x11);
    assert_eq!(rig.sb.platform_mut().memory.peek_u8(phys), 0);

    rig.dma.set_current_count(5, 100);
    rig.sb.device_buffer().unwrap().fill(0x22);
    assert_eq!(rig.sb.platform_mut().memory.peek_u8(phys), 0x22);
    assert_eq!(rig.sb.platform_mut().memory.peek_u8(phys + 4096), 0x11);
}

#[test]
fn irq_mixes_acknowledges_and_ends_interrupt() {
    let mut rig = rig();
    let (mixer, calls) = counting_mixer(0x5A);
    rig.sb.open(mixer).unwrap();
    let phys = rig.sb.dma_buffer().unwrap().physical();
    rig.dma.set_current_count(5, 10);

    rig.sb.handle_irq();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(rig.sb.platform_mut().memory.peek_u8(phys + 4095), 0x5A);
    assert_eq!(rig.card.acks_16bit(), 1);
    assert_eq!(rig.machine.pic.master_eoi_count(), 1);
}

#[test]
fn irq_on_a_closed_device_still_acknowledges() {
    let mut rig = rig();
    rig.sb.handle_irq();
    assert_eq!(rig.card.acks_16bit(), 1);
    assert_eq!(rig.machine.pic.master_eoi_count(), 1);
}

#[test]
fn irq_while_locked_runs_once_after_the_last_unlock() {
    let mut rig = rig();
    let (mixer, calls) = counting_mixer(1);
    rig.sb.open(mixer).unwrap();

    rig.sb.lock();
    rig.sb.lock();
    rig.sb.handle_irq();
    rig.sb.handle_irq();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(rig.machine.pic.master_eoi_count(), 2);
    assert!(rig.sb.audio_lock().is_deferred());

    rig.sb.unlock();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    rig.sb.unlock();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!rig.sb.audio_lock().is_deferred());
    assert!(rig.machine.cpu.interrupts_enabled());

    rig.sb.unlock();
    assert_eq!(rig.sb.audio_lock().depth(), 0);
}

#[test]
fn missing_16bit_channel_fails_before_allocating() {
    let mut rig = rig_with("A220 I5 D1", CardBehavior::default());
    let (mixer, _) = counting_mixer(0);
    assert!(matches!(rig.sb.open(mixer), Err(SbError::No16BitDma)));
    assert_eq!(rig.machine.memory.live_blocks(), 0);
}

#[test]
fn failed_hook_releases_the_buffer() {
    let mut rig = rig();
    rig.machine.vectors.fail_updates(true);
    let (mixer, _) = counting_mixer(0);
    let err = rig.sb.open(mixer).unwrap_err();
    assert!(matches!(
        err,
        SbError::Dos(DosError::VectorUpdate { vector: IRQ5_VECTOR })
    ));
    assert!(!rig.sb.is_open());
    assert_eq!(rig.machine.memory.live_blocks(), 0);
    assert!(rig.dma.channel(5).masked);
}

#[test]
fn dsp_timeout_during_start_unwinds_the_hook() {
    let mut rig = rig_with(
        "A220 I5 D1 H5",
        CardBehavior {
            write_busy_polls: u32::MAX,
            ..Default::default()
        },
    );
    rig.sb = rig.sb.with_spin_limit(SpinLimit::Polls(8));
    let (mixer, _) = counting_mixer(0);
    assert!(matches!(
        rig.sb.open(mixer),
        Err(SbError::DspTimeout { port: 0x220 })
    ));
    assert_eq!(
        rig.machine.vectors.get(IRQ5_VECTOR),
        SoftVectorTable::bios_default(IRQ5_VECTOR)
    );
    assert_ne!(rig.machine.pic.master_imr() & (1 << 5), 0);
    assert_eq!(rig.machine.memory.live_blocks(), 0);
}

#[test]
fn built_in_trampoline_reaches_the_open_device() {
    let card = Sb16Model::new(0x220);
    let dma = DmaControllerModel::new();
    let mut bus = IoPortBus::new();
    card.attach(&mut bus);
    dma.attach(&mut bus);
    let (platform, machine) = SoftMachine::platform(bus);
    let mut sb = Box::new(SoundBlaster::detect(platform, "A220 I5 H5".parse().unwrap()).unwrap());

    let (mixer, calls) = counting_mixer(3);
    sb.open(mixer).unwrap();
    assert!(machine.vectors.fire(IRQ5_VECTOR));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(card.acks_16bit(), 1);

    sb.close().unwrap();
    assert!(!machine.vectors.fire(IRQ5_VECTOR));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn audio_driver_contract() {
    let mut rig = rig();
    let driver: &mut dyn AudioDriver = &mut rig.sb;
    assert_eq!(driver.name(), "soundblaster");
    assert!(driver.provides_own_callback_thread());
    assert!(driver.only_has_default_playback_device());
    assert!(!driver.has_recording_support());

    let (mixer, calls) = counting_mixer(9);
    let format = driver.open_device(mixer).unwrap();
    assert_eq!(driver.get_device_buffer().unwrap().len(), format.buffer_size);
    driver.lock_stream();
    driver.unlock_stream();
    driver.playback_iterate().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let (again, _) = counting_mixer(0);
    assert!(driver.open_device(again).is_err());
    driver.close_device();
    driver.close_device();
    assert!(driver.get_device_buffer().is_err());
}

#[test]
fn unusable_blaster_value_never_touches_the_ports() {
    for value in [None, Some("I5 D1 H5 T6"), Some("A220 I5")] {
        let card = Sb16Model::new(0x220);
        let mut bus = IoPortBus::new();
        card.attach(&mut bus);
        let ports = TracingPorts::new(bus);
        let log = ports.log();
        let (mut platform, _machine) = SoftMachine::platform(IoPortBus::new());
        platform.io = Box::new(ports);

        let err = SoundBlaster::from_env_value(platform, value).err().unwrap();
        assert!(
            matches!(err, SbError::MissingConfig | SbError::IncompleteConfig),
            "{value:?}: {err}"
        );
        assert!(log.borrow().is_empty(), "{value:?} reached the card");
    }

    // The same wiring does reach the card once the value is complete.
    let card = Sb16Model::new(0x220);
    let mut bus = IoPortBus::new();
    card.attach(&mut bus);
    let ports = TracingPorts::new(bus);
    let log = ports.log();
    let (mut platform, _machine) = SoftMachine::platform(IoPortBus::new());
    platform.io = Box::new(ports);
    assert!(SoundBlaster::from_env_value(platform, Some("A220 I5 D1 H5")).is_ok());
    assert!(!log.borrow().is_empty());
}

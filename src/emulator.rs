//! Top-level facade: owns the bus, the scheduler, both SH-2 cores, the SCU,
//! the SCSP (with its embedded 68000), SMPC, and backup memory, and exposes
//! the host-facing `LoadIPL`/`RunFrame`/callback surface.

use crate::backup::BackupMemory;
use crate::bus::{Bus, Ram, Width};
use crate::config::{CartridgeKind, EmulatorConfig};
use crate::error::LoadError;
use crate::scheduler::{ClockRatio, EventTarget, Scheduler};
use crate::scsp::{Scsp, SAMPLES_PER_FRAME, SOUND_RAM_SIZE};
use crate::scu::Scu;
use crate::sh2::Sh2;
use crate::smpc::Smpc;
use std::cell::RefCell;
use std::rc::Rc;

pub const IPL_SIZE: usize = 0x80000;
pub const WRAM_LOW_SIZE: usize = 1024 * 1024;
pub const WRAM_HIGH_SIZE: usize = 1024 * 1024;

const ADDR_IPL: u32 = 0x0000_0000;
const ADDR_WRAM_LOW: u32 = 0x0020_0000;
const ADDR_CARTRIDGE: u32 = 0x0200_0000;
const ADDR_WRAM_HIGH: u32 = 0x0600_0000;
const ADDR_SCSP: u32 = 0x0580_0000;

pub type FrameCompleteCallback = Box<dyn FnMut(&[u8], u32, u32)>;
pub type Vdp1FrameCompleteCallback = Box<dyn FnMut()>;
pub type ScspSampleCallback = Box<dyn FnMut(i16, i16)>;
pub type CddaCallback = Box<dyn FnMut(&mut [u8; 2048]) -> u32>;

/// Frame-boundary status returned by `RunFrame`, letting the host decide
/// whether to keep pumping frames (e.g. after a disc-load request fired
/// mid-frame and truncated it early).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Completed,
    TerminatedEarly,
}

pub struct Emulator {
    pub bus: Rc<RefCell<Bus>>,
    pub scheduler: Scheduler,
    pub master: Sh2,
    pub slave: Sh2,
    pub scu: Scu,
    pub scsp: Scsp,
    pub smpc: Smpc,
    pub backup: Option<BackupMemory>,
    pub cartridge: CartridgeKind,
    /// Opaque disc image handed over by `load_disc`. Parsing its filesystem
    /// and track layout is a host concern (§1 Non-goals); the core only
    /// tracks ownership so `CDDACallback` has something to pull sectors
    /// against and a later `LoadDisc` can replace it.
    disc: Option<Vec<u8>>,
    config: EmulatorConfig,
    ipl_loaded: bool,
    terminate_requested: bool,

    on_frame: Option<FrameCompleteCallback>,
    on_vdp1_frame: Option<Vdp1FrameCompleteCallback>,
    on_sample: Option<ScspSampleCallback>,
    on_cdda: Option<CddaCallback>,
}

impl Emulator {
    pub fn new(config: EmulatorConfig) -> Self {
        let bus = Rc::new(RefCell::new(Bus::new()));
        {
            let mut b = bus.borrow_mut();
            b.attach("ipl-rom", ADDR_IPL, IPL_SIZE as u32, Box::new(Ram::new(IPL_SIZE)));
            b.attach("wram-low", ADDR_WRAM_LOW, WRAM_LOW_SIZE as u32, Box::new(Ram::new(WRAM_LOW_SIZE)));
            b.attach("wram-high", ADDR_WRAM_HIGH, WRAM_HIGH_SIZE as u32, Box::new(Ram::new(WRAM_HIGH_SIZE)));
        }
        let master = Sh2::new(bus.clone(), true);
        let slave = Sh2::new(bus.clone(), false);
        let scu = Scu::new(bus.clone());
        let scsp = Scsp::new();
        bus.borrow_mut().attach("scsp", ADDR_SCSP, (SOUND_RAM_SIZE + 0x1000) as u32, Box::new(scsp.bus_adapter()));
        let smpc = Smpc::new(config.controller, config.video_standard);
        let backup = BackupMemory::new(config.internal_backup_size).ok();

        let mut scheduler = Scheduler::new();
        scheduler.schedule(EventTarget::Sh2Master, 0);
        scheduler.schedule(EventTarget::Sh2Slave, 0);
        scheduler.schedule(EventTarget::M68k, 0);
        scheduler.schedule(EventTarget::ScuDsp, 0);
        scheduler.schedule(EventTarget::ScspSample, 0);
        scheduler.schedule(EventTarget::VBlankIn, 0);

        Emulator {
            bus,
            scheduler,
            master,
            slave,
            scu,
            scsp,
            smpc,
            backup,
            cartridge: config.cartridge,
            disc: None,
            config,
            ipl_loaded: false,
            terminate_requested: false,
            on_frame: None,
            on_vdp1_frame: None,
            on_sample: None,
            on_cdda: None,
        }
    }

    pub fn set_frame_complete_callback(&mut self, cb: FrameCompleteCallback) {
        self.on_frame = Some(cb);
    }
    pub fn set_vdp1_frame_complete_callback(&mut self, cb: Vdp1FrameCompleteCallback) {
        self.on_vdp1_frame = Some(cb);
    }
    pub fn set_scsp_sample_callback(&mut self, cb: ScspSampleCallback) {
        self.on_sample = Some(cb);
    }
    pub fn set_cdda_callback(&mut self, cb: CddaCallback) {
        self.on_cdda = Some(cb);
    }

    pub fn load_ipl(&mut self, rom_bytes: &[u8]) -> Result<(), LoadError> {
        if rom_bytes.len() != IPL_SIZE {
            return Err(LoadError::WrongIplSize { expected: IPL_SIZE, got: rom_bytes.len() });
        }
        let mut bus = self.bus.borrow_mut();
        for (i, &byte) in rom_bytes.iter().enumerate() {
            bus.write(ADDR_IPL + i as u32, Width::Byte, byte as u32);
        }
        drop(bus);
        self.ipl_loaded = true;
        Ok(())
    }

    pub fn insert_cartridge(&mut self, kind: CartridgeKind) -> Result<(), LoadError> {
        let mut bus = self.bus.borrow_mut();
        match kind {
            CartridgeKind::None => {}
            CartridgeKind::BackupMemory { size } => {
                if !crate::backup::SUPPORTED_SIZES.contains(&size) {
                    return Err(LoadError::InvalidBackupSize(size));
                }
                bus.attach("cartridge-backup", ADDR_CARTRIDGE, size as u32, Box::new(Ram::new(size)));
            }
            CartridgeKind::Dram8Mbit => {
                bus.attach("cartridge-dram", ADDR_CARTRIDGE, 1024 * 1024, Box::new(Ram::new(1024 * 1024)));
            }
            CartridgeKind::Dram32Mbit => {
                bus.attach("cartridge-dram", ADDR_CARTRIDGE, 4 * 1024 * 1024, Box::new(Ram::new(4 * 1024 * 1024)));
            }
            CartridgeKind::Rom { ref bytes } => {
                let mut ram = Ram::new(bytes.len().max(1));
                for (i, &byte) in bytes.iter().enumerate() {
                    ram.as_mut_slice()[i] = byte;
                }
                bus.attach("cartridge-rom", ADDR_CARTRIDGE, bytes.len().max(1) as u32, Box::new(ram));
            }
        }
        drop(bus);
        self.cartridge = kind;
        Ok(())
    }

    /// Takes ownership of a disc image, replacing any previously loaded one.
    /// The core does not parse the image (§1 Non-goals); it only holds it so
    /// `pull_cdda_sector` has a source to draw from.
    pub fn load_disc(&mut self, disc: Vec<u8>) {
        self.disc = Some(disc);
    }

    pub fn disc_loaded(&self) -> bool {
        self.disc.is_some()
    }

    pub fn reset(&mut self, hard: bool) {
        if hard {
            self.master.reset(ADDR_IPL, 0x0006_0000 + WRAM_HIGH_SIZE as u32);
            self.slave.reset(ADDR_IPL, 0x0006_0000);
            self.scheduler = Scheduler::new();
            self.scheduler.schedule(EventTarget::Sh2Master, 0);
            self.scheduler.schedule(EventTarget::Sh2Slave, 0);
            self.scheduler.schedule(EventTarget::M68k, 0);
            self.scheduler.schedule(EventTarget::ScuDsp, 0);
            self.scheduler.schedule(EventTarget::ScspSample, 0);
            self.scheduler.schedule(EventTarget::VBlankIn, 0);
        } else {
            self.smpc.request_soft_reset();
        }
    }

    /// Enqueued by the host between frames (e.g. alongside a disc-load or
    /// factory-reset request) to cut the in-progress `run_frame` short.
    pub fn request_early_termination(&mut self) {
        self.terminate_requested = true;
    }

    pub fn factory_reset(&mut self) {
        self.reset(true);
        if let Some(backup) = &mut self.backup {
            backup.format();
        }
        self.cartridge = CartridgeKind::None;
    }

    /// Runs until the next VBlank-in boundary, or until something enqueued
    /// an early-termination request (factory reset, disc load).
    pub fn run_frame(&mut self) -> FrameOutcome {
        self.terminate_requested = false;
        let master_ratio = ClockRatio::new(1, 1);
        let sample_ratio = ClockRatio::new(crate::scsp::SAMPLE_RATE_HZ as u64, self.config.video_standard.master_clock_hz());
        let scu_dsp_ratio = ClockRatio::new(1, 2);

        loop {
            if self.terminate_requested {
                return FrameOutcome::TerminatedEarly;
            }
            let Some((_time, target)) = self.scheduler.pop() else {
                return FrameOutcome::Completed;
            };
            match target {
                EventTarget::Sh2Master => {
                    self.master.step();
                    self.scheduler.schedule_after(EventTarget::Sh2Master, master_ratio.unscale(1));
                }
                EventTarget::Sh2Slave => {
                    self.slave.step();
                    self.scheduler.schedule_after(EventTarget::Sh2Slave, master_ratio.unscale(1));
                }
                EventTarget::ScuDsp => {
                    self.scu.step_dsp();
                    self.scheduler.schedule_after(EventTarget::ScuDsp, scu_dsp_ratio.unscale(1));
                }
                EventTarget::ScspSample => {
                    let (left, right) = self.scsp.generate_sample();
                    if let Some(cb) = &mut self.on_sample {
                        cb(left, right);
                    }
                    self.scu.run_dma(crate::scu::DmaTrigger::SoundRequest);
                    let cycles = sample_ratio.unscale(1).max(1);
                    self.scheduler.schedule_after(EventTarget::ScspSample, cycles);
                }
                EventTarget::M68k => {
                    self.scsp.cpu.clock_cycle();
                    // SCSP drives the 68000 at one third of its own rate.
                    self.scheduler.schedule_after(EventTarget::M68k, 3);
                }
                EventTarget::VBlankIn => {
                    if self.smpc.take_reset() {
                        self.reset(false);
                    }
                    self.scu.top.raise(crate::scu::top::ScuInterrupt::VBlankIn);
                    self.scu.run_dma(crate::scu::DmaTrigger::VBlankIn);
                    if let Some(cb) = &mut self.on_vdp1_frame {
                        cb();
                    }
                    if let Some(cb) = &mut self.on_frame {
                        cb(&[], 320, 224);
                    }
                    self.scheduler.schedule_after(EventTarget::VBlankIn, self.config.video_standard.master_clock_hz() / 60);
                    self.master.mem.interrupt.irl_level = self.scu.irl_level();
                    return FrameOutcome::Completed;
                }
                _ => {}
            }
            self.master.mem.interrupt.irl_level = self.scu.irl_level();
        }
    }

    /// Pulls one CD-DA sector through the host-provided source, if wired up.
    pub fn pull_cdda_sector(&mut self) -> Option<u32> {
        let mut buffer = [0u8; 2048];
        self.on_cdda.as_mut().map(|cb| cb(&mut buffer))
    }

    pub fn samples_per_frame(&self) -> u32 {
        SAMPLES_PER_FRAME
    }

    pub fn ipl_loaded(&self) -> bool {
        self.ipl_loaded
    }
}

//! Construction-time configuration for an emulator instance. Nothing here
//! survives `Reset` except the fields that describe fixed topology (cache
//! emulation toggle, video standard); everything that is guest state lives
//! on the components themselves.

/// NTSC runs the master SH-2 at ~26.84 MHz; PAL trims it for the 50 Hz
/// field rate. `Scheduler::retime` rescales every outstanding event when
/// this changes at runtime (an SMPC clock-change request).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStandard {
    Ntsc,
    Pal,
}

impl VideoStandard {
    /// Master SH-2 clock in Hz, the scheduler's reference rate.
    pub fn master_clock_hz(self) -> u64 {
        match self {
            VideoStandard::Ntsc => 26_847_000,
            VideoStandard::Pal => 26_687_500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    SaturnPad,
    None,
}

#[derive(Debug, Clone, Copy)]
pub enum CartridgeKind {
    None,
    BackupMemory { size: usize },
    Dram8Mbit,
    Dram32Mbit,
    Rom { bytes: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    pub video_standard: VideoStandard,
    /// Opt-in: SH-2 cache timing is not modeled even when enabled (§9 open
    /// area), but mis-speculation behavior only shows up when this is on.
    pub emulate_sh2_cache: bool,
    pub controller: ControllerKind,
    pub cartridge: CartridgeKind,
    pub internal_backup_size: usize,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            video_standard: VideoStandard::Ntsc,
            emulate_sh2_cache: false,
            controller: ControllerKind::SaturnPad,
            cartridge: CartridgeKind::None,
            internal_backup_size: 32 * 1024,
        }
    }
}

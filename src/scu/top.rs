//! SCU top-level: interrupt aggregation across every source in the console,
//! plus the three CPU-side DMA channels. Signals the master SH-2's IRL line
//! whenever a pending, enabled interrupt outranks what is currently queued.

use crate::bus::{Bus, Width};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScuInterrupt {
    VBlankIn,
    VBlankOut,
    HBlankIn,
    Timer0,
    Timer1,
    DspEnd,
    SoundRequest,
    SystemManager,
    PadInterrupt,
    Level2DmaEnd,
    Level1DmaEnd,
    Level0DmaEnd,
    DmaIllegal,
    Vdp1DrawEnd,
    ABus(u8),
    External,
}

impl ScuInterrupt {
    /// Priority level, 15 (external) down through 1 (VDP1); matches §4.5's
    /// table with external interrupts ranked highest.
    pub fn priority(self) -> u8 {
        match self {
            ScuInterrupt::External => 15,
            ScuInterrupt::VBlankIn => 14,
            ScuInterrupt::VBlankOut => 13,
            ScuInterrupt::HBlankIn => 12,
            ScuInterrupt::Timer0 => 11,
            ScuInterrupt::Timer1 => 10,
            ScuInterrupt::DspEnd => 9,
            ScuInterrupt::SoundRequest => 8,
            ScuInterrupt::SystemManager => 7,
            ScuInterrupt::PadInterrupt => 6,
            ScuInterrupt::Level2DmaEnd => 5,
            ScuInterrupt::Level1DmaEnd => 4,
            ScuInterrupt::Level0DmaEnd => 3,
            ScuInterrupt::DmaIllegal => 2,
            ScuInterrupt::Vdp1DrawEnd => 1,
            ScuInterrupt::ABus(_) => 1,
        }
    }

    fn mask_bit(self) -> u32 {
        match self {
            ScuInterrupt::VBlankIn => 0,
            ScuInterrupt::VBlankOut => 1,
            ScuInterrupt::HBlankIn => 2,
            ScuInterrupt::Timer0 => 3,
            ScuInterrupt::Timer1 => 4,
            ScuInterrupt::DspEnd => 5,
            ScuInterrupt::SoundRequest => 6,
            ScuInterrupt::SystemManager => 7,
            ScuInterrupt::PadInterrupt => 8,
            ScuInterrupt::Level2DmaEnd => 9,
            ScuInterrupt::Level1DmaEnd => 10,
            ScuInterrupt::Level0DmaEnd => 11,
            ScuInterrupt::DmaIllegal => 12,
            ScuInterrupt::Vdp1DrawEnd => 13,
            ScuInterrupt::ABus(n) => 16 + n as u32,
            ScuInterrupt::External => 31,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaTrigger {
    Immediate,
    VBlankIn,
    VBlankOut,
    HBlankIn,
    Timer0,
    Timer1,
    SoundRequest,
    SpriteDrawEnd,
}

#[derive(Debug, Clone, Copy)]
pub struct DmaChannel {
    pub src: u32,
    pub dst: u32,
    pub count: u32,
    pub src_increment: i32,
    pub dst_increment: i32,
    pub trigger: DmaTrigger,
    pub active: bool,
    pub max_count: u32,
}

impl DmaChannel {
    fn new(max_count: u32) -> Self {
        DmaChannel {
            src: 0,
            dst: 0,
            count: 0,
            src_increment: 4,
            dst_increment: 4,
            trigger: DmaTrigger::Immediate,
            active: false,
            max_count,
        }
    }
}

/// Every interrupt source that can assert the master SH-2's IRL line.
/// `ABus` and `External` carry a cartridge-defined level and aren't part of
/// the fixed console-side set this module aggregates on its own.
pub const IRL_SOURCES: [ScuInterrupt; 14] = [
    ScuInterrupt::VBlankIn,
    ScuInterrupt::VBlankOut,
    ScuInterrupt::HBlankIn,
    ScuInterrupt::Timer0,
    ScuInterrupt::Timer1,
    ScuInterrupt::DspEnd,
    ScuInterrupt::SoundRequest,
    ScuInterrupt::SystemManager,
    ScuInterrupt::PadInterrupt,
    ScuInterrupt::Level2DmaEnd,
    ScuInterrupt::Level1DmaEnd,
    ScuInterrupt::Level0DmaEnd,
    ScuInterrupt::DmaIllegal,
    ScuInterrupt::Vdp1DrawEnd,
];

pub struct ScuTop {
    pub pending: u32,
    pub mask: u32,
    pub channels: [DmaChannel; 3],
    bus: Rc<RefCell<Bus>>,
}

impl ScuTop {
    pub fn new(bus: Rc<RefCell<Bus>>) -> Self {
        ScuTop {
            pending: 0,
            mask: 0xffff_ffff,
            channels: [DmaChannel::new(1 << 20), DmaChannel::new(1 << 12), DmaChannel::new(1 << 12)],
            bus,
        }
    }

    pub fn raise(&mut self, source: ScuInterrupt) {
        self.pending |= 1 << source.mask_bit();
    }

    pub fn acknowledge(&mut self, source: ScuInterrupt) {
        self.pending &= !(1 << source.mask_bit());
    }

    /// Highest-priority pending-and-enabled interrupt, or `None`. Used to
    /// decide whether to assert the master SH-2's IRL line.
    pub fn highest_pending(&self, sources: &[ScuInterrupt]) -> Option<ScuInterrupt> {
        sources
            .iter()
            .copied()
            .filter(|s| self.pending & (1 << s.mask_bit()) != 0 && self.mask & (1 << s.mask_bit()) != 0)
            .max_by_key(|s| s.priority())
    }

    /// IRL level the master SH-2 should currently see: the priority of the
    /// highest-ranked pending-and-enabled console interrupt, or 0 if none.
    pub fn irl_level(&self) -> u8 {
        self.highest_pending(&IRL_SOURCES).map(|s| s.priority()).unwrap_or(0)
    }

    /// Runs every armed channel whose trigger matches, copying `count`
    /// longwords from `src` to `dst` one scheduler boundary at a time, then
    /// raises that channel's DMA-end interrupt and disarms it.
    pub fn run_dma(&mut self, trigger: DmaTrigger) {
        let mut ends = Vec::new();
        for (index, channel) in self.channels.iter_mut().enumerate() {
            if !channel.active || channel.trigger != trigger {
                continue;
            }
            let mut bus = self.bus.borrow_mut();
            let mut src = channel.src;
            let mut dst = channel.dst;
            for _ in 0..channel.count {
                let word = bus.read(src, Width::Long);
                bus.write(dst, Width::Long, word);
                src = src.wrapping_add(channel.src_increment as u32);
                dst = dst.wrapping_add(channel.dst_increment as u32);
            }
            drop(bus);
            channel.active = false;
            ends.push(match index {
                0 => ScuInterrupt::Level0DmaEnd,
                1 => ScuInterrupt::Level1DmaEnd,
                _ => ScuInterrupt::Level2DmaEnd,
            });
        }
        for end in ends {
            self.raise(end);
        }
    }
}

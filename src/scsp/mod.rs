//! Saturn Custom Sound Processor: 32 voice slots feeding a shared DSP effect
//! stage, its own 512KiB sound RAM, and the embedded MC68EC000 that drives
//! it. The SH-2 side sees the whole thing as one region on the main bus;
//! the 68000 sees sound RAM and the SCSP register bank through `ScspBus`.

pub mod dsp;
pub mod voice;

use crate::bus::{Bus, BusDevice, Ram, Width};
use crate::m68k::memory::M68kBus;
use crate::m68k::processor::M68k;
use crate::scheduler::{EventTarget, Scheduler};
use crate::tracer::ScspTracer;
use dsp::ScspDsp;
use std::cell::RefCell;
use std::rc::Rc;
use voice::VoiceSlot;

pub const NUM_SLOTS: usize = 32;
pub const SOUND_RAM_SIZE: usize = 512 * 1024;
pub const SAMPLE_RATE_HZ: u32 = 44_100;
/// Samples generated per NTSC video frame at 44.1kHz / ~60fps.
pub const SAMPLES_PER_FRAME: u32 = 512;

/// State shared between the SH-2-visible register bank and the
/// 68000-visible `M68kBus` implementation: the sound RAM itself plus the
/// per-slot register shadow the 68000 can also poke.
pub struct ScspShared {
    pub sound_ram: Rc<RefCell<Bus>>,
    pub registers: [u16; 0x1000 / 2],
    /// Set when a write lands on a slot's KYONEX bit; consumed once per
    /// sample period to apply every slot's latched key-on/off state at once.
    kyonex_pending: bool,
}

impl ScspShared {
    fn new() -> Self {
        let mut bus = Bus::new();
        bus.attach("scsp-wram", 0, SOUND_RAM_SIZE as u32, Box::new(Ram::new(SOUND_RAM_SIZE)));
        ScspShared { sound_ram: Rc::new(RefCell::new(bus)), registers: [0; 0x800], kyonex_pending: false }
    }

    pub fn take_kyonex_pending(&mut self) -> bool {
        std::mem::take(&mut self.kyonex_pending)
    }

    /// KYONEX (bit 15 of a slot's word 0) is a strobe: any write that sets
    /// it latches a pending key-on/off resolution pass and is cleared back
    /// to 0 immediately, matching the real chip's self-clearing behavior.
    fn note_register_write(&mut self, idx: usize) {
        if idx % voice::SLOT_REGISTER_WORDS == 0 && self.registers[idx] & (1 << 15) != 0 {
            self.registers[idx] &= !(1 << 15);
            self.kyonex_pending = true;
        }
    }

    /// Raw register/sound-RAM write with none of `write8`/`write16`'s
    /// side effects — for debugger-facing pokes that must not arm KYONEX.
    fn poke_raw(&mut self, offset: u32, width: Width, value: u32) {
        if (offset as usize) < SOUND_RAM_SIZE {
            // Plain RAM: `write` has no side effects, so it doubles as poke.
            self.sound_ram.borrow_mut().write(offset, width, value);
            return;
        }
        let idx = ((offset as usize - SOUND_RAM_SIZE) / 2) % self.registers.len();
        match width {
            Width::Byte => {
                if offset & 1 == 0 {
                    self.registers[idx] = (self.registers[idx] & 0x00ff) | ((value as u16) << 8);
                } else {
                    self.registers[idx] = (self.registers[idx] & 0xff00) | value as u16;
                }
            }
            Width::Word => self.registers[idx] = value as u16,
            Width::Long => {
                self.registers[idx] = (value >> 16) as u16;
                let idx2 = (idx + 1) % self.registers.len();
                self.registers[idx2] = value as u16;
            }
        }
    }
}

impl M68kBus for ScspShared {
    fn read8(&mut self, address: u32) -> u8 {
        if (address as usize) < SOUND_RAM_SIZE {
            self.sound_ram.borrow_mut().read(address, Width::Byte) as u8
        } else {
            let idx = ((address as usize - SOUND_RAM_SIZE) / 2) % self.registers.len();
            if address & 1 == 0 {
                (self.registers[idx] >> 8) as u8
            } else {
                self.registers[idx] as u8
            }
        }
    }

    fn read16(&mut self, address: u32) -> u16 {
        if (address as usize) < SOUND_RAM_SIZE {
            self.sound_ram.borrow_mut().read(address & !1, Width::Word) as u16
        } else {
            let idx = ((address as usize - SOUND_RAM_SIZE) / 2) % self.registers.len();
            self.registers[idx]
        }
    }

    fn write8(&mut self, address: u32, value: u8) {
        if (address as usize) < SOUND_RAM_SIZE {
            self.sound_ram.borrow_mut().write(address, Width::Byte, value as u32);
        } else {
            let idx = ((address as usize - SOUND_RAM_SIZE) / 2) % self.registers.len();
            if address & 1 == 0 {
                self.registers[idx] = (self.registers[idx] & 0x00ff) | ((value as u16) << 8);
            } else {
                self.registers[idx] = (self.registers[idx] & 0xff00) | value as u16;
            }
            self.note_register_write(idx);
        }
    }

    fn write16(&mut self, address: u32, value: u16) {
        if (address as usize) < SOUND_RAM_SIZE {
            self.sound_ram.borrow_mut().write(address & !1, Width::Word, value as u32);
        } else {
            let idx = ((address as usize - SOUND_RAM_SIZE) / 2) % self.registers.len();
            self.registers[idx] = value;
            self.note_register_write(idx);
        }
    }

    fn peek8(&self, address: u32) -> u8 {
        if (address as usize) < SOUND_RAM_SIZE {
            self.sound_ram.borrow().peek(address, Width::Byte).unwrap_or(0) as u8
        } else {
            let idx = ((address as usize - SOUND_RAM_SIZE) / 2) % self.registers.len();
            if address & 1 == 0 {
                (self.registers[idx] >> 8) as u8
            } else {
                self.registers[idx] as u8
            }
        }
    }

    fn peek16(&self, address: u32) -> u16 {
        if (address as usize) < SOUND_RAM_SIZE {
            self.sound_ram.borrow().peek(address & !1, Width::Word).unwrap_or(0) as u16
        } else {
            let idx = ((address as usize - SOUND_RAM_SIZE) / 2) % self.registers.len();
            self.registers[idx]
        }
    }
}

pub struct Scsp {
    pub voices: Vec<VoiceSlot>,
    pub dsp: ScspDsp,
    pub shared: Rc<RefCell<ScspShared>>,
    pub cpu: M68k,
    tracer: Option<Box<dyn ScspTracer>>,
}

impl Scsp {
    pub fn new() -> Self {
        let shared = Rc::new(RefCell::new(ScspShared::new()));
        let d = std::array::from_fn(|_| Rc::new(RefCell::new(0u32)));
        let a = std::array::from_fn(|_| Rc::new(RefCell::new(0u32)));
        let cpu = M68k::new(0, d, a, shared.clone());
        Scsp { voices: (0..NUM_SLOTS).map(|_| VoiceSlot::new()).collect(), dsp: ScspDsp::new(), shared, cpu, tracer: None }
    }

    pub fn install_tracer(&mut self, tracer: Box<dyn ScspTracer>) {
        self.tracer = Some(tracer);
    }

    pub fn key_on(&mut self, slot: usize) {
        if let Some(voice) = self.voices.get_mut(slot) {
            voice.key_on_trigger();
            if let Some(tracer) = &self.tracer {
                tracer.on_key_on(slot);
            }
        }
    }

    pub fn key_off(&mut self, slot: usize) {
        if let Some(voice) = self.voices.get_mut(slot) {
            voice.key_off();
            if let Some(tracer) = &self.tracer {
                tracer.on_key_off(slot);
            }
        }
    }

    /// Re-reads every slot's register block from the guest-visible bank,
    /// then resolves any KYONEX strobe latched since the last sample.
    fn sync_voices_from_registers(&mut self) {
        let kyonex = {
            let mut shared = self.shared.borrow_mut();
            let kyonex = shared.take_kyonex_pending();
            for (slot, voice) in self.voices.iter_mut().enumerate() {
                let base = slot * voice::SLOT_REGISTER_WORDS;
                let words: [u16; voice::SLOT_REGISTER_WORDS] =
                    shared.registers[base..base + voice::SLOT_REGISTER_WORDS].try_into().unwrap();
                voice.load_registers(&words);
            }
            kyonex
        };
        if kyonex {
            for slot in 0..self.voices.len() {
                let (wants_on, is_on) = (self.voices[slot].key_on, self.voices[slot].active);
                if wants_on && !is_on {
                    self.key_on(slot);
                } else if !wants_on && is_on {
                    self.key_off(slot);
                }
            }
        }
    }

    /// Runs one sample period: every voice ticks once into the DSP's mix
    /// stack, the DSP program runs once, and the result is the final
    /// stereo frame.
    pub fn generate_sample(&mut self) -> (i16, i16) {
        self.sync_voices_from_registers();
        let mut bus = self.shared.borrow_mut().sound_ram.clone();
        let mut left = 0i32;
        let mut right = 0i32;
        for (i, voice) in self.voices.iter_mut().enumerate() {
            let sample = voice.tick(&mut bus.borrow_mut());
            self.dsp.push_mix(i, sample as i32);
            let (gl, gr) = voice.pan_gains();
            left += (sample as i32 * gl) >> 10;
            right += (sample as i32 * gr) >> 10;
        }
        self.dsp.run_sample();
        let left = left.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        let right = right.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        if let Some(tracer) = &self.tracer {
            tracer.on_sample(left, right);
        }
        // Sample-generation boundary: the only interrupt line the embedded
        // 68000 ever sees, per its own doc comment.
        self.cpu.request_interrupt(1);
        (left, right)
    }

    pub fn schedule_next_sample(&self, scheduler: &mut Scheduler, cycles_per_sample: u64) {
        scheduler.schedule_after(EventTarget::ScspSample, cycles_per_sample);
    }

    /// A bus-attachable handle onto the same sound RAM and register bank
    /// the embedded 68000 sees, for mounting on the SH-2 side's main bus.
    pub fn bus_adapter(&self) -> ScspBusAdapter {
        ScspBusAdapter(self.shared.clone())
    }
}

impl Default for Scsp {
    fn default() -> Self {
        Self::new()
    }
}

/// The SH-2 side's view of the SCSP: sound RAM plus register bank,
/// reached by cloning the `Rc` the embedded 68000 also writes through, so
/// a register write from either CPU is visible to the other immediately.
pub struct ScspBusAdapter(pub Rc<RefCell<ScspShared>>);

impl BusDevice for ScspBusAdapter {
    fn read(&mut self, offset: u32, width: Width) -> u32 {
        let mut shared = self.0.borrow_mut();
        match width {
            Width::Byte => shared.read8(offset) as u32,
            Width::Word => shared.read16(offset) as u32,
            Width::Long => shared.read32(offset),
        }
    }

    fn write(&mut self, offset: u32, width: Width, value: u32) {
        let mut shared = self.0.borrow_mut();
        match width {
            Width::Byte => shared.write8(offset, value as u8),
            Width::Word => shared.write16(offset, value as u16),
            Width::Long => shared.write32(offset, value),
        }
    }

    fn peek(&self, offset: u32, width: Width) -> Option<u32> {
        let shared = self.0.borrow();
        Some(match width {
            Width::Byte => shared.peek8(offset) as u32,
            Width::Word => shared.peek16(offset) as u32,
            Width::Long => ((shared.peek16(offset) as u32) << 16) | shared.peek16(offset.wrapping_add(2)) as u32,
        })
    }

    /// Overridden so a debugger write can't arm the KYONEX latch or
    /// otherwise ripple into the next sample period's key-on/off pass.
    fn poke(&mut self, offset: u32, width: Width, value: u32) {
        self.0.borrow_mut().poke_raw(offset, width, value);
    }
}

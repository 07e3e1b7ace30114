//! SCSP 32-voice slot engine. Each `tick()` call advances one slot through
//! the 7-step micro-pipeline in one sample period: phase/pitch-LFO, address
//! and modulation read, waveform read, interpolation + envelope + amp-LFO,
//! two level-calculation passes, and the sound-stack write.

use crate::bus::{Bus, Width};
use std::cell::RefCell;
use std::rc::Rc;

/// Fixed LFO step-rate table, index by the 5-bit LFO frequency field.
pub const LFO_FREQ_TABLE: [u16; 32] = [
    1020, 892, 764, 636, 508, 444, 380, 316, 252, 220, 188, 156, 124, 108, 92, 76, 60, 52, 44, 36, 28, 24, 20, 16, 12, 10, 8, 6, 4, 3, 2, 1,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Off,
    Normal,
    Reverse,
    Alternate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundSource {
    SoundRam,
    Noise,
    Silence,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Attack,
    Decay1,
    Decay2,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoWaveform {
    Saw,
    Square,
    Triangle,
    Noise,
}

#[derive(Debug, Clone)]
pub struct VoiceSlot {
    // Static parameters.
    pub sa: u32,
    pub lsa: u16,
    pub lea: u16,
    pub pcm8b: bool,
    pub key_on: bool,
    pub loop_control: LoopControl,
    pub sample_xor: u16,
    pub source: SoundSource,
    pub ar: u8,
    pub d1r: u8,
    pub d2r: u8,
    pub rr: u8,
    pub dl: u8,
    pub krs: u8,
    pub eg_hold: bool,
    pub loop_start_link: bool,
    pub mdl: u8,
    pub mdxsl: u8,
    pub mdysl: u8,
    pub stwinh: bool,
    pub tl: u8,
    pub sound_direct: bool,
    pub octave: i8,
    pub fns: u16,
    pub lfo_waveform_amp: LfoWaveform,
    pub lfo_waveform_pitch: LfoWaveform,
    pub lfo_freq: u8,
    pub alfo_sens: u8,
    pub plfo_sens: u8,
    pub imxl: u8,
    pub isel: u8,
    pub disdl: u8,
    pub dipan: u8,
    pub efsdl: u8,
    pub efpan: u8,

    // Runtime state.
    pub active: bool,
    pub envelope_state: EnvelopeState,
    pub eg_level: u16,
    pub sample_counter: u32,
    pub current_address: u32,
    pub current_sample: i16,
    pub phase: u32,
    pub reverse: bool,
    pub crossed_loop_start: bool,
    pub prev_samples: [i16; 2],
    pub output: i16,
    lfsr: u32,
    lfo_counter: u32,
}

impl Default for VoiceSlot {
    fn default() -> Self {
        VoiceSlot {
            sa: 0,
            lsa: 0,
            lea: 0,
            pcm8b: false,
            key_on: false,
            loop_control: LoopControl::Off,
            sample_xor: 0,
            source: SoundSource::SoundRam,
            ar: 0,
            d1r: 0,
            d2r: 0,
            rr: 0,
            dl: 0,
            krs: 0,
            eg_hold: false,
            loop_start_link: false,
            mdl: 0,
            mdxsl: 0,
            mdysl: 0,
            stwinh: false,
            tl: 0,
            sound_direct: false,
            octave: 0,
            fns: 0,
            lfo_waveform_amp: LfoWaveform::Saw,
            lfo_waveform_pitch: LfoWaveform::Saw,
            lfo_freq: 0,
            alfo_sens: 0,
            plfo_sens: 0,
            imxl: 0,
            isel: 0,
            disdl: 0,
            dipan: 0,
            efsdl: 0,
            efpan: 0,
            active: false,
            envelope_state: EnvelopeState::Attack,
            eg_level: 0x3ff,
            sample_counter: 0,
            current_address: 0,
            current_sample: 0,
            phase: 0,
            reverse: false,
            crossed_loop_start: false,
            prev_samples: [0, 0],
            output: 0,
            lfsr: 1,
            lfo_counter: 0,
        }
    }
}

/// Number of register-bank words occupied by one slot.
pub const SLOT_REGISTER_WORDS: usize = 16;

fn lfo_waveform(bits: u16) -> LfoWaveform {
    match bits & 0x3 {
        0 => LfoWaveform::Saw,
        1 => LfoWaveform::Square,
        2 => LfoWaveform::Triangle,
        _ => LfoWaveform::Noise,
    }
}

impl VoiceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes this slot's 16-word register block (as laid out by the guest
    /// bus at `SLOT_REGISTER_WORDS * slot_index`) into the slot's static
    /// parameters. `key_on`/`active` are left untouched here — KYONEX
    /// triggering is resolved by the caller once every slot has re-synced.
    pub fn load_registers(&mut self, words: &[u16; SLOT_REGISTER_WORDS]) {
        let w0 = words[0];
        self.key_on = w0 & (1 << 14) != 0;
        let sbctl = (w0 >> 12) & 0x3;
        self.sample_xor = if sbctl & 1 != 0 { 0x7fff } else { 0 } | if sbctl & 2 != 0 { 0x8000 } else { 0 };
        self.source = match (w0 >> 10) & 0x3 {
            0 => SoundSource::SoundRam,
            1 => SoundSource::Noise,
            2 => SoundSource::Silence,
            _ => SoundSource::Unknown,
        };
        self.loop_control = match (w0 >> 8) & 0x3 {
            0 => LoopControl::Off,
            1 => LoopControl::Normal,
            2 => LoopControl::Reverse,
            _ => LoopControl::Alternate,
        };
        self.pcm8b = w0 & (1 << 7) != 0;
        self.sound_direct = w0 & (1 << 6) != 0;
        self.sa = (((w0 & 0xf) as u32) << 16) | words[1] as u32;
        self.lsa = words[2];
        self.lea = words[3];

        let w4 = words[4];
        self.ar = ((w4 >> 11) & 0x1f) as u8;
        self.d1r = ((w4 >> 6) & 0x1f) as u8;
        self.d2r = ((w4 >> 1) & 0x1f) as u8;
        self.eg_hold = w4 & 1 != 0;

        let w5 = words[5];
        self.rr = ((w5 >> 11) & 0x1f) as u8;
        self.dl = ((w5 >> 6) & 0x1f) as u8;
        self.krs = ((w5 >> 2) & 0xf) as u8;
        self.loop_start_link = w5 & (1 << 1) != 0;
        self.stwinh = w5 & 1 != 0;

        let w6 = words[6];
        self.tl = ((w6 >> 8) & 0xff) as u8;
        self.mdl = ((w6 >> 4) & 0xf) as u8;
        self.mdxsl = ((w6 >> 2) & 0x3) as u8;
        self.mdysl = (w6 & 0x3) as u8;

        let w7 = words[7];
        let raw_octave = ((w7 >> 11) & 0xf) as i8;
        self.octave = if raw_octave & 0x8 != 0 { raw_octave - 16 } else { raw_octave };
        self.fns = w7 & 0x3ff;

        let w8 = words[8];
        self.lfo_freq = ((w8 >> 10) & 0x1f) as u8;
        self.lfo_waveform_pitch = lfo_waveform((w8 >> 8) & 0x3);
        self.plfo_sens = ((w8 >> 5) & 0x7) as u8;
        self.lfo_waveform_amp = lfo_waveform((w8 >> 3) & 0x3);
        self.alfo_sens = (w8 & 0x7) as u8;

        let w9 = words[9];
        self.isel = ((w9 >> 12) & 0xf) as u8;
        self.imxl = ((w9 >> 8) & 0xf) as u8;
        self.disdl = ((w9 >> 4) & 0xf) as u8;

        let w10 = words[10];
        self.dipan = ((w10 >> 11) & 0x1f) as u8;
        self.efsdl = ((w10 >> 6) & 0x1f) as u8;
        self.efpan = (w10 & 0x3f) as u8;
    }

    pub fn key_on_trigger(&mut self) {
        self.active = true;
        self.envelope_state = EnvelopeState::Attack;
        self.eg_level = 0x3ff;
        self.phase = 0;
        self.reverse = false;
        self.crossed_loop_start = false;
        self.current_address = self.sa;
        self.prev_samples = [0, 0];
    }

    pub fn key_off(&mut self) {
        if self.active {
            self.envelope_state = EnvelopeState::Release;
        }
    }

    /// Step 1: phase accumulator advance. FNS is a Q10 fixed-point
    /// fractional step with an implicit leading one; octave shifts it.
    fn step_phase(&mut self, pitch_lfo: i32) {
        let step_base = (0x400 | (self.fns as u32 & 0x3ff)) as i64;
        let shifted = if self.octave >= 0 { step_base << self.octave } else { step_base >> (-self.octave) };
        let step = (shifted + pitch_lfo as i64).max(0) as u32;
        if self.reverse {
            self.phase = self.phase.saturating_sub(step);
        } else {
            self.phase = self.phase.wrapping_add(step);
        }
    }

    fn loop_len(&self) -> u32 {
        (self.lea.saturating_sub(self.lsa)).max(1) as u32
    }

    /// Resolves a raw `whole`-sample offset against the loop-control state
    /// into a concrete data-RAM index. `mutate` gates the side effects
    /// (loop-start-crossed latch, alternate-loop direction flip) so the
    /// lookahead sample used for interpolation doesn't double-apply them.
    fn resolve_index(&mut self, whole: u32, mutate: bool) -> u32 {
        let lsa = self.lsa as u32;
        let lea = self.lea as u32;
        let len = self.loop_len();
        let index = match self.loop_control {
            LoopControl::Off => whole.min(lea.saturating_sub(1)),
            LoopControl::Normal => {
                if whole >= lea {
                    lsa + (whole - lsa) % len
                } else {
                    whole
                }
            }
            LoopControl::Reverse | LoopControl::Alternate => {
                if whole >= lea {
                    if mutate && self.loop_control == LoopControl::Alternate {
                        self.reverse = !self.reverse;
                    }
                    lsa + (whole - lsa) % len
                } else {
                    whole
                }
            }
        };
        if mutate && whole >= lsa && !self.crossed_loop_start {
            self.crossed_loop_start = true;
        }
        index
    }

    /// Step 2+3: fetches one raw waveform sample (applying the XOR mask
    /// for unsigned PCM) at a resolved data-RAM index.
    fn read_sample(&self, bus: &mut Bus, index: u32) -> i16 {
        let byte_addr = self.sa.wrapping_add(if self.pcm8b { index } else { index * 2 });
        if self.pcm8b {
            (bus.read(byte_addr, Width::Byte) as u8 as i8 as i16) ^ (self.sample_xor as i16 & 0xff)
        } else {
            (bus.read(byte_addr, Width::Word) as u16 as i16) ^ self.sample_xor as i16
        }
    }

    /// Rough effective-rate table: higher AR/D1R/D2R/RR step the envelope
    /// faster. Key-rate scaling nudges the rate by octave/FNS per KRS.
    fn effective_rate(&self, base_rate: u8) -> u32 {
        if base_rate == 0 {
            return 0;
        }
        let scaled = base_rate as i32 + (self.krs as i32).min(14) - 7;
        scaled.clamp(1, 63) as u32
    }

    fn step_envelope(&mut self) {
        if !self.active {
            return;
        }
        match self.envelope_state {
            EnvelopeState::Attack => {
                if self.eg_hold {
                    // Time still passes but level is pinned at max volume.
                } else {
                    let rate = self.effective_rate(self.ar);
                    if rate > 0 && self.sample_counter % rate.max(1) == 0 {
                        self.eg_level = self.eg_level.saturating_sub(1);
                    }
                }
                let crossed = self.loop_start_link && self.crossed_loop_start;
                if self.eg_level == 0 || crossed {
                    self.eg_level = 0;
                    self.envelope_state = EnvelopeState::Decay1;
                }
            }
            EnvelopeState::Decay1 => {
                let rate = self.effective_rate(self.d1r);
                if rate > 0 && self.sample_counter % rate.max(1) == 0 {
                    self.eg_level = (self.eg_level + 1).min(0x3ff);
                }
                if (self.eg_level >> 5) >= self.dl as u16 {
                    self.envelope_state = EnvelopeState::Decay2;
                }
            }
            EnvelopeState::Decay2 => {
                let rate = self.effective_rate(self.d2r);
                if rate > 0 && self.sample_counter % rate.max(1) == 0 {
                    self.eg_level = (self.eg_level + 1).min(0x3ff);
                }
            }
            EnvelopeState::Release => {
                let rate = self.effective_rate(self.rr);
                if rate > 0 && self.sample_counter % rate.max(1) == 0 {
                    self.eg_level = (self.eg_level + 1).min(0x3ff);
                }
                if self.eg_level >= 0x3ff {
                    self.active = false;
                }
            }
        }
    }

    fn lfsr_step(&mut self) -> bool {
        // 32-bit LFSR; the exact tap polynomial is a documented open
        // question, this uses a maximal-length 32-bit tap set.
        let bit = ((self.lfsr >> 31) ^ (self.lfsr >> 21) ^ (self.lfsr >> 1) ^ self.lfsr) & 1;
        self.lfsr = (self.lfsr << 1) | bit;
        bit != 0
    }

    fn lfo_value(&mut self, waveform: LfoWaveform) -> i32 {
        let period = LFO_FREQ_TABLE[(self.lfo_freq & 0x1f) as usize] as u32;
        let phase = self.lfo_counter % period.max(1);
        let frac = (phase * 256 / period.max(1)) as i32 - 128;
        match waveform {
            LfoWaveform::Saw => frac,
            LfoWaveform::Square => {
                if phase * 2 < period {
                    127
                } else {
                    -128
                }
            }
            LfoWaveform::Triangle => 128 - (frac.abs() * 2),
            LfoWaveform::Noise => {
                if self.lfsr_step() {
                    127
                } else {
                    -128
                }
            }
        }
    }

    /// Runs the full 7-step pipeline for one sample period and returns the
    /// final attenuated sample that would be pushed to the sound stack
    /// (unless `stwinh` suppresses the push).
    pub fn tick(&mut self, bus: &mut Bus) -> i16 {
        if !self.active {
            return 0;
        }
        self.lfo_counter = self.lfo_counter.wrapping_add(1);
        let pitch_lfo = if self.plfo_sens > 0 {
            (self.lfo_value(self.lfo_waveform_pitch) * self.plfo_sens as i32) >> 7
        } else {
            0
        };
        let position = self.phase;
        let whole = position >> 10;
        let frac = (position & 0x3ff) as i32;
        let index = self.resolve_index(whole, true);
        let next_index = self.resolve_index(whole.wrapping_add(1), false);
        let sample = self.read_sample(bus, index);
        let next_sample = self.read_sample(bus, next_index);
        let interpolated = sample as i32 + (((next_sample as i32 - sample as i32) * frac) >> 10);
        self.prev_samples[0] = sample;
        self.current_sample = sample;
        self.step_phase(pitch_lfo);
        self.step_envelope();
        self.sample_counter = self.sample_counter.wrapping_add(1);

        let amp_lfo = if self.alfo_sens > 0 {
            (self.lfo_value(self.lfo_waveform_amp).unsigned_abs() * self.alfo_sens as u32) >> 7
        } else {
            0
        };
        // Level calculation: EG (0=max, 0x3ff=min) combined with TL and the
        // amp-LFO attenuation, expressed as a linear gain in [0, 1<<10].
        let attenuation = (self.eg_level as u32 + (self.tl as u32) * 8 + amp_lfo).min(0x3ff);
        let gain = 0x400u32.saturating_sub(attenuation);
        let level = (interpolated * gain as i32) >> 10;
        self.output = level.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        if self.stwinh {
            0
        } else {
            self.output
        }
    }

    /// Direct-send (DISDL/DIPAN) stereo gains for this slot, each in
    /// `0..=0x400`. Bit 4 of DIPAN picks the attenuated side; bits 3..0 are
    /// a 3dB-per-step attenuation of that side, the other side passing at
    /// DISDL's level unattenuated.
    pub fn pan_gains(&self) -> (i32, i32) {
        let level = (0x400 >> (7 - self.disdl.min(7))) as i32;
        let atten_steps = (self.dipan & 0xf) as u32;
        let atten = 0x400i32 >> (atten_steps / 4).min(10);
        if self.dipan & 0x10 == 0 {
            (level, (level * atten) >> 10)
        } else {
            ((level * atten) >> 10, level)
        }
    }
}

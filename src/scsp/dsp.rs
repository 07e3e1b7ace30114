//! SCSP DSP: the 128-step microcode engine that mixes the 32 voice slots'
//! sound-stack output into the effect send. Field layout follows the
//! hardware's 64-bit instruction word (MASA/CRA/temp/coef addressing,
//! X/Y multiplier select, EFREG/TEMP read-write requests).

pub const PROGRAM_SIZE: usize = 128;
pub const TEMP_SIZE: usize = 128;
pub const SOUND_MEM_SIZE: usize = 32;
pub const COEF_SIZE: usize = 64;
pub const ADDR_SIZE: usize = 32;
pub const MIX_STACK_SIZE: usize = 16;
pub const EFREG_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct DspInstr {
    pub tra: u8,
    pub twt: bool,
    pub twa: u8,
    pub xsel: bool,
    pub ysel: u8,
    pub ira: u8,
    pub iwt: bool,
    pub iwa: u8,
    pub table: bool,
    pub mwt: bool,
    pub mrd: bool,
    pub ewt: bool,
    pub ewa: u8,
    pub adrl: bool,
    pub frcl: bool,
    pub shift: u8,
    pub yrl: bool,
    pub negb: bool,
    pub zero: bool,
    pub bsel: bool,
    pub cra: u8,
    pub nofl: bool,
    pub masa: u8,
    pub adreb: bool,
    pub nxaddr: bool,
}

pub struct ScspDsp {
    pub program: [DspInstr; PROGRAM_SIZE],
    pub temp_mem: [i32; TEMP_SIZE],
    pub sound_mem: [i32; SOUND_MEM_SIZE],
    pub coeffs: [i16; COEF_SIZE],
    pub addrs: [u16; ADDR_SIZE],
    pub mix_stack: [i32; MIX_STACK_SIZE],
    pub effect_out: [i16; EFREG_SIZE],
    pub audio_in_out: [i16; 2],
    pub ring_buffer_lead: u8,
    pub ring_buffer_len: u8,

    inputs: i32,
    sft_reg: i32,
    frc_reg: i16,
    y_reg: i32,
    adrs_reg: u16,
    mdec_ct: u16,
}

impl ScspDsp {
    pub fn new() -> Self {
        ScspDsp {
            program: [DspInstr::default(); PROGRAM_SIZE],
            temp_mem: [0; TEMP_SIZE],
            sound_mem: [0; SOUND_MEM_SIZE],
            coeffs: [0; COEF_SIZE],
            addrs: [0; ADDR_SIZE],
            mix_stack: [0; MIX_STACK_SIZE],
            effect_out: [0; EFREG_SIZE],
            audio_in_out: [0; 2],
            ring_buffer_lead: 0,
            ring_buffer_len: 0,
            inputs: 0,
            sft_reg: 0,
            frc_reg: 0,
            y_reg: 0,
            adrs_reg: 0,
            mdec_ct: 0,
        }
    }

    pub fn push_mix(&mut self, slot: usize, sample: i32) {
        if slot < MIX_STACK_SIZE {
            self.mix_stack[slot] = sample;
        }
    }

    /// Executes the full 128-step program once; called once per sample.
    pub fn run_sample(&mut self) {
        for step in 0..PROGRAM_SIZE {
            self.execute(step);
        }
        if self.mdec_ct == 0 {
            self.mdec_ct = (self.ring_buffer_len as u16).max(1);
        }
        self.mdec_ct = self.mdec_ct.wrapping_sub(1);
    }

    fn execute(&mut self, step: usize) {
        let instr = self.program[step];

        if instr.iwt {
            self.inputs = self.mix_stack.get(instr.iwa as usize).copied().unwrap_or(0);
        }
        let x = if instr.xsel { self.inputs } else { self.temp_mem[instr.tra as usize % TEMP_SIZE] };
        let y = match instr.ysel {
            0 => self.frc_reg as i32,
            1 => self.coeffs.get(instr.cra as usize % COEF_SIZE).copied().unwrap_or(0) as i32,
            2 => self.y_reg >> 11,
            _ => self.y_reg >> 4 & 0xfff,
        };
        let product = (x as i64) * (y as i64);

        let adder_b = if instr.zero {
            0
        } else if instr.bsel {
            self.sft_reg as i64
        } else {
            self.temp_mem[instr.twa as usize % TEMP_SIZE] as i64
        };
        let sum = if instr.negb { adder_b - product } else { adder_b + product };
        self.sft_reg = match (instr.shift >> 1, instr.shift & 1) {
            (0, _) => (sum << 2) as i32,
            (1, 0) => (sum << 1) as i32,
            _ => sum as i32,
        };

        if instr.twt {
            self.temp_mem[instr.twa as usize % TEMP_SIZE] = self.sft_reg;
        }
        if instr.frcl {
            self.frc_reg = (self.sft_reg & 0xfff) as i16;
        }
        if instr.adrl {
            self.adrs_reg = ((self.sft_reg >> 12) & 0xfff) as u16;
        }
        if instr.ewt {
            self.effect_out[instr.ewa as usize % EFREG_SIZE] = (self.sft_reg >> 8) as i16;
        }
        if instr.yrl {
            self.y_reg = self.inputs;
        }
    }
}

impl Default for ScspDsp {
    fn default() -> Self {
        Self::new()
    }
}

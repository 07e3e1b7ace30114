//! Debug tracer interfaces. Each component accepts an optional boxed tracer;
//! every method has a no-op default so an implementer only overrides the
//! hooks it cares about. Installing any tracer does not by itself slow down
//! memory-access paths elsewhere — each component gates its own "slow path"
//! on whether a tracer is present (see `M68k::clock_cycle`, `Sh2::step`).

use crate::m68k::instructions::Instruction as M68kInstruction;

/// Observes the SH-2 interpreter. `pc` is the address of the instruction that
/// just retired, not the next one.
pub trait Sh2Tracer {
    fn on_execute(&self, _master: bool, _pc: u32, _opcode: u16) {}
    fn on_interrupt(&self, _master: bool, _level: u8, _vector: u8) {}
    fn on_memory_read(&self, _master: bool, _addr: u32, _width: u8, _value: u32) {}
    fn on_memory_write(&self, _master: bool, _addr: u32, _width: u8, _value: u32) {}
}

/// Observes the MC68EC000 interpreter embedded in the SCSP.
pub trait M68kTracer {
    fn on_execute(&self, _pc: u32, _instr: &M68kInstruction) {}
    fn on_interrupt(&self, _level: u8, _vector: u8) {}
}

/// Observes the SCU DSP step function.
pub trait ScuTracer {
    fn on_dsp_step(&self, _pc: u8) {}
    fn on_dsp_end(&self, _interrupt: bool) {}
    fn on_dma(&self, _channel: u8, _src: u32, _dst: u32, _len: u32) {}
    fn on_interrupt(&self, _source: u32) {}
}

/// Observes the SCSP slot engine and its DSP.
pub trait ScspTracer {
    fn on_sample(&self, _left: i16, _right: i16) {}
    fn on_key_on(&self, _slot: usize) {}
    fn on_key_off(&self, _slot: usize) {}
    fn on_dsp_step(&self) {}
}

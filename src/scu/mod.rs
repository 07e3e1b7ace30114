//! System Control Unit: the SH-2-side bus arbiter, interrupt aggregator,
//! and the programmable DSP.

pub mod dsp;
pub mod top;

use crate::bus::Bus;
use crate::tracer::ScuTracer;
use dsp::ScuDsp;
use std::cell::RefCell;
use std::rc::Rc;
pub use top::DmaTrigger;
use top::ScuTop;

pub struct Scu {
    pub dsp: ScuDsp,
    pub top: ScuTop,
    tracer: Option<Box<dyn ScuTracer>>,
}

impl Scu {
    pub fn new(bus: Rc<RefCell<Bus>>) -> Self {
        Scu { dsp: ScuDsp::new(bus.clone()), top: ScuTop::new(bus), tracer: None }
    }

    pub fn install_tracer(&mut self, tracer: Box<dyn ScuTracer>) {
        self.tracer = Some(tracer);
    }

    pub fn step_dsp(&mut self) {
        let was_ended = self.dsp.state == dsp::DspState::Ended;
        self.dsp.step();
        if !was_ended && self.dsp.state == dsp::DspState::Ended {
            if let Some(tracer) = &self.tracer {
                tracer.on_dsp_end(self.dsp.end_triggered);
            }
            if self.dsp.end_triggered {
                self.top.raise(top::ScuInterrupt::DspEnd);
            }
        }
    }

    /// Resolves every DMA channel armed for `trigger` and raises the
    /// corresponding end-of-transfer interrupt(s). Called at each scheduler
    /// boundary where that trigger condition becomes true (VBlank-in,
    /// HBlank-in, sound request, ...).
    pub fn run_dma(&mut self, trigger: DmaTrigger) {
        self.top.run_dma(trigger);
    }

    /// Level the master SH-2's IRL line should currently carry.
    pub fn irl_level(&self) -> u8 {
        self.top.irl_level()
    }
}

//! System Manager and Peripheral Control: pad input latching, the reset
//! button line, and clock-change requests that retime the scheduler.

use crate::config::{ControllerKind, VideoStandard};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmpcCommand {
    IntBack,
    SetSmem,
    SetTime,
    SetSmpcMem,
    ClockChange352,
    ClockChange320,
    NmiRequest,
    ResetEnable,
    ResetDisable,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PadState {
    pub buttons: u16,
}

pub struct Smpc {
    pub controller: ControllerKind,
    pub pad: PadState,
    pub reset_pending: bool,
    pub reset_enabled: bool,
    pub standard: VideoStandard,
    pub ireg: [u8; 7],
    pub oreg: [u8; 32],
    pub comreg: Option<SmpcCommand>,
}

impl Smpc {
    pub fn new(controller: ControllerKind, standard: VideoStandard) -> Self {
        Smpc {
            controller,
            pad: PadState::default(),
            reset_pending: false,
            reset_enabled: true,
            standard,
            ireg: [0; 7],
            oreg: [0xff; 32],
            comreg: None,
        }
    }

    /// Pulses the SMPC's reset line, as `Reset(hard=false)` does: the guest
    /// observes the reset interrupt on its next poll rather than an
    /// immediate CPU reset.
    pub fn request_soft_reset(&mut self) {
        if self.reset_enabled {
            self.reset_pending = true;
        }
    }

    pub fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_pending)
    }

    pub fn issue_command(&mut self, command: SmpcCommand) {
        self.comreg = Some(command);
        match command {
            SmpcCommand::ResetEnable => self.reset_enabled = true,
            SmpcCommand::ResetDisable => self.reset_enabled = false,
            _ => {}
        }
    }

    /// Handles a clock-change command: switches the video standard and
    /// rescales every outstanding scheduler event so in-flight timers land
    /// at the same wall-clock point under the new rate.
    pub fn change_clock(&mut self, new_standard: VideoStandard, scheduler: &mut Scheduler) {
        if new_standard == self.standard {
            return;
        }
        let old_hz = self.standard.master_clock_hz();
        let new_hz = new_standard.master_clock_hz();
        self.standard = new_standard;
        scheduler.retime(new_hz, old_hz);
    }

    /// Samples the current pad state into the SMPC's INTBACK reply
    /// registers, the only path the guest has to read buttons.
    pub fn poll_pad(&mut self) {
        if self.controller == ControllerKind::None {
            self.oreg[1] = 0xff;
            self.oreg[2] = 0xff;
            return;
        }
        self.oreg[1] = (self.pad.buttons >> 8) as u8;
        self.oreg[2] = self.pad.buttons as u8;
    }
}

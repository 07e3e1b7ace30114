//! SH-2 bus state controller registers. All of them are write-locked: a
//! write only takes effect as a 32-bit access whose upper half equals the
//! magic `0xA55A`; anything else is silently dropped, matching the real
//! chip's protection against runaway writes corrupting DRAM timing.

const LOCK_KEY: u32 = 0xa55a;

#[derive(Debug, Clone, Copy, Default)]
pub struct Bsc {
    pub bcr1: u32,
    pub bcr2: u32,
    pub wcr: u32,
    pub mcr: u32,
    pub rtcsr: u32,
    pub rtcnt: u32,
    pub rtcor: u32,
}

pub enum BscRegister {
    Bcr1,
    Bcr2,
    Wcr,
    Mcr,
    Rtcsr,
    Rtcnt,
    Rtcor,
}

impl Bsc {
    pub fn new(is_slave: bool) -> Self {
        let mut bsc = Bsc::default();
        if is_slave {
            bsc.bcr1 |= 1 << 15; // BCR1.MASTER
        }
        bsc
    }

    pub fn write32_locked(&mut self, reg: BscRegister, value: u32) {
        if value >> 16 != LOCK_KEY {
            return;
        }
        let low = value & 0xffff;
        match reg {
            BscRegister::Bcr1 => self.bcr1 = low,
            BscRegister::Bcr2 => self.bcr2 = low,
            BscRegister::Wcr => self.wcr = low,
            BscRegister::Mcr => self.mcr = low,
            BscRegister::Rtcsr => self.rtcsr = low,
            BscRegister::Rtcnt => self.rtcnt = low,
            BscRegister::Rtcor => self.rtcor = low,
        }
    }

    pub fn is_master(&self) -> bool {
        self.bcr1 & (1 << 15) == 0
    }
}

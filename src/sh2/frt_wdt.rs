//! Free-running timer and watchdog timer register banks. Both are simple
//! up-counters on real hardware; this core exposes their registers for
//! guest read/write and lets the scheduler drive `tick`.

#[derive(Debug, Clone, Copy, Default)]
pub struct Frt {
    pub tier: u8,
    pub ftcsr: u8,
    pub frc: u16,
    pub ocra: u16,
    pub ocrb: u16,
    pub tcr: u8,
    pub tocr: u8,
    pub ficr: u16,
}

impl Frt {
    pub fn tick(&mut self, cycles: u32) -> bool {
        let (new_frc, overflowed) = self.frc.overflowing_add(cycles as u16);
        self.frc = new_frc;
        if overflowed {
            self.ftcsr |= 1 << 1; // OVF
        }
        if self.frc == self.ocra {
            self.ftcsr |= 1 << 0; // OCFA
        }
        if self.frc == self.ocrb {
            self.ftcsr |= 1 << 2; // OCFB
        }
        overflowed
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Wdt {
    pub wtcsr: u8,
    pub wtcnt: u8,
    pub rstcsr: u8,
}

impl Wdt {
    pub fn tick(&mut self, cycles: u32) -> bool {
        let (new_count, overflowed) = self.wtcnt.overflowing_add(cycles as u8);
        self.wtcnt = new_count;
        overflowed
    }
}

//! SH-2 memory partitioning keyed off address bits 31..29, wrapping the
//! shared system bus with this core's private cache and on-chip register
//! banks. Each `Sh2` owns one of these; the master and slave differ only in
//! `Bsc::is_master`.

use crate::bus::{Bus, Width};
use crate::sh2::bsc::{Bsc, BscRegister};
use crate::sh2::cache::Cache;
use crate::sh2::divu::Divu;
use crate::sh2::dmac::Dmac;
use crate::sh2::frt_wdt::{Frt, Wdt};
use crate::sh2::interrupt::InterruptController;
use std::cell::RefCell;
use std::rc::Rc;

/// The constant returned by associative-purge-area reads.
const PURGE_READ_CONSTANT: u32 = 0x2312;

pub struct Sh2Memory {
    pub bus: Rc<RefCell<Bus>>,
    pub cache: Cache,
    pub divu: Divu,
    pub bsc: Bsc,
    pub dmac: Dmac,
    pub frt: Frt,
    pub wdt: Wdt,
    pub interrupt: InterruptController,
    /// Set when an on-chip register access used a width the register
    /// doesn't accept; cleared and acted on by `Sh2`'s read/write wrappers.
    pub address_error: bool,
}

enum Partition {
    Cache,
    CacheThrough,
    AssociativePurge,
    CacheAddressArray,
    CacheDataArray,
    IoArea,
}

fn partition_of(addr: u32) -> Partition {
    match addr >> 29 {
        0b000 => Partition::Cache,
        0b001 | 0b101 => Partition::CacheThrough,
        0b010 => Partition::AssociativePurge,
        0b011 => Partition::CacheAddressArray,
        0b100 | 0b110 => Partition::CacheDataArray,
        _ => Partition::IoArea,
    }
}

impl Sh2Memory {
    pub fn new(bus: Rc<RefCell<Bus>>, is_slave: bool) -> Self {
        Sh2Memory {
            bus,
            cache: Cache::new(),
            divu: Divu::new(),
            bsc: Bsc::new(is_slave),
            dmac: Dmac::new(),
            frt: Frt::default(),
            wdt: Wdt::default(),
            interrupt: InterruptController::new(),
            address_error: false,
        }
    }

    /// Clears and returns the pending on-chip-register width fault, if any.
    pub fn take_address_error(&mut self) -> bool {
        std::mem::take(&mut self.address_error)
    }

    /// Registers 0..255 are byte/word-only; 256..511 are word/long-only.
    /// A mismatched access raises an address error instead of completing.
    fn width_allowed(reg: u32, width: Width) -> bool {
        if reg < 0x100 {
            !matches!(width, Width::Long)
        } else {
            !matches!(width, Width::Byte)
        }
    }

    pub fn read(&mut self, addr: u32, width: Width) -> u32 {
        match partition_of(addr) {
            Partition::Cache | Partition::CacheThrough => self.bus.borrow_mut().read(addr, width),
            Partition::AssociativePurge => PURGE_READ_CONSTANT,
            Partition::CacheAddressArray | Partition::CacheDataArray => {
                // Direct tag/data array access; modeled through the cache
                // struct itself rather than round-tripping the system bus.
                self.bus.borrow_mut().read(addr, width)
            }
            Partition::IoArea => self.read_io(addr, width),
        }
    }

    pub fn write(&mut self, addr: u32, width: Width, value: u32) {
        match partition_of(addr) {
            Partition::Cache | Partition::CacheThrough => self.bus.borrow_mut().write(addr, width, value),
            Partition::AssociativePurge => self.cache.purge(addr),
            Partition::CacheAddressArray | Partition::CacheDataArray => {
                self.bus.borrow_mut().write(addr, width, value)
            }
            Partition::IoArea => self.write_io(addr, width, value),
        }
    }

    fn io_register(addr: u32) -> u32 {
        addr & 0x1ff
    }

    fn read_io(&mut self, addr: u32, width: Width) -> u32 {
        let reg = Self::io_register(addr);
        if !Self::width_allowed(reg, width) {
            self.address_error = true;
            return 0;
        }
        match reg {
            0x100 => self.divu.dvsr,
            0x104 => self.divu.dvdnt,
            0x108 => (self.divu.ovf as u32) | ((self.divu.ovf_interrupt_enable as u32) << 1),
            0x10c => self.divu.vcrdiv,
            0x110 => self.interrupt.ipra as u32,
            0x112 => self.interrupt.iprb as u32,
            0x114 => self.divu.dvdnth,
            0x118 => self.divu.dvdntl,
            _ => 0,
        }
    }

    fn write_io(&mut self, addr: u32, width: Width, value: u32) {
        let reg = Self::io_register(addr);
        if !Self::width_allowed(reg, width) {
            self.address_error = true;
            return;
        }
        match reg {
            0x100 => self.divu.dvsr = value,
            0x104 => self.divu.divide32(value as i32, self.divu.dvsr as i32),
            0x108 => {
                self.divu.ovf = value & 1 != 0;
                self.divu.ovf_interrupt_enable = value & 2 != 0;
            }
            0x10c => self.divu.vcrdiv = value,
            0x110 => self.interrupt.ipra = value as u16,
            0x112 => self.interrupt.iprb = value as u16,
            0x114 => self.divu.dvdnth = value,
            0x118 => {
                let dividend = ((self.divu.dvdnth as i64) << 32) | (value as i64 & 0xffff_ffff);
                self.divu.divide64(dividend, self.divu.dvsr as i32);
            }
            0x140 => self.bsc.write32_locked(BscRegister::Bcr1, value),
            0x144 => self.bsc.write32_locked(BscRegister::Bcr2, value),
            0x148 => self.bsc.write32_locked(BscRegister::Wcr, value),
            0x14c => self.bsc.write32_locked(BscRegister::Mcr, value),
            0x150 => self.bsc.write32_locked(BscRegister::Rtcsr, value),
            0x154 => self.bsc.write32_locked(BscRegister::Rtcnt, value),
            0x158 => self.bsc.write32_locked(BscRegister::Rtcor, value),
            _ => {}
        }
    }
}

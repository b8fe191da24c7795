// Licensed under the Apache-2.0 license

//! Register map of the STM32 (F1/F2/F4 family) I2C controller.
//!
//! All registers are 32 bits wide and live at fixed offsets from the
//! per-instance base address. Access goes through the [`Registers`] trait so
//! that the transfer engine can run against memory-mapped hardware or a test
//! double alike.

use core::fmt;

use crate::i2c::common::{IrqLine, PlatformConfig};
use crate::i2c::traits::Registers;
use fugit::HertzU32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    Cr1,
    Cr2,
    Oar1,
    Oar2,
    Dr,
    Sr1,
    Sr2,
    Ccr,
    Trise,
}

impl Reg {
    pub const ALL: [Reg; 9] = [
        Reg::Cr1,
        Reg::Cr2,
        Reg::Oar1,
        Reg::Oar2,
        Reg::Dr,
        Reg::Sr1,
        Reg::Sr2,
        Reg::Ccr,
        Reg::Trise,
    ];

    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Reg::Cr1 => 0x00,
            Reg::Cr2 => 0x04,
            Reg::Oar1 => 0x08,
            Reg::Oar2 => 0x0c,
            Reg::Dr => 0x10,
            Reg::Sr1 => 0x14,
            Reg::Sr2 => 0x18,
            Reg::Ccr => 0x1c,
            Reg::Trise => 0x20,
        }
    }
}

// CR1
pub const CR1_PE: u32 = 1 << 0;
pub const CR1_START: u32 = 1 << 8;
pub const CR1_STOP: u32 = 1 << 9;

// CR2
pub const CR2_FREQ_MASK: u32 = 0x3f;
pub const CR2_ITERREN: u32 = 1 << 8;
pub const CR2_ITEVTEN: u32 = 1 << 9;
/// TXE/RXNE also raise event interrupts
pub const CR2_ITBUFEN: u32 = 1 << 10;

// SR1
pub const SR1_SB: u32 = 1 << 0;
pub const SR1_ADDR: u32 = 1 << 1;
pub const SR1_BTF: u32 = 1 << 2;
pub const SR1_RXNE: u32 = 1 << 6;
pub const SR1_TXE: u32 = 1 << 7;
pub const SR1_BERR: u32 = 1 << 8;
pub const SR1_ARLO: u32 = 1 << 9;
pub const SR1_AF: u32 = 1 << 10;
pub const SR1_OVR: u32 = 1 << 11;
pub const SR1_PECERR: u32 = 1 << 12;
pub const SR1_TIMEOUT: u32 = 1 << 14;

pub const SR1_ERROR_MASK: u32 =
    SR1_TIMEOUT | SR1_AF | SR1_PECERR | SR1_OVR | SR1_ARLO | SR1_BERR;

// CCR
pub const CCR_MASK: u32 = 0x0fff;
pub const CCR_DUTY: u32 = 1 << 14;
pub const CCR_FAST_MODE: u32 = 1 << 15;

macro_rules! register_accessors {
    ($($name:ident),* $(,)?) => {
        paste::paste! {
            /// Named accessors for every controller register.
            pub trait RegisterExt: Registers {
                $(
                    #[inline]
                    fn [<read_ $name>](&self) -> u32 {
                        self.read(Reg::[<$name:camel>])
                    }

                    #[inline]
                    fn [<write_ $name>](&self, value: u32) {
                        self.write(Reg::[<$name:camel>], value)
                    }
                )*
            }
        }
    };
}

register_accessors!(cr1, cr2, oar1, oar2, dr, sr1, sr2, ccr, trise);

impl<T: Registers + ?Sized> RegisterExt for T {}

/// Memory-mapped register block.
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must be the address of an I2C controller register block that
    /// stays mapped for the lifetime of the returned value, and no other code
    /// may drive the same controller.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }
}

impl Registers for Mmio {
    fn read(&self, reg: Reg) -> u32 {
        // SAFETY: the constructor contract guarantees a mapped, aligned register block.
        unsafe { core::ptr::read_volatile((self.base + reg.offset()) as *const u32) }
    }

    fn write(&self, reg: Reg, value: u32) {
        // SAFETY: the constructor contract guarantees a mapped, aligned register block.
        unsafe { core::ptr::write_volatile((self.base + reg.offset()) as *mut u32, value) }
    }
}

/// Side-effect free register dump for diagnostics.
///
/// SR2 is deliberately absent: reading it right after SR1 clears ADDR.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub cr1: u32,
    pub cr2: u32,
    pub sr1: u32,
    pub ccr: u32,
    pub trise: u32,
}

impl RegisterSnapshot {
    pub fn capture<R: Registers + ?Sized>(regs: &R) -> Self {
        Self {
            cr1: regs.read_cr1(),
            cr2: regs.read_cr2(),
            sr1: regs.read_sr1(),
            ccr: regs.read_ccr(),
            trise: regs.read_trise(),
        }
    }
}

impl fmt::Display for RegisterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CR1={:#06x} CR2={:#06x} SR1={:#06x} CCR={:#06x} TRISE={:#04x}",
            self.cr1, self.cr2, self.sr1, self.ccr, self.trise
        )
    }
}

/// I2C controllers of the STM32F4 family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instance {
    I2c1,
    I2c2,
    I2c3,
}

impl Instance {
    #[must_use]
    pub const fn base_addr(self) -> usize {
        match self {
            Instance::I2c1 => 0x4000_5400,
            Instance::I2c2 => 0x4000_5800,
            Instance::I2c3 => 0x4000_5c00,
        }
    }

    /// (event, error) interrupt numbers
    #[must_use]
    pub const fn irq_lines(self) -> (IrqLine, IrqLine) {
        match self {
            Instance::I2c1 => (IrqLine(31), IrqLine(32)),
            Instance::I2c2 => (IrqLine(33), IrqLine(34)),
            Instance::I2c3 => (IrqLine(72), IrqLine(73)),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Instance::I2c1 => "i2c1",
            Instance::I2c2 => "i2c2",
            Instance::I2c3 => "i2c3",
        }
    }

    /// Platform description for this instance fed by an APB1 clock of `apb1`.
    #[must_use]
    pub const fn platform(self, apb1: HertzU32) -> PlatformConfig {
        let (event_irq, error_irq) = self.irq_lines();
        PlatformConfig {
            event_irq,
            error_irq,
            clock: apb1,
        }
    }

    /// Register block of this instance.
    ///
    /// # Safety
    ///
    /// Same contract as [`Mmio::new`]: the peripheral must be clocked and not
    /// driven by anything else.
    #[must_use]
    pub const unsafe fn registers(self) -> Mmio {
        // SAFETY: forwarded to the caller.
        unsafe { Mmio::new(self.base_addr()) }
    }
}

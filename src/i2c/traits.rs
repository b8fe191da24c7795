// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! The driver touches the outside world through two narrow seams:
//!
//! ```text
//! Registers   (32-bit register block of one controller)
//! IrqControl  (per-line enable/disable on the interrupt controller)
//! ```
//!
//! Time is the third seam and comes from `embedded_hal::delay::DelayNs`.
//! Keeping these small lets the transfer engine, the interrupt handlers and
//! the device surface run unchanged on hardware (`Mmio`, `NvicLines`) and
//! against recording test doubles.

use crate::i2c::common::IrqLine;
use crate::i2c::registers::Reg;

/// Word access to a controller's register block.
///
/// Takes `&self`: the block is shared between thread context and the
/// interrupt handlers, and register access is inherently volatile.
///
/// # Examples
///
/// ```rust,no_run
/// use stm32_i2c_ddk::i2c::registers::CR1_PE;
/// use stm32_i2c_ddk::i2c::{RegisterExt, Registers};
///
/// fn enable<R: Registers>(regs: &R) {
///     regs.write_cr1(regs.read_cr1() | CR1_PE);
/// }
/// ```
pub trait Registers {
    /// Read the current value of `reg`.
    fn read(&self, reg: Reg) -> u32;

    /// Write `value` to `reg`.
    fn write(&self, reg: Reg, value: u32);
}

impl<T: Registers + ?Sized> Registers for &T {
    fn read(&self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&self, reg: Reg, value: u32) {
        (**self).write(reg, value);
    }
}

/// Interrupt controller operations needed by the driver.
///
/// Lines are masked by the event handler to throttle the level-triggered
/// event interrupt and unmasked by the transfer engine before each wait.
pub trait IrqControl {
    fn enable_line(&self, line: IrqLine);

    fn disable_line(&self, line: IrqLine);
}

impl<T: IrqControl + ?Sized> IrqControl for &T {
    fn enable_line(&self, line: IrqLine) {
        (**self).enable_line(line);
    }

    fn disable_line(&self, line: IrqLine) {
        (**self).disable_line(line);
    }
}

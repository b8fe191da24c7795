// Licensed under the Apache-2.0 license

//! STM32 I2C master driver.
//!
//! Interrupt-driven driver for the I2C v1 controller found on STM32F1/F2/F4
//! parts, designed for bare-metal and `no_std` environments. Controllers are
//! registered once in a [`Registry`], opened, and then used through
//! [`Registry::transfer`], the [`Registry::ioctl`] control entry point or the
//! embedded-hal [`I2cController`] facade.

pub mod common;
mod device;
mod engine;
pub mod i2c_controller;
mod irq;
#[cfg(test)]
mod mock;
pub mod nvic;
pub mod registers;
pub mod registry;
pub mod sync;
pub mod timing;
pub mod traits;

pub use common::{
    BusFault, Direction, DriverConfig, DriverConfigBuilder, Error, I2cSpeed, IrqLine, Message,
    MessageBuf, PlatformConfig,
};
pub use device::{Command, CommandCode, MAX_ADDRESS};
pub use i2c_controller::I2cController;
pub use nvic::{NvicLines, SpinDelay};
pub use registers::{Instance, Mmio, Reg, RegisterExt, RegisterSnapshot};
pub use registry::{Bus, BusHandle, Registry};
pub use sync::{AdapterSlot, CountingSignal};
pub use timing::TimingParams;
pub use traits::{IrqControl, Registers};

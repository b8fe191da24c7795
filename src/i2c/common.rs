// Licensed under the Apache-2.0 license

//! Common types and constants for the STM32 I2C driver modules.
//!
//! This module provides shared definitions for error handling, bus messages,
//! platform and driver configuration used across the I2C driver implementation.

use core::fmt;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use fugit::HertzU32;

use crate::i2c::registers::{
    SR1_AF, SR1_ARLO, SR1_BERR, SR1_ERROR_MASK, SR1_OVR, SR1_PECERR, SR1_TIMEOUT,
};

/// Bus speed grade.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
}

impl I2cSpeed {
    /// Highest bus frequency allowed in this grade.
    #[must_use]
    pub const fn ceiling(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }

    /// Speed grade a bus frequency falls into, `None` above the fast-mode ceiling.
    #[must_use]
    pub fn for_frequency(freq: HertzU32) -> Option<Self> {
        if freq <= I2cSpeed::Standard.ceiling() {
            Some(I2cSpeed::Standard)
        } else if freq <= I2cSpeed::Fast.ceiling() {
            Some(I2cSpeed::Fast)
        } else {
            None
        }
    }
}

/// Interrupt line number as known to the interrupt controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IrqLine(pub u16);

/// Board-supplied description of one controller instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Line carrying protocol events (start sent, address sent, TXE/RXNE, ...)
    pub event_irq: IrqLine,
    /// Line carrying error conditions
    pub error_irq: IrqLine,
    /// Peripheral input clock (APB1)
    pub clock: HertzU32,
}

/// Accepted range of the CR2 FREQ field, in MHz.
const MIN_INPUT_MHZ: u32 = 2;
const MAX_INPUT_MHZ: u32 = 50;

impl PlatformConfig {
    /// Input clock in whole MHz, as programmed into CR2.
    #[must_use]
    pub const fn clock_mhz(&self) -> u32 {
        self.clock.raw() / 1_000_000
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the input clock cannot be
    /// represented in the CR2 FREQ field.
    pub fn validate(&self) -> Result<(), Error> {
        let mhz = self.clock_mhz();
        if (MIN_INPUT_MHZ..=MAX_INPUT_MHZ).contains(&mhz) {
            Ok(())
        } else {
            Err(Error::InvalidArgument)
        }
    }
}

/// Driver tuning shared by every controller in a registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    /// Upper bound for each wait on a bus event, in microseconds
    pub event_timeout_us: u32,
    /// Log a register snapshot on open and when a transfer fails
    pub dump_registers: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfigBuilder::new().build()
    }
}

pub struct DriverConfigBuilder {
    event_timeout_us: u32,
    dump_registers: bool,
}

impl Default for DriverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverConfigBuilder {
    /// SMBus clock-low timeout, generous enough for a stretched standard-mode byte.
    pub const DEFAULT_EVENT_TIMEOUT_US: u32 = 25_000;

    #[must_use]
    pub fn new() -> Self {
        Self {
            event_timeout_us: Self::DEFAULT_EVENT_TIMEOUT_US,
            dump_registers: false,
        }
    }
    #[must_use]
    pub fn event_timeout_us(mut self, timeout: u32) -> Self {
        self.event_timeout_us = timeout;
        self
    }
    #[must_use]
    pub fn dump_registers(mut self, enabled: bool) -> Self {
        self.dump_registers = enabled;
        self
    }
    #[must_use]
    pub fn build(self) -> DriverConfig {
        DriverConfig {
            event_timeout_us: self.event_timeout_us,
            dump_registers: self.dump_registers,
        }
    }
}

/// Transfer direction of a message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// Caller-owned data of one message.
#[derive(Debug)]
pub enum MessageBuf<'a> {
    /// Filled from the bus
    Read(&'a mut [u8]),
    /// Sent on the bus
    Write(&'a [u8]),
}

/// One unit of a bus transaction: a 7-bit target address and a borrowed buffer.
///
/// Messages of one transfer are separated by repeated starts; the stop
/// condition follows the last message only. A [continued](Message::continued)
/// message instead extends the data phase of the one before it.
#[derive(Debug)]
pub struct Message<'a> {
    address: u8,
    buf: MessageBuf<'a>,
    continued: bool,
}

impl<'a> Message<'a> {
    #[must_use]
    pub fn read(address: u8, buf: &'a mut [u8]) -> Self {
        Self {
            address,
            buf: MessageBuf::Read(buf),
            continued: false,
        }
    }

    #[must_use]
    pub fn write(address: u8, bytes: &'a [u8]) -> Self {
        Self {
            address,
            buf: MessageBuf::Write(bytes),
            continued: false,
        }
    }

    /// Send or receive this message's bytes as part of the previous message:
    /// no repeated start, no address byte. The previous message must have the
    /// same address and direction.
    #[must_use]
    pub fn continued(mut self) -> Self {
        self.continued = true;
        self
    }

    #[must_use]
    pub fn is_continued(&self) -> bool {
        self.continued
    }

    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        match self.buf {
            MessageBuf::Read(_) => Direction::Read,
            MessageBuf::Write(_) => Direction::Write,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.buf {
            MessageBuf::Read(buf) => buf.len(),
            MessageBuf::Write(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn buf_mut(&mut self) -> &mut MessageBuf<'a> {
        &mut self.buf
    }
}

/// SR1 error bits latched when a bus operation failed.
///
/// The individual flags are diagnostics only: every fault aborts the
/// transaction the same way.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusFault(u32);

impl BusFault {
    /// Extract the fault bits from an SR1 value, `None` if no error bit is set.
    #[must_use]
    pub fn from_status(sr1: u32) -> Option<Self> {
        let bits = sr1 & SR1_ERROR_MASK;
        (bits != 0).then_some(Self(bits))
    }

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }
    #[must_use]
    pub fn bus_error(self) -> bool {
        self.0 & SR1_BERR != 0
    }
    #[must_use]
    pub fn arbitration_lost(self) -> bool {
        self.0 & SR1_ARLO != 0
    }
    #[must_use]
    pub fn ack_failure(self) -> bool {
        self.0 & SR1_AF != 0
    }
    #[must_use]
    pub fn overrun(self) -> bool {
        self.0 & SR1_OVR != 0
    }
    #[must_use]
    pub fn pec_error(self) -> bool {
        self.0 & SR1_PECERR != 0
    }
    #[must_use]
    pub fn timeout(self) -> bool {
        self.0 & SR1_TIMEOUT != 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Missing platform data, bad frequency, unknown command, illegal state transition
    InvalidArgument,
    /// No adapter slot or registry entry left
    OutOfMemory,
    /// The controller reported an error condition
    Bus(BusFault),
    /// An expected bus event did not arrive in time
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::OutOfMemory => f.write_str("out of memory"),
            Error::Bus(fault) => write!(f, "bus error (SR1 {:#06x})", fault.bits()),
            Error::Timeout => f.write_str("timed out waiting for bus event"),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Bus(fault) if fault.ack_failure() => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            Error::Bus(fault) if fault.arbitration_lost() => ErrorKind::ArbitrationLoss,
            Error::Bus(fault) if fault.overrun() => ErrorKind::Overrun,
            Error::Bus(fault) if fault.bus_error() => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    #[test]
    fn test_speed_for_frequency() {
        assert_eq!(
            I2cSpeed::for_frequency(HertzU32::kHz(100)),
            Some(I2cSpeed::Standard)
        );
        assert_eq!(
            I2cSpeed::for_frequency(HertzU32::from_raw(100_001)),
            Some(I2cSpeed::Fast)
        );
        assert_eq!(
            I2cSpeed::for_frequency(HertzU32::kHz(400)),
            Some(I2cSpeed::Fast)
        );
        assert_eq!(I2cSpeed::for_frequency(HertzU32::from_raw(400_001)), None);
    }

    #[test]
    fn test_platform_validate() {
        let mut platform = PlatformConfig {
            event_irq: IrqLine(33),
            error_irq: IrqLine(34),
            clock: HertzU32::MHz(42),
        };
        assert_eq!(platform.clock_mhz(), 42);
        assert!(platform.validate().is_ok());

        platform.clock = HertzU32::MHz(1);
        assert_eq!(platform.validate(), Err(Error::InvalidArgument));

        platform.clock = HertzU32::MHz(84);
        assert_eq!(platform.validate(), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_driver_config_builder() {
        let config = DriverConfigBuilder::new()
            .event_timeout_us(500)
            .dump_registers(true)
            .build();
        assert_eq!(config.event_timeout_us, 500);
        assert!(config.dump_registers);

        let config = DriverConfig::default();
        assert_eq!(
            config.event_timeout_us,
            DriverConfigBuilder::DEFAULT_EVENT_TIMEOUT_US
        );
        assert!(!config.dump_registers);
    }

    #[test]
    fn test_message_accessors() {
        let mut buf = [0u8; 3];
        let msg = Message::read(0x48, &mut buf);
        assert_eq!(msg.address(), 0x48);
        assert_eq!(msg.direction(), Direction::Read);
        assert_eq!(msg.len(), 3);

        let msg = Message::write(0x20, &[]);
        assert_eq!(msg.direction(), Direction::Write);
        assert!(msg.is_empty());
        assert!(!msg.is_continued());
        assert!(msg.continued().is_continued());
    }

    #[test]
    fn test_bus_fault_from_status() {
        // SB and TXE are not faults
        assert_eq!(BusFault::from_status(0x0081), None);

        let fault = BusFault::from_status(SR1_AF | 0x0001).unwrap();
        assert_eq!(fault.bits(), SR1_AF);
        assert!(fault.ack_failure());
        assert!(!fault.arbitration_lost());
    }

    #[test]
    fn test_error_kind_mapping() {
        let kind = |bits| Error::Bus(BusFault::from_status(bits).unwrap()).kind();
        assert_eq!(
            kind(SR1_AF),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
        );
        assert_eq!(kind(SR1_ARLO), ErrorKind::ArbitrationLoss);
        assert_eq!(kind(SR1_OVR), ErrorKind::Overrun);
        assert_eq!(kind(SR1_BERR), ErrorKind::Bus);
        assert_eq!(kind(SR1_PECERR), ErrorKind::Other);
        assert_eq!(Error::Timeout.kind(), ErrorKind::Other);
    }
}

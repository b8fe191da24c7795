// Licensed under the Apache-2.0 license

//! embedded-hal facade over one registered controller.
//!
//! Lets sensor and EEPROM drivers written against `embedded_hal::i2c::I2c`
//! talk through the registry. The controller must already be open.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{Error, Message};
use crate::i2c::registry::{BusHandle, Registry, DEFAULT_MAX_BUSES};
use crate::i2c::traits::{IrqControl, Registers};

/// Most operations one `transaction` call can carry.
pub const MAX_OPERATIONS: usize = 8;

pub struct I2cController<'r, 'p, R, I, D, L = NoOpLogger, const N: usize = DEFAULT_MAX_BUSES> {
    registry: &'r Registry<'p, R, I, D, L, N>,
    handle: BusHandle,
}

impl<'r, 'p, R, I, D, L, const N: usize> I2cController<'r, 'p, R, I, D, L, N> {
    pub fn new(registry: &'r Registry<'p, R, I, D, L, N>, handle: BusHandle) -> Self {
        Self { registry, handle }
    }

    #[must_use]
    pub fn handle(&self) -> BusHandle {
        self.handle
    }
}

impl<R, I, D, L, const N: usize> embedded_hal::i2c::ErrorType
    for I2cController<'_, '_, R, I, D, L, N>
{
    type Error = Error;
}

impl<R, I, D, L, const N: usize> embedded_hal::i2c::I2c for I2cController<'_, '_, R, I, D, L, N>
where
    R: Registers,
    I: IrqControl,
    D: DelayNs,
    L: Logger,
{
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.registry
            .transfer(self.handle, &mut [Message::read(addr, buffer)])
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.registry
            .transfer(self.handle, &mut [Message::write(addr, bytes)])
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.registry.transfer(
            self.handle,
            &mut [Message::write(addr, bytes), Message::read(addr, buffer)],
        )
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut msgs: heapless::Vec<Message<'_>, MAX_OPERATIONS> = heapless::Vec::new();
        let mut previous = None;
        for op in operations.iter_mut() {
            let msg = match op {
                Operation::Read(buf) => Message::read(addr, buf),
                Operation::Write(bytes) => Message::write(addr, bytes),
            };
            // adjacent operations of one kind share a single start and address
            let direction = msg.direction();
            let msg = if previous == Some(direction) {
                msg.continued()
            } else {
                msg
            };
            previous = Some(direction);
            msgs.push(msg).map_err(|_| Error::InvalidArgument)?;
        }
        self.registry.transfer(self.handle, &mut msgs)
    }
}

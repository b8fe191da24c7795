// Licensed under the Apache-2.0 license

//! Device-facing surface: open/close lifecycle and command dispatch.
//!
//! A registered controller is either closed or open. Opening claims an
//! [`AdapterSlot`](crate::i2c::AdapterSlot) and brings the peripheral up at
//! the standard-mode ceiling; closing disables the peripheral and gives the
//! slot back. Transfers and frequency changes require an open controller and
//! run under the slot's bus lock.

use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

use crate::common::Logger;
use crate::i2c::common::{Error, I2cSpeed, Message};
use crate::i2c::engine::Engine;
use crate::i2c::registers::{
    RegisterExt, CR1_PE, CR2_FREQ_MASK, CR2_ITBUFEN, CR2_ITERREN, CR2_ITEVTEN,
};
use crate::i2c::registry::{BusHandle, Registry};
use crate::i2c::sync;
use crate::i2c::timing::{self, TimingParams};
use crate::i2c::traits::{IrqControl, Registers};

/// Highest 7-bit target address.
pub const MAX_ADDRESS: u8 = 0x7f;

/// Raw command discriminants of the control entry point.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandCode {
    Transfer = 1,
    SetFrequency = 2,
}

impl TryFrom<u32> for CommandCode {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(CommandCode::Transfer),
            2 => Ok(CommandCode::SetFrequency),
            _ => Err(Error::InvalidArgument),
        }
    }
}

/// Operation accepted by [`Registry::ioctl`].
#[derive(Debug)]
pub enum Command<'a, 'b> {
    /// Run the messages as one transaction
    Transfer(&'a mut [Message<'b>]),
    /// Reprogram the bus clock
    SetFrequency(HertzU32),
}

impl Command<'_, '_> {
    #[must_use]
    pub fn code(&self) -> CommandCode {
        match self {
            Command::Transfer(_) => CommandCode::Transfer,
            Command::SetFrequency(_) => CommandCode::SetFrequency,
        }
    }
}

impl<R, I, D, L, const N: usize> Registry<'_, R, I, D, L, N>
where
    R: Registers,
    I: IrqControl,
    D: DelayNs,
    L: Logger,
{
    /// Bring a controller up: clock field, interrupt enables, standard-mode
    /// timing, peripheral enable.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] for an unknown or removed handle, missing
    ///   or unusable platform configuration, or a controller already open
    /// * [`Error::OutOfMemory`] when every adapter slot is in use
    pub fn open(&self, handle: BusHandle) -> Result<(), Error> {
        let bus = self.bus(handle)?;
        let platform = bus.platform.ok_or(Error::InvalidArgument)?;
        platform.validate()?;

        let mut adapter = bus.adapter.write();
        if adapter.is_some() || !bus.is_attached() {
            return Err(Error::InvalidArgument);
        }
        let slot = sync::claim(self.slots).ok_or(Error::OutOfMemory)?;

        let regs = &bus.regs;
        regs.write_cr1(0);
        regs.write_cr2(
            (platform.clock_mhz() & CR2_FREQ_MASK) | CR2_ITEVTEN | CR2_ITERREN | CR2_ITBUFEN,
        );
        let params =
            match timing::set_frequency(regs, platform.clock, I2cSpeed::Standard.ceiling()) {
                Ok(params) => params,
                Err(err) => {
                    sync::release(self.slots, slot);
                    return Err(err);
                }
            };
        regs.write_cr1(CR1_PE);
        *adapter = Some(slot);
        drop(adapter);

        self.logger.debug(format_args!(
            "{}: open, {} MHz input, CCR {:#06x} TRISE {}",
            bus.name,
            platform.clock_mhz(),
            params.ccr(),
            params.rise_time
        ));
        self.dump_registers(bus);
        Ok(())
    }

    /// Disable the controller and release its adapter slot.
    ///
    /// Waits for a transfer in progress to finish.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unknown handle or a controller that is
    /// not open.
    pub fn close(&self, handle: BusHandle) -> Result<(), Error> {
        let bus = self.bus(handle)?;
        let mut adapter = bus.adapter.write();
        let slot = adapter.take().ok_or(Error::InvalidArgument)?;

        bus.regs.write_cr1(0);
        sync::release(self.slots, slot);
        drop(adapter);

        self.logger.debug(format_args!("{}: closed", bus.name));
        Ok(())
    }

    /// Control entry point. Returns the result of the selected operation.
    ///
    /// # Errors
    ///
    /// Whatever [`Registry::transfer`] or [`Registry::set_frequency`] returns.
    pub fn ioctl(&self, handle: BusHandle, command: Command<'_, '_>) -> Result<(), Error> {
        match command {
            Command::Transfer(msgs) => self.transfer(handle, msgs),
            Command::SetFrequency(freq) => self.set_frequency(handle, freq).map(|_| ()),
        }
    }

    /// Control entry point taking a raw command discriminant, for callers that
    /// carry the command number separately from its argument.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] for an unrecognized `code` or one that does
    ///   not name `command`
    /// * otherwise whatever [`Registry::ioctl`] returns
    pub fn ioctl_raw(
        &self,
        handle: BusHandle,
        code: u32,
        command: Command<'_, '_>,
    ) -> Result<(), Error> {
        let code = CommandCode::try_from(code).inspect_err(|_| {
            self.logger
                .error(format_args!("unrecognized control command {:#x}", code));
        })?;
        if code != command.code() {
            return Err(Error::InvalidArgument);
        }
        self.ioctl(handle, command)
    }

    /// Run `msgs` as one transaction: repeated starts between messages, a
    /// single stop at the end (also after a failure).
    ///
    /// Other callers on the same controller are held off for the whole
    /// sequence. An empty sequence succeeds without touching the hardware.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] for an unknown handle, a closed controller,
    ///   an address above 0x7f or a continued message that does not follow
    ///   one with the same address and direction
    /// * [`Error::Bus`] when the controller flags an error
    /// * [`Error::Timeout`] when an expected event does not arrive in time
    pub fn transfer(&self, handle: BusHandle, msgs: &mut [Message<'_>]) -> Result<(), Error> {
        let bus = self.bus(handle)?;
        validate(msgs)?;
        let platform = bus.platform.ok_or(Error::InvalidArgument)?;

        let adapter = bus.adapter.read();
        let slot = (*adapter)
            .and_then(|index| self.slots.get(index))
            .ok_or(Error::InvalidArgument)?;
        if msgs.is_empty() {
            return Ok(());
        }

        let _bus_lock = slot.bus_lock().lock();
        let mut delay = bus.delay.lock();
        let mut engine = Engine {
            regs: &bus.regs,
            irq: &self.irq,
            delay: &mut *delay,
            logger: &self.logger,
            signal: slot.signal(),
            event_line: platform.event_irq,
            error_line: platform.error_irq,
            timeout_us: self.config.event_timeout_us,
        };
        let result = engine.run(msgs);
        if result.is_err() {
            self.dump_registers(bus);
        }
        result
    }

    /// Reprogram the bus clock of an open controller.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] for an unknown handle, a closed controller,
    ///   or a frequency of zero or above the fast-mode ceiling
    pub fn set_frequency(&self, handle: BusHandle, freq: HertzU32) -> Result<TimingParams, Error> {
        let bus = self.bus(handle)?;
        let platform = bus.platform.ok_or(Error::InvalidArgument)?;

        let adapter = bus.adapter.read();
        let slot = (*adapter)
            .and_then(|index| self.slots.get(index))
            .ok_or(Error::InvalidArgument)?;

        let _bus_lock = slot.bus_lock().lock();
        let params = timing::set_frequency(&bus.regs, platform.clock, freq).inspect_err(|_| {
            self.logger.error(format_args!(
                "{}: rejected bus frequency {} Hz",
                bus.name,
                freq.raw()
            ));
        })?;

        self.logger.debug(format_args!(
            "{}: {} Hz, {:?} mode, CCR {:#06x} TRISE {}",
            bus.name,
            freq.raw(),
            params.speed,
            params.ccr(),
            params.rise_time
        ));
        Ok(params)
    }
}

fn validate(msgs: &[Message<'_>]) -> Result<(), Error> {
    let mut previous = None;
    for msg in msgs {
        let target = (msg.address(), msg.direction());
        if msg.address() > MAX_ADDRESS || (msg.is_continued() && previous != Some(target)) {
            return Err(Error::InvalidArgument);
        }
        previous = Some(target);
    }
    Ok(())
}

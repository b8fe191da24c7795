// Licensed under the Apache-2.0 license

//! Transfer engine: runs a message sequence as start, address, data and stop
//! phases.
//!
//! Every phase ends by waiting for the controller to raise the matching event.
//! The wait arms the interrupt lines, then consumes posts from the adapter's
//! counting signal and inspects SR1 after each one:
//!
//! * any error bit fails the phase with [`Error::Bus`],
//! * the expected flag completes the phase,
//! * anything else is a spurious wake-up and the wait continues.
//!
//! A wait gives up with [`Error::Timeout`] after `timeout_us`. Whatever
//! happens, the sequence is closed with a stop condition.

use embedded_hal::delay::DelayNs;

use crate::common::Logger;
use crate::i2c::common::{BusFault, Direction, Error, IrqLine, Message, MessageBuf};
use crate::i2c::registers::{
    RegisterExt, CR1_PE, CR1_START, CR1_STOP, SR1_ADDR, SR1_RXNE, SR1_SB, SR1_TXE,
};
use crate::i2c::sync::CountingSignal;
use crate::i2c::traits::{IrqControl, Registers};

/// Sleep between two looks at the counting signal.
const POLL_INTERVAL_US: u32 = 1;

pub(crate) struct Engine<'a, R, I, D, L> {
    pub regs: &'a R,
    pub irq: &'a I,
    pub delay: &'a mut D,
    pub logger: &'a L,
    pub signal: &'a CountingSignal,
    pub event_line: IrqLine,
    pub error_line: IrqLine,
    pub timeout_us: u32,
}

impl<R, I, D, L> Engine<'_, R, I, D, L>
where
    R: Registers,
    I: IrqControl,
    D: DelayNs,
    L: Logger,
{
    /// Run `msgs` as one bus transaction. The caller holds the adapter lock.
    pub fn run(&mut self, msgs: &mut [Message<'_>]) -> Result<(), Error> {
        if msgs.is_empty() {
            return Ok(());
        }

        let mut result = Ok(());
        for (index, msg) in msgs.iter_mut().enumerate() {
            if let Err(err) = self.message(msg) {
                self.logger.error(format_args!(
                    "msg {} to {:#04x} failed: {}",
                    index,
                    msg.address(),
                    err
                ));
                if let Error::Bus(fault) = err {
                    self.clear_fault(fault);
                }
                result = Err(err);
                break;
            }
        }

        self.stop();
        result
    }

    fn message(&mut self, msg: &mut Message<'_>) -> Result<(), Error> {
        if !msg.is_continued() {
            self.start()?;
            self.address(msg.address(), msg.direction())?;
        }
        match msg.buf_mut() {
            MessageBuf::Write(bytes) => {
                for &byte in bytes.iter() {
                    self.send(byte)?;
                }
            }
            MessageBuf::Read(buf) => {
                for byte in buf.iter_mut() {
                    *byte = self.receive()?;
                }
            }
        }
        Ok(())
    }

    /// (Repeated) start condition.
    fn start(&mut self) -> Result<(), Error> {
        self.regs.write_cr1(CR1_PE | CR1_START);
        self.wait_for(SR1_SB)
    }

    fn address(&mut self, address: u8, direction: Direction) -> Result<(), Error> {
        let mut byte = u32::from(address) << 1;
        if direction == Direction::Read {
            byte |= 1;
        }
        self.regs.write_dr(byte);
        self.wait_for(SR1_ADDR)?;
        // SR1 then SR2 clears ADDR
        let _ = self.regs.read_sr2();
        Ok(())
    }

    fn send(&mut self, byte: u8) -> Result<(), Error> {
        self.wait_for(SR1_TXE)?;
        self.regs.write_dr(u32::from(byte));
        Ok(())
    }

    fn receive(&mut self) -> Result<u8, Error> {
        self.wait_for(SR1_RXNE)?;
        Ok((self.regs.read_dr() & 0xff) as u8)
    }

    fn stop(&mut self) {
        self.regs.write_cr1(CR1_PE | CR1_STOP);
    }

    /// Error flags are rc_w0: write zero to the latched bits only.
    fn clear_fault(&mut self, fault: BusFault) {
        self.regs.write_sr1(!fault.bits());
    }

    fn arm(&self) {
        self.irq.enable_line(self.event_line);
        self.irq.enable_line(self.error_line);
    }

    fn wait_for(&mut self, flag: u32) -> Result<(), Error> {
        self.arm();
        let mut waited_us: u32 = 0;
        loop {
            match self.poll(flag) {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(err)) => return Err(err),
                Err(nb::Error::WouldBlock) => {
                    if waited_us >= self.timeout_us {
                        return Err(Error::Timeout);
                    }
                    self.delay.delay_us(POLL_INTERVAL_US);
                    waited_us = waited_us.saturating_add(POLL_INTERVAL_US);
                }
            }
        }
    }

    fn poll(&self, flag: u32) -> nb::Result<(), Error> {
        if !self.signal.try_take() {
            return Err(nb::Error::WouldBlock);
        }

        let sr1 = self.regs.read_sr1();
        if let Some(fault) = BusFault::from_status(sr1) {
            return Err(nb::Error::Other(Error::Bus(fault)));
        }
        if sr1 & flag != 0 {
            return Ok(());
        }

        // Spurious: the event handler masked the line before posting.
        self.arm();
        Err(nb::Error::WouldBlock)
    }
}

// Licensed under the Apache-2.0 license

//! Event and error interrupt handlers.
//!
//! Handlers run in interrupt context. They only read SR1, mask their own line
//! and post the adapter's counting signal; control registers are left to the
//! thread holding the bus lock. A post made while no transfer is waiting is
//! kept by the signal and picked up by the next wait, where it is treated as
//! spurious unless SR1 says otherwise.

use crate::common::Logger;
use crate::i2c::common::{BusFault, IrqLine};
use crate::i2c::registers::RegisterExt;
use crate::i2c::registry::Bus;
use crate::i2c::sync::AdapterSlot;
use crate::i2c::traits::{IrqControl, Registers};

/// Protocol event (SB, ADDR, BTF, TXE, RXNE).
///
/// The event interrupt is level triggered, so the line stays masked until the
/// transfer engine arms it again for its next wait.
pub(crate) fn on_event<R, D, I>(bus: &Bus<R, D>, slots: &[AdapterSlot], irq: &I, line: IrqLine)
where
    R: Registers,
    I: IrqControl,
{
    irq.disable_line(line);
    if let Some(slot) = bus.adapter_slot(slots) {
        slot.signal().up();
    }
}

/// Error condition latched in SR1.
///
/// The engine observes the fault on its next look at SR1, clears it and
/// re-arms the line.
pub(crate) fn on_error<R, D, I, L>(
    bus: &Bus<R, D>,
    slots: &[AdapterSlot],
    irq: &I,
    logger: &L,
    line: IrqLine,
) where
    R: Registers,
    I: IrqControl,
    L: Logger,
{
    irq.disable_line(line);
    if let Some(fault) = BusFault::from_status(bus.regs.read_sr1()) {
        logger.error(format_args!(
            "{}: error interrupt, SR1 faults {:#06x}",
            bus.name,
            fault.bits()
        ));
    }
    if let Some(slot) = bus.adapter_slot(slots) {
        slot.signal().up();
    }
}

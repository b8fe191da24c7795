// Licensed under the Apache-2.0 license

//! # I2C Controller Registry
//!
//! Board code describes each physical controller once, as a [`Bus`], and hands
//! it to a [`Registry`] at startup. Registration returns a [`BusHandle`]; every
//! later operation (open, close, transfers, frequency changes, removal) goes
//! through the registry with that handle. There is no global driver state: the
//! registry is an ordinary value that lives wherever the board puts it, usually
//! a `static` built once in `main`.
//!
//! ## Ownership
//!
//! ```text
//! Registry
//!  ├── buses: heapless::Vec<Bus, N>   (register block, platform data, open state)
//!  ├── slots: &[AdapterSlot]         (lock + counting signal while open)
//!  ├── irq:   IrqControl             (line enable/disable)
//!  ├── logger
//!  └── config: DriverConfig
//! ```
//!
//! ## Usage Patterns
//!
//! ```rust,ignore
//! use stm32_i2c_ddk::i2c::{AdapterSlot, Bus, Instance, Registry, Message, NvicLines, SpinDelay};
//!
//! static SLOTS: [AdapterSlot; 2] = [AdapterSlot::new(), AdapterSlot::new()];
//!
//! let mut registry: Registry<'_, _, _, _> =
//!     Registry::new(&SLOTS, NvicLines, NoOpLogger, DriverConfig::default());
//! let i2c2 = registry.register(Bus::new(
//!     Instance::I2c2.name(),
//!     unsafe { Instance::I2c2.registers() },
//!     Some(Instance::I2c2.platform(HertzU32::MHz(42))),
//!     SpinDelay::new(HertzU32::MHz(168)),
//! ))?;
//!
//! registry.open(i2c2)?;
//! registry.transfer(i2c2, &mut [Message::write(0x50, &[0x00, 0x10])])?;
//!
//! // interrupt vectors forward to the registry
//! #[interrupt]
//! fn I2C2_EV() {
//!     REGISTRY.on_interrupt(IrqLine(33));
//! }
//! ```
//!
//! ## Interrupt Routing
//!
//! `register` attaches both lines of the bus and unmasks them; `remove`
//! detaches and masks them. [`Registry::on_interrupt`] looks the line up among
//! the attached buses and runs the event or error handler for it. Lines that
//! belong to no attached bus are ignored.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{DriverConfig, Error, IrqLine, PlatformConfig};
use crate::i2c::irq;
use crate::i2c::registers::RegisterSnapshot;
use crate::i2c::sync::AdapterSlot;
use crate::i2c::traits::{IrqControl, Registers};

/// Default number of controllers a registry can hold.
pub const DEFAULT_MAX_BUSES: usize = 4;

/// One physical controller as described by the board.
pub struct Bus<R, D> {
    pub(crate) name: &'static str,
    pub(crate) regs: R,
    pub(crate) platform: Option<PlatformConfig>,
    /// Adapter slot index while open
    pub(crate) adapter: spin::RwLock<Option<usize>>,
    pub(crate) attached: AtomicBool,
    pub(crate) delay: spin::Mutex<D>,
}

impl<R: Registers, D: DelayNs> Bus<R, D> {
    pub fn new(name: &'static str, regs: R, platform: Option<PlatformConfig>, delay: D) -> Self {
        Self {
            name,
            regs,
            platform,
            adapter: spin::RwLock::new(None),
            attached: AtomicBool::new(false),
            delay: spin::Mutex::new(delay),
        }
    }
}

impl<R, D> Bus<R, D> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    #[must_use]
    pub fn platform(&self) -> Option<&PlatformConfig> {
        self.platform.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.adapter.read().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Adapter slot of an open controller. Never blocks: `None` while the
    /// open state is being changed.
    pub(crate) fn adapter_slot<'p>(&self, slots: &'p [AdapterSlot]) -> Option<&'p AdapterSlot> {
        self.adapter
            .try_read()
            .and_then(|adapter| *adapter)
            .and_then(|index| slots.get(index))
    }
}

/// Strongly typed reference to a registered controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BusHandle(u8);

impl BusHandle {
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

pub struct Registry<'p, R, I, D, L = NoOpLogger, const N: usize = DEFAULT_MAX_BUSES> {
    pub(crate) buses: heapless::Vec<Bus<R, D>, N>,
    pub(crate) slots: &'p [AdapterSlot],
    pub(crate) irq: I,
    pub(crate) logger: L,
    pub(crate) config: DriverConfig,
}

impl<'p, R, I, D, L, const N: usize> Registry<'p, R, I, D, L, N>
where
    R: Registers,
    I: IrqControl,
    D: DelayNs,
    L: Logger,
{
    /// Empty registry. `slots` bounds how many controllers can be open at once.
    pub fn new(slots: &'p [AdapterSlot], irq: I, logger: L, config: DriverConfig) -> Self {
        Self {
            buses: heapless::Vec::new(),
            slots,
            irq,
            logger,
            config,
        }
    }

    /// Register a controller, attach its interrupt lines and unmask them.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] if the bus has no platform configuration
    /// * [`Error::OutOfMemory`] if the registry is full
    pub fn register(&mut self, bus: Bus<R, D>) -> Result<BusHandle, Error> {
        let platform = bus.platform.ok_or(Error::InvalidArgument)?;
        let handle = BusHandle(u8::try_from(self.buses.len()).map_err(|_| Error::OutOfMemory)?);
        let name = bus.name;

        self.buses.push(bus).map_err(|_| Error::OutOfMemory)?;
        if let Some(bus) = self.buses.get(handle.index()) {
            bus.attached.store(true, Ordering::Release);
        }
        self.irq.enable_line(platform.event_irq);
        self.irq.enable_line(platform.error_irq);

        self.logger.debug(format_args!(
            "{}: registered, irq {}/{}",
            name, platform.event_irq.0, platform.error_irq.0
        ));
        Ok(handle)
    }

    /// Detach a closed controller from its interrupt lines.
    ///
    /// The handle stays valid but the bus can no longer be opened.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unknown handle, an open controller or
    /// one already removed.
    pub fn remove(&self, handle: BusHandle) -> Result<(), Error> {
        let bus = self.bus(handle)?;
        let adapter = bus.adapter.write();
        if adapter.is_some() || !bus.is_attached() {
            return Err(Error::InvalidArgument);
        }
        bus.attached.store(false, Ordering::Release);
        if let Some(platform) = bus.platform {
            self.irq.disable_line(platform.event_irq);
            self.irq.disable_line(platform.error_irq);
        }
        drop(adapter);

        self.logger.debug(format_args!("{}: removed", bus.name));
        Ok(())
    }

    /// Entry point for the board's interrupt vectors.
    ///
    /// Returns `false` when `line` belongs to no attached controller.
    pub fn on_interrupt(&self, line: IrqLine) -> bool {
        let mut handled = false;
        for bus in self.buses.iter().filter(|bus| bus.is_attached()) {
            let Some(platform) = bus.platform else {
                continue;
            };
            if platform.event_irq == line {
                irq::on_event(bus, self.slots, &self.irq, line);
                handled = true;
            } else if platform.error_irq == line {
                irq::on_error(bus, self.slots, &self.irq, &self.logger, line);
                handled = true;
            }
        }
        handled
    }

    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unknown handle.
    pub fn bus(&self, handle: BusHandle) -> Result<&Bus<R, D>, Error> {
        self.buses.get(handle.index()).ok_or(Error::InvalidArgument)
    }

    pub fn buses(&self) -> impl Iterator<Item = (BusHandle, &Bus<R, D>)> {
        self.buses
            .iter()
            .enumerate()
            .filter_map(|(index, bus)| Some((BusHandle(u8::try_from(index).ok()?), bus)))
    }

    /// Current register values of a controller.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unknown handle.
    pub fn snapshot(&self, handle: BusHandle) -> Result<RegisterSnapshot, Error> {
        Ok(RegisterSnapshot::capture(&self.bus(handle)?.regs))
    }

    pub fn irq(&self) -> &I {
        &self.irq
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub(crate) fn dump_registers(&self, bus: &Bus<R, D>) {
        if self.config.dump_registers {
            let snapshot = RegisterSnapshot::capture(&bus.regs);
            self.logger.debug(format_args!("{}: {}", bus.name, snapshot));
        }
    }
}

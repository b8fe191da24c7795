// Licensed under the Apache-2.0 license

//! Test doubles: a recording register bank, a recording interrupt controller
//! and a delay that returns immediately.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

use crate::common::NoOpLogger;
use crate::i2c::common::{DriverConfig, IrqLine, PlatformConfig};
use crate::i2c::registers::{Instance, Reg, SR1_ADDR, SR1_BTF, SR1_RXNE, SR1_SB, SR1_TXE};
use crate::i2c::registry::{Bus, BusHandle, Registry};
use crate::i2c::sync::AdapterSlot;
use crate::i2c::traits::{IrqControl, Registers};

pub const EVT: IrqLine = IrqLine(33);
pub const ERR: IrqLine = IrqLine(34);

/// SR1 once the scripted values run out: every progress flag, no error.
pub const SR1_IDLE_READY: u32 = SR1_SB | SR1_ADDR | SR1_BTF | SR1_RXNE | SR1_TXE;

#[derive(Default)]
struct State {
    values: HashMap<Reg, u32>,
    writes: Vec<(Reg, u32)>,
    reads: Vec<Reg>,
    sr1: VecDeque<u32>,
    rx: VecDeque<u8>,
}

/// Register bank recording every access.
///
/// SR1 reads return scripted values first, then [`SR1_IDLE_READY`]; DR reads
/// return queued receive bytes; SR2 always reads zero. Everything else reads
/// back the last value written.
#[derive(Default)]
pub struct MockRegisters {
    state: Mutex<State>,
}

impl MockRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sr1(&self, value: u32) {
        self.state.lock().unwrap().sr1.push_back(value);
    }

    pub fn push_rx(&self, bytes: &[u8]) {
        self.state.lock().unwrap().rx.extend(bytes);
    }

    pub fn writes(&self) -> Vec<(Reg, u32)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn reads(&self) -> Vec<Reg> {
        self.state.lock().unwrap().reads.clone()
    }

    /// Last value written to `reg`.
    pub fn value(&self, reg: Reg) -> u32 {
        self.state
            .lock()
            .unwrap()
            .values
            .get(&reg)
            .copied()
            .unwrap_or(0)
    }

    pub fn clear_log(&self) {
        let mut state = self.state.lock().unwrap();
        state.writes.clear();
        state.reads.clear();
    }
}

impl Registers for MockRegisters {
    fn read(&self, reg: Reg) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.reads.push(reg);
        match reg {
            Reg::Sr1 => state.sr1.pop_front().unwrap_or(SR1_IDLE_READY),
            Reg::Sr2 => 0,
            Reg::Dr => state.rx.pop_front().map_or(0, u32::from),
            _ => state.values.get(&reg).copied().unwrap_or(0),
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        let mut state = self.state.lock().unwrap();
        state.writes.push((reg, value));
        state.values.insert(reg, value);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqCall {
    Enable(IrqLine),
    Disable(IrqLine),
}

#[derive(Default)]
pub struct MockIrq {
    calls: Mutex<Vec<IrqCall>>,
}

impl MockIrq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<IrqCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn enable_count(&self, line: IrqLine) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call == IrqCall::Enable(line))
            .count()
    }

    /// Whether the most recent call for `line` unmasked it.
    pub fn is_enabled(&self, line: IrqLine) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|call| match *call {
                IrqCall::Enable(l) if l == line => Some(true),
                IrqCall::Disable(l) if l == line => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl IrqControl for MockIrq {
    fn enable_line(&self, line: IrqLine) {
        self.calls.lock().unwrap().push(IrqCall::Enable(line));
    }

    fn disable_line(&self, line: IrqLine) {
        self.calls.lock().unwrap().push(IrqCall::Disable(line));
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub type TestRegistry<'p> = Registry<'p, MockRegisters, MockIrq, NoDelay, NoOpLogger>;

/// I2C2 on a 42 MHz APB1.
pub fn platform() -> PlatformConfig {
    Instance::I2c2.platform(HertzU32::MHz(42))
}

/// Registry with one registered, closed controller.
pub fn registry(slots: &[AdapterSlot]) -> (TestRegistry<'_>, BusHandle) {
    let mut registry = Registry::new(slots, MockIrq::new(), NoOpLogger, DriverConfig::default());
    let handle = registry
        .register(Bus::new("i2c2", MockRegisters::new(), Some(platform()), NoDelay))
        .unwrap();
    (registry, handle)
}

/// Raise `count` event interrupts.
pub fn post_events(registry: &TestRegistry<'_>, count: usize) {
    for _ in 0..count {
        registry.on_interrupt(EVT);
    }
}

// Licensed under the Apache-2.0 license

//! Cortex-M glue: NVIC line control and a busy-wait delay.

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;
use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

use crate::i2c::common::IrqLine;
use crate::i2c::traits::IrqControl;

#[derive(Copy, Clone)]
struct NvicLine(u16);

// SAFETY: the number comes from the board's interrupt table via `IrqLine`.
unsafe impl InterruptNumber for NvicLine {
    fn number(self) -> u16 {
        self.0
    }
}

/// [`IrqControl`] on the Cortex-M NVIC.
#[derive(Copy, Clone, Debug, Default)]
pub struct NvicLines;

impl IrqControl for NvicLines {
    fn enable_line(&self, line: IrqLine) {
        // SAFETY: the line is only unmasked once its handler is routed through
        // `Registry::on_interrupt`, which does not break critical sections.
        unsafe { NVIC::unmask(NvicLine(line.0)) }
    }

    fn disable_line(&self, line: IrqLine) {
        NVIC::mask(NvicLine(line.0));
    }
}

/// Busy-wait delay calibrated against the core clock.
///
/// Counts loop iterations, so it only bounds waits from below; good enough
/// for event timeouts.
#[derive(Copy, Clone, Debug)]
pub struct SpinDelay {
    cycles_per_us: u32,
}

impl SpinDelay {
    #[must_use]
    pub fn new(core_clock: HertzU32) -> Self {
        Self {
            cycles_per_us: (core_clock.raw() / 1_000_000).max(1),
        }
    }
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = u64::from(ns) * u64::from(self.cycles_per_us) / 1_000;
        for _ in 0..cycles {
            core::hint::spin_loop();
        }
    }
}

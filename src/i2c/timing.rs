// Licensed under the Apache-2.0 license

//! Bus clock derivation: CCR divider and TRISE rise time.

use fugit::HertzU32;

use crate::i2c::common::{Error, I2cSpeed};
use crate::i2c::registers::{RegisterExt, CCR_DUTY, CCR_FAST_MODE, CCR_MASK, CR1_PE};
use crate::i2c::traits::Registers;

/// Rise time budget is 1000 ns in standard mode...
const STD_MODE_TIME_CONSTANT: u32 = 1_000_000;
/// ...and 300 ns in fast mode.
const FAST_MODE_TIME_CONSTANT: u32 = 3_333_333;

/// Fast mode with the 16/9 duty cycle. Never selected: the plain 2:1 divider
/// is used for both grades.
const USE_FAST_MODE_DUTY: bool = false;

/// Values programmed into CCR and TRISE for one (input clock, bus frequency) pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingParams {
    pub speed: I2cSpeed,
    /// CCR divider field, without the mode bits
    pub divider: u32,
    pub rise_time: u32,
    pub duty: bool,
}

impl TimingParams {
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `bus` is zero or above the fast-mode ceiling.
    pub fn compute(input: HertzU32, bus: HertzU32) -> Result<Self, Error> {
        let hz = bus.raw();
        if hz == 0 {
            return Err(Error::InvalidArgument);
        }
        let speed = I2cSpeed::for_frequency(bus).ok_or(Error::InvalidArgument)?;
        let clk = input.raw();

        let duty = speed == I2cSpeed::Fast && USE_FAST_MODE_DUTY;
        let divider = if duty {
            clk / (hz * 25)
        } else {
            clk / (hz * 3)
        };

        let rise_time = match speed {
            I2cSpeed::Standard => clk / STD_MODE_TIME_CONSTANT + 1,
            I2cSpeed::Fast => clk / FAST_MODE_TIME_CONSTANT + 1,
        };

        Ok(Self {
            speed,
            divider: divider.clamp(1, CCR_MASK),
            rise_time,
            duty,
        })
    }

    /// Full CCR register value.
    #[must_use]
    pub fn ccr(&self) -> u32 {
        let mut ccr = self.divider;
        if self.speed == I2cSpeed::Fast {
            ccr |= CCR_FAST_MODE;
        }
        if self.duty {
            ccr |= CCR_DUTY;
        }
        ccr
    }
}

/// Program the bus frequency.
///
/// The peripheral is disabled while CCR and TRISE change; CR1 is restored to
/// its value on entry afterwards, whether or not the frequency was accepted.
///
/// # Errors
///
/// [`Error::InvalidArgument`] when `bus` is zero or above the fast-mode
/// ceiling. CCR and TRISE are left untouched in that case.
pub fn set_frequency<R: Registers + ?Sized>(
    regs: &R,
    input: HertzU32,
    bus: HertzU32,
) -> Result<TimingParams, Error> {
    let cr1 = regs.read_cr1();
    regs.write_cr1(cr1 & !CR1_PE);

    let result = TimingParams::compute(input, bus);
    if let Ok(params) = &result {
        regs.write_ccr(params.ccr());
        regs.write_trise(params.rise_time);
    }

    regs.write_cr1(cr1);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::mock::MockRegisters;
    use crate::i2c::registers::Reg;

    #[test]
    fn test_standard_mode_42mhz() {
        let params = TimingParams::compute(HertzU32::MHz(42), HertzU32::kHz(100)).unwrap();
        assert_eq!(params.speed, I2cSpeed::Standard);
        assert_eq!(params.divider, 140);
        assert_eq!(params.rise_time, 43);
        assert_eq!(params.ccr(), 140);
    }

    #[test]
    fn test_fast_mode_42mhz() {
        let params = TimingParams::compute(HertzU32::MHz(42), HertzU32::kHz(400)).unwrap();
        assert_eq!(params.speed, I2cSpeed::Fast);
        assert_eq!(params.divider, 35);
        assert_eq!(params.rise_time, 13);
        assert_eq!(params.ccr(), CCR_FAST_MODE | 35);
        assert!(!params.duty);
    }

    #[test]
    fn test_divider_formula() {
        // (input MHz, bus kHz, divider, rise time)
        let cases = [
            (42, 100, 140, 43),
            (16, 100, 53, 17),
            (36, 250, 48, 11),
            (8, 400, 6, 3),
            (42, 50, 280, 43),
        ];
        for (input, bus, divider, rise_time) in cases {
            let params =
                TimingParams::compute(HertzU32::MHz(input), HertzU32::kHz(bus)).unwrap();
            assert_eq!(params.divider, input * 1_000_000 / (bus * 1000 * 3));
            assert_eq!(params.divider, divider, "{input} MHz / {bus} kHz");
            assert_eq!(params.rise_time, rise_time, "{input} MHz / {bus} kHz");
        }
    }

    #[test]
    fn test_grade_boundaries() {
        let clk = HertzU32::MHz(42);
        for hz in [1_000, 99_999, 100_000] {
            let params = TimingParams::compute(clk, HertzU32::from_raw(hz)).unwrap();
            assert_eq!(params.ccr() & CCR_FAST_MODE, 0, "{hz} Hz");
        }
        for hz in [100_001, 300_000, 400_000] {
            let params = TimingParams::compute(clk, HertzU32::from_raw(hz)).unwrap();
            assert_ne!(params.ccr() & CCR_FAST_MODE, 0, "{hz} Hz");
        }
    }

    #[test]
    fn test_divider_clamped_to_field() {
        let params = TimingParams::compute(HertzU32::MHz(50), HertzU32::from_raw(100)).unwrap();
        assert_eq!(params.divider, CCR_MASK);
    }

    #[test]
    fn test_set_frequency_restores_enable() {
        let regs = MockRegisters::new();
        regs.write_cr1(CR1_PE);
        regs.clear_log();

        let params = set_frequency(&regs, HertzU32::MHz(42), HertzU32::kHz(400)).unwrap();
        assert_eq!(params.rise_time, 13);
        assert_eq!(
            regs.writes(),
            vec![
                (Reg::Cr1, 0),
                (Reg::Ccr, CCR_FAST_MODE | 35),
                (Reg::Trise, 13),
                (Reg::Cr1, CR1_PE),
            ]
        );
    }

    #[test]
    fn test_set_frequency_keeps_disabled_controller_disabled() {
        let regs = MockRegisters::new();
        set_frequency(&regs, HertzU32::MHz(42), HertzU32::kHz(100)).unwrap();
        assert_eq!(regs.value(Reg::Cr1), 0);
        assert_eq!(regs.value(Reg::Ccr), 140);
        assert_eq!(regs.value(Reg::Trise), 43);
    }

    #[test]
    fn test_set_frequency_rejects_out_of_range() {
        for hz in [0, 400_001, 1_000_000] {
            let regs = MockRegisters::new();
            regs.write_cr1(CR1_PE);
            regs.clear_log();

            let result = set_frequency(&regs, HertzU32::MHz(42), HertzU32::from_raw(hz));
            assert_eq!(result, Err(Error::InvalidArgument));
            assert_eq!(regs.writes(), vec![(Reg::Cr1, 0), (Reg::Cr1, CR1_PE)]);
        }
    }
}

/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
/*!
A platform agnostic Rust driver for the [Si5351], based on the
[`embedded-hal`] traits, with support for quadrature (90° offset) output pairs.

## The Device

The Silicon Labs [Si5351] is an any-frequency CMOS clock generator. Two PLLs
multiply a crystal reference up to a VCO frequency, and a fractional multisynth
divider per output brings it back down to the requested frequency.

The device has an I²C interface.

## Usage

Instantiate the device from any `embedded_hal` blocking I²C implementation and
bring it up:

```ignore
use silicon5351::{ClockConfig, ClockOutput, Si5351, Si5351Device, PLL};

let mut clock = Si5351Device::new_adafruit_module(i2c);
clock.init_adafruit_module(&mut delay)?;
```

Assign outputs to a PLL, program the PLL, then ask for a frequency. Two outputs
on the same PLL with one of them in quadrature mode give an I/Q pair:

```ignore
clock.init_clock(ClockOutput::Clk0, ClockConfig::new(PLL::A))?;
clock.init_clock(ClockOutput::Clk1, ClockConfig::new(PLL::A).quadrature(true))?;
clock.setup_pll_int(PLL::A, 32)?;
clock.set_frequency(ClockOutput::Clk0, 6_300_000)?;
clock.set_frequency(ClockOutput::Clk1, 6_300_000)?;
clock.enable_outputs(0b011)?;
```

Every change of a multisynth divider soft-resets the owning PLL, which moves the
phase origin of *all* outputs on that PLL. Outputs sharing a PLL should always
be refreshed together, in the same order.

[Si5351]: https://www.silabs.com/documents/public/data-sheets/Si5351-B.pdf
[`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
*/
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate bitflags;
use embedded_hal as hal;

use core::fmt;

pub mod codec;
mod device;
pub mod rational;
mod registers;
pub mod synth;

pub use crate::device::{Si5351, Si5351Device};
pub use crate::registers::DeviceStatusBits;

/// Default 7-bit I²C address of the chip.
pub const DEFAULT_ADDRESS: u8 = 0b0110_0000;

/// Largest numerator / denominator the 20-bit fractional fields can hold.
pub const FRAC_MAX: u32 = 0xF_FFFF;

/// Lowest VCO frequency the PLLs are specified for, in Hz.
pub const VCO_MIN: u64 = 600_000_000;
/// Highest VCO frequency the PLLs are specified for, in Hz.
pub const VCO_MAX: u64 = 900_000_000;

/// Upper bound for the bring-up poll on the device status register, in ms.
pub const INIT_TIMEOUT_MS: u16 = 100;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// The bus transaction failed; carries the bus error untouched.
    CommunicationError(E),
    InvalidParameter(RangeError),
    InvalidState(StateError),
    /// SYS_INIT never cleared within [`INIT_TIMEOUT_MS`].
    DeviceNotReady,
}

/// A value outside what the hardware can represent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RangeError {
    PllMultiplier,
    Numerator,
    Denominator,
    MultisynthDivider,
    OutputDivider,
    /// Even a /128 R divider leaves the multisynth divisor above its limit.
    FrequencyTooLow,
    FrequencyTooHigh,
    ZeroFrequency,
    PhaseOffset,
    /// The output has no fractional multisynth this driver can program.
    ClockOutput,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StateError {
    ClockNotInitialized(ClockOutput),
    PllNotConfigured(PLL),
}

impl<E> From<RangeError> for Error<E> {
    fn from(e: RangeError) -> Self {
        Error::InvalidParameter(e)
    }
}

impl<E> From<StateError> for Error<E> {
    fn from(e: StateError) -> Self {
        Error::InvalidState(e)
    }
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RangeError::PllMultiplier => write!(f, "PLL multiplier outside 15..=90"),
            RangeError::Numerator => write!(f, "fraction numerator out of range"),
            RangeError::Denominator => write!(f, "fraction denominator out of range"),
            RangeError::MultisynthDivider => write!(f, "multisynth divider out of range"),
            RangeError::OutputDivider => write!(f, "R divider exponent outside 0..=7"),
            RangeError::FrequencyTooLow => {
                write!(f, "target frequency too low for this PLL/output combination")
            }
            RangeError::FrequencyTooHigh => write!(f, "target frequency too high"),
            RangeError::ZeroFrequency => write!(f, "target frequency is zero"),
            RangeError::PhaseOffset => write!(f, "phase offset wider than 7 bits"),
            RangeError::ClockOutput => write!(f, "output has no programmable multisynth"),
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StateError::ClockNotInitialized(clk) => write!(f, "{:?} was never initialized", clk),
            StateError::PllNotConfigured(pll) => write!(f, "PLL {:?} was never programmed", pll),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CommunicationError(e) => write!(f, "Communication Error: {:?}", e),
            Error::InvalidParameter(e) => write!(f, "Invalid Parameter: {}", e),
            Error::InvalidState(e) => write!(f, "Invalid State: {}", e),
            Error::DeviceNotReady => write!(f, "Device Not Ready"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrystalLoad {
    _6,
    _8,
    _10,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PLL {
    A = 0,
    B,
}

impl PLL {
    fn ix(self) -> usize {
        self as usize
    }
}

/// The output multisynths this driver programs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Multisynth {
    MS0 = 0,
    MS1,
    MS2,
}

impl Multisynth {
    fn ix(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClockOutput {
    Clk0 = 0,
    Clk1,
    Clk2,
    Clk3,
    Clk4,
    Clk5,
    Clk6,
    Clk7,
}

impl ClockOutput {
    pub const ALL: [ClockOutput; 8] = [
        ClockOutput::Clk0,
        ClockOutput::Clk1,
        ClockOutput::Clk2,
        ClockOutput::Clk3,
        ClockOutput::Clk4,
        ClockOutput::Clk5,
        ClockOutput::Clk6,
        ClockOutput::Clk7,
    ];

    fn ix(self) -> u8 {
        self as u8
    }

    /// The multisynth feeding this output, if it is one of the three the
    /// driver supports.
    pub fn multisynth(self) -> Option<Multisynth> {
        match self {
            ClockOutput::Clk0 => Some(Multisynth::MS0),
            ClockOutput::Clk1 => Some(Multisynth::MS1),
            ClockOutput::Clk2 => Some(Multisynth::MS2),
            _ => None,
        }
    }
}

/// R divider: divides the multisynth output by 2^n.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl OutputDivider {
    pub fn exponent(self) -> u8 {
        self as u8
    }

    pub fn from_exponent(exponent: u8) -> Result<OutputDivider, RangeError> {
        match exponent {
            0 => Ok(OutputDivider::Div1),
            1 => Ok(OutputDivider::Div2),
            2 => Ok(OutputDivider::Div4),
            3 => Ok(OutputDivider::Div8),
            4 => Ok(OutputDivider::Div16),
            5 => Ok(OutputDivider::Div32),
            6 => Ok(OutputDivider::Div64),
            7 => Ok(OutputDivider::Div128),
            _ => Err(RangeError::OutputDivider),
        }
    }

    /// Smallest R divider that is at least `desired_divider`.
    pub fn min_divider(desired_divider: u32) -> Result<OutputDivider, RangeError> {
        let exponent = 32 - (desired_divider.max(1) - 1).leading_zeros();
        OutputDivider::from_exponent(exponent as u8).map_err(|_| RangeError::FrequencyTooLow)
    }

    pub fn denominator(self) -> u32 {
        1 << self.exponent()
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DriveStrength {
    _2mA = 0b00,
    _4mA = 0b01,
    _6mA = 0b10,
    _8mA = 0b11,
}

/// Level an output drives while it is disabled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisabledState {
    Low = 0b00,
    High = 0b01,
    HighImpedance = 0b10,
    NeverDisabled = 0b11,
}

/// Per-output settings recorded by `init_clock`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClockConfig {
    pub pll: PLL,
    /// Shift this output by 90° against a plain output on the same PLL.
    /// Caps the multisynth divisor at 128.
    pub quadrature: bool,
    pub invert: bool,
    pub drive_strength: DriveStrength,
}

impl ClockConfig {
    pub fn new(pll: PLL) -> Self {
        ClockConfig {
            pll,
            ..ClockConfig::default()
        }
    }

    pub fn quadrature(mut self, quadrature: bool) -> Self {
        self.quadrature = quadrature;
        self
    }

    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn drive_strength(mut self, drive_strength: DriveStrength) -> Self {
        self.drive_strength = drive_strength;
        self
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            pll: PLL::A,
            quadrature: false,
            invert: false,
            drive_strength: DriveStrength::_8mA,
        }
    }
}

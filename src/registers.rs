/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
use crate::{ClockOutput, DisabledState, DriveStrength, Multisynth, PLL};

#[derive(Debug, Copy, Clone)]
pub enum Register {
    DeviceStatus = 0,
    OutputEnable = 3,
    OebEnable = 9,
    Clk0Control = 16,
    DisabledState1 = 24,
    DisabledState2 = 25,
    Clk0PhaseOffset = 165,
    PLLReset = 177,
    CrystalLoad = 183,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

pub trait FractionalMultisynth {
    fn base_addr(&self) -> u8;
}

impl FractionalMultisynth for PLL {
    fn base_addr(&self) -> u8 {
        match *self {
            PLL::A => 26,
            PLL::B => 34,
        }
    }
}

impl FractionalMultisynth for Multisynth {
    fn base_addr(&self) -> u8 {
        match *self {
            Multisynth::MS0 => 42,
            Multisynth::MS1 => 50,
            Multisynth::MS2 => 58,
        }
    }
}

bitflags! {
    pub struct DeviceStatusBits: u8 {
        const SYS_INIT = 0b1000_0000;
        const LOL_B = 0b0100_0000;
        const LOL_A = 0b0010_0000;
        const LOS = 0b0001_0000;
    }
}

bitflags! {
    pub struct CrystalLoadBits: u8 {
        const RESERVED = 0b00_010010;
        const CL_6 = 0b01_000000;
        const CL_8 = 0b10_000000;
        const CL_10 = 0b11_000000;
    }
}

bitflags! {
    pub struct ClockControlBits: u8 {
        const CLK_PDN = 0b1000_0000;
        const MS_INT = 0b0100_0000;
        const MS_SRC = 0b0010_0000;
        const CLK_INV = 0b0001_0000;
        const CLK_SRC_MS = 0b0000_1100;
        const CLK_DRV_2 = 0b0000_0000;
        const CLK_DRV_4 = 0b0000_0001;
        const CLK_DRV_6 = 0b0000_0010;
        const CLK_DRV_8 = 0b0000_0011;
    }
}

bitflags! {
    pub struct PLLResetBits: u8 {
        const PLLB_RST = 0b1000_0000;
        const PLLA_RST = 0b0010_0000;
    }
}

impl ClockOutput {
    pub(crate) fn control_addr(self) -> u8 {
        Register::Clk0Control.addr() + self.ix()
    }

    pub(crate) fn phase_addr(self) -> u8 {
        Register::Clk0PhaseOffset.addr() + self.ix()
    }

    /// Register and bit offset of this output's 2-bit disabled-state field.
    pub(crate) fn disabled_state_field(self) -> (Register, u8) {
        let reg = if self.ix() < 4 {
            Register::DisabledState1
        } else {
            Register::DisabledState2
        };
        (reg, (self.ix() % 4) * 2)
    }
}

impl DriveStrength {
    pub(crate) fn bits(self) -> ClockControlBits {
        match self {
            DriveStrength::_2mA => ClockControlBits::CLK_DRV_2,
            DriveStrength::_4mA => ClockControlBits::CLK_DRV_4,
            DriveStrength::_6mA => ClockControlBits::CLK_DRV_6,
            DriveStrength::_8mA => ClockControlBits::CLK_DRV_8,
        }
    }
}

impl DisabledState {
    pub(crate) fn bits(self) -> u8 {
        self as u8
    }
}

impl PLL {
    pub(crate) fn reset_bits(self) -> PLLResetBits {
        match self {
            PLL::A => PLLResetBits::PLLA_RST,
            PLL::B => PLLResetBits::PLLB_RST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_output_addresses() {
        assert_eq!(ClockOutput::Clk0.control_addr(), 16);
        assert_eq!(ClockOutput::Clk7.control_addr(), 23);
        assert_eq!(ClockOutput::Clk2.phase_addr(), 167);
    }

    #[test]
    fn disabled_state_fields_split_over_two_registers() {
        let (reg, shift) = ClockOutput::Clk1.disabled_state_field();
        assert_eq!((reg.addr(), shift), (24, 2));
        let (reg, shift) = ClockOutput::Clk7.disabled_state_field();
        assert_eq!((reg.addr(), shift), (25, 6));
    }

    #[test]
    fn synth_banks() {
        assert_eq!(PLL::B.base_addr(), 34);
        assert_eq!(Multisynth::MS2.base_addr(), 58);
    }
}

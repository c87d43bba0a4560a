/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
use log::{debug, trace, warn};

use crate::hal::blocking::delay::DelayMs;
use crate::hal::blocking::i2c::{Write, WriteRead};
use crate::registers::{
    ClockControlBits, CrystalLoadBits, DeviceStatusBits, FractionalMultisynth, Register,
};
use crate::synth::{DividerLimits, MultisynthConfig, PllConfig, Vco};
use crate::{
    ClockConfig, ClockOutput, CrystalLoad, DisabledState, Error, Multisynth, RangeError,
    StateError, DEFAULT_ADDRESS, INIT_TIMEOUT_MS, PLL, VCO_MAX, VCO_MIN,
};

/// What the driver remembers about an output between calls.
#[derive(Debug, Copy, Clone)]
struct ClockState {
    config: ClockConfig,
    /// Last divider written, `None` until the first frequency request.
    multisynth: Option<MultisynthConfig>,
}

/// Si5351 driver
pub struct Si5351Device<I2C> {
    i2c: I2C,
    address: u8,
    xtal_freq: u32,
    vco: [Option<Vco>; 2],
    clocks: [Option<ClockState>; 3],
}

pub trait Si5351<E> {
    fn init_adafruit_module<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<(), Error<E>>;
    /// Waits for the device to finish its own start-up, sets the crystal load
    /// and disables and powers down all eight outputs.
    fn init<D: DelayMs<u8>>(&mut self, delay: &mut D, xtal_load: CrystalLoad)
        -> Result<(), Error<E>>;
    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error<E>>;

    /// Records the PLL and output options of `clk`. Nothing is written until
    /// the first frequency request.
    fn init_clock(&mut self, clk: ClockOutput, config: ClockConfig) -> Result<(), Error<E>>;

    fn setup_pll_int(&mut self, pll: PLL, mult: u8) -> Result<(), Error<E>>;
    /// Sets the VCO of `pll` to crystal * (mult + num / denom).
    fn setup_pll(&mut self, pll: PLL, mult: u8, num: u32, denom: u32) -> Result<(), Error<E>>;

    /// Tunes `clk` by its multisynth divider, leaving the PLL alone.
    ///
    /// A change in the whole part of the divider soft-resets the PLL, which
    /// also moves the phase of every other output on that PLL.
    fn set_frequency(&mut self, clk: ClockOutput, freq: u32) -> Result<(), Error<E>>;
    /// Tunes `clk` by its PLL, keeping an even integer multisynth divider.
    ///
    /// The current divider is kept for as long as it puts the VCO between
    /// [`VCO_MIN`] and [`VCO_MAX`], so nearby frequencies need no reset.
    fn set_frequency_fixed_multisynth(&mut self, clk: ClockOutput, freq: u32)
        -> Result<(), Error<E>>;

    fn enable_output(&mut self, clk: ClockOutput) -> Result<(), Error<E>>;
    fn disable_output(&mut self, clk: ClockOutput) -> Result<(), Error<E>>;
    /// Enables the outputs in `mask` and disables all others.
    fn enable_outputs(&mut self, mask: u8) -> Result<(), Error<E>>;
    fn set_disabled_state(&mut self, clk: ClockOutput, state: DisabledState)
        -> Result<(), Error<E>>;
    /// Makes the outputs in `mask` ignore the OEB pin.
    fn disable_oeb(&mut self, mask: u8) -> Result<(), Error<E>>;

    fn set_phase(&mut self, clk: ClockOutput, phase: u8) -> Result<(), Error<E>>;
    fn reset_pll(&mut self, pll: PLL) -> Result<(), Error<E>>;

    fn vco_frequency(&self, pll: PLL) -> Option<Vco>;
    fn multisynth(&self, clk: ClockOutput) -> Option<MultisynthConfig>;
}

impl<I2C, E> Si5351Device<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// Creates a new driver from a I2C peripheral
    pub fn new(i2c: I2C, address: u8, xtal_freq: u32) -> Self {
        Si5351Device {
            i2c,
            address,
            xtal_freq,
            vco: [None; 2],
            clocks: [None; 3],
        }
    }

    pub fn new_adafruit_module(i2c: I2C) -> Self {
        Si5351Device::new(i2c, DEFAULT_ADDRESS, 25_000_000)
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Error<E>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[addr], &mut buffer)
            .map_err(Error::CommunicationError)?;
        trace!("read {:#04x} <- {:#04x}", addr, buffer[0]);
        Ok(buffer[0])
    }

    fn write_register(&mut self, addr: u8, byte: u8) -> Result<(), Error<E>> {
        trace!("write {:#04x} -> {:#04x}", addr, byte);
        self.i2c
            .write(self.address, &[addr, byte])
            .map_err(Error::CommunicationError)
    }

    fn write_burst(&mut self, addr: u8, params: &[u8; 8]) -> Result<(), Error<E>> {
        trace!("write {:#04x} -> {:02x?}", addr, params);
        self.i2c
            .write(
                self.address,
                &[
                    addr, params[0], params[1], params[2], params[3], params[4], params[5],
                    params[6], params[7],
                ],
            )
            .map_err(Error::CommunicationError)
    }

    /// Read-modify-write of the bits in `mask`.
    fn update_register(&mut self, addr: u8, mask: u8, bits: u8) -> Result<(), Error<E>> {
        let current = self.read_register(addr)?;
        self.write_register(addr, (current & !mask) | (bits & mask))
    }

    fn status(&mut self) -> Result<DeviceStatusBits, Error<E>> {
        Ok(DeviceStatusBits::from_bits_truncate(
            self.read_register(Register::DeviceStatus.addr())?,
        ))
    }

    fn wait_until_ready<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        for _ in 0..INIT_TIMEOUT_MS {
            let device_status = self.status()?;
            if !device_status.contains(DeviceStatusBits::SYS_INIT) {
                return Ok(());
            }
            delay.delay_ms(1);
        }
        warn!("SYS_INIT still set after {} ms", INIT_TIMEOUT_MS);
        Err(Error::DeviceNotReady)
    }

    fn bring_up<D: DelayMs<u8>>(
        &mut self,
        delay: &mut D,
        xtal_load: CrystalLoad,
    ) -> Result<(), Error<E>> {
        self.wait_until_ready(delay)?;

        self.write_register(
            Register::CrystalLoad.addr(),
            (CrystalLoadBits::RESERVED
                | match xtal_load {
                    CrystalLoad::_6 => CrystalLoadBits::CL_6,
                    CrystalLoad::_8 => CrystalLoadBits::CL_8,
                    CrystalLoad::_10 => CrystalLoadBits::CL_10,
                })
            .bits(),
        )?;

        self.write_register(Register::OutputEnable.addr(), 0xFF)?;
        self.write_burst(
            Register::Clk0Control.addr(),
            &[ClockControlBits::CLK_PDN.bits(); 8],
        )?;

        // outputs are powered down, the next frequency request starts over
        for state in self.clocks.iter_mut().flatten() {
            state.multisynth = None;
        }
        debug!("initialized, crystal {} Hz", self.xtal_freq);
        Ok(())
    }

    /// Phase offset of `clk` in quarter VCO periods, 7 bits wide.
    fn write_phase(&mut self, clk: ClockOutput, phase: u8) -> Result<(), Error<E>> {
        clk.multisynth().ok_or(RangeError::ClockOutput)?;
        // upper bit is reserved
        if phase > 0b0111_1111 {
            return Err(RangeError::PhaseOffset.into());
        }
        self.write_register(clk.phase_addr(), phase)
    }

    fn soft_reset(&mut self, pll: PLL) -> Result<(), Error<E>> {
        debug!("soft reset PLL {:?}", pll);
        self.write_register(Register::PLLReset.addr(), pll.reset_bits().bits())
    }

    fn clock_state(&self, clk: ClockOutput) -> Result<(Multisynth, ClockState), Error<E>> {
        let ms = clk.multisynth().ok_or(RangeError::ClockOutput)?;
        let state = self.clocks[ms.ix()].ok_or(StateError::ClockNotInitialized(clk))?;
        Ok((ms, state))
    }

    fn write_pll(&mut self, pll: PLL, config: PllConfig) -> Result<(), Error<E>> {
        let block = config.params().encode()?;
        self.write_burst(pll.base_addr(), &block.0)?;

        let vco = config.vco(self.xtal_freq);
        debug!(
            "PLL {:?}: {} + {}/{} -> VCO {} Hz",
            pll,
            config.mult,
            config.num,
            config.denom,
            vco.hz()
        );
        self.vco[pll.ix()] = Some(vco);
        Ok(())
    }

    /// Writes a solved divider and keeps phase and control state in step.
    fn apply_multisynth(
        &mut self,
        clk: ClockOutput,
        ms: Multisynth,
        mut state: ClockState,
        config: MultisynthConfig,
    ) -> Result<(), Error<E>> {
        let block = config.params().encode()?;
        self.write_burst(ms.base_addr(), &block.0)?;
        debug!(
            "{:?}: {} + {}/{}, R = {}",
            clk,
            config.whole,
            config.num,
            config.denom,
            config.r_div.denominator()
        );

        let previous = state.multisynth.map(|current| current.whole);
        if previous != Some(config.whole) {
            let phase = if state.config.quadrature {
                config.whole as u8
            } else {
                0
            };
            self.write_phase(clk, phase)?;
            // restarts every multisynth on this PLL from a common edge
            self.soft_reset(state.config.pll)?;
        }
        self.write_register(
            clk.control_addr(),
            control_bits(&state.config, config.is_integer()).bits(),
        )?;

        state.multisynth = Some(config);
        self.clocks[ms.ix()] = Some(state);
        Ok(())
    }
}

fn control_bits(config: &ClockConfig, integer_mode: bool) -> ClockControlBits {
    let mut bits = ClockControlBits::CLK_SRC_MS | config.drive_strength.bits();
    if integer_mode {
        bits |= ClockControlBits::MS_INT;
    }
    if config.pll == PLL::B {
        bits |= ClockControlBits::MS_SRC;
    }
    // the quadrature output runs inverted against its partner
    if config.invert || config.quadrature {
        bits |= ClockControlBits::CLK_INV;
    }
    bits
}

impl<I2C, E> Si5351<E> for Si5351Device<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    fn init_adafruit_module<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.bring_up(delay, CrystalLoad::_10)
    }

    fn init<D: DelayMs<u8>>(
        &mut self,
        delay: &mut D,
        xtal_load: CrystalLoad,
    ) -> Result<(), Error<E>> {
        self.bring_up(delay, xtal_load)
    }

    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error<E>> {
        self.status()
    }

    fn init_clock(&mut self, clk: ClockOutput, config: ClockConfig) -> Result<(), Error<E>> {
        let ms = clk.multisynth().ok_or(RangeError::ClockOutput)?;
        self.clocks[ms.ix()] = Some(ClockState {
            config,
            multisynth: None,
        });
        Ok(())
    }

    fn setup_pll_int(&mut self, pll: PLL, mult: u8) -> Result<(), Error<E>> {
        let config = PllConfig::new(mult, 0, 1)?;
        self.write_pll(pll, config)
    }

    fn setup_pll(&mut self, pll: PLL, mult: u8, num: u32, denom: u32) -> Result<(), Error<E>> {
        let config = PllConfig::new(mult, num, denom)?;
        self.write_pll(pll, config)
    }

    fn set_frequency(&mut self, clk: ClockOutput, freq: u32) -> Result<(), Error<E>> {
        let (ms, state) = self.clock_state(clk)?;
        let pll = state.config.pll;
        let vco = self.vco[pll.ix()].ok_or(StateError::PllNotConfigured(pll))?;

        let limits = DividerLimits::for_output(state.config.quadrature);
        let config = MultisynthConfig::solve(vco, freq, limits)?;
        self.apply_multisynth(clk, ms, state, config)
    }

    fn set_frequency_fixed_multisynth(
        &mut self,
        clk: ClockOutput,
        freq: u32,
    ) -> Result<(), Error<E>> {
        let (ms, state) = self.clock_state(clk)?;
        if freq == 0 {
            return Err(RangeError::ZeroFrequency.into());
        }

        let limits = DividerLimits::for_output(state.config.quadrature);
        let reusable = state.multisynth.filter(|current| {
            let pll_freq = freq as u64 * current.total_divider();
            current.is_integer() && (VCO_MIN..=VCO_MAX).contains(&pll_freq)
        });
        let config = match reusable {
            Some(current) => current,
            None => MultisynthConfig::integer_for_frequency(freq, limits)?,
        };

        let pll_freq = freq as u64 * config.total_divider();
        let pll_config = PllConfig::for_frequency(self.xtal_freq, pll_freq)?;
        self.write_pll(state.config.pll, pll_config)?;
        self.apply_multisynth(clk, ms, state, config)
    }

    fn enable_output(&mut self, clk: ClockOutput) -> Result<(), Error<E>> {
        // a set bit disables the output
        self.update_register(Register::OutputEnable.addr(), 1 << clk.ix(), 0)
    }

    fn disable_output(&mut self, clk: ClockOutput) -> Result<(), Error<E>> {
        let bit = 1 << clk.ix();
        self.update_register(Register::OutputEnable.addr(), bit, bit)
    }

    fn enable_outputs(&mut self, mask: u8) -> Result<(), Error<E>> {
        self.write_register(Register::OutputEnable.addr(), !mask)
    }

    fn set_disabled_state(
        &mut self,
        clk: ClockOutput,
        state: DisabledState,
    ) -> Result<(), Error<E>> {
        let (reg, shift) = clk.disabled_state_field();
        self.update_register(reg.addr(), 0b11 << shift, state.bits() << shift)
    }

    fn disable_oeb(&mut self, mask: u8) -> Result<(), Error<E>> {
        self.write_register(Register::OebEnable.addr(), mask)
    }

    fn set_phase(&mut self, clk: ClockOutput, phase: u8) -> Result<(), Error<E>> {
        self.write_phase(clk, phase)
    }

    fn reset_pll(&mut self, pll: PLL) -> Result<(), Error<E>> {
        self.soft_reset(pll)
    }

    fn vco_frequency(&self, pll: PLL) -> Option<Vco> {
        self.vco[pll.ix()]
    }

    fn multisynth(&self, clk: ClockOutput) -> Option<MultisynthConfig> {
        let ms = clk.multisynth()?;
        self.clocks[ms.ix()].and_then(|state| state.multisynth)
    }
}

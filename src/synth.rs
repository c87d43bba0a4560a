/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Frequency planning for the two synthesis stages.
//!
//! All arithmetic is done on exact rationals in integer form. A VCO of
//! `crystal * (mult + num / denom)` is carried as the pair
//! `(crystal * (mult * denom + num), denom)`, so dividing it down never rounds
//! before the final fraction is approximated into the 20-bit register fields.

use crate::codec::SynthParams;
use crate::rational::approximate;
use crate::{OutputDivider, RangeError, FRAC_MAX, VCO_MAX, VCO_MIN};

/// Exact PLL output frequency in Hz, as `numer / denom`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Vco {
    numer: u64,
    denom: u32,
}

impl Vco {
    pub fn from_hz(hz: u64) -> Self {
        Vco { numer: hz, denom: 1 }
    }

    pub fn numer(&self) -> u64 {
        self.numer
    }

    pub fn denom(&self) -> u32 {
        self.denom
    }

    /// Integer part of the frequency.
    pub fn hz(&self) -> u64 {
        self.numer / self.denom as u64
    }
}

/// Feedback multisynth setting: VCO = crystal * (mult + num / denom).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PllConfig {
    pub mult: u8,
    pub num: u32,
    pub denom: u32,
}

impl PllConfig {
    pub const MULT_MIN: u8 = 15;
    pub const MULT_MAX: u8 = 90;

    pub fn new(mult: u8, num: u32, denom: u32) -> Result<Self, RangeError> {
        if mult < Self::MULT_MIN || mult > Self::MULT_MAX {
            return Err(RangeError::PllMultiplier);
        }
        if denom == 0 || denom > FRAC_MAX {
            return Err(RangeError::Denominator);
        }
        if num >= FRAC_MAX || num >= denom {
            return Err(RangeError::Numerator);
        }
        Ok(PllConfig { mult, num, denom })
    }

    /// Multiplier reaching `pll_freq` from `xtal_freq` as closely as the
    /// 20-bit fraction allows.
    pub fn for_frequency(xtal_freq: u32, pll_freq: u64) -> Result<Self, RangeError> {
        if xtal_freq == 0 {
            return Err(RangeError::ZeroFrequency);
        }
        let xtal = xtal_freq as u64;
        let mut mult = pll_freq / xtal;
        let (mut num, mut denom) = approximate(pll_freq % xtal, xtal, FRAC_MAX as u64);
        if num >= denom {
            mult += 1;
            num = 0;
            denom = 1;
        } else if num == 0 {
            denom = 1;
        }
        if mult > Self::MULT_MAX as u64 {
            return Err(RangeError::PllMultiplier);
        }
        PllConfig::new(mult as u8, num as u32, denom as u32)
    }

    pub fn vco(&self, xtal_freq: u32) -> Vco {
        let scaled = self.mult as u64 * self.denom as u64 + self.num as u64;
        Vco {
            numer: xtal_freq as u64 * scaled,
            denom: self.denom,
        }
    }

    pub fn params(&self) -> SynthParams {
        SynthParams {
            whole: self.mult as u16,
            num: self.num,
            denom: self.denom,
            r_div: OutputDivider::Div1,
        }
    }
}

/// Bounds applied while solving an output divider.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DividerLimits {
    /// Exclusive upper bound on the whole part of the multisynth divider.
    pub max_divisor: u16,
    /// Largest denominator handed to the rational approximation.
    pub max_denom: u32,
    /// Largest R divider the search may pick.
    pub max_r_div: OutputDivider,
}

impl DividerLimits {
    pub const STANDARD: DividerLimits = DividerLimits {
        max_divisor: 2048,
        max_denom: FRAC_MAX,
        max_r_div: OutputDivider::Div128,
    };

    /// The phase offset register is 7 bits wide and counts in quarter VCO
    /// periods ahead of the R divider, so a 90° shift is only reachable for
    /// divisors below 128 with R = 1.
    pub const QUADRATURE: DividerLimits = DividerLimits {
        max_divisor: 128,
        max_denom: FRAC_MAX,
        max_r_div: OutputDivider::Div1,
    };

    pub fn for_output(quadrature: bool) -> Self {
        if quadrature {
            DividerLimits::QUADRATURE
        } else {
            DividerLimits::STANDARD
        }
    }
}

/// Output multisynth setting: f_out = VCO / (whole + num / denom) / R.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MultisynthConfig {
    pub whole: u16,
    pub num: u32,
    pub denom: u32,
    pub r_div: OutputDivider,
}

impl MultisynthConfig {
    pub const DIVIDER_MIN: u16 = 8;
    pub const DIVIDER_MAX: u16 = 2048;

    /// Divides `vco` down to `freq` with a fractional multisynth divider and,
    /// when the divider alone cannot reach that low, an R divider.
    pub fn solve(vco: Vco, freq: u32, limits: DividerLimits) -> Result<Self, RangeError> {
        if freq == 0 {
            return Err(RangeError::ZeroFrequency);
        }

        let vco_numer = vco.numer as u128;
        let vco_denom = vco.denom as u128;
        let max_divisor = limits.max_divisor as u128;

        // smallest R divider that brings the multisynth divisor under the cap
        let mut working = freq as u64;
        let mut exponent = 0u8;
        while working as u128 * max_divisor * vco_denom <= vco_numer {
            if exponent >= limits.max_r_div.exponent() {
                return Err(RangeError::FrequencyTooLow);
            }
            working *= 2;
            exponent += 1;
        }
        let r_div = OutputDivider::from_exponent(exponent)?;

        let scale = working as u128 * vco_denom;
        let mut whole = vco_numer / scale;
        let remainder = (vco_numer % scale) as u64;
        let (mut num, mut denom) = approximate(remainder, scale as u64, limits.max_denom as u64);
        if num >= denom {
            whole += 1;
            num = 0;
            denom = 1;
        } else if num == 0 {
            denom = 1;
        }

        let config = MultisynthConfig {
            whole: whole.min(u16::MAX as u128) as u16,
            num: num as u32,
            denom: denom as u32,
            r_div,
        };
        config.validate()?;
        // rounding the fraction up can carry into the cap
        if config.whole >= limits.max_divisor {
            return Err(RangeError::MultisynthDivider);
        }
        Ok(config)
    }

    /// Even integer divider and R divider putting the VCO as close under
    /// [`VCO_MAX`] as possible, for tuning by PLL with a fixed multisynth.
    ///
    /// Fails with `FrequencyTooLow` when the limits leave no divider that
    /// keeps the VCO at or above [`VCO_MIN`].
    pub fn integer_for_frequency(freq: u32, limits: DividerLimits) -> Result<Self, RangeError> {
        if freq == 0 {
            return Err(RangeError::ZeroFrequency);
        }
        let total = VCO_MAX / freq as u64;
        if total < 4 {
            return Err(RangeError::FrequencyTooHigh);
        }

        let limit = (limits.max_divisor as u64).saturating_sub(1).max(4);
        let desired = ((total + limit - 1) / limit).min(u32::MAX as u64) as u32;
        let r_div = OutputDivider::min_divider(desired)
            .ok()
            .filter(|r| r.exponent() <= limits.max_r_div.exponent())
            .unwrap_or(limits.max_r_div);

        let whole = (total / r_div.denominator() as u64).min(limit) & !1;

        let config = MultisynthConfig {
            whole: whole as u16,
            num: 0,
            denom: 1,
            r_div,
        };
        config.validate()?;
        if freq as u64 * config.total_divider() < VCO_MIN {
            return Err(RangeError::FrequencyTooLow);
        }
        Ok(config)
    }

    pub fn is_integer(&self) -> bool {
        self.num == 0
    }

    /// Multisynth divider times R divider, for integer settings.
    pub fn total_divider(&self) -> u64 {
        self.whole as u64 * self.r_div.denominator() as u64
    }

    pub fn validate(&self) -> Result<(), RangeError> {
        let small_integer = (self.whole == 4 || self.whole == 6) && self.num == 0;
        if !small_integer && !(Self::DIVIDER_MIN..Self::DIVIDER_MAX).contains(&self.whole) {
            return Err(RangeError::MultisynthDivider);
        }
        if self.denom == 0 || self.denom > FRAC_MAX {
            return Err(RangeError::Denominator);
        }
        if self.num >= FRAC_MAX || self.num >= self.denom {
            return Err(RangeError::Numerator);
        }
        Ok(())
    }

    pub fn params(&self) -> SynthParams {
        SynthParams {
            whole: self.whole,
            num: self.num,
            denom: self.denom,
            r_div: self.r_div,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XTAL: u32 = 25_000_000;

    #[test]
    fn pll_ranges() {
        assert_eq!(PllConfig::new(14, 0, 1), Err(RangeError::PllMultiplier));
        assert_eq!(PllConfig::new(91, 0, 1), Err(RangeError::PllMultiplier));
        assert_eq!(PllConfig::new(32, 0, 0), Err(RangeError::Denominator));
        assert_eq!(
            PllConfig::new(32, 0, 1_048_576),
            Err(RangeError::Denominator)
        );
        assert_eq!(
            PllConfig::new(32, 1_048_575, 1_048_575),
            Err(RangeError::Numerator)
        );
        assert_eq!(
            PllConfig::new(90, 1_000_000, 1),
            Err(RangeError::Numerator)
        );
        assert_eq!(PllConfig::new(32, 7, 7), Err(RangeError::Numerator));
        assert!(PllConfig::new(15, 1_048_574, 1_048_575).is_ok());
        assert!(PllConfig::new(90, 0, 1).is_ok());
    }

    #[test]
    fn integer_vco() {
        let vco = PllConfig::new(32, 0, 1).unwrap().vco(XTAL);
        assert_eq!(vco.hz(), 800_000_000);
        assert_eq!(vco, Vco::from_hz(800_000_000));
    }

    #[test]
    fn fractional_vco_is_exact() {
        // 25 MHz * (35 + 1/3)
        let vco = PllConfig::new(35, 1, 3).unwrap().vco(XTAL);
        assert_eq!((vco.numer(), vco.denom()), (2_650_000_000, 3));
        assert_eq!(vco.hz(), 883_333_333);
    }

    #[test]
    fn pll_for_frequency() {
        assert_eq!(
            PllConfig::for_frequency(XTAL, 800_000_000),
            Ok(PllConfig {
                mult: 32,
                num: 0,
                denom: 1
            })
        );
        // 25 MHz * (28 + 22/25) = 722 MHz
        assert_eq!(
            PllConfig::for_frequency(XTAL, 722_000_000),
            Ok(PllConfig {
                mult: 28,
                num: 22,
                denom: 25
            })
        );
        assert_eq!(
            PllConfig::for_frequency(XTAL, 300_000_000),
            Err(RangeError::PllMultiplier)
        );
    }

    #[test]
    fn golden_6m3() {
        let config =
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 6_300_000, DividerLimits::STANDARD)
                .unwrap();
        assert_eq!(
            config,
            MultisynthConfig {
                whole: 126,
                num: 62,
                denom: 63,
                r_div: OutputDivider::Div1
            }
        );
        assert!(!config.is_integer());
    }

    #[test]
    fn integer_division() {
        let config =
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 10_000_000, DividerLimits::STANDARD)
                .unwrap();
        assert_eq!((config.whole, config.num, config.denom), (80, 0, 1));
        assert!(config.is_integer());
    }

    #[test]
    fn fractional_vco_divides_exactly() {
        // (2_650_000_000 / 3) / 10 MHz = 88 + 1/3
        let vco = PllConfig::new(35, 1, 3).unwrap().vco(XTAL);
        let config = MultisynthConfig::solve(vco, 10_000_000, DividerLimits::STANDARD).unwrap();
        assert_eq!((config.whole, config.num, config.denom), (88, 1, 3));
    }

    #[test]
    fn low_frequency_uses_r_divider() {
        // 800 MHz / 2048 = 390.625 kHz is the lowest reachable with R = 1
        let config =
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 100_000, DividerLimits::STANDARD)
                .unwrap();
        assert_eq!(config.r_div, OutputDivider::Div4);
        assert_eq!((config.whole, config.num), (2000, 0));

        let config =
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 390_625, DividerLimits::STANDARD)
                .unwrap();
        assert_eq!(config.r_div, OutputDivider::Div2);
        assert_eq!(config.whole, 1024);
    }

    #[test]
    fn quadrature_caps_divisor_at_128() {
        let config =
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 6_300_000, DividerLimits::QUADRATURE)
                .unwrap();
        assert_eq!((config.whole, config.r_div), (126, OutputDivider::Div1));

        // 800 MHz / 6.2 MHz = 129.03 would need R = 2
        assert_eq!(
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 6_200_000, DividerLimits::QUADRATURE),
            Err(RangeError::FrequencyTooLow)
        );
        // the same frequency is fine for a plain output
        let config =
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 6_200_000, DividerLimits::STANDARD)
                .unwrap();
        assert_eq!((config.whole, config.r_div), (129, OutputDivider::Div1));
    }

    #[test]
    fn too_low_after_seven_doublings() {
        // 800 MHz / 2048 / 128 = 3051.7 Hz
        assert_eq!(
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 3_000, DividerLimits::STANDARD),
            Err(RangeError::FrequencyTooLow)
        );
        assert!(
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 3_100, DividerLimits::STANDARD)
                .is_ok()
        );
        assert_eq!(
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 1, DividerLimits::QUADRATURE),
            Err(RangeError::FrequencyTooLow)
        );
    }

    #[test]
    fn too_high_for_the_divider() {
        // 800 / 150 = 5.33, fractional below 8
        assert_eq!(
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 150_000_000, DividerLimits::STANDARD),
            Err(RangeError::MultisynthDivider)
        );
        // 800 / 200 = 4 exactly, integer-only small divider
        let config =
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 200_000_000, DividerLimits::STANDARD)
                .unwrap();
        assert_eq!((config.whole, config.num), (4, 0));
        assert_eq!(
            MultisynthConfig::solve(Vco::from_hz(800_000_000), 0, DividerLimits::STANDARD),
            Err(RangeError::ZeroFrequency)
        );
    }

    #[test]
    fn validate_small_dividers() {
        let config = |whole, num| MultisynthConfig {
            whole,
            num,
            denom: 7,
            r_div: OutputDivider::Div1,
        };
        assert!(config(4, 0).validate().is_ok());
        assert!(config(6, 0).validate().is_ok());
        assert_eq!(config(6, 1).validate(), Err(RangeError::MultisynthDivider));
        assert_eq!(config(5, 0).validate(), Err(RangeError::MultisynthDivider));
        assert_eq!(config(7, 0).validate(), Err(RangeError::MultisynthDivider));
        assert!(config(8, 3).validate().is_ok());
        assert_eq!(config(8, 7).validate(), Err(RangeError::Numerator));
        assert!(config(2047, 3).validate().is_ok());
        assert_eq!(
            config(2048, 0).validate(),
            Err(RangeError::MultisynthDivider)
        );
    }

    #[test]
    fn integer_divider_for_pll_tuning() {
        // 900 MHz / 7.1 MHz = 126.7 -> 126
        let config =
            MultisynthConfig::integer_for_frequency(7_100_000, DividerLimits::QUADRATURE).unwrap();
        assert_eq!(
            config,
            MultisynthConfig {
                whole: 126,
                num: 0,
                denom: 1,
                r_div: OutputDivider::Div1
            }
        );
        // 900 MHz / 3.2 MHz = 281, but 126 would leave the VCO at 403.2 MHz
        assert_eq!(
            MultisynthConfig::integer_for_frequency(3_200_000, DividerLimits::QUADRATURE),
            Err(RangeError::FrequencyTooLow)
        );
        // 600 MHz / 126 = 4.76 MHz is the quadrature floor
        let config =
            MultisynthConfig::integer_for_frequency(4_800_000, DividerLimits::QUADRATURE).unwrap();
        assert_eq!((config.whole, config.r_div), (126, OutputDivider::Div1));
        assert_eq!(config.total_divider(), 126);

        let config =
            MultisynthConfig::integer_for_frequency(3_200_000, DividerLimits::STANDARD).unwrap();
        assert_eq!((config.whole, config.r_div), (280, OutputDivider::Div1));

        // 2046 * 128 * 2.3 kHz = 602.3 MHz
        let config =
            MultisynthConfig::integer_for_frequency(2_300, DividerLimits::STANDARD).unwrap();
        assert_eq!((config.whole, config.r_div), (2046, OutputDivider::Div128));
        // 1 kHz would need R = 512
        assert_eq!(
            MultisynthConfig::integer_for_frequency(1_000, DividerLimits::STANDARD),
            Err(RangeError::FrequencyTooLow)
        );

        // 900 / 160 = 5 -> 4
        let config =
            MultisynthConfig::integer_for_frequency(160_000_000, DividerLimits::STANDARD).unwrap();
        assert_eq!(config.whole, 4);

        assert_eq!(
            MultisynthConfig::integer_for_frequency(250_000_000, DividerLimits::STANDARD),
            Err(RangeError::FrequencyTooHigh)
        );
    }
}

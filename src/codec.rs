/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! The 8-byte parameter block shared by the PLL feedback multisynths and the
//! output multisynths.
//!
//! A divider `whole + num / denom` is stored as three integers:
//!
//! ```text
//! P1 = 128 * whole + floor(128 * num / denom) - 512
//! P2 = 128 * num - denom * floor(128 * num / denom)
//! P3 = denom
//! ```
//!
//! laid out over eight consecutive registers together with the R divider.

use crate::{OutputDivider, RangeError, FRAC_MAX};

/// Divider parameters before encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SynthParams {
    pub whole: u16,
    pub num: u32,
    pub denom: u32,
    pub r_div: OutputDivider,
}

/// Raw register contents, in register order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterBlock(pub [u8; 8]);

impl SynthParams {
    pub fn encode(&self) -> Result<RegisterBlock, RangeError> {
        if self.denom == 0 || self.denom > FRAC_MAX {
            return Err(RangeError::Denominator);
        }
        if self.num > FRAC_MAX {
            return Err(RangeError::Numerator);
        }
        // P1 would go negative below 4
        if self.whole < 4 {
            return Err(RangeError::MultisynthDivider);
        }

        let ratio = (128u64 * self.num as u64 / self.denom as u64) as u32;

        let p1: u32 = 128 * self.whole as u32 + ratio - 512;
        // 18-bit field
        if p1 > 0x3_FFFF {
            return Err(RangeError::MultisynthDivider);
        }
        let p2: u32 = 128 * self.num - self.denom * ratio;
        let p3: u32 = self.denom;

        Ok(RegisterBlock([
            ((p3 & 0x0000FF00) >> 8) as u8,
            p3 as u8,
            ((p1 & 0x00030000) >> 16) as u8 | self.r_div.exponent() << 4,
            ((p1 & 0x0000FF00) >> 8) as u8,
            p1 as u8,
            (((p3 & 0x000F0000) >> 12) | ((p2 & 0x000F0000) >> 16)) as u8,
            ((p2 & 0x0000FF00) >> 8) as u8,
            p2 as u8,
        ]))
    }
}

impl RegisterBlock {
    pub fn p1(&self) -> u32 {
        let b = &self.0;
        ((b[2] as u32 & 0x03) << 16) | ((b[3] as u32) << 8) | b[4] as u32
    }

    pub fn p2(&self) -> u32 {
        let b = &self.0;
        ((b[5] as u32 & 0x0F) << 16) | ((b[6] as u32) << 8) | b[7] as u32
    }

    pub fn p3(&self) -> u32 {
        let b = &self.0;
        ((b[5] as u32 & 0xF0) << 12) | ((b[0] as u32) << 8) | b[1] as u32
    }

    pub fn r_div(&self) -> OutputDivider {
        // three bits wide, always a valid exponent
        OutputDivider::from_exponent((self.0[2] >> 4) & 0x07).unwrap_or(OutputDivider::Div1)
    }

    /// Recovers the parameters a block was encoded from.
    ///
    /// Exact for every block produced by [`SynthParams::encode`] with
    /// `num < denom`; a zero P3 is reported as a denominator error.
    pub fn decode(&self) -> Result<SynthParams, RangeError> {
        let (p1, p2, p3) = (self.p1(), self.p2(), self.p3());
        if p3 == 0 {
            return Err(RangeError::Denominator);
        }

        // p1 + 512 = 128 * whole + ratio, with ratio < 128 when num < denom
        let scaled = p1 + 512;
        let whole = scaled >> 7;
        let ratio = scaled & 0x7F;
        // 128 * num = p3 * ratio + p2
        let num = (p3 as u64 * ratio as u64 + p2 as u64) / 128;

        Ok(SynthParams {
            whole: whole as u16,
            num: num as u32,
            denom: p3,
            r_div: self.r_div(),
        })
    }
}

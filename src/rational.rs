/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Best rational approximation with a bounded denominator.

/// Closest fraction `p/q` to `numerator/denominator` with `q <= max_denominator`.
///
/// Fractions whose denominator already fits are returned unchanged (not
/// reduced). Otherwise the continued fraction expansion is walked until the
/// next convergent would overflow the bound, and the last convergent is
/// compared against the largest semiconvergent that still fits.
pub fn approximate(numerator: u64, denominator: u64, max_denominator: u64) -> (u64, u64) {
    let max_denominator = max_denominator.max(1);
    if denominator <= max_denominator {
        return (numerator, denominator);
    }

    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    let (mut n, mut d) = (numerator, denominator);
    loop {
        let a = n / d;
        let q2 = q0.saturating_add(a.saturating_mul(q1));
        if q2 > max_denominator {
            break;
        }
        let p2 = p0.saturating_add(a.saturating_mul(p1));
        p0 = p1;
        q0 = q1;
        p1 = p2;
        q1 = q2;

        let r = n - a * d;
        n = d;
        d = r;
        if d == 0 {
            // expansion terminated, p1/q1 is exact
            return (p1, q1);
        }
    }

    let k = (max_denominator - q0) / q1;
    let (sp, sq) = (p0.saturating_add(k.saturating_mul(p1)), q0 + k * q1);

    if distance(numerator, denominator, p1, q1) * sq as u128
        <= distance(numerator, denominator, sp, sq) * q1 as u128
    {
        (p1, q1)
    } else {
        (sp, sq)
    }
}

/// `|p/q - n/d| * q * d`
fn distance(n: u64, d: u64, p: u64, q: u64) -> u128 {
    let lhs = p as u128 * d as u128;
    let rhs = n as u128 * q as u128;
    if lhs > rhs {
        lhs - rhs
    } else {
        rhs - lhs
    }
}

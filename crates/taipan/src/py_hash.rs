//! CPython-compatible hashing for dict and set keys.
//!
//! The critical property is cross-type consistency: `hash(1) == hash(1.0) ==
//! hash(True)`, so `{1, True, 1.0}` collapses to one element. Numeric hashes
//! use CPython's Mersenne-prime reduction (`n mod 2^61 - 1`).

use std::hash::{DefaultHasher, Hash, Hasher};

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Mersenne prime `2^61 - 1`, matching CPython's `_PyHASH_MODULUS`.
const MODULUS: u64 = (1 << 61) - 1;

/// Hashes an i64 the way CPython hashes small ints.
#[must_use]
pub fn hash_int(v: i64) -> u64 {
    let negative = v < 0;
    let reduced = (v.unsigned_abs() % MODULUS) as i64;
    let signed = if negative { -reduced } else { reduced };
    // CPython reserves -1 as an error sentinel and maps it to -2.
    let adjusted = if signed == -1 { -2 } else { signed };
    u64::from_ne_bytes(adjusted.to_ne_bytes())
}

/// Hashes an arbitrary-precision integer consistently with [`hash_int`].
#[must_use]
pub fn hash_bigint(v: &BigInt) -> u64 {
    if let Some(i) = v.to_i64() {
        return hash_int(i);
    }
    let remainder = v.abs() % BigInt::from(MODULUS);
    let reduced = remainder.to_i64().unwrap_or(0);
    let signed = if v.is_negative() { -reduced } else { reduced };
    let adjusted = if signed == -1 { -2 } else { signed };
    u64::from_ne_bytes(adjusted.to_ne_bytes())
}

/// Hashes a float so that integral floats collide with their int values.
///
/// Implements CPython's `_Py_HashDouble` mantissa-walk reduction modulo
/// `2^61 - 1`. NaN hashes to 0 (callers give NaN keys identity semantics, so
/// the hash value only affects bucketing).
#[must_use]
pub fn hash_float(v: f64) -> u64 {
    if v.is_nan() {
        return 0;
    }
    if v.is_infinite() {
        // CPython's _PyHASH_INF.
        let h: i64 = if v > 0.0 { 314_159 } else { -314_159 };
        return u64::from_ne_bytes(h.to_ne_bytes());
    }
    if v == 0.0 {
        return 0;
    }

    let negative = v < 0.0;
    let (mut m, mut e) = frexp(v.abs());

    // Process 28 mantissa bits at a time, rotating within the 61-bit field.
    let mut x: u64 = 0;
    while m != 0.0 {
        x = ((x << 28) & MODULUS) | (x >> (61 - 28));
        m *= 268_435_456.0; // 2^28
        e -= 28;
        let y = m as u64;
        m -= y as f64;
        x += y;
        if x >= MODULUS {
            x -= MODULUS;
        }
    }

    // Fold the exponent back in: multiply by 2^e mod 2^61-1 via rotation.
    let e = e.rem_euclid(61) as u32;
    x = ((x << e) & MODULUS) | (x >> (61 - e));

    let signed = if negative { -(x as i64) } else { x as i64 };
    let adjusted = if signed == -1 { -2 } else { signed };
    u64::from_ne_bytes(adjusted.to_ne_bytes())
}

/// Decomposes `v` into `(mantissa, exponent)` with `0.5 <= mantissa < 1`.
fn frexp(v: f64) -> (f64, i32) {
    if v == 0.0 || !v.is_finite() {
        return (v, 0);
    }
    let bits = v.to_bits();
    let raw_exp = ((bits >> 52) & 0x7ff) as i32;
    if raw_exp == 0 {
        // Subnormal: scale up into the normal range first.
        let scaled = v * f64::from_bits(0x4330_0000_0000_0000); // 2^52
        let (m, e) = frexp(scaled);
        return (m, e - 52);
    }
    let exp = raw_exp - 1022;
    let mantissa = f64::from_bits((bits & !(0x7ffu64 << 52)) | (1022u64 << 52));
    (mantissa, exp)
}

/// Hashes string content. Stable within one process, which is all dict
/// bucketing needs.
#[must_use]
pub fn hash_str(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_float_bool_collide() {
        assert_eq!(hash_int(1), hash_float(1.0));
        assert_eq!(hash_int(0), hash_float(0.0));
        assert_eq!(hash_int(-7), hash_float(-7.0));
        assert_eq!(hash_int(1 << 40), hash_float((1u64 << 40) as f64));
    }

    #[test]
    fn test_bigint_consistent_with_int() {
        assert_eq!(hash_bigint(&BigInt::from(42)), hash_int(42));
        assert_eq!(hash_bigint(&BigInt::from(-3)), hash_int(-3));
    }

    #[test]
    fn test_fractional_floats_distinct_buckets() {
        // Not a correctness requirement, but catches a degenerate hash.
        assert_ne!(hash_float(0.5), hash_float(0.25));
    }

    #[test]
    fn test_minus_one_remapped() {
        assert_eq!(hash_int(-1), u64::from_ne_bytes((-2i64).to_ne_bytes()));
        assert_eq!(hash_float(-1.0), hash_int(-1));
    }

    #[test]
    fn test_frexp_normal() {
        let (m, e) = frexp(8.0);
        assert_eq!((m, e), (0.5, 4));
    }
}

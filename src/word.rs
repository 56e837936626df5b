//! EVM semantics for 256-bit words: wrapping modular arithmetic, the
//! signed (two's-complement) views, shifts and byte extraction, plus the
//! conversions between words, addresses and machine-sized offsets.

use ethereum_types::{Address, H256, U256, U512};

use crate::vm::EvmError;

pub fn add(a: U256, b: U256) -> U256 {
    a.overflowing_add(b).0
}

pub fn sub(a: U256, b: U256) -> U256 {
    a.overflowing_sub(b).0
}

pub fn mul(a: U256, b: U256) -> U256 {
    a.overflowing_mul(b).0
}

/// Integer division; division by zero yields zero.
pub fn div(a: U256, b: U256) -> U256 {
    a.checked_div(b).unwrap_or_default()
}

/// Modulo; a zero modulus yields zero.
pub fn rem(a: U256, b: U256) -> U256 {
    a.checked_rem(b).unwrap_or_default()
}

/// `(a + b) % m` over the full 512-bit sum; `m == 0` yields zero.
pub fn addmod(a: U256, b: U256, m: U256) -> U256 {
    if m.is_zero() {
        return U256::zero();
    }
    let r = (U512::from(a) + U512::from(b)) % U512::from(m);
    U256::try_from(r).expect("remainder fits 256 bits")
}

/// `(a * b) % m` over the full 512-bit product; `m == 0` yields zero.
pub fn mulmod(a: U256, b: U256, m: U256) -> U256 {
    if m.is_zero() {
        return U256::zero();
    }
    let r = a.full_mul(b) % U512::from(m);
    U256::try_from(r).expect("remainder fits 256 bits")
}

/// `base ^ power mod 2^256` by right-to-left square-and-multiply.
pub fn exp(base: U256, power: U256) -> U256 {
    let mut result = U256::one();
    let mut acc = base;
    for i in 0..power.bits() {
        if power.bit(i) {
            result = mul(result, acc);
        }
        acc = mul(acc, acc);
    }
    result
}

/// Whether bit 255 (the two's-complement sign bit) is set.
pub fn is_negative(x: U256) -> bool {
    x.bit(255)
}

/// Two's-complement negation.
pub fn neg(x: U256) -> U256 {
    (!x).overflowing_add(U256::one()).0
}

fn abs(x: U256) -> U256 {
    if is_negative(x) {
        neg(x)
    } else {
        x
    }
}

/// Signed division truncating toward zero. `INT_MIN / -1` wraps to `INT_MIN`.
pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let q = div(abs(a), abs(b));
    if is_negative(a) != is_negative(b) {
        neg(q)
    } else {
        q
    }
}

/// Signed modulo; the result carries the sign of the dividend.
pub fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let r = rem(abs(a), abs(b));
    if is_negative(a) {
        neg(r)
    } else {
        r
    }
}

pub fn slt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

pub fn sgt(a: U256, b: U256) -> bool {
    slt(b, a)
}

/// `value << shift`; zero for shifts of 256 or more.
pub fn shl(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        U256::zero()
    } else {
        value << shift.low_u64() as usize
    }
}

/// `value >> shift` (logical); zero for shifts of 256 or more.
pub fn shr(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        U256::zero()
    } else {
        value >> shift.low_u64() as usize
    }
}

/// Arithmetic right shift: the vacated high bits copy the sign bit.
pub fn sar(shift: U256, value: U256) -> U256 {
    if !is_negative(value) {
        return shr(shift, value);
    }
    if shift >= U256::from(256) {
        return U256::MAX;
    }
    let n = shift.low_u64() as usize;
    if n == 0 {
        return value;
    }
    (value >> n) | (U256::MAX << (256 - n))
}

/// Extend the sign of the byte at index `b` (0 = least significant) through
/// the high bytes. Identity for `b >= 31`.
pub fn signextend(b: U256, x: U256) -> U256 {
    if b >= U256::from(31) {
        return x;
    }
    let sign_bit = b.low_u64() as usize * 8 + 7;
    let mask = U256::MAX << (sign_bit + 1);
    if x.bit(sign_bit) {
        x | mask
    } else {
        x & !mask
    }
}

/// The `i`-th byte of `x` counting from the most significant end; zero for
/// `i >= 32`.
pub fn byte(i: U256, x: U256) -> U256 {
    if i >= U256::from(32) {
        U256::zero()
    } else {
        U256::from(x.byte(31 - i.low_u64() as usize))
    }
}

pub fn from_bool(b: bool) -> U256 {
    if b {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Narrow a word to a machine-sized offset, faulting when it cannot be
/// materialized as memory.
pub fn to_usize(v: U256) -> Result<usize, EvmError> {
    if v > U256::from(usize::MAX as u64) {
        return Err(EvmError::MemoryOffsetTooLarge);
    }
    Ok(v.low_u64() as usize)
}

/// The low 160 bits of a word, as an address.
pub fn to_address(v: U256) -> Address {
    let bytes = v.to_big_endian();
    Address::from_slice(&bytes[12..])
}

pub fn from_address(a: &Address) -> U256 {
    U256::from_big_endian(a.as_bytes())
}

pub fn from_h256(h: &H256) -> U256 {
    U256::from_big_endian(h.as_bytes())
}

pub fn to_h256(v: U256) -> H256 {
    H256(v.to_big_endian())
}

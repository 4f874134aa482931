//! Fixed-length bit vectors used for circuit inputs and outputs.
//!
//! Bits are stored most significant first: index 0 of a [`BitVector`] is its most significant
//! bit, so `"10"` has the integer value 2. Every operation returns a new vector.

use std::{fmt, ops::Not, str::FromStr};

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by [`BitVector`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A binary operation was applied to vectors of different lengths.
    #[error("bit vector length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Length of the left operand.
        left: usize,
        /// Length of the right operand.
        right: usize,
    },
    /// An integer does not fit into the requested number of bits.
    #[error("integer needs {bits} bits but only {length} are available")]
    Overflow {
        /// Number of bits needed to represent the integer.
        bits: u64,
        /// Requested vector length.
        length: usize,
    },
    /// A character other than `0` or `1` appeared in a bit string.
    #[error("invalid bit {0:?}, expected '0' or '1'")]
    InvalidBit(char),
}

/// An ordered, fixed-length sequence of bits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVector(Vec<bool>);

impl BitVector {
    /// Creates a bit vector from bits in most-significant-first order.
    pub fn from_bools(bits: impl Into<Vec<bool>>) -> Self {
        Self(bits.into())
    }

    /// A vector of `len` zero bits.
    pub fn zeros(len: usize) -> Self {
        Self(vec![false; len])
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector has no bits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The bit at `i`, if in range.
    pub fn get(&self, i: usize) -> Option<bool> {
        self.0.get(i).copied()
    }

    /// Iterates over the bits, most significant first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    /// The bits as a slice.
    pub fn as_bools(&self) -> &[bool] {
        &self.0
    }

    /// Left-pads with zeros up to exactly `n` bits. Vectors already at least `n` bits long are
    /// returned unchanged.
    pub fn pad(&self, n: usize) -> Self {
        if n <= self.len() {
            return self.clone();
        }
        let mut bits = vec![false; n - self.len()];
        bits.extend_from_slice(&self.0);
        Self(bits)
    }

    /// Keeps the rightmost (least significant) `n` bits. Vectors at most `n` bits long are
    /// returned unchanged.
    pub fn truncate(&self, n: usize) -> Self {
        if n >= self.len() {
            return self.clone();
        }
        Self(self.0[self.len() - n..].to_vec())
    }

    /// The bits in reverse order.
    pub fn reverse(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// `self` followed by `other`.
    pub fn concat(&self, other: &BitVector) -> Self {
        let mut bits = Vec::with_capacity(self.len() + other.len());
        bits.extend_from_slice(&self.0);
        bits.extend_from_slice(&other.0);
        Self(bits)
    }

    fn zip_with(&self, other: &BitVector, op: impl Fn(bool, bool) -> bool) -> Result<Self, Error> {
        if self.len() != other.len() {
            return Err(Error::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        Ok(Self(
            self.0.iter().zip(&other.0).map(|(a, b)| op(*a, *b)).collect(),
        ))
    }

    /// Bitwise AND.
    pub fn and(&self, other: &BitVector) -> Result<Self, Error> {
        self.zip_with(other, |a, b| a & b)
    }

    /// Bitwise OR.
    pub fn or(&self, other: &BitVector) -> Result<Self, Error> {
        self.zip_with(other, |a, b| a | b)
    }

    /// Bitwise XOR.
    pub fn xor(&self, other: &BitVector) -> Result<Self, Error> {
        self.zip_with(other, |a, b| a ^ b)
    }

    /// Whether every bit is set. True for the empty vector.
    pub fn all(&self) -> bool {
        self.0.iter().all(|b| *b)
    }

    /// Whether at least one bit is set.
    pub fn any(&self) -> bool {
        self.0.iter().any(|b| *b)
    }

    /// The unsigned integer value of the vector.
    pub fn to_integer(&self) -> BigUint {
        let padding = (8 - self.len() % 8) % 8;
        let mut bytes = vec![0u8; (self.len() + padding) / 8];
        for (i, bit) in self.pad(self.len() + padding).iter().enumerate() {
            if bit {
                bytes[i / 8] |= 0x80 >> (i % 8);
            }
        }
        BigUint::from_bytes_be(&bytes)
    }

    /// The `length`-bit representation of `n`, zero-padded on the left.
    pub fn from_integer(n: &BigUint, length: usize) -> Result<Self, Error> {
        let bits = n.bits();
        if bits > length as u64 {
            return Err(Error::Overflow { bits, length });
        }
        if n.is_zero() {
            return Ok(Self::zeros(length));
        }
        let mut v = Vec::with_capacity(bits as usize);
        for byte in n.to_bytes_be() {
            for i in 0..8 {
                v.push(byte & (0x80 >> i) != 0);
            }
        }
        // drops the leading zeros of the first byte
        let v = Self(v).truncate(bits as usize);
        Ok(v.pad(length))
    }

    /// Sum of both vectors modulo `2^len`.
    pub fn add(&self, other: &BitVector) -> Result<Self, Error> {
        if self.len() != other.len() {
            return Err(Error::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        let sum = self.to_integer() + other.to_integer();
        let sum = Self::from_integer(&sum, self.len() + 1)?;
        Ok(sum.truncate(self.len()))
    }
}

impl Not for &BitVector {
    type Output = BitVector;

    fn not(self) -> BitVector {
        BitVector(self.0.iter().map(|b| !b).collect())
    }
}

impl Not for BitVector {
    type Output = BitVector;

    fn not(self) -> BitVector {
        !&self
    }
}

impl FromStr for BitVector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                c => Err(Error::InvalidBit(c)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.0 {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl From<Vec<bool>> for BitVector {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl From<BitVector> for Vec<bool> {
    fn from(bits: BitVector) -> Self {
        bits.0
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use proptest::prelude::*;

    use super::{BitVector, Error};

    fn bv(s: &str) -> BitVector {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(bv("1011").as_bools(), &[true, false, true, true]);
        assert_eq!(bv("0110").to_string(), "0110");
        assert_eq!("10a".parse::<BitVector>(), Err(Error::InvalidBit('a')));
    }

    #[test]
    fn pad_and_truncate() {
        assert_eq!(bv("101").pad(6), bv("000101"));
        assert_eq!(bv("101").pad(2), bv("101"));
        assert_eq!(bv("110101").truncate(3), bv("101"));
        assert_eq!(bv("01").truncate(5), bv("01"));
    }

    #[test]
    fn reverse_and_concat() {
        assert_eq!(bv("1100").reverse(), bv("0011"));
        assert_eq!(bv("10").concat(&bv("011")), bv("10011"));
    }

    #[test]
    fn boolean_ops() {
        let a = bv("1100");
        let b = bv("1010");
        assert_eq!(a.and(&b).unwrap(), bv("1000"));
        assert_eq!(a.or(&b).unwrap(), bv("1110"));
        assert_eq!(a.xor(&b).unwrap(), bv("0110"));
        assert_eq!(!&a, bv("0011"));
        assert_eq!(
            a.and(&bv("1")),
            Err(Error::LengthMismatch { left: 4, right: 1 })
        );
        assert!(bv("111").all());
        assert!(!bv("101").all());
        assert!(bv("001").any());
        assert!(!bv("000").any());
    }

    #[test]
    fn integers() {
        assert_eq!(bv("10").to_integer(), BigUint::from(2u32));
        assert_eq!(bv("").to_integer(), BigUint::from(0u32));
        assert_eq!(
            BitVector::from_integer(&BigUint::from(5u32), 6).unwrap(),
            bv("000101")
        );
        assert_eq!(
            BitVector::from_integer(&BigUint::from(0u32), 3).unwrap(),
            bv("000")
        );
        assert_eq!(
            BitVector::from_integer(&BigUint::from(8u32), 3),
            Err(Error::Overflow { bits: 4, length: 3 })
        );
    }

    #[test]
    fn wide_integers() {
        let big = BigUint::from(1u32) << 200usize;
        let v = BitVector::from_integer(&big, 201).unwrap();
        assert!(v.get(0).unwrap());
        assert_eq!(v.iter().filter(|b| *b).count(), 1);
        assert_eq!(v.to_integer(), big);
    }

    #[test]
    fn add_wraps() {
        assert_eq!(bv("0011").add(&bv("0001")).unwrap(), bv("0100"));
        assert_eq!(bv("1111").add(&bv("0001")).unwrap(), bv("0000"));
    }

    proptest! {
        #[test]
        fn integer_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..24), extra in 0usize..17) {
            let v = BigUint::from_bytes_be(&bytes);
            let length = v.bits() as usize + extra;
            let bits = BitVector::from_integer(&v, length).unwrap();
            prop_assert_eq!(bits.len(), length);
            prop_assert_eq!(bits.to_integer(), v);
        }
    }
}

//! A 128-bit [`Block`] type, the payload of every wire label.
//!
//! Operations on [`Block`]s will use SIMD instructions where possible. The byte
//! order of a block is fixed: byte 0 holds bits 0..8, so the serialized form does
//! not depend on the platform.
use std::{
    fmt,
    ops::{BitAnd, BitXor},
};

use aes::cipher::{self, array::sizes};
use bytemuck::{Pod, Zeroable};
use rand::{Rng, distr::StandardUniform, prelude::Distribution};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use thiserror::Error;
use wide::u8x16;

/// A 128-bit block. Uses SIMD operations where available.
#[derive(Clone, Copy, Serialize, Deserialize, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct Block(u8x16);

impl Block {
    /// All bits set to 0.
    pub const ZERO: Self = Self(u8x16::ZERO);
    /// Lsb set to 1, all others zero.
    pub const ONE: Self = Self::new([1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    /// Mask to mask off the LSB of a Block.
    pub const MASK_LSB: Self = Self::new([
        0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff,
    ]);

    /// 16 bytes in a Block.
    pub const BYTES: usize = 16;

    /// Create a new block from bytes.
    #[inline]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(u8x16::new(bytes))
    }

    /// Bytes of the block.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_array_ref()
    }

    /// Least significant bit of the block
    #[inline]
    pub fn lsb(&self) -> bool {
        self.as_bytes()[0] & 1 == 1
    }

    /// Returns the block with its least significant bit set to `bit`.
    #[inline]
    pub fn with_lsb(self, bit: bool) -> Block {
        (self & Block::MASK_LSB) ^ Block::ONE.const_mul(bit)
    }

    /// Multiplication by `x` in GF(2^128) with the polynomial `x^128 + x^7 + x^2 + x + 1`.
    ///
    /// The block is read as a little-endian 128-bit integer.
    #[inline]
    pub fn double(&self) -> Block {
        let x = u128::from(*self);
        let carry = (x >> 127) as u8;
        let reduced = (x << 1) ^ u128::from(carry.wrapping_neg() & 0x87);
        Block::from(reduced)
    }

    /// Computes self * b, where b is `bool` in constant time.
    #[inline]
    pub fn const_mul(&self, b: bool) -> Block {
        Block::conditional_select(&Block::ZERO, self, Choice::from(u8::from(b)))
    }
}

impl BitAnd for Block {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitXor for Block {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes()[..].ct_eq(&other.as_bytes()[..]).into()
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Distribution<Block> for StandardUniform {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        let mut bytes = [0; 16];
        rng.fill_bytes(&mut bytes);
        Block::new(bytes)
    }
}

impl From<Block> for cipher::Array<u8, sizes::U16> {
    #[inline]
    fn from(value: Block) -> Self {
        Self(*value.as_bytes())
    }
}

impl From<cipher::Array<u8, sizes::U16>> for Block {
    #[inline]
    fn from(value: cipher::Array<u8, sizes::U16>) -> Self {
        Self::new(value.0)
    }
}

impl From<[u8; 16]> for Block {
    #[inline]
    fn from(value: [u8; 16]) -> Self {
        Self::new(value)
    }
}

impl From<Block> for u128 {
    #[inline]
    fn from(value: Block) -> Self {
        u128::from_le_bytes(*value.as_bytes())
    }
}

impl From<u128> for Block {
    #[inline]
    fn from(value: u128) -> Self {
        Self::new(value.to_le_bytes())
    }
}

impl From<usize> for Block {
    fn from(value: usize) -> Self {
        (value as u128).into()
    }
}

/// A slice of the wrong length was converted into a [`Block`] or a [`crate::Label`].
#[derive(Debug, Error)]
#[error("slice must have length of 16, found {0}")]
pub struct WrongLength(pub usize);

impl TryFrom<&[u8]> for Block {
    type Error = WrongLength;

    #[inline]
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let arr = value.try_into().map_err(|_| WrongLength(value.len()))?;
        Ok(Self::new(arr))
    }
}

impl ConditionallySelectable for Block {
    #[inline]
    // adapted from https://github.com/dalek-cryptography/subtle/blob/369e7463e85921377a5f2df80aabcbbc6d57a930/src/lib.rs#L510-L517
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        // if choice = 0, mask = (-0) = 0000...0000
        // if choice = 1, mask = (-1) = 1111...1111
        let mask = Block::new((-(choice.unwrap_u8() as i128)).to_le_bytes());
        *a ^ (mask & (*a ^ *b))
    }
}

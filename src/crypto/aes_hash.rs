//! Correlation robust AES hash.
//!
//! This implementation of a tweakable circular correlation robust AES hash
//! function is based on the findings of <https://eprint.iacr.org/2019/074>.
use std::sync::LazyLock;

use aes::{
    Aes128,
    cipher::{BlockCipherEncrypt, Key, KeyInit},
};

use crate::block::Block;

/// AES accelerated hashing of [`Block`]s.
#[derive(Clone)]
pub(crate) struct AesHash {
    aes: Aes128,
}

impl AesHash {
    /// Create a new `AesHash` with the given key.
    pub(crate) fn new(key: &Key<Aes128>) -> Self {
        Self {
            aes: Aes128::new(key),
        }
    }

    /// Tweakable circular correlation robust hash function.
    ///
    /// Calculates `π(π(x) ^ tweak) ^ π(x)` for a single block.
    ///
    /// See <https://eprint.iacr.org/2019/074> for details. This is the TMMO function.
    pub(crate) fn tccr_hash_block(&self, tweak: Block, x: Block) -> Block {
        let mut x_enc = x.into();
        self.aes.encrypt_block(&mut x_enc);
        let mut x_enc_xor_tweak_enc = (Block::from(x_enc) ^ tweak).into();
        self.aes.encrypt_block(&mut x_enc_xor_tweak_enc);

        Block::from(x_enc_xor_tweak_enc) ^ Block::from(x_enc)
    }
}

/// An `AesHash` with a fixed key.
pub(crate) static FIXED_KEY_HASH: LazyLock<AesHash> = LazyLock::new(|| {
    // The key was randomly chosen. Any key would be okay, but both parties must agree on it.
    let key = 193502124791825095790518994062991136444_u128
        .to_le_bytes()
        .into();
    AesHash::new(&key)
});

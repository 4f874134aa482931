//! Symmetric primitives used to garble gate tables.
mod aes_hash;

pub(crate) use aes_hash::FIXED_KEY_HASH;

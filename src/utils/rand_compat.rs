//! Bridges the `rand` 0.9 generators of this crate to `curve25519-dalek`, which still samples
//! scalars through `rand_core` 0.6.
use rand::{CryptoRng, RngCore};

/// Wraps a `rand_core` 0.9 generator so that it implements [`rand_core_0_6::RngCore`] and
/// [`rand_core_0_6::CryptoRng`].
///
/// ```rust,ignore
/// let x = Scalar::random(&mut RngCompat(&mut rng));
/// ```
pub(crate) struct RngCompat<R>(pub(crate) R);

impl<R: RngCore> rand_core_0_6::RngCore for RngCompat<R> {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest);
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core_0_6::Error> {
        self.0.fill_bytes(dest);
        Ok(())
    }
}

impl<R: CryptoRng> rand_core_0_6::CryptoRng for RngCompat<R> {}

//! Diffie-Hellman based 1-out-of-2 oblivious transfer of wire labels.
//!
//! Every transfer uses its own sender scalar `a` and receiver scalar `b` over the Ristretto
//! group of `curve25519-dalek`:
//!
//! 1. The sender sends `A = a·G`.
//! 2. The receiver sends `B = b·G` for choice 0 or `B = A + b·G` for choice 1.
//! 3. The sender derives `k0 = H(i, a·B)` and `k1 = H(i, a·(B - A))` and sends both messages
//!    encrypted under these keys.
//! 4. The receiver derives `k = H(i, b·A)`, which equals the key of its choice.
//!
//! A batch of transfers shares one round trip per step and the position `i` of a transfer in its
//! batch is hashed into its keys. Every point received from the peer is checked before use: it
//! must be a canonical encoding of a group element other than the identity.

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_TABLE,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::IsIdentity,
};
use rand::{CryptoRng, Rng};
use subtle::{Choice, ConditionallySelectable};
use thiserror::Error;
use tracing::debug;

use crate::{
    block::Block,
    channel::{self, Channel, MsgChannel},
    label::Label,
    utils::RngCompat,
};

/// A compressed Ristretto point as sent over the channel.
type EncodedPoint = [u8; 32];

/// Errors raised during oblivious transfer.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer sent a point that is not a valid, non-identity group element.
    #[error("invalid group element for transfer {0}")]
    InvalidPoint(usize),
    /// The peer sent a different number of points or ciphertexts than transfers.
    #[error("expected {expected} OT values, found {actual}")]
    LengthMismatch {
        /// The number of transfers.
        expected: usize,
        /// The number of values received.
        actual: usize,
    },
    /// A message could not be sent or received.
    #[error(transparent)]
    Channel(#[from] channel::Error),
}

/// Hashes a point into a 16-byte key, tweaked by the transfer index.
pub(crate) fn hash_pt(tweak: u128, pt: &RistrettoPoint) -> Block {
    let h = blake3::keyed_hash(pt.compress().as_bytes(), &tweak.to_le_bytes());
    let mut key = [0; Block::BYTES];
    key.copy_from_slice(&h.as_bytes()[..Block::BYTES]);
    Block::from(key)
}

fn decode_point(i: usize, bytes: &EncodedPoint) -> Result<RistrettoPoint, Error> {
    match CompressedRistretto(*bytes).decompress() {
        Some(pt) if !pt.is_identity() => Ok(pt),
        _ => Err(Error::InvalidPoint(i)),
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::LengthMismatch { expected, actual })
    }
}

fn random_scalar(rng: &mut (impl CryptoRng + Rng)) -> Scalar {
    Scalar::random(&mut RngCompat(rng))
}

/// The sender side of a batch of transfers, between its first and second message.
pub(crate) struct OtSender {
    secrets: Vec<(Scalar, RistrettoPoint)>,
    messages: Vec<(Label, Label)>,
}

impl OtSender {
    /// Draws one scalar per message pair and returns the points `A` to send.
    pub(crate) fn new(
        messages: &[(Label, Label)],
        rng: &mut (impl CryptoRng + Rng),
    ) -> (Self, Vec<EncodedPoint>) {
        let secrets: Vec<_> = messages
            .iter()
            .map(|_| {
                let a = random_scalar(&mut *rng);
                (a, &a * RISTRETTO_BASEPOINT_TABLE)
            })
            .collect();
        let points = secrets.iter().map(|(_, pt)| pt.compress().to_bytes()).collect();
        let sender = Self {
            secrets,
            messages: messages.to_vec(),
        };
        (sender, points)
    }

    /// Encrypts both messages of every pair under the keys derived from the receiver's points.
    pub(crate) fn respond(self, points: &[EncodedPoint]) -> Result<Vec<(Block, Block)>, Error> {
        check_len(self.secrets.len(), points.len())?;
        self.secrets
            .iter()
            .zip(&self.messages)
            .zip(points)
            .enumerate()
            .map(|(i, (((a, big_a), (m0, m1)), b))| {
                let big_b = decode_point(i, b)?;
                let k0 = hash_pt(i as u128, &(a * big_b));
                let k1 = hash_pt(i as u128, &(a * (big_b - big_a)));
                Ok((m0.0 ^ k0, m1.0 ^ k1))
            })
            .collect()
    }
}

/// The receiver side of a batch of transfers, waiting for the ciphertexts.
pub(crate) struct OtReceiver {
    keys: Vec<Block>,
    choices: Vec<bool>,
}

impl OtReceiver {
    /// Answers the sender's points `A` with one point `B` per choice bit.
    pub(crate) fn new(
        choices: &[bool],
        points: &[EncodedPoint],
        rng: &mut (impl CryptoRng + Rng),
    ) -> Result<(Self, Vec<EncodedPoint>), Error> {
        check_len(choices.len(), points.len())?;
        let mut keys = Vec::with_capacity(choices.len());
        let mut answers = Vec::with_capacity(choices.len());
        for (i, (choice, a)) in choices.iter().zip(points).enumerate() {
            let big_a = decode_point(i, a)?;
            let b = random_scalar(&mut *rng);
            let gb = &b * RISTRETTO_BASEPOINT_TABLE;
            let big_b =
                RistrettoPoint::conditional_select(&gb, &(gb + big_a), Choice::from(*choice as u8));
            keys.push(hash_pt(i as u128, &(b * big_a)));
            answers.push(big_b.compress().to_bytes());
        }
        let receiver = Self {
            keys,
            choices: choices.to_vec(),
        };
        Ok((receiver, answers))
    }

    /// Decrypts the chosen message of every pair.
    pub(crate) fn finish(self, ciphertexts: &[(Block, Block)]) -> Result<Vec<Label>, Error> {
        check_len(self.keys.len(), ciphertexts.len())?;
        Ok(self
            .keys
            .iter()
            .zip(&self.choices)
            .zip(ciphertexts)
            .map(|((k, choice), (c0, c1))| {
                Label(*k ^ Block::conditional_select(c0, c1, Choice::from(*choice as u8)))
            })
            .collect())
    }
}

/// Obliviously sends one label of every pair to the peer, which calls [`receive_oblivious`].
///
/// `phase` prefixes the message keys so that several transfers can share a channel.
pub async fn send_oblivious(
    channel: &mut MsgChannel<impl Channel>,
    phase: &str,
    messages: &[(Label, Label)],
    rng: &mut (impl CryptoRng + Rng),
) -> Result<(), Error> {
    debug!(phase, transfers = messages.len(), "OT send");
    let (sender, a) = OtSender::new(messages, rng);
    channel.send_to(&format!("{phase}: A"), &a).await?;
    let b: Vec<EncodedPoint> = channel
        .recv_vec_from(&format!("{phase}: B"), messages.len())
        .await?;
    let ciphertexts = sender.respond(&b)?;
    channel
        .send_to(&format!("{phase}: ciphertexts"), &ciphertexts)
        .await?;
    Ok(())
}

/// Obliviously receives the label selected by every choice bit from [`send_oblivious`].
pub async fn receive_oblivious(
    channel: &mut MsgChannel<impl Channel>,
    phase: &str,
    choices: &[bool],
    rng: &mut (impl CryptoRng + Rng),
) -> Result<Vec<Label>, Error> {
    debug!(phase, transfers = choices.len(), "OT receive");
    let a: Vec<EncodedPoint> = channel
        .recv_vec_from(&format!("{phase}: A"), choices.len())
        .await?;
    let (receiver, b) = OtReceiver::new(choices, &a, rng)?;
    channel.send_to(&format!("{phase}: B"), &b).await?;
    let ciphertexts: Vec<(Block, Block)> = channel
        .recv_vec_from(&format!("{phase}: ciphertexts"), choices.len())
        .await?;
    receiver.finish(&ciphertexts)
}

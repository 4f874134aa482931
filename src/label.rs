//! Wire labels and the per-party maps from wires to labels.
//!
//! A [`Label`] is a 16-byte [`Block`] whose least significant bit is the point-and-permute
//! pointer. The global offset [`Delta`] always has that bit set, so the two labels of a wire,
//! `l0` and `l0 ^ delta`, carry complementary pointers and XOR-ing two labels also XORs their
//! pointers.

use std::ops::BitXor;

use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    block::{Block, WrongLength},
    circuit::{Circuit, Wire},
};

/// The garbler's secret global offset `R` shared by all label pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Delta(pub(crate) Block);

impl Delta {
    /// Draws a random offset with the pointer bit set.
    pub(crate) fn random(rng: &mut (impl CryptoRng + Rng)) -> Self {
        Delta(rng.random::<Block>().with_lsb(true))
    }
}

/// A label for a particular wire in the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label(pub(crate) Block);

impl Label {
    /// Serialized length in bytes.
    pub const BYTES: usize = Block::BYTES;

    /// Draws a uniformly random label, including a random pointer bit.
    pub(crate) fn random(rng: &mut (impl CryptoRng + Rng)) -> Self {
        Label(rng.random())
    }

    /// The point-and-permute pointer bit.
    pub fn pointer(&self) -> bool {
        self.0.lsb()
    }

    /// The same label with the pointer bit replaced.
    pub fn with_pointer(self, bit: bool) -> Self {
        Label(self.0.with_lsb(bit))
    }

    /// The label payload with its pointer bit cleared.
    pub(crate) fn masked(&self) -> Block {
        self.0 & Block::MASK_LSB
    }

    /// Whether both labels encode the same value, ignoring the pointer bit.
    pub fn same_value(&self, other: &Label) -> bool {
        self.masked() == other.masked()
    }

    /// Canonical fixed-width encoding.
    pub fn to_bytes(&self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    /// Decodes a label from exactly [`Label::BYTES`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WrongLength> {
        Block::try_from(bytes).map(Label)
    }
}

impl BitXor for Label {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Label(self.0 ^ rhs.0)
    }
}

impl BitXor<Delta> for Label {
    type Output = Self;

    fn bitxor(self, rhs: Delta) -> Self::Output {
        Label(self.0 ^ rhs.0)
    }
}

impl BitXor<Block> for Label {
    type Output = Self;

    fn bitxor(self, rhs: Block) -> Self::Output {
        Label(self.0 ^ rhs)
    }
}

/// The garbler's labels: both labels of every wire, stored as the zero label plus [`Delta`].
#[derive(Debug, Clone)]
pub(crate) struct GarblerWires {
    delta: Delta,
    zeros: Vec<Option<Label>>,
}

impl GarblerWires {
    /// Draws the global offset and a fresh label pair for every circuit input wire.
    pub(crate) fn new(circuit: &Circuit, rng: &mut (impl CryptoRng + Rng)) -> Self {
        let mut wires = Self {
            delta: Delta::random(rng),
            zeros: vec![None; circuit.wire_count + 1],
        };
        for w in circuit.garbler_inputs().chain(circuit.evaluator_inputs()) {
            wires.set_zero(w, Label::random(rng));
        }
        wires
    }

    pub(crate) fn delta(&self) -> Delta {
        self.delta
    }

    /// The label encoding `false` on wire `w`.
    pub(crate) fn zero(&self, w: Wire) -> Option<Label> {
        self.zeros.get(w).copied().flatten()
    }

    /// Both labels of wire `w`, indexed by the boolean value they encode.
    pub(crate) fn pair(&self, w: Wire) -> Option<[Label; 2]> {
        self.zero(w).map(|l0| [l0, l0 ^ self.delta])
    }

    /// The label encoding `bit` on wire `w`.
    pub(crate) fn label(&self, w: Wire, bit: bool) -> Option<Label> {
        self.pair(w).map(|pair| pair[bit as usize])
    }

    pub(crate) fn set_zero(&mut self, w: Wire, label: Label) {
        self.zeros[w] = Some(label);
    }
}

/// The evaluator's labels: at most one label per wire, filled in as gates are evaluated.
#[derive(Debug, Clone)]
pub(crate) struct EvaluatorWires {
    labels: Vec<Option<Label>>,
}

impl EvaluatorWires {
    pub(crate) fn new(circuit: &Circuit) -> Self {
        Self {
            labels: vec![None; circuit.wire_count + 1],
        }
    }

    pub(crate) fn get(&self, w: Wire) -> Option<Label> {
        self.labels.get(w).copied().flatten()
    }

    pub(crate) fn set(&mut self, w: Wire, label: Label) {
        self.labels[w] = Some(label);
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rng};
    use rand_chacha::ChaCha20Rng;

    use super::{Delta, Label};

    #[test]
    fn delta_flips_pointer() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..32 {
            let delta = Delta::random(&mut rng);
            let l0 = Label::random(&mut rng);
            let l1 = l0 ^ delta;
            assert_ne!(l0.pointer(), l1.pointer());
            assert_eq!(l0 ^ l1, Label(delta.0));
        }
    }

    #[test]
    fn same_value_ignores_pointer() {
        let l = Label::random(&mut rng());
        assert!(l.same_value(&l.with_pointer(!l.pointer())));
        assert_ne!(l, l.with_pointer(!l.pointer()));
    }

    #[test]
    fn bytes_round_trip() {
        let l = Label::random(&mut rng());
        assert_eq!(Label::from_bytes(&l.to_bytes()).unwrap(), l);
        assert!(Label::from_bytes(&[0; 17]).is_err());
    }
}

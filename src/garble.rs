//! Yao garbling with free-XOR and point-and-permute.
//!
//! XOR and NOT gates cost nothing: XOR outputs are the XOR of the input labels and NOT swaps the
//! two labels of a wire. Every AND gate gets a table of four ciphertexts, placed at index
//! `2 * pointer(left) + pointer(right)` of the labels used to encrypt them, so that the evaluator
//! decrypts exactly one row without learning which input combination it corresponds to.

use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    bits::BitVector,
    block::Block,
    circuit::{Circuit, Gate, GateOp, Wire},
    crypto::FIXED_KEY_HASH,
    label::{EvaluatorWires, GarblerWires, Label},
};

/// Errors raised while garbling, evaluating or decoding a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A gate was processed before a label for one of its input wires was known.
    #[error("no label for wire {0}")]
    MissingInput(Wire),
    /// An output label matches neither label of its wire.
    #[error("output label of wire {0} matches neither known label")]
    DecodeError(Wire),
    /// The garbled gate does not fit the circuit gate at this position.
    #[error("garbled gate {0} does not match the circuit")]
    GateMismatch(usize),
    /// The number of labels or gates does not match the circuit.
    #[error("expected {expected} items, found {actual}")]
    LengthMismatch {
        /// The number the circuit requires.
        expected: usize,
        /// The number provided.
        actual: usize,
    },
}

/// A garbled gate as sent to the evaluator. XOR and NOT gates are just a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GarbledGate {
    /// Free XOR gate.
    Xor,
    /// Free NOT gate.
    Not,
    /// An AND gate table, indexed by the input pointers.
    And([Block; 4]),
}

/// Derives the one-time pad of a table row from the two input labels used for it.
///
/// Pointer bits are cleared before hashing and the left label is doubled, so that the row keys
/// of a free-XOR gate are not related by `delta`. Encryption and decryption are the same XOR.
pub(crate) fn row_pad(gate: usize, left: Label, right: Label) -> Block {
    let key = left.masked().double() ^ right.masked();
    FIXED_KEY_HASH.tccr_hash_block(Block::from(gate), key)
}

fn row_index(left: Label, right: Label) -> usize {
    2 * left.pointer() as usize + right.pointer() as usize
}

fn garbler_input(wires: &GarblerWires, w: Wire) -> Result<[Label; 2], Error> {
    wires.pair(w).ok_or(Error::MissingInput(w))
}

/// Assigns labels to the output wire of gate number `i` and returns its garbled form.
pub(crate) fn garble_gate(
    wires: &mut GarblerWires,
    i: usize,
    gate: &Gate,
    rng: &mut (impl CryptoRng + Rng),
) -> Result<GarbledGate, Error> {
    let delta = wires.delta();
    match gate.op {
        GateOp::Xor => {
            let [x0, _] = garbler_input(wires, gate.inputs[0])?;
            let [y0, _] = garbler_input(wires, gate.inputs[1])?;
            wires.set_zero(gate.output, x0 ^ y0);
            Ok(GarbledGate::Xor)
        }
        GateOp::Not => {
            let [_, x1] = garbler_input(wires, gate.inputs[0])?;
            wires.set_zero(gate.output, x1);
            Ok(GarbledGate::Not)
        }
        GateOp::And => {
            let x = garbler_input(wires, gate.inputs[0])?;
            let y = garbler_input(wires, gate.inputs[1])?;
            let z0 = Label::random(rng);
            let z = [z0, z0 ^ delta];
            let mut table = [Block::ZERO; 4];
            for a in [false, true] {
                for b in [false, true] {
                    let (left, right) = (x[a as usize], y[b as usize]);
                    let out = z[(a & b) as usize];
                    table[row_index(left, right)] = (out ^ row_pad(i, left, right)).0;
                }
            }
            wires.set_zero(gate.output, z0);
            Ok(GarbledGate::And(table))
        }
    }
}

fn evaluator_input(wires: &EvaluatorWires, w: Wire) -> Result<Label, Error> {
    wires.get(w).ok_or(Error::MissingInput(w))
}

/// Computes the label of the output wire of gate number `i` from the known input labels.
pub(crate) fn evaluate_gate(
    wires: &mut EvaluatorWires,
    i: usize,
    gate: &Gate,
    garbled: &GarbledGate,
) -> Result<(), Error> {
    let out = match (gate.op, garbled) {
        (GateOp::Xor, GarbledGate::Xor) => {
            evaluator_input(wires, gate.inputs[0])? ^ evaluator_input(wires, gate.inputs[1])?
        }
        (GateOp::Not, GarbledGate::Not) => evaluator_input(wires, gate.inputs[0])?,
        (GateOp::And, GarbledGate::And(table)) => {
            let left = evaluator_input(wires, gate.inputs[0])?;
            let right = evaluator_input(wires, gate.inputs[1])?;
            Label(table[row_index(left, right)]) ^ row_pad(i, left, right)
        }
        _ => return Err(Error::GateMismatch(i)),
    };
    wires.set(gate.output, out);
    Ok(())
}

/// The labels the evaluator holds for the output wires.
pub(crate) fn output_labels(circuit: &Circuit, wires: &EvaluatorWires) -> Result<Vec<Label>, Error> {
    circuit
        .outputs()
        .map(|w| evaluator_input(wires, w))
        .collect()
}

/// Maps the evaluator's output labels back to bits.
pub(crate) fn decode(
    circuit: &Circuit,
    wires: &GarblerWires,
    labels: &[Label],
) -> Result<BitVector, Error> {
    if labels.len() != circuit.output_size {
        return Err(Error::LengthMismatch {
            expected: circuit.output_size,
            actual: labels.len(),
        });
    }
    let mut bits = Vec::with_capacity(labels.len());
    for (w, label) in circuit.outputs().zip(labels) {
        let [l0, l1] = garbler_input(wires, w)?;
        let bit = if label.same_value(&l0) {
            false
        } else if label.same_value(&l1) {
            true
        } else {
            return Err(Error::DecodeError(w));
        };
        bits.push(bit);
    }
    Ok(BitVector::from_bools(bits))
}

#[cfg(test)]
mod tests {
    use rand::{CryptoRng, Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::{
        Error, GarbledGate, decode, evaluate_gate, garble_gate, output_labels, row_index, row_pad,
    };
    use crate::{
        bits::BitVector,
        circuit::Circuit,
        label::{EvaluatorWires, GarblerWires, Label},
    };

    fn garble(
        circuit: &Circuit,
        rng: &mut (impl CryptoRng + Rng),
    ) -> Result<(GarblerWires, Vec<GarbledGate>), Error> {
        let mut wires = GarblerWires::new(circuit, rng);
        let gates = circuit
            .gates
            .iter()
            .enumerate()
            .map(|(i, gate)| garble_gate(&mut wires, i, gate, &mut *rng))
            .collect::<Result<_, _>>()?;
        Ok((wires, gates))
    }

    fn evaluate(
        circuit: &Circuit,
        gates: &[GarbledGate],
        wires: &mut EvaluatorWires,
    ) -> Result<Vec<Label>, Error> {
        for (i, (gate, garbled)) in circuit.gates.iter().zip(gates).enumerate() {
            evaluate_gate(wires, i, gate, garbled)?;
        }
        output_labels(circuit, wires)
    }

    const MIXED: &str = "5 8
2 2 1
1 2
2 1 0 1 3 AND
2 1 3 2 4 XOR
1 1 4 5 INV
2 1 5 0 6 AND
2 1 6 1 7 XOR
";

    fn run(circuit: &Circuit, rng: &mut ChaCha20Rng, a: &BitVector, b: &BitVector) -> BitVector {
        let (wires, gates) = garble(circuit, rng).unwrap();
        let mut eval = EvaluatorWires::new(circuit);
        for (w, bit) in circuit
            .garbler_inputs()
            .chain(circuit.evaluator_inputs())
            .zip(a.iter().chain(b.iter()))
        {
            eval.set(w, wires.label(w, bit).unwrap());
        }
        let labels = evaluate(circuit, &gates, &mut eval).unwrap();
        decode(circuit, &wires, &labels).unwrap()
    }

    #[test]
    fn free_xor_invariant_holds_on_every_wire() {
        let circuit = Circuit::parse_bristol(MIXED).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let (wires, _) = garble(&circuit, &mut rng).unwrap();
        let delta = wires.delta();
        for w in 1..=circuit.wire_count {
            let [l0, l1] = wires.pair(w).unwrap();
            assert_eq!(l0 ^ l1, Label(delta.0));
            assert_ne!(l0.pointer(), l1.pointer());
        }
    }

    #[test]
    fn and_table_rows_decrypt_to_the_and_of_inputs() {
        let circuit = Circuit::parse_bristol("1 3\n2 1 1\n1 1\n2 1 0 1 2 AND\n").unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mut wires = GarblerWires::new(&circuit, &mut rng);
        let gate = &circuit.gates[0];
        let GarbledGate::And(table) =
            garble_gate(&mut wires, 0, gate, &mut rng).unwrap()
        else {
            panic!("expected an AND table");
        };
        let mut seen = [false; 4];
        for a in [false, true] {
            for b in [false, true] {
                let left = wires.label(1, a).unwrap();
                let right = wires.label(2, b).unwrap();
                let i = row_index(left, right);
                seen[i] = true;
                let out = Label(table[i]) ^ row_pad(0, left, right);
                assert_eq!(out, wires.label(3, a & b).unwrap());
            }
        }
        assert_eq!(seen, [true; 4]);
    }

    #[test]
    fn garbled_evaluation_matches_direct_evaluation() {
        let circuit = Circuit::parse_bristol(MIXED).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..16 {
            let a = BitVector::from_bools(vec![rng.random(), rng.random()]);
            let b = BitVector::from_bools(vec![rng.random()]);
            let expected = circuit.evaluate(&[a.clone(), b.clone()]).unwrap();
            assert_eq!(run(&circuit, &mut rng, &a, &b), expected);
        }
    }

    #[test]
    fn missing_input_label_is_reported() {
        let circuit = Circuit::parse_bristol(MIXED).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let (wires, gates) = garble(&circuit, &mut rng).unwrap();
        let mut eval = EvaluatorWires::new(&circuit);
        eval.set(1, wires.label(1, true).unwrap());
        eval.set(3, wires.label(3, false).unwrap());
        assert_eq!(
            evaluate(&circuit, &gates, &mut eval),
            Err(Error::MissingInput(2))
        );
    }

    #[test]
    fn foreign_output_label_fails_to_decode() {
        let circuit = Circuit::parse_bristol(MIXED).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let (wires, _) = garble(&circuit, &mut rng).unwrap();
        let good = wires.label(7, true).unwrap();
        let bogus = Label::random(&mut rng);
        assert_eq!(
            decode(&circuit, &wires, &[bogus, good]),
            Err(Error::DecodeError(7))
        );
        // the pointer bit does not take part in decoding
        let flipped = good.with_pointer(!good.pointer());
        let zero = wires.label(8, false).unwrap();
        assert_eq!(
            decode(&circuit, &wires, &[flipped, zero]).unwrap().to_string(),
            "10"
        );
    }

    #[test]
    fn mismatched_gate_kind_is_rejected() {
        let circuit = Circuit::parse_bristol(MIXED).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let (wires, mut gates) = garble(&circuit, &mut rng).unwrap();
        gates[1] = GarbledGate::Not;
        let mut eval = EvaluatorWires::new(&circuit);
        for w in 1..=3 {
            eval.set(w, wires.label(w, false).unwrap());
        }
        assert_eq!(
            evaluate(&circuit, &gates, &mut eval),
            Err(Error::GateMismatch(1))
        );
    }
}

//! Boolean circuits in the [Bristol Fashion](https://nigelsmart.github.io/MPC-Circuits/) format.
//!
//! Wire ids in the text are 0-based, a [`Circuit`] uses 1-based wire indices throughout. Wires
//! `1..=garbler_input_size` carry the garbler's input, the next `evaluator_input_size` wires carry
//! the evaluator's input and the last `output_size` wires are the circuit outputs.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bits::{self, BitVector};

/// A 1-based wire index.
pub type Wire = usize;

/// The boolean operation computed by a [`Gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateOp {
    /// Conjunction of two wires.
    And,
    /// Exclusive or of two wires.
    Xor,
    /// Negation of a single wire.
    Not,
}

impl GateOp {
    /// The number of input wires of the operation.
    pub fn arity(self) -> usize {
        match self {
            GateOp::And | GateOp::Xor => 2,
            GateOp::Not => 1,
        }
    }

    fn token(self) -> &'static str {
        match self {
            GateOp::And => "AND",
            GateOp::Xor => "XOR",
            GateOp::Not => "INV",
        }
    }
}

/// A single gate, reading one or two wires and writing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    /// The input wires; two for `AND`/`XOR`, one for `NOT`.
    pub inputs: Vec<Wire>,
    /// The output wire.
    pub output: Wire,
    /// The operation of the gate.
    pub op: GateOp,
}

/// A Boolean circuit between a garbler and an evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    /// Total number of wires.
    pub wire_count: usize,
    /// Number of input wires owned by the garbler.
    pub garbler_input_size: usize,
    /// Number of input wires owned by the evaluator.
    pub evaluator_input_size: usize,
    /// Number of output wires.
    pub output_size: usize,
    /// The gates in topological order.
    pub gates: Vec<Gate>,
}

/// The reason a Bristol Fashion text was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// The number of non-empty rows does not equal `gate_count + 3`.
    #[error("expected {expected} rows, found {actual}")]
    RowCount {
        /// `gate_count + 3`.
        expected: usize,
        /// Non-empty rows in the text.
        actual: usize,
    },
    /// A token that should have been a number was not one.
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    /// A row has the wrong number of tokens.
    #[error("expected {expected} tokens, found {actual}")]
    TokenCount {
        /// Number of tokens the row should have.
        expected: usize,
        /// Number of tokens in the row.
        actual: usize,
    },
    /// Only two input groups (garbler, evaluator) are supported.
    #[error("expected 2 input groups, found {0}")]
    InputGroups(usize),
    /// Only a single output group is supported.
    #[error("expected 1 output group, found {0}")]
    OutputGroups(usize),
    /// The operation token is not one of `AND`, `XOR`, `INV`, `NOT`.
    #[error("unknown operation {0:?}")]
    UnknownOp(String),
    /// The declared input count does not match the operation.
    #[error("{op:?} takes {expected} inputs, but {actual} are declared")]
    Arity {
        /// The operation of the gate.
        op: GateOp,
        /// Inputs the operation takes.
        expected: usize,
        /// Inputs declared in the row.
        actual: usize,
    },
    /// Each gate must have exactly one output wire.
    #[error("gates must have exactly 1 output, found {0}")]
    OutputArity(usize),
    /// A wire id is not below the declared wire count.
    #[error("wire {0} is out of range")]
    WireOutOfRange(usize),
    /// A gate reads a wire that is neither an input nor written by an earlier gate.
    #[error("wire {0} is read before it is written")]
    UndefinedWire(usize),
    /// A gate writes a wire that already carries a value.
    #[error("wire {0} is written twice")]
    WireRedefined(usize),
    /// The wire count is too small for the declared inputs and outputs.
    #[error("{wire_count} wires cannot hold {inputs} inputs and {outputs} outputs")]
    TooFewWires {
        /// Declared wire count.
        wire_count: usize,
        /// Total number of input wires.
        inputs: usize,
        /// Number of output wires.
        outputs: usize,
    },
    /// More wires are declared than the inputs and gates can write.
    #[error("{wire_count} wires declared, but inputs and gates write only {writable}")]
    TooManyWires {
        /// Declared wire count.
        wire_count: usize,
        /// Input wires plus one output wire per gate.
        writable: usize,
    },
}

/// Malformed circuit text, naming the offending 0-based row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid Bristol circuit at row {row}: {kind}")]
pub struct ParseError {
    /// The 0-based row (empty lines are not counted).
    pub row: usize,
    /// What is wrong with the row.
    pub kind: ParseErrorKind,
}

fn err(row: usize, kind: ParseErrorKind) -> ParseError {
    ParseError { row, kind }
}

fn parse_num(row: usize, token: &str) -> Result<usize, ParseError> {
    token
        .parse()
        .map_err(|_| err(row, ParseErrorKind::InvalidNumber(token.to_string())))
}

fn parse_nums(row: usize, tokens: &[&str]) -> Result<Vec<usize>, ParseError> {
    tokens.iter().map(|t| parse_num(row, t)).collect()
}

fn expect_tokens(row: usize, tokens: &[&str], expected: usize) -> Result<(), ParseError> {
    if tokens.len() != expected {
        return Err(err(
            row,
            ParseErrorKind::TokenCount {
                expected,
                actual: tokens.len(),
            },
        ));
    }
    Ok(())
}

impl Circuit {
    /// Parses a circuit in Bristol Fashion with exactly two input groups and one output group.
    pub fn parse_bristol(text: &str) -> Result<Circuit, ParseError> {
        let rows: Vec<Vec<&str>> = text
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>())
            .filter(|tokens| !tokens.is_empty())
            .collect();
        let Some(header) = rows.first() else {
            return Err(err(
                0,
                ParseErrorKind::RowCount {
                    expected: 3,
                    actual: 0,
                },
            ));
        };
        expect_tokens(0, header, 2)?;
        let header = parse_nums(0, header)?;
        let (gate_count, wire_count) = (header[0], header[1]);
        let expected_rows = gate_count.checked_add(3);
        if expected_rows != Some(rows.len()) {
            let expected = expected_rows.unwrap_or(usize::MAX);
            return Err(err(
                rows.len().min(expected),
                ParseErrorKind::RowCount {
                    expected,
                    actual: rows.len(),
                },
            ));
        }

        let inputs = parse_nums(1, &rows[1])?;
        match inputs.first() {
            Some(2) => expect_tokens(1, &rows[1], 3)?,
            Some(n) => return Err(err(1, ParseErrorKind::InputGroups(*n))),
            None => return Err(err(1, ParseErrorKind::InputGroups(0))),
        }
        let (garbler_input_size, evaluator_input_size) = (inputs[1], inputs[2]);

        let outputs = parse_nums(2, &rows[2])?;
        match outputs.first() {
            Some(1) => expect_tokens(2, &rows[2], 2)?,
            Some(n) => return Err(err(2, ParseErrorKind::OutputGroups(*n))),
            None => return Err(err(2, ParseErrorKind::OutputGroups(0))),
        }
        let output_size = outputs[1];

        let input_wires = garbler_input_size.checked_add(evaluator_input_size);
        let needed = input_wires.and_then(|n| n.checked_add(output_size));
        let Some(input_wires) = input_wires.filter(|_| needed.is_some_and(|n| n <= wire_count))
        else {
            return Err(err(
                0,
                ParseErrorKind::TooFewWires {
                    wire_count,
                    inputs: garbler_input_size.saturating_add(evaluator_input_size),
                    outputs: output_size,
                },
            ));
        };
        // every wire is an input or the output of exactly one gate
        let writable = input_wires.saturating_add(gate_count);
        if wire_count > writable {
            return Err(err(
                0,
                ParseErrorKind::TooManyWires {
                    wire_count,
                    writable,
                },
            ));
        }

        // wires are tracked 0-based here, as written in the file; only gate outputs need a flag
        let mut written = vec![false; gate_count];
        let defined = |written: &[bool], w: usize| w < input_wires || written[w - input_wires];
        let mut gates = Vec::with_capacity(gate_count);
        for (row, tokens) in rows.iter().enumerate().skip(3) {
            if tokens.len() < 2 {
                return Err(err(
                    row,
                    ParseErrorKind::TokenCount {
                        expected: 2,
                        actual: tokens.len(),
                    },
                ));
            }
            let num_inputs = parse_num(row, tokens[0])?;
            let num_outputs = parse_num(row, tokens[1])?;
            let Some(expected) = num_inputs
                .checked_add(num_outputs)
                .and_then(|n| n.checked_add(3))
            else {
                return Err(err(
                    row,
                    ParseErrorKind::TokenCount {
                        expected: usize::MAX,
                        actual: tokens.len(),
                    },
                ));
            };
            expect_tokens(row, tokens, expected)?;
            let op = match tokens[tokens.len() - 1] {
                "AND" => GateOp::And,
                "XOR" => GateOp::Xor,
                "INV" | "NOT" => GateOp::Not,
                other => return Err(err(row, ParseErrorKind::UnknownOp(other.to_string()))),
            };
            if num_inputs != op.arity() {
                return Err(err(
                    row,
                    ParseErrorKind::Arity {
                        op,
                        expected: op.arity(),
                        actual: num_inputs,
                    },
                ));
            }
            if num_outputs != 1 {
                return Err(err(row, ParseErrorKind::OutputArity(num_outputs)));
            }
            let wires = parse_nums(row, &tokens[2..2 + num_inputs + 1])?;
            for w in wires.iter().copied() {
                if w >= wire_count {
                    return Err(err(row, ParseErrorKind::WireOutOfRange(w)));
                }
            }
            let (ins, out) = wires.split_at(num_inputs);
            for w in ins.iter().copied() {
                if !defined(&written, w) {
                    return Err(err(row, ParseErrorKind::UndefinedWire(w)));
                }
            }
            let out = out[0];
            if defined(&written, out) {
                return Err(err(row, ParseErrorKind::WireRedefined(out)));
            }
            written[out - input_wires] = true;
            gates.push(Gate {
                inputs: ins.iter().map(|w| w + 1).collect(),
                output: out + 1,
                op,
            });
        }
        Ok(Circuit {
            wire_count,
            garbler_input_size,
            evaluator_input_size,
            output_size,
            gates,
        })
    }

    /// Renders the circuit as canonical Bristol Fashion text.
    pub fn to_bristol(&self) -> String {
        self.to_string()
    }

    /// The 1-based wires carrying the garbler's input.
    pub fn garbler_inputs(&self) -> impl Iterator<Item = Wire> + use<> {
        1..=self.garbler_input_size
    }

    /// The 1-based wires carrying the evaluator's input.
    pub fn evaluator_inputs(&self) -> impl Iterator<Item = Wire> + use<> {
        let first = self.garbler_input_size + 1;
        first..first + self.evaluator_input_size
    }

    /// The 1-based output wires, in output order.
    pub fn outputs(&self) -> impl Iterator<Item = Wire> + use<> {
        self.wire_count - self.output_size + 1..=self.wire_count
    }

    /// Number of AND gates, i.e. garbled tables.
    pub fn and_gates(&self) -> usize {
        self.gates.iter().filter(|g| g.op == GateOp::And).count()
    }

    /// Evaluates the circuit in the clear, on `[garbler_input, evaluator_input]`.
    pub fn evaluate(&self, inputs: &[BitVector; 2]) -> Result<BitVector, bits::Error> {
        let [garbler, evaluator] = inputs;
        for (input, expected) in [
            (garbler, self.garbler_input_size),
            (evaluator, self.evaluator_input_size),
        ] {
            if input.len() != expected {
                return Err(bits::Error::LengthMismatch {
                    left: input.len(),
                    right: expected,
                });
            }
        }
        let mut values = vec![false; self.wire_count + 1];
        for (w, bit) in self
            .garbler_inputs()
            .chain(self.evaluator_inputs())
            .zip(garbler.iter().chain(evaluator.iter()))
        {
            values[w] = bit;
        }
        for gate in &self.gates {
            values[gate.output] = match gate.op {
                GateOp::And => values[gate.inputs[0]] & values[gate.inputs[1]],
                GateOp::Xor => values[gate.inputs[0]] ^ values[gate.inputs[1]],
                GateOp::Not => !values[gate.inputs[0]],
            };
        }
        Ok(BitVector::from_bools(
            self.outputs().map(|w| values[w]).collect::<Vec<_>>(),
        ))
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.gates.len(), self.wire_count)?;
        writeln!(
            f,
            "2 {} {}",
            self.garbler_input_size, self.evaluator_input_size
        )?;
        writeln!(f, "1 {}", self.output_size)?;
        for gate in &self.gates {
            write!(f, "{} 1", gate.inputs.len())?;
            for w in &gate.inputs {
                write!(f, " {}", w - 1)?;
            }
            writeln!(f, " {} {}", gate.output - 1, gate.op.token())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Circuit, Gate, GateOp, ParseError, ParseErrorKind};
    use crate::bits::BitVector;

    const AND_4: &str = "3 7
2 2 2
1 1

2 1 0 1 4 AND
2 1 2 3 5 AND
2 1 4 5 6 AND
";

    fn kind(text: &str) -> (usize, ParseErrorKind) {
        let ParseError { row, kind } = Circuit::parse_bristol(text).unwrap_err();
        (row, kind)
    }

    #[test]
    fn parses_and_reduction() {
        let circuit = Circuit::parse_bristol(AND_4).unwrap();
        assert_eq!(circuit.wire_count, 7);
        assert_eq!(circuit.garbler_input_size, 2);
        assert_eq!(circuit.evaluator_input_size, 2);
        assert_eq!(circuit.output_size, 1);
        assert_eq!(
            circuit.gates[0],
            Gate {
                inputs: vec![1, 2],
                output: 5,
                op: GateOp::And
            }
        );
        assert_eq!(circuit.evaluator_inputs().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(circuit.outputs().collect::<Vec<_>>(), vec![7]);
        assert_eq!(circuit.and_gates(), 3);
    }

    #[test]
    fn display_round_trips() {
        let circuit = Circuit::parse_bristol(AND_4).unwrap();
        assert_eq!(Circuit::parse_bristol(&circuit.to_bristol()).unwrap(), circuit);
    }

    #[test]
    fn evaluates_directly() {
        let circuit = Circuit::parse_bristol(AND_4).unwrap();
        let eval = |a: &str, b: &str| {
            circuit
                .evaluate(&[a.parse().unwrap(), b.parse().unwrap()])
                .unwrap()
                .to_string()
        };
        assert_eq!(eval("11", "11"), "1");
        assert_eq!(eval("10", "11"), "0");
        assert_eq!(eval("00", "00"), "0");
        assert!(
            circuit
                .evaluate(&[BitVector::zeros(1), BitVector::zeros(2)])
                .is_err()
        );
    }

    #[test]
    fn accepts_inv_and_not() {
        let text = "2 4\n2 1 1\n1 1\n1 1 0 2 INV\n1 1 2 3 NOT\n";
        let circuit = Circuit::parse_bristol(text).unwrap();
        assert!(circuit.gates.iter().all(|g| g.op == GateOp::Not));
        let out = circuit
            .evaluate(&["1".parse().unwrap(), "0".parse().unwrap()])
            .unwrap();
        assert_eq!(out.to_string(), "1");
    }

    #[test]
    fn rejects_wrong_row_count() {
        let text = "2 7\n2 2 2\n1 1\n2 1 0 1 4 AND\n";
        assert!(matches!(kind(text).1, ParseErrorKind::RowCount { expected: 5, actual: 4 }));
    }

    #[test]
    fn rejects_unknown_op() {
        let text = "1 3\n2 1 1\n1 1\n2 1 0 1 2 OR\n";
        assert_eq!(kind(text), (3, ParseErrorKind::UnknownOp("OR".into())));
    }

    #[test]
    fn rejects_wrong_arity() {
        let text = "1 3\n2 1 1\n1 1\n1 1 0 2 AND\n";
        assert_eq!(
            kind(text),
            (
                3,
                ParseErrorKind::Arity {
                    op: GateOp::And,
                    expected: 2,
                    actual: 1
                }
            )
        );
        let text = "1 3\n2 1 1\n1 1\n2 1 0 1 2 INV\n";
        assert!(matches!(kind(text), (3, ParseErrorKind::Arity { .. })));
    }

    #[test]
    fn rejects_party_counts() {
        let text = "1 4\n3 1 1 1\n1 1\n2 1 0 1 3 AND\n";
        assert_eq!(kind(text), (1, ParseErrorKind::InputGroups(3)));
        let text = "1 3\n2 1 1\n2 1 1\n2 1 0 1 2 AND\n";
        assert_eq!(kind(text), (2, ParseErrorKind::OutputGroups(2)));
    }

    #[test]
    fn rejects_bad_wiring() {
        let text = "1 3\n2 1 1\n1 1\n2 1 0 5 2 XOR\n";
        assert_eq!(kind(text), (3, ParseErrorKind::WireOutOfRange(5)));
        let text = "2 4\n2 1 1\n1 1\n2 1 0 3 2 XOR\n2 1 0 1 3 XOR\n";
        assert_eq!(kind(text), (3, ParseErrorKind::UndefinedWire(3)));
        let text = "1 3\n2 1 1\n1 1\n2 1 0 1 1 XOR\n";
        assert_eq!(kind(text), (3, ParseErrorKind::WireRedefined(1)));
        let text = "1 4\n2 1 1\n1 1\n2 1 0 1 2 XOR\n";
        assert_eq!(
            kind(text),
            (
                0,
                ParseErrorKind::TooManyWires {
                    wire_count: 4,
                    writable: 3
                }
            )
        );
    }

    #[test]
    fn rejects_overflowing_counts() {
        let max = usize::MAX;
        let (row, kind_) = kind(&format!("{max} 3\n2 1 1\n1 1\n"));
        assert_eq!(row, 3);
        assert!(matches!(kind_, ParseErrorKind::RowCount { actual: 3, .. }));
        let text = format!("1 3\n2 1 1\n1 1\n{max} 1 0 1 2 AND\n");
        assert!(matches!(kind(&text), (3, ParseErrorKind::TokenCount { .. })));
        let text = format!("0 3\n2 {max} 1\n1 1\n");
        assert!(matches!(kind(&text), (0, ParseErrorKind::TooFewWires { .. })));
        let text = format!("0 {}\n2 {} {}\n1 0\n", max / 2 + 10, max / 4, max / 4);
        assert!(matches!(kind(&text), (0, ParseErrorKind::TooManyWires { .. })));
        // nothing is allocated per input wire
        let huge = Circuit::parse_bristol("0 1000000000000\n2 500000000000 500000000000\n1 0\n");
        assert_eq!(huge.unwrap().wire_count, 1_000_000_000_000);
    }

    #[test]
    fn rejects_garbage_numbers() {
        let text = "one 3\n2 1 1\n1 1\n2 1 0 1 2 XOR\n";
        assert_eq!(kind(text), (0, ParseErrorKind::InvalidNumber("one".into())));
    }
}

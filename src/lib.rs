//! Secure two-party computation of Boolean circuits using Yao's garbled circuits.
//!
//! A garbler and an evaluator jointly compute a public circuit over their private inputs. Neither
//! party learns anything about the other's input beyond the output, assuming both follow the
//! protocol (semi-honest security).
//!
//! ## Features
//!
//! - Free-XOR: XOR and NOT gates need no ciphertexts
//! - Point-and-permute: the evaluator decrypts exactly one row per AND gate
//! - A fixed-key AES hash as the gate cipher
//! - Diffie-Hellman oblivious transfer over Ristretto for the evaluator's input labels
//! - Circuits in the Bristol Fashion format
//!
//! ## Main Components
//!
//! * [`circuit`]: Parsing and direct evaluation of Bristol Fashion circuits.
//! * [`bits`]: The [`bits::BitVector`] used for inputs and outputs.
//! * [`garbler`] and [`evaluator`]: The two parties as explicit state machines.
//! * [`protocol`]: [`protocol::run_2pc`], which executes the protocol for a single party.
//! * [`channel`]: Communication abstractions for exchanging keyed messages between the parties.
//! * [`ot`]: The oblivious transfer of wire labels.
//! * [`config`]: Role, input encoding and port of a party.
//!
//! ## Example
//!
//! For simulated environments (testing/development), you can use [`protocol::simulate_2pc`]:
//!
//! ```
//! use yao_gc::{circuit::Circuit, protocol::simulate_2pc};
//!
//! let circuit = Circuit::parse_bristol("1 3\n2 1 1\n1 1\n2 1 0 1 2 AND\n")?;
//! let output = simulate_2pc(&circuit, &"1".parse()?, &"1".parse()?)?;
//! assert_eq!(output.to_string(), "1");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod bits;
pub mod channel;
pub mod circuit;
pub mod config;
pub mod evaluator;
pub mod garble;
pub mod garbler;
pub mod ot;
pub mod protocol;

mod block;
mod crypto;
mod label;
mod utils;

pub use block::WrongLength;
pub use label::Label;

//! Options supplied by whoever launches a party: its role, how its input is written and the port
//! used by an external transport.

use std::{fmt, str::FromStr};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    bits::{self, BitVector},
    circuit::Circuit,
    protocol::Role,
};

/// Errors raised while reading a party's input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The encoding name is not `bits`, `hex` or `number`.
    #[error("unknown input encoding {0:?}, expected bits, hex or number")]
    UnknownEncoding(String),
    /// The text is not valid in the chosen encoding.
    #[error("{text:?} is not a valid {encoding} input")]
    Malformed {
        /// The encoding that was used.
        encoding: InputEncoding,
        /// The rejected text.
        text: String,
    },
    /// A bit string is longer than the circuit input.
    #[error("input has {actual} bits, but the circuit expects {expected}")]
    TooLong {
        /// Input bits expected by the circuit.
        expected: usize,
        /// Bits in the given input.
        actual: usize,
    },
    /// The value does not fit into the circuit input.
    #[error(transparent)]
    Bits(#[from] bits::Error),
}

/// How a party writes down its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputEncoding {
    /// A string of `0`s and `1`s, most significant bit first.
    #[default]
    Bits,
    /// A hexadecimal number, optionally prefixed by `0x`.
    Hex,
    /// A decimal number.
    Number,
}

impl InputEncoding {
    /// Decodes `text` into exactly `width` bits.
    ///
    /// Shorter bit strings and all numbers are zero-padded on the left.
    pub fn decode(self, text: &str, width: usize) -> Result<BitVector, Error> {
        let text = text.trim();
        let malformed = || Error::Malformed {
            encoding: self,
            text: text.to_string(),
        };
        match self {
            InputEncoding::Bits => {
                let bits: BitVector = text.parse().map_err(|_| malformed())?;
                if bits.len() > width {
                    return Err(Error::TooLong {
                        expected: width,
                        actual: bits.len(),
                    });
                }
                Ok(bits.pad(width))
            }
            InputEncoding::Hex | InputEncoding::Number => {
                let (digits, radix) = match self {
                    InputEncoding::Hex => {
                        let digits = text
                            .strip_prefix("0x")
                            .or_else(|| text.strip_prefix("0X"))
                            .unwrap_or(text);
                        (digits, 16)
                    }
                    _ => (text, 10),
                };
                let n = BigUint::parse_bytes(digits.as_bytes(), radix).ok_or_else(malformed)?;
                Ok(BitVector::from_integer(&n, width)?)
            }
        }
    }

    /// Writes `bits` in this encoding.
    pub fn encode(self, bits: &BitVector) -> String {
        match self {
            InputEncoding::Bits => bits.to_string(),
            InputEncoding::Hex => format!("{:x}", bits.to_integer()),
            InputEncoding::Number => bits.to_integer().to_string(),
        }
    }
}

impl fmt::Display for InputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputEncoding::Bits => "bits",
            InputEncoding::Hex => "hex",
            InputEncoding::Number => "number",
        })
    }
}

impl FromStr for InputEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bits" => Ok(InputEncoding::Bits),
            "hex" => Ok(InputEncoding::Hex),
            "number" => Ok(InputEncoding::Number),
            _ => Err(Error::UnknownEncoding(s.to_string())),
        }
    }
}

/// The configuration of one party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// The role this party plays.
    pub role: Role,
    /// How the input of this party is written.
    pub input_encoding: InputEncoding,
    /// The port of the transport connecting the parties.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::Garbler,
            input_encoding: InputEncoding::Bits,
            port: 8000,
        }
    }
}

impl Config {
    /// Reads this party's input for `circuit`.
    pub fn parse_input(&self, circuit: &Circuit, text: &str) -> Result<BitVector, Error> {
        let width = match self.role {
            Role::Garbler => circuit.garbler_input_size,
            Role::Evaluator => circuit.evaluator_input_size,
        };
        self.input_encoding.decode(text, width)
    }
}

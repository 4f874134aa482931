//! Two-party computation of a circuit between a garbler and an evaluator.
//!
//! [`run_2pc`] executes one party of the protocol over an existing [`Channel`], [`simulate_2pc`]
//! runs both parties in-process and is mostly useful for testing.

use std::{fmt, str::FromStr};

use futures::future::try_join;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Builder;
use tracing::{info, warn};

use crate::{
    bits::{self, BitVector},
    channel::{self, Channel, MsgChannel, SimpleChannel},
    circuit::{Circuit, ParseError},
    evaluator::Evaluator,
    garble,
    garbler::Garbler,
    ot,
};

/// Number of gates garbled or evaluated between two yields to the async runtime.
pub(crate) const CHUNK_SIZE: usize = 1024;

/// Message keys used on the channel.
pub(crate) mod keys {
    pub(crate) const HELLO: &str = "hello";
    pub(crate) const GARBLER_INPUTS: &str = "garbler input labels";
    pub(crate) const EVALUATOR_INPUTS: &str = "evaluator input labels";
    pub(crate) const GATES: &str = "garbled gates";
    pub(crate) const OUTPUT_LABELS: &str = "output labels";
    pub(crate) const OUTPUT: &str = "output";
}

/// The role played by a party in the protocol execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    /// Garbles the circuit and decodes the output.
    #[default]
    Garbler,
    /// Evaluates the garbled circuit.
    Evaluator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Garbler => "Garbler",
            Role::Evaluator => "Evaluator",
        })
    }
}

/// A role name other than `Garbler` or `Evaluator`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role {0:?}, expected Garbler or Evaluator")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "garbler" => Ok(Role::Garbler),
            "evaluator" => Ok(Role::Evaluator),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// The stages reported to a [`Progress`] observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Both parties joined and agree on the circuit.
    Connected,
    /// Gates are being garbled.
    Garbling,
    /// Gates are being evaluated.
    Evaluating,
    /// The output is known.
    Output,
    /// The run failed.
    Error,
}

/// Observes the progress of a protocol run. Reports have no influence on the protocol.
pub trait Progress {
    /// Called with the current stage and how far along it is.
    fn report(&mut self, stage: Stage, current: usize, total: usize);
}

impl Progress for () {
    fn report(&mut self, _: Stage, _: usize, _: usize) {}
}

impl<F: FnMut(Stage, usize, usize)> Progress for F {
    fn report(&mut self, stage: Stage, current: usize, total: usize) {
        self(stage, current, total)
    }
}

/// Errors that abort a protocol run.
#[derive(Debug, Error)]
pub enum Error {
    /// The circuit text is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Bit vectors of different lengths were combined.
    #[error(transparent)]
    Bits(#[from] bits::Error),
    /// Garbling, evaluating or decoding failed.
    #[error(transparent)]
    Garble(#[from] garble::Error),
    /// The oblivious transfer was given invalid points or a wrong number of values.
    #[error(transparent)]
    Ot(ot::Error),
    /// The peer closed the channel or stopped responding.
    #[error("peer disconnected while waiting for {0:?}")]
    Disconnected(String),
    /// A message could not be decoded.
    #[error(transparent)]
    Channel(channel::Error),
    /// The number of provided input bits does not match the inputs expected in the circuit.
    #[error("expected {expected} input bits, found {actual}")]
    WrongInputSize {
        /// The number of input bits specified in the circuit.
        expected: usize,
        /// The number of input bits provided by the user.
        actual: usize,
    },
    /// The peer does not take part in the same computation.
    #[error("peer mismatch: {0}")]
    PeerMismatch(String),
    /// A state machine was advanced after it had failed.
    #[error("the protocol run already failed")]
    Aborted,
    /// The async runtime of a simulated run could not be started.
    #[error("could not start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<channel::Error> for Error {
    fn from(e: channel::Error) -> Self {
        if e.is_disconnect() {
            Self::Disconnected(e.phase)
        } else {
            Self::Channel(e)
        }
    }
}

impl From<ot::Error> for Error {
    fn from(e: ot::Error) -> Self {
        match e {
            ot::Error::Channel(e) => e.into(),
            e => Self::Ot(e),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    role: Role,
    circuit: [u8; 32],
}

/// Announces this party to the peer and waits until the peer has announced itself.
///
/// Fails with [`Error::PeerMismatch`] unless the peer plays the other role on the same circuit.
pub async fn handshake(
    channel: &mut MsgChannel<impl Channel>,
    circuit: &Circuit,
    role: Role,
) -> Result<(), Error> {
    let digest = *blake3::hash(circuit.to_bristol().as_bytes()).as_bytes();
    let hello = Hello {
        role,
        circuit: digest,
    };
    channel.send_to(keys::HELLO, &hello).await?;
    let peer: Hello = channel.recv_from(keys::HELLO).await?;
    if peer.role == role {
        return Err(Error::PeerMismatch(format!("both parties are the {role}")));
    }
    if peer.circuit != digest {
        return Err(Error::PeerMismatch(
            "the parties hold different circuits".to_string(),
        ));
    }
    Ok(())
}

/// Executes the protocol for one party and returns the output, which both parties learn.
pub async fn run_2pc(
    channel: impl Channel,
    circuit: &Circuit,
    role: Role,
    input: &BitVector,
    progress: &mut impl Progress,
) -> Result<BitVector, Error> {
    let expected = match role {
        Role::Garbler => circuit.garbler_input_size,
        Role::Evaluator => circuit.evaluator_input_size,
    };
    let mut channel = MsgChannel::new(channel);
    let connected = if input.len() == expected {
        handshake(&mut channel, circuit, role).await
    } else {
        Err(Error::WrongInputSize {
            expected,
            actual: input.len(),
        })
    };
    if let Err(e) = connected {
        warn!(%role, "could not start the protocol: {e}");
        progress.report(Stage::Error, 0, 0);
        return Err(e);
    }
    info!(%role, "connected to peer");
    progress.report(Stage::Connected, 1, 1);
    let (circuit, input) = (circuit.clone(), input.clone());
    match role {
        Role::Garbler => Garbler::new(channel, circuit, input)?.run(progress).await,
        Role::Evaluator => Evaluator::new(channel, circuit, input)?.run(progress).await,
    }
}

/// Simulates both parties in-process and returns the output they agreed on.
pub fn simulate_2pc(
    circuit: &Circuit,
    garbler_input: &BitVector,
    evaluator_input: &BitVector,
) -> Result<BitVector, Error> {
    let runtime = Builder::new_current_thread().enable_time().build()?;
    let (garbler, evaluator) = SimpleChannel::pair();
    let (from_garbler, from_evaluator) = runtime.block_on(try_join(
        run_2pc(garbler, circuit, Role::Garbler, garbler_input, &mut ()),
        run_2pc(evaluator, circuit, Role::Evaluator, evaluator_input, &mut ()),
    ))?;
    if from_garbler != from_evaluator {
        return Err(Error::PeerMismatch(format!(
            "garbler output {from_garbler} differs from evaluator output {from_evaluator}"
        )));
    }
    Ok(from_garbler)
}

#[cfg(test)]
mod tests {
    use super::{Role, Stage};

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Garbler".parse(), Ok(Role::Garbler));
        assert_eq!("evaluator".parse(), Ok(Role::Evaluator));
        assert!("judge".parse::<Role>().is_err());
        assert_eq!(Role::Evaluator.to_string(), "Evaluator");
    }

    #[test]
    fn closures_observe_progress() {
        let mut seen = vec![];
        let mut progress =
            |stage: Stage, current: usize, total: usize| seen.push((stage, current, total));
        super::Progress::report(&mut progress, Stage::Garbling, 1, 2);
        assert_eq!(seen, vec![(Stage::Garbling, 1, 2)]);
    }
}

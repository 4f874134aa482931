//! The evaluator's side of the protocol as an explicit state machine.
//!
//! ```text
//! Init -> InputsReceived -> GatesReceived -> Evaluated -> ResultSent -> Done
//! ```

use std::mem;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio::task::yield_now;
use tracing::{debug, info, instrument, warn};

use crate::{
    bits::BitVector,
    channel::{Channel, MsgChannel},
    circuit::Circuit,
    garble::{self, GarbledGate},
    label::{EvaluatorWires, Label},
    ot::receive_oblivious,
    protocol::{CHUNK_SIZE, Error, Progress, Stage, keys},
};

/// The named states of an [`Evaluator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorPhase {
    /// Nothing has happened yet.
    Init,
    /// One label per input wire is known.
    InputsReceived,
    /// The garbled gates have arrived.
    GatesReceived,
    /// Every gate has been evaluated.
    Evaluated,
    /// The output labels were sent to the garbler.
    ResultSent,
    /// The decoded output has arrived.
    Done,
    /// The run was aborted by an error.
    Failed,
}

#[derive(Default)]
pub(crate) enum EvaluatorState {
    Init,
    InputsReceived {
        wires: EvaluatorWires,
    },
    GatesReceived {
        wires: EvaluatorWires,
        gates: Vec<GarbledGate>,
    },
    Evaluated {
        labels: Vec<Label>,
    },
    ResultSent,
    Done {
        output: BitVector,
    },
    #[default]
    Failed,
}

impl EvaluatorState {
    fn phase(&self) -> EvaluatorPhase {
        match self {
            EvaluatorState::Init => EvaluatorPhase::Init,
            EvaluatorState::InputsReceived { .. } => EvaluatorPhase::InputsReceived,
            EvaluatorState::GatesReceived { .. } => EvaluatorPhase::GatesReceived,
            EvaluatorState::Evaluated { .. } => EvaluatorPhase::Evaluated,
            EvaluatorState::ResultSent => EvaluatorPhase::ResultSent,
            EvaluatorState::Done { .. } => EvaluatorPhase::Done,
            EvaluatorState::Failed => EvaluatorPhase::Failed,
        }
    }
}

/// The party that evaluates the garbled circuit without learning intermediate values.
pub struct Evaluator<C: Channel> {
    channel: MsgChannel<C>,
    circuit: Circuit,
    input: BitVector,
    rng: ChaCha20Rng,
    state: EvaluatorState,
}

impl<C: Channel> Evaluator<C> {
    /// Prepares an evaluator with its private input, one bit per evaluator input wire.
    pub fn new(channel: MsgChannel<C>, circuit: Circuit, input: BitVector) -> Result<Self, Error> {
        if input.len() != circuit.evaluator_input_size {
            return Err(Error::WrongInputSize {
                expected: circuit.evaluator_input_size,
                actual: input.len(),
            });
        }
        Ok(Self {
            channel,
            circuit,
            input,
            rng: ChaCha20Rng::from_rng(&mut rand::rng()),
            state: EvaluatorState::Init,
        })
    }

    /// The current state.
    pub fn state(&self) -> EvaluatorPhase {
        self.state.phase()
    }

    /// The output, once the evaluator is [`EvaluatorPhase::Done`].
    pub fn output(&self) -> Option<&BitVector> {
        match &self.state {
            EvaluatorState::Done { output } => Some(output),
            _ => None,
        }
    }

    /// Performs the next transition and returns the new state.
    ///
    /// Errors are reported as [`Stage::Error`] and leave the evaluator
    /// [`EvaluatorPhase::Failed`], as does dropping a transition before it completes.
    #[instrument(skip_all, fields(from = ?self.state()))]
    pub async fn advance(&mut self, progress: &mut impl Progress) -> Result<EvaluatorPhase, Error> {
        let state = mem::take(&mut self.state);
        match self.transition(state, progress).await {
            Ok(next) => {
                self.state = next;
                debug!(to = ?self.state(), "evaluator advanced");
                Ok(self.state())
            }
            Err(e) => {
                warn!("evaluator failed: {e}");
                self.state = EvaluatorState::Failed;
                progress.report(Stage::Error, 0, 0);
                Err(e)
            }
        }
    }

    /// Advances until the output is known and returns it.
    pub async fn run(mut self, progress: &mut impl Progress) -> Result<BitVector, Error> {
        loop {
            self.advance(progress).await?;
            if let EvaluatorState::Done { output } = self.state {
                return Ok(output);
            }
        }
    }

    async fn transition(
        &mut self,
        state: EvaluatorState,
        progress: &mut impl Progress,
    ) -> Result<EvaluatorState, Error> {
        Ok(match state {
            EvaluatorState::Init => {
                let mut wires = EvaluatorWires::new(&self.circuit);
                let own = receive_oblivious(
                    &mut self.channel,
                    keys::EVALUATOR_INPUTS,
                    self.input.as_bools(),
                    &mut self.rng,
                )
                .await?;
                let garbler: Vec<Label> = self
                    .channel
                    .recv_vec_from(keys::GARBLER_INPUTS, self.circuit.garbler_input_size)
                    .await?;
                let inputs = self.circuit.garbler_inputs().chain(self.circuit.evaluator_inputs());
                for (w, label) in inputs.zip(garbler.into_iter().chain(own)) {
                    wires.set(w, label);
                }
                EvaluatorState::InputsReceived { wires }
            }
            EvaluatorState::InputsReceived { wires } => {
                let gates = self
                    .channel
                    .recv_vec_from(keys::GATES, self.circuit.gates.len())
                    .await?;
                EvaluatorState::GatesReceived { wires, gates }
            }
            EvaluatorState::GatesReceived { mut wires, gates } => {
                let total = self.circuit.gates.len();
                let chunks = self.circuit.gates.chunks(CHUNK_SIZE);
                for (c, (chunk, garbled)) in chunks.zip(gates.chunks(CHUNK_SIZE)).enumerate() {
                    for (j, (gate, garbled)) in chunk.iter().zip(garbled).enumerate() {
                        garble::evaluate_gate(&mut wires, c * CHUNK_SIZE + j, gate, garbled)?;
                    }
                    progress.report(Stage::Evaluating, c * CHUNK_SIZE + chunk.len(), total);
                    yield_now().await;
                }
                info!(gates = total, "circuit evaluated");
                EvaluatorState::Evaluated {
                    labels: garble::output_labels(&self.circuit, &wires)?,
                }
            }
            EvaluatorState::Evaluated { labels } => {
                self.channel.send_to(keys::OUTPUT_LABELS, &labels).await?;
                EvaluatorState::ResultSent
            }
            EvaluatorState::ResultSent => {
                let bits: Vec<bool> = self
                    .channel
                    .recv_vec_from(keys::OUTPUT, self.circuit.output_size)
                    .await?;
                let output = BitVector::from_bools(bits);
                progress.report(Stage::Output, output.len(), output.len());
                info!(%output, "output received");
                EvaluatorState::Done { output }
            }
            done @ EvaluatorState::Done { .. } => done,
            EvaluatorState::Failed => return Err(Error::Aborted),
        })
    }
}

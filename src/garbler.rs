//! The garbler's side of the protocol as an explicit state machine.
//!
//! ```text
//! Init -> LabelsGenerated -> GatesGarbled -> InputsSent -> GatesSent
//!      -> AwaitingEvaluation -> Decoded -> Done
//! ```
//!
//! Each call to [`Garbler::advance`] performs exactly one transition. Any error moves the
//! machine to [`GarblerPhase::Failed`]. Advancing a failed machine returns [`Error::Aborted`].

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
    label::{GarblerWires, Label},
    ot::send_oblivious,
    protocol::{CHUNK_SIZE, Error, Progress, Stage, keys},
};

/// The named states of a [`Garbler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarblerPhase {
    /// Nothing has happened yet.
    Init,
    /// The global offset and the input wire labels have been drawn.
    LabelsGenerated,
    /// Every gate has been garbled.
    GatesGarbled,
    /// The garbler's input labels were sent and the evaluator's were transferred obliviously.
    InputsSent,
    /// The garbled gates were sent.
    GatesSent,
    /// The evaluator's output labels have arrived.
    AwaitingEvaluation,
    /// The output labels have been decoded to bits.
    Decoded,
    /// The output was shared with the evaluator.
    Done,
    /// The run was aborted by an error.
    Failed,
}

#[derive(Default)]
pub(crate) enum GarblerState {
    Init,
    LabelsGenerated {
        wires: GarblerWires,
    },
    GatesGarbled {
        wires: GarblerWires,
        gates: Vec<GarbledGate>,
    },
    InputsSent {
        wires: GarblerWires,
        gates: Vec<GarbledGate>,
    },
    GatesSent {
        wires: GarblerWires,
    },
    AwaitingEvaluation {
        wires: GarblerWires,
        labels: Vec<Label>,
    },
    Decoded {
        output: BitVector,
    },
    Done {
        output: BitVector,
    },
    #[default]
    Failed,
}

impl GarblerState {
    fn phase(&self) -> GarblerPhase {
        match self {
            GarblerState::Init => GarblerPhase::Init,
            GarblerState::LabelsGenerated { .. } => GarblerPhase::LabelsGenerated,
            GarblerState::GatesGarbled { .. } => GarblerPhase::GatesGarbled,
            GarblerState::InputsSent { .. } => GarblerPhase::InputsSent,
            GarblerState::GatesSent { .. } => GarblerPhase::GatesSent,
            GarblerState::AwaitingEvaluation { .. } => GarblerPhase::AwaitingEvaluation,
            GarblerState::Decoded { .. } => GarblerPhase::Decoded,
            GarblerState::Done { .. } => GarblerPhase::Done,
            GarblerState::Failed => GarblerPhase::Failed,
        }
    }
}

/// The party that garbles the circuit and decodes its output.
pub struct Garbler<C: Channel> {
    channel: MsgChannel<C>,
    circuit: Circuit,
    input: BitVector,
    rng: ChaCha20Rng,
    state: GarblerState,
}

impl<C: Channel> Garbler<C> {
    /// Prepares a garbler with its private input, which must have one bit per garbler input wire.
    pub fn new(channel: MsgChannel<C>, circuit: Circuit, input: BitVector) -> Result<Self, Error> {
        if input.len() != circuit.garbler_input_size {
            return Err(Error::WrongInputSize {
                expected: circuit.garbler_input_size,
                actual: input.len(),
            });
        }
        Ok(Self {
            channel,
            circuit,
            input,
            rng: ChaCha20Rng::from_rng(&mut rand::rng()),
            state: GarblerState::Init,
        })
    }

    /// The current state.
    pub fn state(&self) -> GarblerPhase {
        self.state.phase()
    }

    /// The decoded output, once the garbler is [`GarblerPhase::Done`].
    pub fn output(&self) -> Option<&BitVector> {
        match &self.state {
            GarblerState::Done { output } => Some(output),
            _ => None,
        }
    }

    /// Performs the next transition and returns the new state.
    ///
    /// On error the garbler reports [`Stage::Error`] and is left [`GarblerPhase::Failed`]. A
    /// transition that is dropped before it completes also leaves it failed.
    #[instrument(skip_all, fields(from = ?self.state()))]
    pub async fn advance(&mut self, progress: &mut impl Progress) -> Result<GarblerPhase, Error> {
        let state = mem::take(&mut self.state);
        match self.transition(state, progress).await {
            Ok(next) => {
                self.state = next;
                debug!(to = ?self.state(), "garbler advanced");
                Ok(self.state())
            }
            Err(e) => {
                warn!("garbler failed: {e}");
                self.state = GarblerState::Failed;
                progress.report(Stage::Error, 0, 0);
                Err(e)
            }
        }
    }

    /// Advances until the output is known and returns it.
    pub async fn run(mut self, progress: &mut impl Progress) -> Result<BitVector, Error> {
        loop {
            self.advance(progress).await?;
            if let GarblerState::Done { output } = self.state {
                return Ok(output);
            }
        }
    }

    async fn transition(
        &mut self,
        state: GarblerState,
        progress: &mut impl Progress,
    ) -> Result<GarblerState, Error> {
        Ok(match state {
            GarblerState::Init => GarblerState::LabelsGenerated {
                wires: GarblerWires::new(&self.circuit, &mut self.rng),
            },
            GarblerState::LabelsGenerated { mut wires } => {
                let total = self.circuit.gates.len();
                let mut gates = Vec::with_capacity(total);
                for (c, chunk) in self.circuit.gates.chunks(CHUNK_SIZE).enumerate() {
                    for (j, gate) in chunk.iter().enumerate() {
                        let i = c * CHUNK_SIZE + j;
                        gates.push(garble::garble_gate(&mut wires, i, gate, &mut self.rng)?);
                    }
                    progress.report(Stage::Garbling, gates.len(), total);
                    yield_now().await;
                }
                info!(gates = total, and_gates = self.circuit.and_gates(), "circuit garbled");
                GarblerState::GatesGarbled { wires, gates }
            }
            GarblerState::GatesGarbled { wires, gates } => {
                let own = self
                    .circuit
                    .garbler_inputs()
                    .zip(self.input.iter())
                    .map(|(w, bit)| wires.label(w, bit).ok_or(garble::Error::MissingInput(w)))
                    .collect::<Result<Vec<_>, _>>()?;
                self.channel.send_to(keys::GARBLER_INPUTS, &own).await?;
                let pairs = self
                    .circuit
                    .evaluator_inputs()
                    .map(|w| {
                        let [l0, l1] = wires.pair(w).ok_or(garble::Error::MissingInput(w))?;
                        Ok((l0, l1))
                    })
                    .collect::<Result<Vec<_>, garble::Error>>()?;
                send_oblivious(&mut self.channel, keys::EVALUATOR_INPUTS, &pairs, &mut self.rng)
                    .await?;
                GarblerState::InputsSent { wires, gates }
            }
            GarblerState::InputsSent { wires, gates } => {
                self.channel.send_to(keys::GATES, &gates).await?;
                GarblerState::GatesSent { wires }
            }
            GarblerState::GatesSent { wires } => {
                let labels = self
                    .channel
                    .recv_vec_from(keys::OUTPUT_LABELS, self.circuit.output_size)
                    .await?;
                GarblerState::AwaitingEvaluation { wires, labels }
            }
            GarblerState::AwaitingEvaluation { wires, labels } => GarblerState::Decoded {
                output: garble::decode(&self.circuit, &wires, &labels)?,
            },
            GarblerState::Decoded { output } => {
                self.channel.send_to(keys::OUTPUT, &output).await?;
                progress.report(Stage::Output, output.len(), output.len());
                info!(%output, "output decoded and shared");
                GarblerState::Done { output }
            }
            done @ GarblerState::Done { .. } => done,
            GarblerState::Failed => return Err(Error::Aborted),
        })
    }
}

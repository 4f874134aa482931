//! A communication channel used to send/receive messages to/from the other party.
//!
//! [`Channel`] is the transport boundary and only moves opaque byte messages in order.
//! [`MsgChannel`] adds keyed messages on top: every message is sent under a key and
//! [`MsgChannel::recv_from`] waits for the next message with that key, buffering messages with
//! other keys until they are asked for. Keys can therefore be received in a different order than
//! they were sent.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    future::Future,
    time::Duration,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::{
    sync::mpsc::{Receiver, Sender, channel, error::SendError},
    time::timeout,
};
use tracing::{debug, trace};

use crate::utils::{deserialize, serialize};

/// Errors related to sending / receiving / (de-)serializing messages.
#[derive(Debug, Error)]
#[error("{reason} ({phase})")]
pub struct Error {
    /// The message key during which the error occurred.
    pub phase: String,
    /// The specific error that was raised.
    pub reason: ErrorKind,
}

/// The specific error that occurred when trying to send / receive a message.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The (serialized) message could not be received over the channel.
    #[error("could not receive message: {0}")]
    RecvError(String),
    /// The (serialized) message could not be sent over the channel.
    #[error("could not send message: {0}")]
    SendError(String),
    /// The message could not be (de-)serialized.
    #[error("could not (de-)serialize message: {0}")]
    SerdeError(String),
    /// The message is a Vec, but not of the expected length.
    #[error("expected {expected} elements, found {actual}")]
    InvalidLength {
        /// The expected number of elements.
        expected: usize,
        /// The number of elements received.
        actual: usize,
    },
}

impl Error {
    /// Whether the error means that the peer can no longer be reached.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self.reason,
            ErrorKind::RecvError(_) | ErrorKind::SendError(_)
        )
    }
}

/// A communication channel used to send/receive messages to/from the other party.
pub trait Channel {
    /// The error that can occur sending messages over the channel.
    type SendError: fmt::Debug;
    /// The error that can occur receiving messages over the channel.
    type RecvError: fmt::Debug;

    /// Sends a message to the other party.
    fn send_bytes(
        &mut self,
        msg: Vec<u8>,
    ) -> impl Future<Output = Result<(), Self::SendError>> + Send;

    /// Awaits the next message of the other party.
    fn recv_bytes(&mut self) -> impl Future<Output = Result<Vec<u8>, Self::RecvError>> + Send;
}

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    key: String,
    payload: Vec<u8>,
}

/// A wrapper around [`Channel`] that takes care of keying and (de-)serializing messages.
#[derive(Debug)]
pub struct MsgChannel<C: Channel> {
    channel: C,
    pending: HashMap<String, VecDeque<Vec<u8>>>,
}

fn serde_error(phase: &str, e: bincode::Error) -> Error {
    Error {
        phase: phase.to_string(),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    }
}

impl<C: Channel> MsgChannel<C> {
    /// Wraps a raw byte channel.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            pending: HashMap::new(),
        }
    }

    /// Returns the raw channel. Buffered messages are dropped.
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Serializes and sends a message under the given key.
    pub async fn send_to(&mut self, key: &str, msg: &impl Serialize) -> Result<(), Error> {
        let payload = serialize(msg).map_err(|e| serde_error(key, e))?;
        let frame = Frame {
            key: key.to_string(),
            payload,
        };
        let bytes = serialize(&frame).map_err(|e| serde_error(key, e))?;
        debug!(key, bytes = bytes.len(), "sending message");
        self.channel.send_bytes(bytes).await.map_err(|e| Error {
            phase: key.to_string(),
            reason: ErrorKind::SendError(format!("{e:?}")),
        })
    }

    /// Receives and deserializes the next message sent under the given key.
    pub async fn recv_from<T: DeserializeOwned>(&mut self, key: &str) -> Result<T, Error> {
        let payload = match self.pending.get_mut(key).and_then(VecDeque::pop_front) {
            Some(payload) => payload,
            None => loop {
                let bytes = self.channel.recv_bytes().await.map_err(|e| Error {
                    phase: key.to_string(),
                    reason: ErrorKind::RecvError(format!("{e:?}")),
                })?;
                let frame: Frame = deserialize(&bytes).map_err(|e| serde_error(key, e))?;
                if frame.key == key {
                    break frame.payload;
                }
                trace!(expected = key, got = frame.key, "buffering message");
                self.pending
                    .entry(frame.key)
                    .or_default()
                    .push_back(frame.payload);
            },
        };
        debug!(key, bytes = payload.len(), "received message");
        deserialize(&payload).map_err(|e| serde_error(key, e))
    }

    /// Receives and deserializes a Vec (while checking the length).
    pub async fn recv_vec_from<T: DeserializeOwned>(
        &mut self,
        key: &str,
        len: usize,
    ) -> Result<Vec<T>, Error> {
        let v: Vec<T> = self.recv_from(key).await?;
        if v.len() == len {
            Ok(v)
        } else {
            Err(Error {
                phase: key.to_string(),
                reason: ErrorKind::InvalidLength {
                    expected: len,
                    actual: v.len(),
                },
            })
        }
    }
}

/// An in-process channel between two parties using tokio's [`Sender`] and [`Receiver`].
#[derive(Debug)]
pub struct SimpleChannel {
    s: Sender<Vec<u8>>,
    r: Receiver<Vec<u8>>,
    recv_timeout: Duration,
}

impl SimpleChannel {
    /// Creates the two connected ends of a channel.
    pub fn pair() -> (Self, Self) {
        let buffer_capacity = 1024;
        let recv_timeout = Duration::from_secs(10 * 60);
        let (send_a_to_b, recv_a_to_b) = channel(buffer_capacity);
        let (send_b_to_a, recv_b_to_a) = channel(buffer_capacity);
        (
            SimpleChannel {
                s: send_a_to_b,
                r: recv_b_to_a,
                recv_timeout,
            },
            SimpleChannel {
                s: send_b_to_a,
                r: recv_a_to_b,
                recv_timeout,
            },
        )
    }

    /// Sets how long a receive waits before giving up.
    pub fn with_timeout(mut self, recv_timeout: Duration) -> Self {
        self.recv_timeout = recv_timeout;
        self
    }
}

#[derive(Debug)]
/// The error raised by `recv` calls of a [`SimpleChannel`].
pub enum AsyncRecvError {
    /// The channel has been closed.
    Closed,
    /// No message was received before the timeout.
    TimeoutElapsed,
}

impl Channel for SimpleChannel {
    type SendError = SendError<Vec<u8>>;
    type RecvError = AsyncRecvError;

    async fn send_bytes(&mut self, msg: Vec<u8>) -> Result<(), SendError<Vec<u8>>> {
        self.s.send(msg).await
    }

    async fn recv_bytes(&mut self) -> Result<Vec<u8>, AsyncRecvError> {
        match timeout(self.recv_timeout, self.r.recv()).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(AsyncRecvError::Closed),
            Err(_) => Err(AsyncRecvError::TimeoutElapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ErrorKind, MsgChannel, SimpleChannel};

    #[tokio::test]
    async fn keyed_messages_can_be_received_out_of_order() {
        let (a, b) = SimpleChannel::pair();
        let (mut a, mut b) = (MsgChannel::new(a), MsgChannel::new(b));
        a.send_to("first", &1u32).await.unwrap();
        a.send_to("second", &"two").await.unwrap();
        a.send_to("first", &3u32).await.unwrap();

        let second: String = b.recv_from("second").await.unwrap();
        let first: u32 = b.recv_from("first").await.unwrap();
        let third: u32 = b.recv_from("first").await.unwrap();
        assert_eq!((first, second.as_str(), third), (1, "two", 3));
    }

    #[tokio::test]
    async fn both_directions_are_independent() {
        let (a, b) = SimpleChannel::pair();
        let (mut a, mut b) = (MsgChannel::new(a), MsgChannel::new(b));
        a.send_to("ping", &true).await.unwrap();
        b.send_to("pong", &false).await.unwrap();
        assert!(!a.recv_from::<bool>("pong").await.unwrap());
        assert!(b.recv_from::<bool>("ping").await.unwrap());
    }

    #[tokio::test]
    async fn vec_length_is_checked() {
        let (a, b) = SimpleChannel::pair();
        let (mut a, mut b) = (MsgChannel::new(a), MsgChannel::new(b));
        a.send_to("v", &vec![1u8, 2, 3]).await.unwrap();
        let err = b.recv_vec_from::<u8>("v", 2).await.unwrap_err();
        assert!(matches!(
            err.reason,
            ErrorKind::InvalidLength {
                expected: 2,
                actual: 3
            }
        ));
        assert!(!err.is_disconnect());
    }

    #[tokio::test]
    async fn closed_peer_is_a_disconnect() {
        let (a, b) = SimpleChannel::pair();
        let mut b = MsgChannel::new(b);
        drop(a);
        let err = b.recv_from::<u8>("anything").await.unwrap_err();
        assert!(err.is_disconnect());
        let err = b.send_to("anything", &0u8).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (_a, b) = SimpleChannel::pair();
        let mut b = MsgChannel::new(b.with_timeout(Duration::from_millis(10)));
        let err = b.recv_from::<u8>("never").await.unwrap_err();
        assert!(matches!(err.reason, ErrorKind::RecvError(_)));
    }
}

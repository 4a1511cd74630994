//! Length-delimited framing of protocol messages.
//!
//! Each message is preceded by its length, encoded as a protocol buffer varint (at most 10 bytes,
//! least significant group first). Bytes arrive on stdin in chunks of arbitrary size, so a message
//! may be split across many reads, and a single read may carry many messages. The [`Framer`]
//! decodes one message at a time from the beginning of a buffer, telling apart buffers that only
//! need more bytes from buffers that can never be decoded. The [`Accumulator`] owns the pending
//! bytes between reads.

use log::{debug, warn};
use nom::bytes::streaming::take;
use nom::error::{Error, ErrorKind};
use nom::number::streaming::be_u8;
use nom::Err as NomErr;
use nom::IResult;
use prost::Message;
use std::convert::TryFrom;

/// Default upper bound on the declared length of a single message (64 MiB).
pub const DEFAULT_MAX_LENGTH: usize = 64 * 1024 * 1024;
const MAX_VARINT_LENGTH: usize = 10;
const RETAINED_CAPACITY: usize = 8192;

/// Result of a decode attempt at the beginning of a buffer.
#[derive(Debug, PartialEq)]
pub enum Decoded<M> {
    /// A complete message, spanning the first `consumed` bytes of the buffer.
    Message { message: M, consumed: usize },
    /// The buffer is a prefix of a message: retry once more bytes are available.
    Incomplete,
    /// The buffer can never be decoded, whatever bytes come next.
    Malformed,
}

/// Decode length-delimited messages from the beginning of byte buffers.
#[derive(Clone, Copy, Debug)]
pub struct Framer {
    max_length: usize,
}

impl Framer {
    /// Create a new framer, rejecting messages declaring a length above the given maximum.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Try to decode one message from the beginning of the given input.
    pub fn decode<M: Message + Default>(&self, input: &[u8]) -> Decoded<M> {
        match self.parse_frame(input) {
            Ok((input_left, body)) => match M::decode(body) {
                Ok(message) => Decoded::Message {
                    message,
                    consumed: input.len() - input_left.len(),
                },
                Err(error) => {
                    debug!("Unable to decode a {} bytes message body: {}.", body.len(), error);

                    Decoded::Malformed
                },
            },
            Err(NomErr::Incomplete(_)) => Decoded::Incomplete,
            Err(_) => Decoded::Malformed,
        }
    }

    fn parse_frame<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], &'a [u8]> {
        let (input, length) = self.length_prefix(input)?;

        take(length)(input)
    }

    /// Parse the varint length prefix. Never allocates: only the declared length is returned.
    fn length_prefix<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], usize> {
        let too_large = || NomErr::Failure(Error::new(input, ErrorKind::TooLarge));
        let mut length: u64 = 0;
        let mut rest = input;

        for index in 0..MAX_VARINT_LENGTH {
            let (input_left, byte) = be_u8(rest)?;
            rest = input_left;

            // The last byte only has room for the 64th bit.
            if index == MAX_VARINT_LENGTH - 1 && byte > 1 {
                return Err(too_large());
            }
            length |= u64::from(byte & 0x7f) << (7 * index);

            if byte & 0x80 == 0 {
                return match usize::try_from(length) {
                    Ok(length) if length <= self.max_length => Ok((rest, length)),
                    _ => Err(too_large()),
                };
            }
        }

        Err(too_large())
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

/// Encode the given message, prefixed by its length.
pub fn encode<M: Message>(message: &M) -> Vec<u8> {
    message.encode_length_delimited_to_vec()
}

/// Pending bytes received from the stream, always starting at a message boundary.
pub struct Accumulator {
    framer: Framer,
    pending: Vec<u8>,
}

impl Accumulator {
    pub fn new(framer: Framer) -> Self {
        Self {
            framer,
            pending: Vec::new(),
        }
    }

    /// Append newly received bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Decode the next pending message. A decoded message is dropped from the pending bytes. A
    /// malformed message makes the whole buffer be discarded: once desynchronized, there is no
    /// way to find where the next message starts.
    pub fn next<M: Message + Default>(&mut self) -> Decoded<M> {
        let decoded = self.framer.decode(&self.pending);

        match &decoded {
            Decoded::Message { consumed, .. } => {
                self.pending.drain(..*consumed);
            },
            Decoded::Malformed => {
                warn!("Discarding {} pending bytes after a malformed message.", self.pending.len());
                self.pending.clear();
            },
            Decoded::Incomplete => {},
        };
        if self.pending.is_empty() {
            self.pending.shrink_to(RETAINED_CAPACITY);
        }

        decoded
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

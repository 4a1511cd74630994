//! Reading the request stream in the background.
//!
//! Reads on stdin block, while the worker must keep reacting to builds completing. A dedicated
//! thread reads the stream and forwards every chunk of bytes as an [`Event`].

use crossbeam_channel::{unbounded, Receiver};
use log::debug;
use std::io::{Error as IoError, ErrorKind, Read};
use std::thread;

const READ_BUFFER_SIZE: usize = 8192;

#[derive(Debug)]
pub enum Event {
    /// Bytes read from the stream, in order.
    Bytes(Vec<u8>),
    /// The end of the stream has been reached.
    Closed,
    /// The stream cannot be read anymore.
    Failed(IoError),
}

/// Spawn a thread reading the given stream until its end, returning the receiving side of the
/// produced events. The thread ends after sending [`Event::Closed`] or [`Event::Failed`], or as
/// soon as the receiver is dropped.
pub fn spawn<R: Read + Send + 'static>(mut reader: R) -> Result<Receiver<Event>, IoError> {
    let (sender, receiver) = unbounded();

    thread::Builder::new().name("bundle-worker/input".to_string()).spawn(move || {
        let mut buffer = [0; READ_BUFFER_SIZE];

        loop {
            let event = match reader.read(&mut buffer) {
                Ok(0) => {
                    debug!("EOF reached on the request stream.");

                    Event::Closed
                },
                Ok(length) => Event::Bytes(buffer[..length].to_vec()),
                Err(ref error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => Event::Failed(error),
            };
            let last = !matches!(event, Event::Bytes(_));

            if sender.send(event).is_err() || last {
                return;
            }
        }
    })?;

    Ok(receiver)
}

//! Bridge between a file watcher and a development server.
//!
//! When a watched target uses the notification channel, the file watcher writes a line on our
//! stdin each time the external part of the build completed. Such lines trigger a rebuild on the
//! development server. Any other line is ignored: this is a notification channel, not a protocol.

use super::DevServer;
use log::debug;
use std::io::{BufRead, Error as IoError, ErrorKind};

/// The line written by the watcher once the external build succeeded.
pub const BUILD_COMPLETED: &str = "IBAZEL_BUILD_COMPLETED SUCCESS";

/// Listen to notifications on the given reader until its end, invalidating the given server on
/// each completed build. Return the number of invalidations.
pub fn listen<R: BufRead, S: DevServer + ?Sized>(mut reader: R, server: &S) -> Result<usize, IoError> {
    let mut line = Vec::new();
    let mut invalidations = 0;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                debug!("Notification stream closed after {} invalidations.", invalidations);

                return Ok(invalidations);
            },
            Ok(_) => {},
            Err(ref error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };

        if trim_line_ending(&line) == BUILD_COMPLETED.as_bytes() {
            server.invalidate();
            invalidations += 1;
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);

    line.strip_suffix(b"\r").unwrap_or(line)
}

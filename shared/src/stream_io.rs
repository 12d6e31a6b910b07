//! Byte-accumulation primitives.
//!
//! A stream socket may hand back any number of bytes per call, so both
//! directions loop until the requested amount has been moved.

use std::io::{ErrorKind, Read, Write};

use tracing::trace;

use crate::error::TransferError;

/// Reads exactly `n` bytes, or fails with [`TransferError::ConnectionClosed`]
/// if the stream ends first.
pub fn read_exact_or_closed(reader: &mut impl Read, n: usize) -> Result<Vec<u8>, TransferError> {
    let mut buffer = vec![0u8; n];
    read_into_or_closed(reader, &mut buffer)?;
    Ok(buffer)
}

/// Fills `buffer` completely. A zero-length read before the buffer is full
/// means the peer closed the connection.
pub fn read_into_or_closed(reader: &mut impl Read, buffer: &mut [u8]) -> Result<(), TransferError> {
    let expected = buffer.len();
    let mut received = 0usize;

    while received < expected {
        match reader.read(&mut buffer[received..]) {
            Ok(0) => return Err(TransferError::ConnectionClosed { expected, received }),
            Ok(count) => {
                received += count;
                trace!(count, received, expected, "read chunk");
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Writes the whole buffer. A write call that accepts zero bytes means the
/// socket is dead; that is fatal and never retried.
pub fn write_all_or_broken(writer: &mut impl Write, data: &[u8]) -> Result<(), TransferError> {
    let total = data.len();
    let mut written = 0usize;

    while written < total {
        match writer.write(&data[written..]) {
            Ok(0) => return Err(TransferError::ConnectionBroken { written, total }),
            Ok(count) => {
                written += count;
                trace!(count, written, total, "wrote chunk");
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    writer.flush()?;

    Ok(())
}

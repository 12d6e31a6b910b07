//! Length-prefixed framing.
//!
//! Every message on the wire is `[len: u32 BE][len bytes of payload]`. The
//! one-way reply is the exception: a bare 8 byte big-endian `f64` with no
//! prefix.

use std::io::{Read, Write};
use std::mem::size_of;

use tracing::debug;
use zerocopy::{
    byteorder::{BigEndian, F64, U32},
    AsBytes, FromBytes, FromZeroes, Unaligned,
};

use crate::{
    error::TransferError,
    stream_io::{read_exact_or_closed, read_into_or_closed, write_all_or_broken},
};

/// 64 MiB. Large enough for any array this benchmark builds.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 << 20;

pub const HEADER_LEN: usize = size_of::<FrameHeader>();

pub const TIMESTAMP_LEN: usize = size_of::<F64<BigEndian>>();

#[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
pub struct FrameHeader {
    len: U32<BigEndian>,
}

impl FrameHeader {
    pub fn new(len: u32) -> Self {
        Self {
            len: U32::new(len),
        }
    }

    pub fn payload_len(&self) -> u32 {
        self.len.get()
    }
}

/// Produces `be_u32(payload.len()) || payload`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransferError> {
    let len = u32::try_from(payload.len()).map_err(|_| TransferError::FrameTooLarge {
        len: payload.len() as u64,
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(FrameHeader::new(len).as_bytes());
    frame.extend_from_slice(payload);

    Ok(frame)
}

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    fn check_len(&self, len: u64) -> Result<(), TransferError> {
        if len > self.max_frame_len as u64 {
            return Err(TransferError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        Ok(())
    }

    /// Encodes a frame, refusing payloads the peer would reject anyway.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, TransferError> {
        self.check_len(payload.len() as u64)?;
        encode_frame(payload)
    }

    pub fn write_frame(&self, writer: &mut impl Write, payload: &[u8]) -> Result<(), TransferError> {
        let frame = self.encode(payload)?;
        write_all_or_broken(writer, &frame)
    }

    /// Reads one whole frame. The declared length is checked against the
    /// limit before any payload buffer is allocated.
    pub fn read_frame(&self, reader: &mut impl Read) -> Result<Vec<u8>, TransferError> {
        let mut header = FrameHeader::new_zeroed();
        read_into_or_closed(reader, header.as_bytes_mut())?;

        let len = header.payload_len();
        debug!(len, "frame header received");

        self.check_len(len as u64)?;

        read_exact_or_closed(reader, len as usize)
    }
}

/// Writes the unframed one-way reply.
pub fn write_timestamp(writer: &mut impl Write, secs: f64) -> Result<(), TransferError> {
    write_all_or_broken(writer, F64::<BigEndian>::new(secs).as_bytes())
}

pub fn read_timestamp(reader: &mut impl Read) -> Result<f64, TransferError> {
    let mut stamp = F64::<BigEndian>::new_zeroed();
    read_into_or_closed(reader, stamp.as_bytes_mut())?;
    Ok(stamp.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_four_big_endian_bytes() {
        assert_eq!(HEADER_LEN, 4);
        assert_eq!(FrameHeader::new(0x0102_0304).as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn encode_prefixes_length() {
        let frame = encode_frame(b"abc").unwrap();
        assert_eq!(frame, [0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn empty_payload_is_a_valid_frame() {
        let frame = encode_frame(b"").unwrap();
        assert_eq!(frame, [0, 0, 0, 0]);

        let payload = FrameCodec::default().read_frame(&mut frame.as_slice()).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn encode_refuses_payload_over_limit() {
        let codec = FrameCodec::new(4);
        assert!(matches!(
            codec.encode(b"hello"),
            Err(TransferError::FrameTooLarge { len: 5, max: 4 })
        ));
    }

    #[test]
    fn timestamp_is_eight_big_endian_bytes() {
        let mut wire = Vec::new();
        write_timestamp(&mut wire, 1.5).unwrap();
        assert_eq!(wire.len(), TIMESTAMP_LEN);
        assert_eq!(wire, 1.5f64.to_be_bytes());
        assert_eq!(read_timestamp(&mut wire.as_slice()).unwrap(), 1.5);
    }
}

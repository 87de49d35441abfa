//! Transport abstraction the wire codecs serialize onto.
//!
//! The source devices write directly against `O2Device::Send`/`Receive` on a
//! named FairMQ channel. Rather than pull in a message-queue transport for
//! this, the codecs here are generic over plain `std::io::{Read, Write}` --
//! any `TcpStream`, `UnixStream`, or in-process pipe satisfies the contract,
//! matching the byte-oriented framing spec.md §6.1/§6.2 actually specify.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use dd_utils::PayloadHandle;

pub trait FrameSink: Write {}
impl<T: Write> FrameSink for T {}

pub trait FrameSource: Read {}
impl<T: Read> FrameSource for T {}

/// FairMQ messages are self-delimiting on the wire; a plain byte stream is
/// not, so every payload gets an explicit 8-byte little-endian length prefix
/// here. This is the one place the rewrite's framing diverges from the
/// original transport.
pub fn write_payload<W: Write>(w: &mut W, payload: &PayloadHandle) -> io::Result<()> {
    w.write_u64::<LittleEndian>(payload.len() as u64)?;
    w.write_all(payload.as_bytes())
}

pub fn read_payload<R: Read>(r: &mut R) -> io::Result<PayloadHandle> {
    let len = r.read_u64::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(PayloadHandle::from_bytes(buf))
}

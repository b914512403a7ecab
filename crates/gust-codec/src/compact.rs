//! Default compact wire codec.
//!
//! Field layout of one message:
//!
//! ```text
//! kind (u8) | method_len (varint) | method (utf-8) | seq (varint) |
//! payload_len (varint) | payload (bytes)
//! ```
//!
//! Lengths and the sequence number use a variable-length integer with a
//! 2-bit tag in the high bits of the first byte. The tag selects the
//! encoded width (1, 2, 4 or 8 bytes) and the remaining bits carry the
//! value big-endian. One byte covers values below 64, so minimal
//! messages cost single-digit overhead.

use crate::{CodecError, CodecFactory, Envelope, MemoryTransport, MessageCodec, MessageKind, Result};

/// Largest value a varint can carry: 2^62 - 1.
pub const MAX_VARINT: u64 = (1 << 62) - 1;

/// Reads one tagged varint from the front of `transport`.
fn read_varint(transport: &mut MemoryTransport) -> Result<u64> {
    let first = transport.get_u8()?;
    let extra = match first >> 6 {
        0b00 => 0,
        0b01 => 1,
        0b10 => 3,
        _ => 7,
    };
    let mut value = u64::from(first & 0x3f);
    for _ in 0..extra {
        value = (value << 8) | u64::from(transport.get_u8()?);
    }
    Ok(value)
}

/// Appends `value` as a tagged varint, using the smallest width that fits.
fn write_varint(transport: &mut MemoryTransport, value: u64) -> Result<()> {
    if value < 1 << 6 {
        transport.put_u8(value as u8);
    } else if value < 1 << 14 {
        transport.put_u8(0x40 | (value >> 8) as u8);
        transport.put_u8(value as u8);
    } else if value < 1 << 30 {
        transport.put_u8(0x80 | (value >> 24) as u8);
        transport.put_u8((value >> 16) as u8);
        transport.put_u8((value >> 8) as u8);
        transport.put_u8(value as u8);
    } else if value <= MAX_VARINT {
        transport.put_u8(0xc0 | (value >> 56) as u8);
        for shift in [48u32, 40, 32, 24, 16, 8, 0] {
            transport.put_u8((value >> shift) as u8);
        }
    } else {
        return Err(CodecError::Oversize(value));
    }
    Ok(())
}

/// Reads a varint and narrows it to a buffer length.
fn read_len(transport: &mut MemoryTransport) -> Result<usize> {
    let value = read_varint(transport)?;
    usize::try_from(value).map_err(|_| CodecError::Oversize(value))
}

/// The default codec. See the module docs for the wire layout.
#[derive(Debug, Default)]
pub struct CompactCodec {
    transport: MemoryTransport,
}

impl CompactCodec {
    /// Creates a codec with an empty transport.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageCodec for CompactCodec {
    fn transport_mut(&mut self) -> &mut MemoryTransport {
        &mut self.transport
    }

    /// Decodes one envelope. Bytes after the payload are left on the
    /// transport untouched; a datagram carries exactly one message so a
    /// well-formed peer never produces any.
    fn decode(&mut self) -> Result<Envelope> {
        let kind = MessageKind::try_from(self.transport.get_u8()?)?;

        let method_len = read_len(&mut self.transport)?;
        let method_bytes = self.transport.get_bytes(method_len)?;
        let method = core::str::from_utf8(&method_bytes)?.to_owned();

        let seq = read_varint(&mut self.transport)?;
        let seq = u32::try_from(seq).map_err(|_| CodecError::Oversize(seq))?;

        let payload_len = read_len(&mut self.transport)?;
        let payload = self.transport.get_bytes(payload_len)?;

        Ok(Envelope {
            method,
            seq,
            kind,
            payload,
        })
    }

    fn encode(&mut self, envelope: &Envelope) -> Result<()> {
        self.transport.put_u8(envelope.kind as u8);
        write_varint(&mut self.transport, envelope.method.len() as u64)?;
        self.transport.put_slice(envelope.method.as_bytes());
        write_varint(&mut self.transport, u64::from(envelope.seq))?;
        write_varint(&mut self.transport, envelope.payload.len() as u64)?;
        self.transport.put_slice(&envelope.payload);
        Ok(())
    }
}

/// Factory for [`CompactCodec`] instances.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompactCodecFactory;

impl CodecFactory for CompactCodecFactory {
    fn build(&self) -> Box<dyn MessageCodec> {
        Box::new(CompactCodec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn encode_varint(value: u64) -> Vec<u8> {
        let mut t = MemoryTransport::new();
        write_varint(&mut t, value).unwrap();
        t.take().to_vec()
    }

    #[test]
    fn varint_widths_match_value_ranges() {
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(63), vec![0x3f]);
        assert_eq!(encode_varint(64), vec![0x40, 0x40]);
        assert_eq!(encode_varint(300), vec![0x41, 0x2c]);
        assert_eq!(encode_varint(16383), vec![0x7f, 0xff]);
        assert_eq!(encode_varint(16384), vec![0x80, 0x00, 0x40, 0x00]);
        assert_eq!(
            encode_varint(1 << 30),
            vec![0xc0, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn varint_roundtrips_at_width_boundaries() {
        for value in [0u64, 1, 63, 64, 16383, 16384, (1 << 30) - 1, 1 << 30, MAX_VARINT] {
            let mut t = MemoryTransport::new();
            write_varint(&mut t, value).unwrap();
            assert_eq!(read_varint(&mut t).unwrap(), value);
            assert!(t.is_empty());
        }
    }

    #[test]
    fn varint_rejects_values_past_max() {
        let mut t = MemoryTransport::new();
        assert_eq!(
            write_varint(&mut t, MAX_VARINT + 1),
            Err(CodecError::Oversize(MAX_VARINT + 1))
        );
    }

    #[test]
    fn encode_produces_documented_layout() {
        let mut codec = CompactCodec::new();
        codec
            .encode(&Envelope::call("ping", 7, Bytes::from_static(&[1, 2, 3])))
            .unwrap();
        assert_eq!(
            codec.transport_mut().take().as_ref(),
            &[0x01, 0x04, b'p', b'i', b'n', b'g', 0x07, 0x03, 1, 2, 3]
        );
    }

    #[test]
    fn decode_reverses_encode() {
        let env = Envelope::reply("get_user", 70_000, Bytes::from(vec![9u8; 300]));
        let mut codec = CompactCodec::new();
        codec.encode(&env).unwrap();
        let wire = codec.transport_mut().take();

        codec.transport_mut().fill(&wire);
        assert_eq!(codec.decode().unwrap(), env);
        assert!(codec.transport_mut().is_empty());
    }

    #[test]
    fn empty_payload_is_legal() {
        let env = Envelope::oneway("fire", 0, Bytes::new());
        let mut codec = CompactCodec::new();
        codec.encode(&env).unwrap();
        let wire = codec.transport_mut().take();

        codec.transport_mut().fill(&wire);
        let decoded = codec.decode().unwrap();
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded, env);
    }

    #[test]
    fn truncated_datagram_reports_missing_bytes() {
        let mut codec = CompactCodec::new();
        codec
            .encode(&Envelope::call("ping", 1, Bytes::from_static(b"abcdef")))
            .unwrap();
        let wire = codec.transport_mut().take();

        // Drop the tail so the payload read comes up short.
        codec.transport_mut().fill(&wire[..wire.len() - 4]);
        assert_eq!(
            codec.decode(),
            Err(CodecError::Truncated {
                needed: 6,
                available: 2
            })
        );
    }

    #[test]
    fn unknown_kind_byte_fails_fast() {
        let mut codec = CompactCodec::new();
        codec.transport_mut().fill(&[0x09, 0x00, 0x00, 0x00]);
        assert_eq!(codec.decode(), Err(CodecError::InvalidKind(0x09)));
    }

    #[test]
    fn non_utf8_method_is_rejected() {
        let mut codec = CompactCodec::new();
        // kind=Call, method_len=2, method bytes are an invalid sequence.
        codec.transport_mut().fill(&[0x01, 0x02, 0xff, 0xfe, 0x00, 0x00]);
        assert!(matches!(
            codec.decode(),
            Err(CodecError::MethodNotUtf8(_))
        ));
    }

    #[test]
    fn sequence_numbers_wider_than_u32_are_rejected() {
        let mut codec = CompactCodec::new();
        codec.transport_mut().put_u8(0x01);
        write_varint(codec.transport_mut(), 0).unwrap();
        write_varint(codec.transport_mut(), u64::from(u32::MAX) + 1).unwrap();
        write_varint(codec.transport_mut(), 0).unwrap();
        assert_eq!(
            codec.decode(),
            Err(CodecError::Oversize(u64::from(u32::MAX) + 1))
        );
    }

    #[test]
    fn factory_builds_independent_codecs() {
        let factory = CompactCodecFactory;
        let mut a = factory.build();
        let mut b = factory.build();
        a.transport_mut().fill(&[1, 2, 3]);
        assert_eq!(b.transport_mut().remaining(), 0);
        assert_eq!(a.transport_mut().remaining(), 3);
    }
}

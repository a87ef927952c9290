use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

pub const HEADER_LENGTH: usize = 4;
pub const VERSION_SHIFT: u8 = 6;
pub const VERSION_MASK: u8 = 0x3;
pub const PADDING_SHIFT: u8 = 5;
pub const PADDING_MASK: u8 = 0x1;
pub const EXTENSION_SHIFT: u8 = 4;
pub const EXTENSION_MASK: u8 = 0x1;
pub const CC_MASK: u8 = 0xF;
pub const MARKER_SHIFT: u8 = 7;
pub const MARKER_MASK: u8 = 0x1;
pub const PT_MASK: u8 = 0x7F;
pub const SEQ_NUM_OFFSET: usize = 2;
pub const SEQ_NUM_LENGTH: usize = 2;
pub const TIMESTAMP_OFFSET: usize = 4;
pub const TIMESTAMP_LENGTH: usize = 4;
pub const SSRC_OFFSET: usize = 8;
pub const SSRC_LENGTH: usize = 4;
pub const CSRC_OFFSET: usize = 12;
pub const CSRC_LENGTH: usize = 4;

const RTP_VERSION: u8 = 2;

/// One-byte RTP header extension element per RFC 8285.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extension {
    pub id: u8,
    pub payload: Bytes,
}

/// RTP fixed header plus optional CSRC list and optional extension,
/// laid out exactly as RFC 3550 §5.1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub extension_profile: u16,
    pub extension: Option<Bytes>,
}

impl Header {
    /// Size in bytes of the marshaled header (fixed part + CSRC + extension).
    pub fn marshal_size(&self) -> usize {
        let mut size = HEADER_LENGTH + SSRC_LENGTH + self.csrc.len() * CSRC_LENGTH;
        if let Some(ext) = &self.extension {
            size += 4 + ext.len();
        }
        size
    }

    pub fn marshal(&self) -> Result<Bytes> {
        if self.csrc.len() > 0xF {
            return Err(Error::ErrTooManyReports);
        }
        let mut buf = BytesMut::with_capacity(self.marshal_size());

        let mut b0: u8 = RTP_VERSION << VERSION_SHIFT;
        if self.padding {
            b0 |= 1 << PADDING_SHIFT;
        }
        if self.extension.is_some() {
            b0 |= 1 << EXTENSION_SHIFT;
        }
        b0 |= self.csrc.len() as u8 & CC_MASK;
        buf.put_u8(b0);

        let mut b1 = self.payload_type & PT_MASK;
        if self.marker {
            b1 |= 1 << MARKER_SHIFT;
        }
        buf.put_u8(b1);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }
        if let Some(ext) = &self.extension {
            if ext.len() % 4 != 0 {
                return Err(Error::ErrInvalidMsg);
            }
            buf.put_u16(self.extension_profile);
            buf.put_u16((ext.len() / 4) as u16);
            buf.extend_from_slice(ext);
        }
        Ok(buf.freeze())
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        if raw.len() < HEADER_LENGTH + SSRC_LENGTH {
            return Err(Error::ErrBufferShort {
                need: HEADER_LENGTH + SSRC_LENGTH,
                have: raw.len(),
            });
        }
        let mut reader = raw.clone();
        let b0 = reader.get_u8();
        let version = (b0 >> VERSION_SHIFT) & VERSION_MASK;
        if version != RTP_VERSION {
            return Err(Error::ErrUnsupportedVersion);
        }
        let padding = ((b0 >> PADDING_SHIFT) & PADDING_MASK) != 0;
        let has_extension = ((b0 >> EXTENSION_SHIFT) & EXTENSION_MASK) != 0;
        let cc = (b0 & CC_MASK) as usize;

        let b1 = reader.get_u8();
        let marker = ((b1 >> MARKER_SHIFT) & MARKER_MASK) != 0;
        let payload_type = b1 & PT_MASK;

        let sequence_number = reader.get_u16();
        let timestamp = reader.get_u32();
        let ssrc = reader.get_u32();

        if reader.remaining() < cc * CSRC_LENGTH {
            return Err(Error::ErrBufferShort {
                need: cc * CSRC_LENGTH,
                have: reader.remaining(),
            });
        }
        let mut csrc = Vec::with_capacity(cc);
        for _ in 0..cc {
            csrc.push(reader.get_u32());
        }

        let mut extension_profile = 0u16;
        let mut extension = None;
        if has_extension {
            if reader.remaining() < 4 {
                return Err(Error::ErrBufferShort {
                    need: 4,
                    have: reader.remaining(),
                });
            }
            extension_profile = reader.get_u16();
            let ext_words = reader.get_u16() as usize;
            let ext_len = ext_words * 4;
            if reader.remaining() < ext_len {
                return Err(Error::ErrBufferShort {
                    need: ext_len,
                    have: reader.remaining(),
                });
            }
            extension = Some(reader.copy_to_bytes(ext_len));
        }

        Ok(Header {
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension_profile,
            extension,
        })
    }

    /// Parses the extension body as a chain of one-byte RFC 8285 elements.
    pub fn one_byte_extensions(&self) -> Vec<Extension> {
        let Some(ext) = &self.extension else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut i = 0;
        while i < ext.len() {
            let b = ext[i];
            if b == 0 {
                i += 1;
                continue;
            }
            let id = b >> 4;
            let len = (b & 0xF) as usize + 1;
            i += 1;
            if i + len > ext.len() {
                break;
            }
            out.push(Extension {
                id,
                payload: ext.slice(i..i + len),
            });
            i += len;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_extension_and_csrc() {
        let h = Header {
            padding: false,
            marker: true,
            payload_type: 99,
            sequence_number: 42371,
            timestamp: 57800,
            ssrc: 0x927D_CD02,
            csrc: vec![],
            extension_profile: 0xBEDE,
            extension: Some(Bytes::from_static(&[0x41, 0x78, 0x42, 0x00])),
        };
        let wire = h.marshal().unwrap();
        let expected: &[u8] = &[
            0x90, 0xE3, 0xA5, 0x83, 0x00, 0x00, 0xE1, 0xC8, 0x92, 0x7D, 0xCD, 0x02, 0xBE, 0xDE,
            0x00, 0x01, 0x41, 0x78, 0x42, 0x00,
        ];
        assert_eq!(&wire[..], expected);

        let decoded = Header::unmarshal(&wire).unwrap();
        assert_eq!(decoded, h);

        let exts = decoded.one_byte_extensions();
        assert_eq!(exts.len(), 1);
        assert_eq!(exts[0].id, 4);
        assert_eq!(&exts[0].payload[..], &[0x78, 0x42]);
    }

    #[test]
    fn rejects_wrong_version() {
        let raw = Bytes::from_static(&[0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            Header::unmarshal(&raw),
            Err(Error::ErrUnsupportedVersion)
        ));
    }
}

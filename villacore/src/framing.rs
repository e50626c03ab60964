/// Villa gateway framing.
///
/// Every WebSocket binary message carries exactly one frame:
///
/// ```text
/// fixed header     magic: u32 | body_len: u32
/// variable header  header_len: u32 | id: u64 | flag: u32 | biz_type: u32 [| app_id: i32]
/// body             body_len - header_len bytes
/// ```
///
/// All integers are little-endian. `body_len` counts the variable header plus
/// the body, so a frame is always `FIX_HEADER_LEN + body_len` bytes long. The
/// long variable header (with `app_id`) is used whenever the sender has a
/// non-zero app id.
use crate::protocol::Flag;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::trace;
use thiserror::Error;

pub const MAGIC: u32 = 0xBABE_FACE;
pub const FIX_HEADER_LEN: usize = 8;
/// Variable header without the sender app id.
pub const HEADER_LEN_V1: u32 = 20;
/// Variable header including the sender app id.
pub const HEADER_LEN_V2: u32 = 24;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated (need {needed} bytes, got {got})")]
    Truncated { needed: usize, got: usize },
    #[error("invalid magic {0:#010x}")]
    BadMagic(u32),
    #[error("invalid body length (expected frame of {expected} bytes, got {actual})")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("invalid variable header length {0}")]
    UnknownHeaderVariant(u32),
    #[error("frame body is too large ({0} bytes)")]
    TooLarge(usize),
}

/// One decoded frame. `id` is the request id: replies echo the id of the
/// request that caused them, pushes carry a server-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u64,
    pub flag: Flag,
    pub biz_type: u32,
    /// Sender app id, 0 when the frame used the short header.
    pub app_id: i32,
    pub body: Bytes,
}

impl Frame {
    pub fn new(biz_type: u32, id: u64, app_id: i32, flag: Flag, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            flag,
            biz_type,
            app_id,
            body: body.into(),
        }
    }

    /// Length of the variable header this frame is written with.
    pub fn header_len(&self) -> u32 {
        if self.app_id == 0 {
            HEADER_LEN_V1
        } else {
            HEADER_LEN_V2
        }
    }

    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let header_len = self.header_len();
        let body_len = (header_len as usize)
            .checked_add(self.body.len())
            .filter(|len| *len <= u32::MAX as usize)
            .ok_or(FrameError::TooLarge(self.body.len()))?;

        let mut data = BytesMut::with_capacity(FIX_HEADER_LEN + body_len);
        data.put_u32_le(MAGIC);
        data.put_u32_le(body_len as u32);
        data.put_u32_le(header_len);
        data.put_u64_le(self.id);
        data.put_u32_le(self.flag.code());
        data.put_u32_le(self.biz_type);
        if header_len == HEADER_LEN_V2 {
            data.put_i32_le(self.app_id);
        }
        data.extend_from_slice(&self.body);
        Ok(data.freeze())
    }

    /// Decodes one complete frame. Never panics; every malformed input maps
    /// to a [`FrameError`].
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < FIX_HEADER_LEN {
            return Err(FrameError::Truncated {
                needed: FIX_HEADER_LEN,
                got: data.len(),
            });
        }

        let mut buf = data;
        let magic = buf.get_u32_le();
        if magic != MAGIC {
            return Err(FrameError::BadMagic(magic));
        }

        let body_len = buf.get_u32_le() as usize;
        let expected = FIX_HEADER_LEN + body_len;
        if data.len() < expected {
            return Err(FrameError::Truncated {
                needed: expected,
                got: data.len(),
            });
        }
        if data.len() > expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        if body_len < 4 {
            return Err(FrameError::Truncated {
                needed: FIX_HEADER_LEN + 4,
                got: data.len(),
            });
        }

        let header_len = buf.get_u32_le();
        if header_len != HEADER_LEN_V1 && header_len != HEADER_LEN_V2 {
            return Err(FrameError::UnknownHeaderVariant(header_len));
        }
        if body_len < header_len as usize {
            return Err(FrameError::Truncated {
                needed: FIX_HEADER_LEN + header_len as usize,
                got: data.len(),
            });
        }

        let id = buf.get_u64_le();
        let flag = Flag::from_code(buf.get_u32_le());
        let biz_type = buf.get_u32_le();
        let app_id = if header_len == HEADER_LEN_V2 {
            buf.get_i32_le()
        } else {
            0
        };

        let body = Bytes::copy_from_slice(buf);
        trace!(
            "<-- Decoded frame: id={id} biz_type={biz_type} body {} bytes",
            body.len()
        );
        Ok(Self {
            id,
            flag,
            biz_type,
            app_id,
            body,
        })
    }
}

/// Encodes a frame. The header variant is picked from `app_id`.
pub fn encode_frame(
    biz_type: u32,
    id: u64,
    app_id: i32,
    flag: Flag,
    body: &[u8],
) -> Result<Bytes, FrameError> {
    Frame::new(biz_type, id, app_id, flag, Bytes::copy_from_slice(body)).encode()
}

pub fn decode_frame(data: &[u8]) -> Result<Frame, FrameError> {
    Frame::decode(data)
}

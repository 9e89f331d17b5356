use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::{DELIMITER, MAX_ARRAY_LEN, MAX_BULK_BYTES};

/// RESP2 frame.
///
/// Null bulk strings (`$-1`) and null arrays (`*-1`) both parse as `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Array(Vec<Frame>),
    Null,
}

pub(crate) mod frameprefix {
    pub(crate) const SIMPLE: u8 = b'+';
    pub(crate) const ERROR: u8 = b'-';
    pub(crate) const INTEGER: u8 = b':';
    pub(crate) const BULK: u8 = b'$';
    pub(crate) const ARRAY: u8 = b'*';
}

#[derive(Debug, PartialEq)]
pub enum FrameError {
    /// Not enough data is available to decode a frame from buffer.
    Incomplete,
    Invalid(String),
}

type ByteCursor<'a> = std::io::Cursor<&'a [u8]>;

impl Frame {
    pub fn bulk(val: impl Into<Bytes>) -> Frame {
        Frame::Bulk(val.into())
    }

    pub fn ok() -> Frame {
        Frame::Simple("OK".into())
    }

    /// Walk one complete frame without allocating.
    pub fn check(src: &mut ByteCursor) -> Result<(), FrameError> {
        match cursor::get_u8(src)? {
            frameprefix::SIMPLE | frameprefix::ERROR => {
                cursor::get_line(src)?;
                Ok(())
            }
            frameprefix::INTEGER => {
                cursor::get_signed(src)?;
                Ok(())
            }
            frameprefix::BULK => match cursor::get_length(src, MAX_BULK_BYTES)? {
                // skip bytes length + delimiter
                Some(len) => cursor::skip(src, len + 2),
                None => Ok(()),
            },
            frameprefix::ARRAY => {
                if let Some(len) = cursor::get_length(src, MAX_ARRAY_LEN)? {
                    for _ in 0..len {
                        Frame::check(src)?;
                    }
                }
                Ok(())
            }
            prefix => Err(FrameError::Invalid(format!(
                "unknown frame prefix {:#x}",
                prefix
            ))),
        }
    }

    pub fn parse(src: &mut ByteCursor) -> Result<Frame, FrameError> {
        match cursor::get_u8(src)? {
            frameprefix::SIMPLE => Ok(Frame::Simple(cursor::get_string(src)?)),
            frameprefix::ERROR => Ok(Frame::Error(cursor::get_string(src)?)),
            frameprefix::INTEGER => Ok(Frame::Integer(cursor::get_signed(src)?)),
            frameprefix::BULK => {
                let len = match cursor::get_length(src, MAX_BULK_BYTES)? {
                    Some(len) => len,
                    None => return Ok(Frame::Null),
                };
                let n = len + 2;
                if src.remaining() < n {
                    return Err(FrameError::Incomplete);
                }
                if &src.chunk()[len..n] != DELIMITER {
                    return Err(FrameError::Invalid("bulk string not terminated".into()));
                }
                let value = Bytes::copy_from_slice(&src.chunk()[..len]);

                cursor::skip(src, n)?;

                Ok(Frame::Bulk(value))
            }
            frameprefix::ARRAY => {
                let len = match cursor::get_length(src, MAX_ARRAY_LEN)? {
                    Some(len) => len,
                    None => return Ok(Frame::Null),
                };
                let mut frames = Vec::with_capacity(len);
                for _ in 0..len {
                    frames.push(Frame::parse(src)?);
                }
                Ok(Frame::Array(frames))
            }
            prefix => Err(FrameError::Invalid(format!(
                "unknown frame prefix {:#x}",
                prefix
            ))),
        }
    }

    /// Serialize into `dst` in wire format.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(val) => {
                dst.put_u8(frameprefix::SIMPLE);
                dst.put_slice(val.as_bytes());
                dst.put_slice(DELIMITER);
            }
            Frame::Error(val) => {
                dst.put_u8(frameprefix::ERROR);
                dst.put_slice(val.as_bytes());
                dst.put_slice(DELIMITER);
            }
            Frame::Integer(val) => {
                dst.put_u8(frameprefix::INTEGER);
                put_decimal(dst, *val);
            }
            Frame::Bulk(val) => {
                dst.put_u8(frameprefix::BULK);
                put_decimal(dst, val.len() as i64);
                dst.put_slice(val);
                dst.put_slice(DELIMITER);
            }
            Frame::Array(frames) => {
                dst.put_u8(frameprefix::ARRAY);
                put_decimal(dst, frames.len() as i64);
                for frame in frames {
                    frame.encode(dst);
                }
            }
            Frame::Null => {
                dst.put_u8(frameprefix::BULK);
                dst.put_slice(b"-1");
                dst.put_slice(DELIMITER);
            }
        }
    }

    /// Bytes of a bulk or simple string frame.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Frame::Bulk(val) => Some(val),
            Frame::Simple(val) => Some(Bytes::from(val)),
            _ => None,
        }
    }
}

fn put_decimal(dst: &mut BytesMut, val: i64) {
    dst.put_slice(val.to_string().as_bytes());
    dst.put_slice(DELIMITER);
}

// cursor utilities.
mod cursor {
    use super::*;

    pub(super) fn get_u8(src: &mut ByteCursor) -> Result<u8, FrameError> {
        if !src.has_remaining() {
            return Err(FrameError::Incomplete);
        }
        Ok(src.get_u8())
    }

    pub(super) fn skip(src: &mut ByteCursor, n: usize) -> Result<(), FrameError> {
        if src.remaining() < n {
            return Err(FrameError::Incomplete);
        }
        src.advance(n);
        Ok(())
    }

    pub(super) fn get_decimal(src: &mut ByteCursor) -> Result<u64, FrameError> {
        let line = get_line(src)?;

        atoi::atoi::<u64>(line)
            .ok_or_else(|| FrameError::Invalid("invalid protocol decimal format".into()))
    }

    pub(super) fn get_signed(src: &mut ByteCursor) -> Result<i64, FrameError> {
        let invalid = || FrameError::Invalid("invalid protocol integer format".into());

        let line = get_line(src)?;
        let digits = line.strip_prefix(b"-").unwrap_or(line);
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }

        // Parsed with its sign so i64::MIN fits.
        std::str::from_utf8(line)
            .ok()
            .and_then(|line| line.parse::<i64>().ok())
            .ok_or_else(invalid)
    }

    // Length prefix of bulk strings and arrays. `-1` means null.
    pub(super) fn get_length(src: &mut ByteCursor, max: usize) -> Result<Option<usize>, FrameError> {
        if src.has_remaining() && src.chunk()[0] == b'-' {
            let line = get_line(src)?;
            return if line == b"-1" {
                Ok(None)
            } else {
                Err(FrameError::Invalid("negative length".into()))
            };
        }

        let len = get_decimal(src)? as usize;
        if len > max {
            return Err(FrameError::Invalid(format!(
                "length {} exceeds maximum {}",
                len, max
            )));
        }
        Ok(Some(len))
    }

    pub(super) fn get_string(src: &mut ByteCursor) -> Result<String, FrameError> {
        let line = get_line(src)?.to_vec();
        String::from_utf8(line).map_err(|e| FrameError::Invalid(e.to_string()))
    }

    pub(super) fn get_line<'a>(src: &'a mut ByteCursor) -> Result<&'a [u8], FrameError> {
        let start = src.position() as usize;
        let len = src.get_ref().len();
        if len < 2 {
            return Err(FrameError::Incomplete);
        }
        let end = len - 1;

        for i in start..end {
            if src.get_ref()[i] == DELIMITER[0] && src.get_ref()[i + 1] == DELIMITER[1] {
                src.set_position((i + 2) as u64);

                return Ok(&src.get_ref()[start..i]);
            }
        }

        Err(FrameError::Incomplete)
    }
}

//! Parser combinators and the `FromNetlink` trait for typed rtnetlink messages.

use winnow::binary::le_u16;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use super::error::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Trait for types that can be parsed from netlink wire format.
pub trait FromNetlink: Sized {
    /// Parse from a mutable byte slice reference.
    /// The slice is advanced past the consumed bytes.
    fn parse(input: &mut &[u8]) -> PResult<Self>;

    /// Parse from a complete message payload.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::parse
            .parse(data)
            .map_err(|e| Error::Parse(format!("{}", e)))
    }

    /// Write the fixed header required for dump requests.
    fn write_dump_header(_buf: &mut Vec<u8>) {}
}

/// Hard parse failure.
pub(crate) fn cut<T>() -> PResult<T> {
    Err(ErrMode::Cut(ContextError::new()))
}

/// Take a fixed-size header of `size` bytes.
pub(crate) fn header<'a>(input: &mut &'a [u8], size: usize) -> PResult<&'a [u8]> {
    if input.len() < size {
        return cut();
    }
    take(size).parse_next(input)
}

/// Consume the remaining input as a sequence of (type, payload) attributes.
///
/// Parsing stops at the first malformed attribute; whatever precedes it is kept.
pub(crate) fn attributes<'a>(input: &mut &'a [u8]) -> PResult<Vec<(u16, &'a [u8])>> {
    let mut attrs = Vec::new();

    while input.len() >= 4 {
        let len = le_u16.parse_next(input)? as usize;
        let attr_type = le_u16.parse_next(input)?;

        if len < 4 {
            break;
        }

        let payload_len = len - 4;
        if input.len() < payload_len {
            break;
        }

        let data: &[u8] = take(payload_len).parse_next(input)?;

        // Align to 4 bytes
        let padding = ((len + 3) & !3) - len;
        if input.len() >= padding {
            let _: &[u8] = take(padding).parse_next(input)?;
        }

        attrs.push((attr_type & 0x3FFF, data));
    }

    Ok(attrs)
}

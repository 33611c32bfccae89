//! Binary-XML token codes (§4.D).
//!
//! Grounded in the teacher's `binxml::tokens` module shape (one decode
//! function per token kind) but collapsed to a single enum discriminant
//! plus a shared high-bit flag, since this dialect's token table is a
//! fixed, closed set rather than the full EVTX token grammar the teacher
//! decodes.

use crate::error::{Error, Result};

/// The low seven bits of a BXML token byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    EndOfFile,
    OpenStartElementTag,
    CloseStartElementTag,
    CloseEmptyElementTag,
    EndElementTag,
    Value,
    Attribute,
    CdataSection,
    EntityRef,
    PiTarget,
    PiData,
    TemplateInstance,
    NormalSubstitution,
    OptionalSubstitution,
    Fragment,
}

const MORE_BIT: u8 = 0x80;

impl TokenKind {
    /// Decode a token byte into `(kind, has_more)`. `has_more` is the token
    /// stream's generic "more data follows" flag (§4.D); its only defined
    /// meaning in this format is on `OpenStartElementTag`, where it marks
    /// the presence of a 2-byte dependency id read before the element's
    /// size field. Every other token kind must carry it clear.
    pub fn from_u8(byte: u8, offset: u32) -> Result<(TokenKind, bool)> {
        let has_more = byte & MORE_BIT != 0;
        let code = byte & !MORE_BIT;
        let kind = match code {
            0x00 => TokenKind::EndOfFile,
            0x01 => TokenKind::OpenStartElementTag,
            0x02 => TokenKind::CloseStartElementTag,
            0x03 => TokenKind::CloseEmptyElementTag,
            0x04 => TokenKind::EndElementTag,
            0x05 => TokenKind::Value,
            0x06 => TokenKind::Attribute,
            0x07 => TokenKind::CdataSection,
            0x08 => TokenKind::EntityRef,
            0x0a => TokenKind::PiTarget,
            0x0b => TokenKind::PiData,
            0x0c => TokenKind::TemplateInstance,
            0x0d => TokenKind::NormalSubstitution,
            0x0e => TokenKind::OptionalSubstitution,
            0x0f => TokenKind::Fragment,
            _ => {
                return Err(Error::Malformed {
                    what: "unrecognized BXML token code",
                    offset,
                });
            }
        };
        if has_more && kind != TokenKind::OpenStartElementTag {
            return Err(Error::Malformed {
                what: "more-data bit set on a token kind that doesn't define it",
                offset,
            });
        }
        Ok((kind, has_more))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_tokens() {
        assert_eq!(
            TokenKind::from_u8(0x01, 0).unwrap(),
            (TokenKind::OpenStartElementTag, false)
        );
        assert_eq!(
            TokenKind::from_u8(0x0f, 0).unwrap(),
            (TokenKind::Fragment, false)
        );
    }

    #[test]
    fn decodes_open_start_element_with_dependency_id() {
        assert_eq!(
            TokenKind::from_u8(0x01 | 0x80, 0).unwrap(),
            (TokenKind::OpenStartElementTag, true)
        );
    }

    #[test]
    fn rejects_more_bit_on_tokens_that_dont_define_it() {
        assert!(TokenKind::from_u8(0x04 | 0x80, 0).is_err());
    }

    #[test]
    fn rejects_unknown_code() {
        assert!(TokenKind::from_u8(0x09, 0).is_err());
    }
}

//! Crate-wide error type.
//!
//! Shaped after `wevt_templates/manifest/error.rs`'s `WevtManifestError`: every
//! structural-bounds variant carries a `&'static str` "what" label plus the
//! offending offset so a caller can log a precise diagnosis without a backtrace.
//! Extended with the BXML-interpreter and rendering error kinds that the
//! manifest-only error type didn't need.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid signature at offset {offset}: expected {expected:?}, got {found:?}")]
    InvalidSignature {
        offset: u32,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("buffer too small for {what} at offset {offset} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        offset: u32,
        need: usize,
        have: usize,
    },

    #[error("offset {offset} out of bounds for {what} (len={len})")]
    OffsetOutOfBounds {
        what: &'static str,
        offset: u32,
        len: usize,
    },

    #[error("size {size} out of bounds for {what} at offset {offset}")]
    SizeOutOfBounds {
        what: &'static str,
        offset: u32,
        size: u32,
    },

    #[error("invalid count {count} for {what} at offset {offset}")]
    CountOutOfBounds {
        what: &'static str,
        offset: u32,
        count: u32,
    },

    #[error("invalid utf-16 string for {what} at offset {offset}")]
    InvalidUtf16String { what: &'static str, offset: u32 },

    #[error("invalid GUID for {what} at offset {offset}")]
    InvalidGuid { what: &'static str, offset: u32 },

    /// Malformed BXML: bad token byte, invalid state transition, or an
    /// internally inconsistent size. Carries the offset of the offending token.
    #[error("malformed BXML at offset {offset}: {what}")]
    Malformed { what: &'static str, offset: u32 },

    /// A value's type was set twice with conflicting base types, or a typed
    /// accessor (`as_u32`, ...) was called against the wrong `ValueType`.
    #[error("type mismatch for {what}: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        what: &'static str,
        expected: crate::value::ValueType,
        found: crate::value::ValueType,
    },

    /// A caller-provided output buffer was shorter than the computed size.
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    /// A Fragment header (token 0x0F) declared a major version this decoder
    /// does not recognize.
    #[error("unsupported BXML fragment major version {major} at offset {offset}")]
    UnsupportedVersion { major: u8, offset: u32 },

    /// Allocation failure while materializing a template's owned byte copy
    /// or a decoded string; surfaced rather than aborting the process.
    #[error("allocation failed while decoding {what}")]
    MemoryExhausted { what: &'static str },

    /// A BXML template reference formed a cycle. Carries the offset of the
    /// template that was already being expanded.
    #[error("cyclic template reference at offset {offset}")]
    CyclicTemplateReference { offset: u32 },
}

//! Caller-supplied ASCII/OEM code page for `ByteStreamString` rendering.
//!
//! Grounded in `wevt_templates/binxml.rs`'s `EncodingRef` parameter threaded
//! through every render entry point; this crate keeps the same `encoding`
//! dependency rather than hand-rolling code-page tables.

use encoding::{DecoderTrap, EncodingRef};

use crate::error::{Error, Result};

/// A code page used to decode `ByteStreamString` values. Defaults to
/// Windows-1252, the common case for ETW provider manifests.
#[derive(Clone, Copy)]
pub struct CodePage(pub EncodingRef);

impl CodePage {
    pub fn new(encoding: EncodingRef) -> Self {
        CodePage(encoding)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        self.0
            .decode(bytes, DecoderTrap::Replace)
            .map_err(|_| Error::InvalidUtf16String {
                what: "ByteStreamString",
                offset: 0,
            })
    }
}

impl Default for CodePage {
    fn default() -> Self {
        CodePage(encoding::all::WINDOWS_1252)
    }
}

impl std::fmt::Debug for CodePage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CodePage").field(&self.0.name()).finish()
    }
}

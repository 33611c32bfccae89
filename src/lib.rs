//! A decoder for WEVT_TEMPLATE manifest resources: the provider element
//! tables a Windows ETW manifest compiles into, and the Binary-XML event
//! templates they embed.
//!
//! This crate only reads the on-disk encoding described by its `CRIM`
//! container; it does not resolve message-table text, link across
//! providers, or parse `.evtx` log files (see `original_source` for that —
//! out of scope here).
//!
//! Entry point: [`open_manifest`], which decodes a `CRIM` blob into a
//! [`manifest::Manifest`]. From there, walk its `providers` field (or look
//! one up by GUID with [`manifest::Manifest::provider_by_identifier`]), then
//! a provider's `events`/`templates` fields, and call [`binxml::interpret`]
//! (via a provider as [`binxml::TemplateResolver`]) to expand a template's
//! BXML body into a [`tag::Tag`] tree ready for [`tag::Tag::as_xml_utf8`].

pub mod binxml;
pub mod codepage;
pub mod cursor;
pub mod diagnostics;
pub mod error;
pub mod manifest;
pub mod serializer;
pub mod tag;
pub mod template;
pub mod time_fmt;
pub mod value;

pub use error::{Error, Result};
pub use manifest::Manifest;

/// Decode a `CRIM` manifest blob (§4.H). The returned [`Manifest`] borrows
/// `bytes` for its lifetime.
pub fn open_manifest(bytes: &[u8]) -> Result<Manifest<'_>> {
    manifest::parse(bytes)
}

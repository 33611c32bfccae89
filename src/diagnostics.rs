//! Non-fatal diagnostics collected while resolving cross-references that
//! the format allows to dangle (§4.G: an event's `template_offset` that
//! matches no template in its provider).
//!
//! Grounded in `libfwevt_manifest.c`'s convention of logging unresolved
//! references inline during parsing rather than aborting; here they're
//! collected instead of logged so the caller decides what to do with them.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An event's `template_offset` did not match any template offset in
    /// the owning provider's template table.
    DanglingReference {
        provider_guid: String,
        event_identifier: u32,
        template_offset: u32,
    },
    /// A provider element-table entry used a type code this decoder
    /// doesn't recognize; bounds were validated but the table's contents
    /// weren't interpreted (§4.G).
    UnrecognizedTableTypeCode {
        provider_guid: String,
        type_code: u32,
        items_offset: u32,
    },
}

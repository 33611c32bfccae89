//! Manifest decoding: the `CRIM` container (§4.H), providers and their
//! element tables (§4.G, §4.F), re-exported as one flat module the way
//! `wevt_templates/manifest.rs` re-exports its `types`/`parse` split.

mod parse;
mod types;

pub use parse::parse;
pub use types::{
    BitmapMap, Channel, Event, EventKey, Keyword, Level, Manifest, ManifestIndex, Map, MapKind,
    Opcode, Provider, Task, ValueMap, ValueMapEntry,
};

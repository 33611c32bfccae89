//! Manifest decoder (§4.H), provider decoder (§4.G), and the per-kind
//! element decoders (§4.F).
//!
//! Grounded in `wevt_templates/manifest/parse.rs`'s field-by-field record
//! layouts (`parse_channels`/`parse_events`/`parse_keywords`/`parse_levels`/
//! `parse_opcodes`/`parse_tasks`/`parse_vmap`), which this crate's S2/S3
//! scenarios reuse byte-for-byte. The provider-level dispatch is not the
//! teacher's: the teacher looks up each element table by reading its real
//! 4-byte signature at a `(element_offset, unknown)` pair's offset, while
//! this crate follows the type-code-triple index literally as described —
//! see `DESIGN.md` for why.

use winstructs::guid::Guid;

use crate::cursor::{
    checked_end, read_array_named, read_sig_named, read_u16_named, read_u32_named,
    read_u64_named, read_u8_named, require_len, u32_to_usize, usize_to_u32_saturating,
};
use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::template::{self, Template};

use super::types::*;

const ABSENT_U32: u32 = 0xffff_ffff;

fn opt_message_id(raw: u32) -> Option<u32> {
    if raw == ABSENT_U32 { None } else { Some(raw) }
}

fn read_guid(data: &[u8], off: usize, what: &'static str) -> Result<Guid> {
    let bytes: [u8; 16] = read_array_named(data, off, what)?;
    Guid::from_reader(&mut std::io::Cursor::new(&bytes[..]))
        .map_err(|_| Error::InvalidGuid { what, offset: off as u32 })
}

/// A UTF-16LE name block: `length(u32, includes the 4-byte prefix),
/// utf16[length-4]`, trimming a trailing NUL code unit when present.
fn read_name_block(data: &[u8], off: u32, what: &'static str) -> Result<String> {
    let off_usize = u32_to_usize(off, what, data.len())?;
    require_len(data, off_usize, 4, what)?;
    let length = read_u32_named(data, off_usize, what)?;
    if length < 4 {
        return Err(Error::SizeOutOfBounds { what, offset: off, size: length });
    }
    let length_usize = usize::try_from(length).map_err(|_| Error::SizeOutOfBounds {
        what,
        offset: off,
        size: length,
    })?;
    require_len(data, off_usize, length_usize, what)?;
    let mut units: Vec<u16> = data[off_usize + 4..off_usize + length_usize]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    if units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16(&units).map_err(|_| Error::InvalidUtf16String { what, offset: off })
}

/// Decode a `CRIM` manifest blob.
pub fn parse(data: &[u8]) -> Result<Manifest<'_>> {
    let header = parse_crim_header(data)?;
    let size_usize = u32_to_usize(header.size, "CRIM.size", data.len())?;
    let data = &data[..size_usize];

    let provider_count = usize::try_from(header.provider_count).map_err(|_| Error::CountOutOfBounds {
        what: "CRIM.provider_count",
        offset: 12,
        count: header.provider_count,
    })?;
    let providers_off = 16usize;
    let desc_size = 20usize;
    let needed = provider_count
        .checked_mul(desc_size)
        .ok_or(Error::CountOutOfBounds {
            what: "CRIM.provider_count",
            offset: 12,
            count: header.provider_count,
        })?;
    require_len(data, providers_off, needed, "CRIM provider descriptor array")?;

    let mut providers = Vec::with_capacity(provider_count);
    let mut diagnostics = Vec::new();
    for i in 0..provider_count {
        let desc_off = providers_off + i * desc_size;
        let guid = read_guid(data, desc_off, "CRIM.provider.guid")?;
        let provider_off = read_u32_named(data, desc_off + 16, "CRIM.provider.offset")?;
        let provider = parse_provider(data, guid, provider_off, &mut diagnostics)?;
        providers.push(provider);
    }

    Ok(Manifest {
        data,
        major_version: header.major_version,
        minor_version: header.minor_version,
        providers,
        diagnostics,
    })
}

fn parse_crim_header(data: &[u8]) -> Result<CrimHeader> {
    require_len(data, 0, 16, "CRIM header")?;
    let sig = read_sig_named(data, 0, "CRIM signature")?;
    if sig != *b"CRIM" {
        return Err(Error::InvalidSignature { offset: 0, expected: *b"CRIM", found: sig });
    }
    let size = read_u32_named(data, 4, "CRIM.size")?;
    if size < 16 {
        return Err(Error::SizeOutOfBounds { what: "CRIM.size", offset: 0, size });
    }
    let major_version = read_u16_named(data, 8, "CRIM.major_version")?;
    let minor_version = read_u16_named(data, 10, "CRIM.minor_version")?;
    let provider_count = read_u32_named(data, 12, "CRIM.provider_count")?;
    Ok(CrimHeader { size, major_version, minor_version, provider_count })
}

/// The `WEVT` header at a provider's `data_offset`: signature, size, an
/// optional message identifier, then the element-table index (§4.G).
fn parse_provider<'a>(
    data: &'a [u8],
    guid: Guid,
    data_offset: u32,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Provider<'a>> {
    let off = u32_to_usize(data_offset, "WEVT provider offset", data.len())?;
    require_len(data, off, 16, "WEVT header")?;
    let sig = read_sig_named(data, off, "WEVT signature")?;
    if sig != *b"WEVT" {
        return Err(Error::InvalidSignature { offset: data_offset, expected: *b"WEVT", found: sig });
    }
    let _size = read_u32_named(data, off + 4, "WEVT.size")?;
    let message_identifier = opt_message_id(read_u32_named(data, off + 8, "WEVT.message_identifier")?);
    let num_entries = read_u32_named(data, off + 12, "WEVT.num_entries")?;

    let entry_count = usize::try_from(num_entries).map_err(|_| Error::CountOutOfBounds {
        what: "WEVT.num_entries",
        offset: data_offset + 12,
        count: num_entries,
    })?;
    let entries_off = off + 16;
    let entries_bytes = entry_count.checked_mul(12).ok_or(Error::CountOutOfBounds {
        what: "WEVT.num_entries",
        offset: data_offset + 12,
        count: num_entries,
    })?;
    require_len(data, entries_off, entries_bytes, "WEVT element-table index")?;

    let provider_guid = guid.to_string();
    let mut provider = Provider {
        identifier: guid,
        offset: data_offset,
        message_identifier,
        channels: Vec::new(),
        events: Vec::new(),
        keywords: Vec::new(),
        levels: Vec::new(),
        opcodes: Vec::new(),
        tasks: Vec::new(),
        maps: Vec::new(),
        templates: Vec::new(),
    };

    for i in 0..entry_count {
        let e_off = entries_off + i * 12;
        let entry = ElementTableEntry {
            type_code: read_u32_named(data, e_off, "WEVT.entry.type_code")?,
            count: read_u32_named(data, e_off + 4, "WEVT.entry.count")?,
            items_offset: read_u32_named(data, e_off + 8, "WEVT.entry.items_offset")?,
        };
        let ElementTableEntry { type_code, count, items_offset } = entry;

        match type_code {
            0x01 => {
                expect_table_signature(data, items_offset, b"LEVL")?;
                provider.levels = parse_levels(data, items_offset, count)?;
            }
            0x02 => {
                expect_table_signature(data, items_offset, b"TASK")?;
                provider.tasks = parse_tasks(data, items_offset, count)?;
            }
            0x03 => {
                expect_table_signature(data, items_offset, b"OPCO")?;
                provider.opcodes = parse_opcodes(data, items_offset, count)?;
            }
            0x04 => {
                expect_table_signature(data, items_offset, b"KEYW")?;
                provider.keywords = parse_keywords(data, items_offset, count)?;
            }
            0x05 => {
                expect_table_signature(data, items_offset, b"CHAN")?;
                provider.channels = parse_channels(data, items_offset, count)?;
            }
            0x06 => {
                expect_table_signature(data, items_offset, b"TTBL")?;
                provider.templates = parse_templates(data, items_offset, count)?;
            }
            0x07 => {
                expect_table_signature(data, items_offset, b"EVTN")?;
                provider.events = parse_events(data, items_offset, count)?;
            }
            0x08 => {
                expect_table_signature(data, items_offset, b"MAPS")?;
                provider.maps = parse_maps(data, items_offset, count)?;
            }
            _ => {
                // Unknown type code: bounds-validate only, per §4.G.
                let items_off_usize = u32_to_usize(items_offset, "WEVT.entry.items_offset", data.len())?;
                require_len(data, items_off_usize, 0, "WEVT unknown element table")?;
                log::debug!(
                    "provider {provider_guid}: skipping element table of unrecognized type code {type_code:#x} at {items_offset:#x}"
                );
                diagnostics.push(Diagnostic::UnrecognizedTableTypeCode {
                    provider_guid: provider_guid.clone(),
                    type_code,
                    items_offset,
                });
            }
        }
    }

    for event in &provider.events {
        let Some(template_offset) = event.template_offset else { continue };
        if provider.template_by_offset(template_offset).is_none() {
            log::warn!(
                "provider {provider_guid}: event {} references template at {template_offset:#x}, which this provider doesn't carry",
                event.identifier
            );
            diagnostics.push(Diagnostic::DanglingReference {
                provider_guid: provider_guid.clone(),
                event_identifier: event.identifier,
                template_offset,
            });
        }
    }

    log::debug!("provider {provider_guid}: decoded {} event(s), {} template(s)", provider.events.len(), provider.templates.len());
    Ok(provider)
}

fn expect_table_signature(data: &[u8], items_offset: u32, expected: &[u8; 4]) -> Result<()> {
    let off = u32_to_usize(items_offset, "element table signature", data.len())?;
    require_len(data, off, 4, "element table signature")?;
    let found = read_sig_named(data, off, "element table signature")?;
    if &found != expected {
        return Err(Error::InvalidSignature { offset: items_offset, expected: *expected, found });
    }
    Ok(())
}

/// `items_offset` points at the table's own 4-byte signature (§4.G); every
/// per-kind record array starts immediately after it.
fn records_offset(items_offset: u32) -> u32 {
    items_offset + 4
}

fn parse_channels(data: &[u8], items_offset: u32, count: u32) -> Result<Vec<Channel>> {
    let records_off = records_offset(items_offset);
    let count_usize = usize::try_from(count).map_err(|_| Error::CountOutOfBounds {
        what: "CHAN.count",
        offset: items_offset,
        count,
    })?;
    let off_usize = u32_to_usize(records_off, "CHAN records", data.len())?;
    let needed = count_usize.checked_mul(16).ok_or(Error::CountOutOfBounds {
        what: "CHAN.count",
        offset: items_offset,
        count,
    })?;
    require_len(data, off_usize, needed, "CHAN definitions array")?;

    let mut channels = Vec::with_capacity(count_usize);
    for i in 0..count_usize {
        let d_off = off_usize + i * 16;
        let identifier = read_u32_named(data, d_off, "CHAN.identifier")?;
        let name_offset = read_u32_named(data, d_off + 4, "CHAN.name_offset")?;
        let flags = read_u32_named(data, d_off + 8, "CHAN.flags")?;
        let message_identifier = opt_message_id(read_u32_named(data, d_off + 12, "CHAN.message_identifier")?);
        let name = if name_offset == 0 {
            None
        } else {
            Some(read_name_block(data, name_offset, "CHAN name")?)
        };
        channels.push(Channel { identifier, flags, message_identifier, name_offset, name });
    }
    Ok(channels)
}

fn parse_events(data: &[u8], items_offset: u32, count: u32) -> Result<Vec<Event>> {
    let records_off = records_offset(items_offset);
    let count_usize = usize::try_from(count).map_err(|_| Error::CountOutOfBounds {
        what: "EVTN.count",
        offset: items_offset,
        count,
    })?;
    let off_usize = u32_to_usize(records_off, "EVTN records", data.len())?;
    let needed = count_usize.checked_mul(48).ok_or(Error::CountOutOfBounds {
        what: "EVTN.count",
        offset: items_offset,
        count,
    })?;
    require_len(data, off_usize, needed, "EVTN event array")?;

    let mut events = Vec::with_capacity(count_usize);
    for i in 0..count_usize {
        let e_off = off_usize + i * 48;
        // On-wire the identifier is u16; widened to u32 in the data model.
        let identifier = read_u16_named(data, e_off, "EVTN.event.identifier")? as u32;
        let version = read_u8_named(data, e_off + 2, "EVTN.event.version")?;
        let channel = read_u8_named(data, e_off + 3, "EVTN.event.channel")?;
        let level = read_u8_named(data, e_off + 4, "EVTN.event.level")?;
        let opcode = read_u8_named(data, e_off + 5, "EVTN.event.opcode")?;
        let task = read_u16_named(data, e_off + 6, "EVTN.event.task")?;
        let keyword = read_u64_named(data, e_off + 8, "EVTN.event.keyword")?;
        let message_identifier = read_u32_named(data, e_off + 16, "EVTN.event.message_identifier")?;
        let template_offset_raw = read_u32_named(data, e_off + 20, "EVTN.event.template_offset")?;
        // offsets +24/+28/+32 (opcode/level/task links) and +36/+40 (an
        // unknown count/offset pair) aren't part of this data model.
        let flags = read_u32_named(data, e_off + 44, "EVTN.event.flags")?;

        events.push(Event {
            identifier,
            version,
            channel,
            level,
            opcode,
            task,
            keyword,
            message_identifier,
            template_offset: if template_offset_raw == 0 { None } else { Some(template_offset_raw) },
            flags,
        });
    }
    Ok(events)
}

fn parse_keywords(data: &[u8], items_offset: u32, count: u32) -> Result<Vec<Keyword>> {
    let records_off = records_offset(items_offset);
    let count_usize = usize::try_from(count).map_err(|_| Error::CountOutOfBounds {
        what: "KEYW.count",
        offset: items_offset,
        count,
    })?;
    let off_usize = u32_to_usize(records_off, "KEYW records", data.len())?;
    let needed = count_usize.checked_mul(16).ok_or(Error::CountOutOfBounds {
        what: "KEYW.count",
        offset: items_offset,
        count,
    })?;
    require_len(data, off_usize, needed, "KEYW definitions array")?;

    let mut keywords = Vec::with_capacity(count_usize);
    for i in 0..count_usize {
        let d_off = off_usize + i * 16;
        let identifier = read_u64_named(data, d_off, "KEYW.identifier")?;
        let message_identifier = opt_message_id(read_u32_named(data, d_off + 8, "KEYW.message_identifier")?);
        let name_offset = read_u32_named(data, d_off + 12, "KEYW.name_offset")?;
        let name = if name_offset == 0 {
            None
        } else {
            Some(read_name_block(data, name_offset, "KEYW name")?)
        };
        keywords.push(Keyword { identifier, message_identifier, name_offset, name });
    }
    Ok(keywords)
}

/// Shared by LEVL and OPCO: both are `(identifier(u32), message_id(u32),
/// name_offset(u32))`, 12 bytes (S2, S3).
fn parse_ident_msg_name_table(
    data: &[u8],
    items_offset: u32,
    count: u32,
    what: &'static str,
) -> Result<Vec<(u32, Option<u32>, u32, Option<String>)>> {
    let records_off = records_offset(items_offset);
    let count_usize = usize::try_from(count).map_err(|_| Error::CountOutOfBounds {
        what,
        offset: items_offset,
        count,
    })?;
    let off_usize = u32_to_usize(records_off, what, data.len())?;
    let needed = count_usize.checked_mul(12).ok_or(Error::CountOutOfBounds {
        what,
        offset: items_offset,
        count,
    })?;
    require_len(data, off_usize, needed, what)?;

    let mut out = Vec::with_capacity(count_usize);
    for i in 0..count_usize {
        let d_off = off_usize + i * 12;
        let identifier = read_u32_named(data, d_off, what)?;
        let message_identifier = opt_message_id(read_u32_named(data, d_off + 4, what)?);
        let name_offset = read_u32_named(data, d_off + 8, what)?;
        let name = if name_offset == 0 {
            None
        } else {
            Some(read_name_block(data, name_offset, what)?)
        };
        out.push((identifier, message_identifier, name_offset, name));
    }
    Ok(out)
}

fn parse_levels(data: &[u8], items_offset: u32, count: u32) -> Result<Vec<Level>> {
    parse_ident_msg_name_table(data, items_offset, count, "LEVL record")
        .map(|rows| {
            rows.into_iter()
                .map(|(identifier, message_identifier, name_offset, name)| Level {
                    identifier,
                    message_identifier,
                    name_offset,
                    name,
                })
                .collect()
        })
}

fn parse_opcodes(data: &[u8], items_offset: u32, count: u32) -> Result<Vec<Opcode>> {
    parse_ident_msg_name_table(data, items_offset, count, "OPCO record")
        .map(|rows| {
            rows.into_iter()
                .map(|(identifier, message_identifier, name_offset, name)| Opcode {
                    identifier,
                    message_identifier,
                    name_offset,
                    name,
                })
                .collect()
        })
}

fn parse_tasks(data: &[u8], items_offset: u32, count: u32) -> Result<Vec<Task>> {
    let records_off = records_offset(items_offset);
    let count_usize = usize::try_from(count).map_err(|_| Error::CountOutOfBounds {
        what: "TASK.count",
        offset: items_offset,
        count,
    })?;
    let off_usize = u32_to_usize(records_off, "TASK records", data.len())?;
    let needed = count_usize.checked_mul(28).ok_or(Error::CountOutOfBounds {
        what: "TASK.count",
        offset: items_offset,
        count,
    })?;
    require_len(data, off_usize, needed, "TASK definitions array")?;

    let mut tasks = Vec::with_capacity(count_usize);
    for i in 0..count_usize {
        let d_off = off_usize + i * 28;
        // On-wire the identifier is u32; the data model's Task.identifier
        // keeps the low 16 bits (the width Event.task links against).
        let identifier_raw = read_u32_named(data, d_off, "TASK.identifier")?;
        let message_identifier = opt_message_id(read_u32_named(data, d_off + 4, "TASK.message_identifier")?);
        // offset +8, 16 bytes: mui_identifier GUID, not part of this data model.
        let name_offset = read_u32_named(data, d_off + 24, "TASK.name_offset")?;
        let name = if name_offset == 0 {
            None
        } else {
            Some(read_name_block(data, name_offset, "TASK name")?)
        };
        tasks.push(Task {
            identifier: identifier_raw as u16,
            message_identifier,
            name_offset,
            name,
        });
    }
    Ok(tasks)
}

fn parse_templates(data: &[u8], items_offset: u32, count: u32) -> Result<Vec<Template>> {
    let records_off = records_offset(items_offset);
    let count_usize = usize::try_from(count).map_err(|_| Error::CountOutOfBounds {
        what: "TTBL.count",
        offset: items_offset,
        count,
    })?;
    let mut templates = Vec::with_capacity(count_usize);
    let mut cur = records_off;
    for _ in 0..count_usize {
        let t = template::parse(data, cur)?;
        cur = cur.checked_add(t.size).ok_or(Error::SizeOutOfBounds {
            what: "TEMP.size",
            offset: cur,
            size: t.size,
        })?;
        templates.push(t);
    }
    Ok(templates)
}

fn parse_maps<'a>(data: &'a [u8], items_offset: u32, count: u32) -> Result<Vec<Map<'a>>> {
    let records_off = records_offset(items_offset);
    let count_usize = usize::try_from(count).map_err(|_| Error::CountOutOfBounds {
        what: "MAPS.count",
        offset: items_offset,
        count,
    })?;
    let off_usize = u32_to_usize(records_off, "MAPS offsets array", data.len())?;
    let needed = count_usize.checked_mul(4).ok_or(Error::CountOutOfBounds {
        what: "MAPS.count",
        offset: items_offset,
        count,
    })?;
    require_len(data, off_usize, needed, "MAPS offsets array")?;

    let mut map_offsets = Vec::with_capacity(count_usize);
    for i in 0..count_usize {
        map_offsets.push(read_u32_named(data, off_usize + i * 4, "MAPS.map_offset")?);
    }

    let mut maps = Vec::with_capacity(map_offsets.len());
    for &map_off in &map_offsets {
        let map_off_usize = u32_to_usize(map_off, "MAPS map offset", data.len())?;
        require_len(data, map_off_usize, 4, "MAPS map signature")?;
        let sig = read_sig_named(data, map_off_usize, "MAPS map signature")?;
        let kind = match &sig {
            b"VMAP" => MapKind::Value(parse_vmap(data, map_off)?),
            b"BMAP" => {
                let size = read_u32_named(data, map_off_usize + 4, "BMAP.size")?;
                let end = checked_end(data.len(), map_off, size, "BMAP.size")?;
                MapKind::Bitmap(BitmapMap { data: &data[map_off_usize..end] })
            }
            _ => {
                let size = read_u32_named(data, map_off_usize + 4, "unknown map size").unwrap_or(4);
                let end = (map_off_usize + size as usize).min(data.len());
                MapKind::Unknown { signature: sig, data: &data[map_off_usize..end] }
            }
        };
        maps.push(Map { offset: map_off, kind });
    }
    Ok(maps)
}

fn parse_vmap(data: &[u8], off: u32) -> Result<ValueMap> {
    let off_usize = u32_to_usize(off, "VMAP offset", data.len())?;
    require_len(data, off_usize, 16, "VMAP header")?;
    let sig = read_sig_named(data, off_usize, "VMAP signature")?;
    if sig != *b"VMAP" {
        return Err(Error::InvalidSignature { offset: off, expected: *b"VMAP", found: sig });
    }
    let size = read_u32_named(data, off_usize + 4, "VMAP.size")?;
    let name_offset = read_u32_named(data, off_usize + 8, "VMAP.name_offset")?;
    let entry_count = read_u32_named(data, off_usize + 12, "VMAP.entry_count")?;
    let end = checked_end(data.len(), off, size, "VMAP.size")?;

    let entry_count_usize = usize::try_from(entry_count).map_err(|_| Error::CountOutOfBounds {
        what: "VMAP.entry_count",
        offset: off + 12,
        count: entry_count,
    })?;
    let entries_off = off_usize + 16;
    let entries_bytes = entry_count_usize.checked_mul(8).ok_or(Error::CountOutOfBounds {
        what: "VMAP.entry_count",
        offset: off + 12,
        count: entry_count,
    })?;
    if entries_off + entries_bytes > end {
        return Err(Error::SizeOutOfBounds { what: "VMAP entries array", offset: off, size });
    }

    let mut entries = Vec::with_capacity(entry_count_usize);
    for i in 0..entry_count_usize {
        let e_off = entries_off + i * 8;
        let value = read_u32_named(data, e_off, "VMAP.entry.value")?;
        let message_identifier = opt_message_id(read_u32_named(data, e_off + 4, "VMAP.entry.message_identifier")?);
        entries.push(ValueMapEntry { value, message_identifier });
    }

    let name = if name_offset == 0 {
        None
    } else {
        Some(read_name_block(data, name_offset, "VMAP name")?)
    };

    Ok(ValueMap { size, name_offset, name, entries })
}

#[allow(dead_code)]
fn to_u32(v: usize) -> u32 {
    usize_to_u32_saturating(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_empty_manifest() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"CRIM");
        blob.extend_from_slice(&16u32.to_le_bytes());
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());

        let manifest = parse(&blob).unwrap();
        assert_eq!((manifest.major_version, manifest.minor_version), (1, 1));
        assert_eq!(manifest.providers.len(), 0);
    }

    #[test]
    fn provider_by_identifier_finds_a_matching_guid_and_rejects_others() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"CRIM");
        blob.extend_from_slice(&0u32.to_le_bytes()); // size, patched below
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&1u32.to_le_bytes()); // provider_count

        let guid_bytes = [
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
            0xff, 0x00,
        ];
        let provider_off = 16u32 + 20;
        blob.extend_from_slice(&guid_bytes);
        blob.extend_from_slice(&provider_off.to_le_bytes());

        blob.extend_from_slice(b"WEVT");
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes()); // num_entries

        let total = blob.len() as u32;
        blob[4..8].copy_from_slice(&total.to_le_bytes());

        let manifest = parse(&blob).unwrap();
        let guid = read_guid(&guid_bytes, 0, "test guid").unwrap();
        assert!(manifest.provider_by_identifier(&guid).is_some());

        let other = read_guid(&[0u8; 16], 0, "zero guid").unwrap();
        assert!(manifest.provider_by_identifier(&other).is_none());
    }

    #[test]
    fn s2_level_record() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&4u32.to_le_bytes());
        blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        blob.extend_from_slice(&0x0Cu32.to_le_bytes());
        blob.extend_from_slice(&0x28u32.to_le_bytes());
        let name: Vec<u16> = "win:Informational".encode_utf16().collect();
        for u in name {
            blob.extend_from_slice(&u.to_le_bytes());
        }
        blob.extend_from_slice(&0u16.to_le_bytes()); // trailing NUL, counted in the 0x28 length

        let identifier = read_u32_named(&blob, 0, "LEVL.identifier").unwrap();
        let msg_raw = read_u32_named(&blob, 4, "LEVL.message_identifier").unwrap();
        let name_offset = read_u32_named(&blob, 8, "LEVL.name_offset").unwrap();
        let name = read_name_block(&blob, name_offset, "LEVL name").unwrap();

        assert_eq!(identifier, 4);
        assert_eq!(opt_message_id(msg_raw), None);
        assert_eq!(name, "win:Informational");
    }

    #[test]
    fn s3_opcode_record() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        blob.extend_from_slice(&0x0Cu32.to_le_bytes());
        blob.extend_from_slice(&0x16u32.to_le_bytes());
        let name: Vec<u16> = "win:Info".encode_utf16().collect();
        for u in name {
            blob.extend_from_slice(&u.to_le_bytes());
        }
        blob.extend_from_slice(&0u16.to_le_bytes()); // trailing NUL, counted in the 0x16 length

        let identifier = read_u32_named(&blob, 0, "OPCO.identifier").unwrap();
        let msg_raw = read_u32_named(&blob, 4, "OPCO.message_identifier").unwrap();
        let name_offset = read_u32_named(&blob, 8, "OPCO.name_offset").unwrap();
        let name = read_name_block(&blob, name_offset, "OPCO name").unwrap();

        assert_eq!(identifier, 0);
        assert_eq!(opt_message_id(msg_raw), None);
        assert_eq!(name, "win:Info");
    }

    #[test]
    fn s7_dangling_event_reports_diagnostic_without_failing() {
        let mut diagnostics = Vec::new();
        let mut provider_blob = Vec::new();
        provider_blob.extend_from_slice(b"WEVT");
        provider_blob.extend_from_slice(&0u32.to_le_bytes()); // size (unused)
        provider_blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // message_identifier
        provider_blob.extend_from_slice(&1u32.to_le_bytes()); // num_entries

        // entry: type_code=0x07 (EVTN), count=1, items_offset
        let entries_off = 16u32;
        let items_offset = entries_off + 12;
        provider_blob.extend_from_slice(&7u32.to_le_bytes());
        provider_blob.extend_from_slice(&1u32.to_le_bytes());
        provider_blob.extend_from_slice(&items_offset.to_le_bytes());

        provider_blob.extend_from_slice(b"EVTN");
        // one 48-byte event record, template_offset = 0x1000
        let mut ev = vec![0u8; 48];
        ev[20..24].copy_from_slice(&0x1000u32.to_le_bytes());
        provider_blob.extend_from_slice(&ev);

        let guid = Guid::from_reader(&mut std::io::Cursor::new(&[0u8; 16][..])).unwrap();
        let provider = parse_provider(&provider_blob, guid, 0, &mut diagnostics).unwrap();
        assert_eq!(provider.events.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(diagnostics[0], Diagnostic::DanglingReference { template_offset: 0x1000, .. }));
    }
}

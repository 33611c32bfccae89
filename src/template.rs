//! Template decoder (§4.E): the TEMP header, the template-item descriptor
//! table, and the bounds of the embedded BXML body.
//!
//! Grounded in `wevt_templates/manifest/parse.rs::parse_ttbl` and
//! `::parse_template_items`, following §6's literal TEMP header table: a
//! 20-byte run of fixed fields, a 4-byte reserved field, then the 16-byte
//! GUID — 40 bytes of header before any item descriptor or BXML byte,
//! matching the teacher's `TEMP_BINXML_OFFSET`. Owns its raw bytes outright
//! per §3's Lifecycles note, rather than borrowing from the CRIM blob the
//! way every other element type does.

use bitflags::bitflags;
use winstructs::guid::Guid;

use crate::cursor::{
    checked_end, read_array_named, read_sig_named, read_u16_named, read_u32_named,
    read_u8_named, require_len, u32_to_usize,
};
use crate::error::{Error, Result};
use crate::value::ValueType;

/// Minimum `TEMP.size` accepted, and the `header_size` §4.E step 2 uses for
/// the `items_offset` lower-bound invariant (S6's scenario uses this exact
/// constant: `items_offset < data_offset + 20` ⇒ *OutOfBounds*).
const TEMP_HEADER_SIZE: u32 = 20;
/// Full on-disk header length before any item descriptor or BXML byte: the
/// 20-byte fixed run, a 4-byte reserved field, and the 16-byte GUID (§6).
const TEMP_FULL_HEADER_SIZE: u32 = 40;
const ITEM_DESCRIPTOR_SIZE: usize = 20;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TemplateValueFlags: u32 {
        const IS_DEFINITION = 0x01;
    }
}

/// A decoded `TEMP` record: header fields, an owned copy of the template's
/// raw bytes, its item descriptor table, and the range of those raw bytes
/// that holds the embedded BXML document.
#[derive(Debug, Clone)]
pub struct Template {
    pub offset: u32,
    pub size: u32,
    pub num_descriptors: u32,
    pub num_names: u32,
    pub items_offset: u32,
    pub identifier: Guid,
    /// Owned copy of `[offset, offset+size)` from the manifest blob.
    pub raw: Vec<u8>,
    pub items: Vec<TemplateItem>,
    /// Definition-form values, parallel to `items`, shared by reference
    /// with the BXML interpreter during a render so that substitutions can
    /// bind to them.
    pub values: Vec<TemplateValue>,
    /// Range within `raw` holding the embedded Binary-XML document.
    binxml_range: (usize, usize),
}

impl Template {
    pub fn binxml(&self) -> &[u8] {
        &self.raw[self.binxml_range.0..self.binxml_range.1]
    }

    /// The `(start, end)` indices of the embedded BXML document within
    /// `raw`, for interpreters that need to resolve name-offsets against
    /// the template's full raw buffer rather than just the BXML slice
    /// (names a BXML token references may live anywhere in `raw`, not only
    /// within the BXML byte range itself).
    pub fn binxml_bounds(&self) -> (usize, usize) {
        self.binxml_range
    }
}

#[derive(Debug, Clone)]
pub struct TemplateItem {
    pub input_type: u8,
    pub output_type: u8,
    pub value_count: u16,
    pub value_size: u16,
    pub name_offset: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateValue {
    pub ty: ValueType,
    pub name_offset: u32,
    pub initial_size: u16,
    pub flags: TemplateValueFlags,
}

/// Decode the `TEMP` record starting at the absolute offset `data_offset`
/// within `blob`.
pub fn parse(blob: &[u8], data_offset: u32) -> Result<Template> {
    let off = u32_to_usize(data_offset, "TEMP offset", blob.len())?;
    require_len(blob, off, TEMP_FULL_HEADER_SIZE as usize, "TEMP header")?;

    let sig = read_sig_named(blob, off, "TEMP signature")?;
    if sig != *b"TEMP" {
        return Err(Error::InvalidSignature {
            offset: data_offset,
            expected: *b"TEMP",
            found: sig,
        });
    }

    let size = read_u32_named(blob, off + 4, "TEMP.size")?;
    if size < TEMP_HEADER_SIZE {
        return Err(Error::SizeOutOfBounds {
            what: "TEMP.size",
            offset: data_offset,
            size,
        });
    }
    let end = checked_end(blob.len(), data_offset, size, "TEMP.size")?;

    let num_descriptors = read_u32_named(blob, off + 8, "TEMP.num_descriptors")?;
    let num_names = read_u32_named(blob, off + 12, "TEMP.num_names")?;
    let items_offset = read_u32_named(blob, off + 16, "TEMP.items_offset")?;
    // offset 20: reserved (ignored)
    let identifier_bytes: [u8; 16] = read_array_named(blob, off + 24, "TEMP.identifier")?;
    let identifier = Guid::from_reader(&mut std::io::Cursor::new(&identifier_bytes[..]))
        .map_err(|_| Error::InvalidGuid {
            what: "TEMP.identifier",
            offset: data_offset + 24,
        })?;

    // §3 invariant / S6: items_offset is either 0, data_offset+size (no
    // items), or strictly between data_offset+header_size and
    // data_offset+size.
    let header_end = data_offset + TEMP_HEADER_SIZE;
    if items_offset != 0 && items_offset < header_end {
        return Err(Error::OffsetOutOfBounds {
            what: "TEMP.items_offset",
            offset: items_offset,
            len: end,
        });
    }
    if items_offset != 0 && items_offset > data_offset + size {
        return Err(Error::OffsetOutOfBounds {
            what: "TEMP.items_offset",
            offset: items_offset,
            len: end,
        });
    }

    if size < TEMP_FULL_HEADER_SIZE {
        return Err(Error::SizeOutOfBounds {
            what: "TEMP.size (header truncated)",
            offset: data_offset,
            size,
        });
    }

    let raw = blob[off..end].to_vec();

    let binxml_end_abs = if items_offset == 0 {
        data_offset + size
    } else {
        items_offset
    };
    let binxml_start_rel = TEMP_FULL_HEADER_SIZE as usize;
    let binxml_end_rel = (binxml_end_abs - data_offset) as usize;
    if binxml_end_rel < binxml_start_rel || binxml_end_rel > raw.len() {
        return Err(Error::OffsetOutOfBounds {
            what: "TEMP binxml range",
            offset: binxml_end_abs,
            len: end,
        });
    }

    let (items, values) = if num_descriptors == 0 {
        (Vec::new(), Vec::new())
    } else {
        parse_item_table(&raw, data_offset, num_descriptors, items_offset)?
    };

    Ok(Template {
        offset: data_offset,
        size,
        num_descriptors,
        num_names,
        items_offset,
        identifier,
        raw,
        items,
        values,
        binxml_range: (binxml_start_rel, binxml_end_rel),
    })
}

fn parse_item_table(
    raw: &[u8],
    template_offset: u32,
    num_descriptors: u32,
    items_offset_abs: u32,
) -> Result<(Vec<TemplateItem>, Vec<TemplateValue>)> {
    let count = usize::try_from(num_descriptors).map_err(|_| Error::CountOutOfBounds {
        what: "TEMP.num_descriptors",
        offset: template_offset + 8,
        count: num_descriptors,
    })?;

    if items_offset_abs < template_offset {
        return Err(Error::OffsetOutOfBounds {
            what: "TEMP.items_offset",
            offset: items_offset_abs,
            len: raw.len(),
        });
    }
    let items_rel = u32_to_usize(
        items_offset_abs - template_offset,
        "TEMP.items_offset (relative)",
        raw.len(),
    )?;

    let mut items = Vec::with_capacity(count);
    let mut values = Vec::with_capacity(count);
    let mut first_name_offset: Option<u32> = None;
    let mut cur = items_rel;

    for _ in 0..count {
        if let Some(bound) = first_name_offset {
            let bound_rel = u32_to_usize(
                bound.saturating_sub(template_offset).max(0) as u32,
                "TEMP item descriptor bound",
                raw.len(),
            )
            .unwrap_or(raw.len());
            if cur >= bound_rel {
                break;
            }
        }
        require_len(raw, cur, ITEM_DESCRIPTOR_SIZE, "TEMP item descriptor")?;
        let input_type = read_u8_named(raw, cur + 4, "TEMP.item.input_type")?;
        let output_type = read_u8_named(raw, cur + 5, "TEMP.item.output_type")?;
        let value_count = read_u16_named(raw, cur + 12, "TEMP.item.value_count")?;
        let value_size = read_u16_named(raw, cur + 14, "TEMP.item.value_size")?;
        let name_offset = read_u32_named(raw, cur + 16, "TEMP.item.name_offset")?;

        if first_name_offset.is_none() {
            first_name_offset = Some(name_offset);
        }

        let (ty, _is_array) = ValueType::from_u8(input_type & 0x7f).ok_or(Error::Malformed {
            what: "unrecognized TEMP item input_type",
            offset: template_offset + cur as u32 + 4,
        })?;

        items.push(TemplateItem {
            input_type,
            output_type,
            value_count,
            value_size,
            name_offset,
            name: None,
        });
        values.push(TemplateValue {
            ty,
            name_offset,
            initial_size: 0,
            flags: TemplateValueFlags::IS_DEFINITION,
        });

        cur += ITEM_DESCRIPTOR_SIZE;
    }

    for item in items.iter_mut() {
        if item.name_offset == 0 {
            continue;
        }
        item.name = Some(read_name_record(raw, template_offset, item.name_offset)?);
    }

    Ok((items, values))
}

/// A name record is `length(u32, includes the prefix), utf16[length-4]`,
/// trimming a trailing NUL code unit when present (§6).
fn read_name_record(raw: &[u8], template_offset: u32, name_offset_abs: u32) -> Result<String> {
    if name_offset_abs < template_offset {
        return Err(Error::OffsetOutOfBounds {
            what: "TEMP item name_offset",
            offset: name_offset_abs,
            len: raw.len(),
        });
    }
    let rel = u32_to_usize(
        name_offset_abs - template_offset,
        "TEMP item name_offset (relative)",
        raw.len(),
    )?;
    require_len(raw, rel, 4, "TEMP item name length")?;
    let length = read_u32_named(raw, rel, "TEMP item name length")?;
    if length < 4 {
        return Err(Error::SizeOutOfBounds {
            what: "TEMP item name length",
            offset: name_offset_abs,
            size: length,
        });
    }
    let length_usize = usize::try_from(length).map_err(|_| Error::SizeOutOfBounds {
        what: "TEMP item name length",
        offset: name_offset_abs,
        size: length,
    })?;
    require_len(raw, rel, length_usize, "TEMP item name")?;
    let mut units: Vec<u16> = raw[rel + 4..rel + length_usize]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    if units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16(&units).map_err(|_| Error::InvalidUtf16String {
        what: "TEMP item name",
        offset: name_offset_abs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16_name(s: &str) -> Vec<u8> {
        let mut out: Vec<u8> = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    #[test]
    fn decodes_minimal_template_with_no_descriptors() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"TEMP");
        blob.extend_from_slice(&40u32.to_le_bytes()); // size
        blob.extend_from_slice(&0u32.to_le_bytes()); // num_descriptors
        blob.extend_from_slice(&0u32.to_le_bytes()); // num_names
        blob.extend_from_slice(&40u32.to_le_bytes()); // items_offset == end
        blob.extend_from_slice(&0u32.to_le_bytes()); // reserved
        blob.extend_from_slice(&[0u8; 16]); // guid

        let t = parse(&blob, 0).unwrap();
        assert_eq!(t.size, 40);
        assert_eq!(t.raw.len(), 40);
        assert!(t.items.is_empty());
        assert_eq!(t.binxml().len(), 0);
    }

    #[test]
    fn rejects_items_offset_before_header_end() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"TEMP");
        blob.extend_from_slice(&40u32.to_le_bytes());
        blob.extend_from_slice(&1u32.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&4u32.to_le_bytes()); // items_offset < header end
        blob.extend_from_slice(&0u32.to_le_bytes()); // reserved
        blob.extend_from_slice(&[0u8; 16]);

        let err = parse(&blob, 0).unwrap_err();
        assert!(matches!(err, Error::OffsetOutOfBounds { .. }));
    }

    #[test]
    fn decodes_single_descriptor_with_name() {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"TEMP");
        let header_end = 40u32;
        let descriptor_off = header_end;
        let name_off = descriptor_off + 20;
        let name_bytes = utf16_name("hi");
        let name_block_len = 4 + name_bytes.len() as u32;
        let total_size = name_off + name_block_len;

        blob.extend_from_slice(&total_size.to_le_bytes()); // size
        blob.extend_from_slice(&1u32.to_le_bytes()); // num_descriptors
        blob.extend_from_slice(&1u32.to_le_bytes()); // num_names
        blob.extend_from_slice(&descriptor_off.to_le_bytes()); // items_offset
        blob.extend_from_slice(&0u32.to_le_bytes()); // reserved
        blob.extend_from_slice(&[0u8; 16]); // guid

        // descriptor (20 bytes)
        blob.extend_from_slice(&0u32.to_le_bytes()); // unknown1
        blob.push(0x07); // input_type = I32
        blob.push(0x01); // output_type
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&1u16.to_le_bytes()); // value_count
        blob.extend_from_slice(&4u16.to_le_bytes()); // value_size
        blob.extend_from_slice(&name_off.to_le_bytes()); // name_offset

        // name record
        blob.extend_from_slice(&name_block_len.to_le_bytes());
        blob.extend_from_slice(&name_bytes);

        let t = parse(&blob, 0).unwrap();
        assert_eq!(t.items.len(), 1);
        assert_eq!(t.items[0].name.as_deref(), Some("hi"));
        assert_eq!(t.values[0].ty, ValueType::I32);
    }
}

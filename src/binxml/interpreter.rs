//! The Binary-XML interpreter (§4.D): walks a token stream and builds a
//! [`Tag`] tree, expanding `TemplateInstance` references along the way.
//!
//! Grounded in the teacher's `render.rs` (`build_wevt_tree` and friends) for
//! the overall shape of "walk tokens, maintain an open-element stack, splice
//! in template expansions" — rewritten against this crate's owned `Tag` and
//! `XmlValue` types and the state machine the component design lays out,
//! rather than the teacher's borrowed, string-table-indexed render tree.

use std::collections::{HashMap, HashSet};

use crate::cursor::{read_u16_named, read_u32_named, u32_to_usize};
use crate::error::{Error, Result};
use crate::tag::{Tag, TagKind};
use crate::template::Template;
use crate::value::ValueType;

/// Looks up a template definition by its absolute offset in the manifest
/// blob. Implemented by [`crate::manifest::types::Provider`] so the
/// interpreter can expand `TemplateInstance` references without owning the
/// provider itself.
pub trait TemplateResolver {
    fn resolve(&self, offset: u32) -> Option<&Template>;
}

struct Ctx {
    name_cache: HashMap<u32, Vec<u16>>,
    expanding: HashSet<u32>,
}

struct SubstitutionValue {
    ty: ValueType,
    is_array: bool,
    bytes: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Document,
    InStartTag(u32),
    InContent(u32),
}

/// Interpret a template's embedded BXML document, producing its root `Tag`.
pub fn interpret(template: &Template, resolver: &dyn TemplateResolver) -> Result<Tag> {
    let mut ctx = Ctx {
        name_cache: HashMap::new(),
        expanding: HashSet::new(),
    };
    ctx.expanding.insert(template.offset);
    let (start, end) = template.binxml_bounds();
    let tag = interpret_fragment(&template.raw, template.offset, start, end, &mut ctx, resolver, None)?;
    Ok(tag)
}

fn need(pos: usize, n: usize, end: usize, raw_base: u32, what: &'static str) -> Result<()> {
    if pos.checked_add(n).is_none_or(|p| p > end) {
        return Err(Error::Truncated {
            what,
            offset: raw_base + pos as u32,
            need: n,
            have: end.saturating_sub(pos),
        });
    }
    Ok(())
}

fn interpret_fragment(
    raw: &[u8],
    raw_base: u32,
    start: usize,
    end: usize,
    ctx: &mut Ctx,
    resolver: &dyn TemplateResolver,
    substitutions: Option<&[SubstitutionValue]>,
) -> Result<Tag> {
    let mut pos = start;
    let mut state = State::Initial;
    let mut stack: Vec<Tag> = Vec::new();
    let mut root: Option<Tag> = None;

    loop {
        match state {
            State::Initial => {
                need(pos, 1, end, raw_base, "BXML token code")?;
                let (kind, _has_more) = crate::binxml::token::TokenKind::from_u8(raw[pos], raw_base + pos as u32)?;
                pos += 1;
                if kind != crate::binxml::token::TokenKind::Fragment {
                    return Err(Error::Malformed {
                        what: "expected a Fragment header at the start of a BXML document",
                        offset: raw_base + (pos - 1) as u32,
                    });
                }
                need(pos, 3, end, raw_base, "Fragment header")?;
                let major = raw[pos];
                pos += 3;
                if major != 1 {
                    return Err(Error::UnsupportedVersion {
                        major,
                        offset: raw_base + (pos - 3) as u32,
                    });
                }
                state = State::Document;
            }

            State::Document => {
                need(pos, 1, end, raw_base, "BXML token code")?;
                let (kind, has_more) = crate::binxml::token::TokenKind::from_u8(raw[pos], raw_base + pos as u32)?;
                pos += 1;
                use crate::binxml::token::TokenKind::*;
                match kind {
                    OpenStartElementTag => {
                        let tag = read_open_start_element(raw, &mut pos, end, raw_base, has_more, ctx)?;
                        stack.push(tag);
                        state = State::InStartTag(1);
                    }
                    TemplateInstance => {
                        let expanded = handle_template_instance(raw, &mut pos, end, raw_base, ctx, resolver)?;
                        root = Some(expanded);
                    }
                    EndOfFile => {
                        return root.ok_or(Error::Malformed {
                            what: "BXML document ended with no root element",
                            offset: raw_base + pos as u32,
                        });
                    }
                    _ => {
                        return Err(Error::Malformed {
                            what: "unexpected token while expecting the document root",
                            offset: raw_base + (pos - 1) as u32,
                        });
                    }
                }
            }

            State::InStartTag(d) => {
                need(pos, 1, end, raw_base, "BXML token code")?;
                let (kind, _has_more) = crate::binxml::token::TokenKind::from_u8(raw[pos], raw_base + pos as u32)?;
                pos += 1;
                use crate::binxml::token::TokenKind::*;
                match kind {
                    Attribute => {
                        let name_off = read_name_off(raw, &mut pos, end, raw_base)?;
                        let name = resolve_name(raw, raw_base, name_off, &mut ctx.name_cache)?;
                        let mut attr = Tag::new(TagKind::Node);
                        attr.set_name_utf16(name);
                        read_value_into(raw, &mut pos, end, raw_base, &mut attr, ctx, substitutions)?;
                        stack
                            .last_mut()
                            .expect("InStartTag implies an open element")
                            .push_attribute(attr);
                    }
                    CloseStartElementTag => {
                        state = State::InContent(d);
                    }
                    CloseEmptyElementTag => {
                        let finished = stack.pop().expect("InStartTag implies an open element");
                        if d == 1 {
                            root = Some(finished);
                            state = State::Document;
                        } else {
                            stack
                                .last_mut()
                                .expect("parent element still open")
                                .push_element(finished);
                            state = State::InContent(d - 1);
                        }
                    }
                    _ => {
                        return Err(Error::Malformed {
                            what: "unexpected token inside a start tag",
                            offset: raw_base + (pos - 1) as u32,
                        });
                    }
                }
            }

            State::InContent(d) => {
                need(pos, 1, end, raw_base, "BXML token code")?;
                let (kind, has_more) = crate::binxml::token::TokenKind::from_u8(raw[pos], raw_base + pos as u32)?;
                pos += 1;
                use crate::binxml::token::TokenKind::*;
                match kind {
                    Value => {
                        pos -= 1; // let read_value_into re-read the token byte
                        read_value_into(
                            raw,
                            &mut pos,
                            end,
                            raw_base,
                            stack.last_mut().expect("InContent implies an open element"),
                            ctx,
                            substitutions,
                        )?;
                    }
                    NormalSubstitution => {
                        apply_substitution(
                            raw,
                            &mut pos,
                            end,
                            raw_base,
                            stack.last_mut().expect("InContent implies an open element"),
                            substitutions,
                            false,
                        )?;
                    }
                    OptionalSubstitution => {
                        apply_substitution(
                            raw,
                            &mut pos,
                            end,
                            raw_base,
                            stack.last_mut().expect("InContent implies an open element"),
                            substitutions,
                            true,
                        )?;
                    }
                    EntityRef => {
                        let name_off = read_name_off(raw, &mut pos, end, raw_base)?;
                        let name = resolve_name(raw, raw_base, name_off, &mut ctx.name_cache)?;
                        let text = entity_text(&String::from_utf16_lossy(&name));
                        append_text(stack.last_mut().expect("InContent implies an open element"), &text)?;
                    }
                    CdataSection => {
                        let bytes = read_len_prefixed_utf16(raw, &mut pos, end, raw_base, "CDATASection")?;
                        let mut cdata = Tag::new(TagKind::Cdata);
                        cdata
                            .value_mut_of_type(ValueType::Utf16String)?
                            .push_segment(ValueType::Utf16String, bytes)?;
                        stack
                            .last_mut()
                            .expect("InContent implies an open element")
                            .push_element(cdata);
                    }
                    PiTarget => {
                        let name_off = read_name_off(raw, &mut pos, end, raw_base)?;
                        let name = resolve_name(raw, raw_base, name_off, &mut ctx.name_cache)?;
                        need(pos, 1, end, raw_base, "BXML token code")?;
                        let (data_kind, _) =
                            crate::binxml::token::TokenKind::from_u8(raw[pos], raw_base + pos as u32)?;
                        pos += 1;
                        if data_kind != PiData {
                            return Err(Error::Malformed {
                                what: "PITarget must be followed by PIData",
                                offset: raw_base + (pos - 1) as u32,
                            });
                        }
                        let bytes = read_len_prefixed_utf16(raw, &mut pos, end, raw_base, "PIData")?;
                        let mut pi = Tag::new(TagKind::Pi);
                        pi.set_name_utf16(name);
                        pi.value_mut_of_type(ValueType::Utf16String)?
                            .push_segment(ValueType::Utf16String, bytes)?;
                        stack
                            .last_mut()
                            .expect("InContent implies an open element")
                            .push_element(pi);
                    }
                    OpenStartElementTag => {
                        let tag = read_open_start_element(raw, &mut pos, end, raw_base, has_more, ctx)?;
                        stack.push(tag);
                        state = State::InStartTag(d + 1);
                    }
                    TemplateInstance => {
                        let expanded = handle_template_instance(raw, &mut pos, end, raw_base, ctx, resolver)?;
                        stack
                            .last_mut()
                            .expect("InContent implies an open element")
                            .push_element(expanded);
                    }
                    EndElementTag => {
                        let finished = stack.pop().expect("InContent implies an open element");
                        if d == 1 {
                            root = Some(finished);
                            state = State::Document;
                        } else {
                            stack
                                .last_mut()
                                .expect("parent element still open")
                                .push_element(finished);
                            state = State::InContent(d - 1);
                        }
                    }
                    EndOfFile => {
                        return Err(Error::Malformed {
                            what: "EndOfFile encountered before the document's elements were closed",
                            offset: raw_base + (pos - 1) as u32,
                        });
                    }
                    _ => {
                        return Err(Error::Malformed {
                            what: "unexpected token inside element content",
                            offset: raw_base + (pos - 1) as u32,
                        });
                    }
                }
            }
        }
    }
}

fn read_name_off(raw: &[u8], pos: &mut usize, end: usize, raw_base: u32) -> Result<u32> {
    need(*pos, 4, end, raw_base, "name offset")?;
    let v = read_u32_named(raw, *pos, "name offset")?;
    *pos += 4;
    Ok(v)
}

/// A name-off is an absolute manifest offset; the decoded name is
/// `hash(u16), length(u16), utf16[length], NUL(u16)` (§4.D), cached keyed
/// by offset on first read.
fn resolve_name(
    raw: &[u8],
    raw_base: u32,
    abs_off: u32,
    cache: &mut HashMap<u32, Vec<u16>>,
) -> Result<Vec<u16>> {
    if let Some(cached) = cache.get(&abs_off) {
        return Ok(cached.clone());
    }
    if abs_off < raw_base {
        return Err(Error::OffsetOutOfBounds {
            what: "BXML name offset",
            offset: abs_off,
            len: raw.len(),
        });
    }
    let rel = u32_to_usize(abs_off - raw_base, "BXML name offset (relative)", raw.len())?;
    crate::cursor::require_len(raw, rel, 4, "BXML name header")?;
    let length = read_u16_named(raw, rel + 2, "BXML name length")? as usize;
    let name_bytes_len = length * 2;
    crate::cursor::require_len(raw, rel + 4, name_bytes_len + 2, "BXML name data")?;
    let units: Vec<u16> = raw[rel + 4..rel + 4 + name_bytes_len]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    cache.insert(abs_off, units.clone());
    Ok(units)
}

fn read_open_start_element(
    raw: &[u8],
    pos: &mut usize,
    end: usize,
    raw_base: u32,
    has_dependency_id: bool,
    ctx: &mut Ctx,
) -> Result<Tag> {
    if has_dependency_id {
        need(*pos, 2, end, raw_base, "OpenStartElementTag dependency id")?;
        *pos += 2;
    }
    need(*pos, 4, end, raw_base, "OpenStartElementTag size")?;
    // The element's declared content size is advisory; the state machine's
    // own token-by-token walk is authoritative for where it ends.
    *pos += 4;
    let name_off = read_name_off(raw, pos, end, raw_base)?;
    let name = resolve_name(raw, raw_base, name_off, &mut ctx.name_cache)?;
    let mut tag = Tag::new(TagKind::Node);
    tag.set_name_utf16(name);
    Ok(tag)
}

fn read_len_prefixed_utf16(
    raw: &[u8],
    pos: &mut usize,
    end: usize,
    raw_base: u32,
    what: &'static str,
) -> Result<Vec<u8>> {
    need(*pos, 2, end, raw_base, what)?;
    let units = read_u16_named(raw, *pos, what)? as usize;
    *pos += 2;
    let nbytes = units * 2;
    need(*pos, nbytes, end, raw_base, what)?;
    let bytes = raw[*pos..*pos + nbytes].to_vec();
    *pos += nbytes;
    Ok(bytes)
}

/// Reads the next token, which must be a value-producing one (`Value`,
/// `NormalSubstitution`, `OptionalSubstitution`, or `EntityRef`), and
/// applies it to `target`'s value (used for both attribute values and
/// element text content).
fn read_value_into(
    raw: &[u8],
    pos: &mut usize,
    end: usize,
    raw_base: u32,
    target: &mut Tag,
    ctx: &mut Ctx,
    substitutions: Option<&[SubstitutionValue]>,
) -> Result<()> {
    need(*pos, 1, end, raw_base, "BXML token code")?;
    let (kind, _has_more) = crate::binxml::token::TokenKind::from_u8(raw[*pos], raw_base + *pos as u32)?;
    *pos += 1;
    use crate::binxml::token::TokenKind::*;
    match kind {
        Value => {
            need(*pos, 1, end, raw_base, "Value type")?;
            let type_byte = raw[*pos];
            *pos += 1;
            let (ty, is_array) = ValueType::from_u8(type_byte).ok_or(Error::Malformed {
                what: "unrecognized BXML value type byte",
                offset: raw_base + (*pos - 1) as u32,
            })?;
            let data = read_inline_value_bytes(raw, pos, end, raw_base, ty)?;
            set_value(target, ty, is_array, data)?;
            Ok(())
        }
        NormalSubstitution => {
            *pos -= 1;
            apply_substitution(raw, pos, end, raw_base, target, substitutions, false)
        }
        OptionalSubstitution => {
            *pos -= 1;
            apply_substitution(raw, pos, end, raw_base, target, substitutions, true)
        }
        EntityRef => {
            let name_off = read_name_off(raw, pos, end, raw_base)?;
            let name = resolve_name(raw, raw_base, name_off, &mut ctx.name_cache)?;
            let text = entity_text(&String::from_utf16_lossy(&name));
            append_text(target, &text)
        }
        _ => Err(Error::Malformed {
            what: "expected a value-producing token",
            offset: raw_base + (*pos - 1) as u32,
        }),
    }
}

fn set_value(target: &mut Tag, ty: ValueType, is_array: bool, data: Vec<u8>) -> Result<()> {
    let value = target.value_mut_of_type(ty)?;
    if !is_array {
        if !data.is_empty() || value.number_of_segments() == 0 {
            value.push_segment(ty, data)?;
        }
        return Ok(());
    }
    for seg in split_array_segments(ty, data) {
        value.push_segment(ty, seg)?;
    }
    Ok(())
}

fn append_text(target: &mut Tag, text: &str) -> Result<()> {
    let mut bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    bytes.extend_from_slice(&0u16.to_le_bytes());
    target
        .value_mut_of_type(ValueType::Utf16String)?
        .push_segment(ValueType::Utf16String, bytes)
}

fn apply_substitution(
    raw: &[u8],
    pos: &mut usize,
    end: usize,
    raw_base: u32,
    target: &mut Tag,
    substitutions: Option<&[SubstitutionValue]>,
    optional: bool,
) -> Result<()> {
    need(*pos, 1, end, raw_base, "substitution token code")?;
    let (kind, _) = crate::binxml::token::TokenKind::from_u8(raw[*pos], raw_base + *pos as u32)?;
    *pos += 1;
    debug_assert!(matches!(
        kind,
        crate::binxml::token::TokenKind::NormalSubstitution | crate::binxml::token::TokenKind::OptionalSubstitution
    ));

    need(*pos, 3, end, raw_base, "substitution payload")?;
    let index = read_u16_named(raw, *pos, "substitution index")? as usize;
    let type_byte = raw[*pos + 2];
    *pos += 3;

    let (token_ty, is_array) = ValueType::from_u8(type_byte).ok_or(Error::Malformed {
        what: "unrecognized substitution value type byte",
        offset: raw_base + (*pos - 1) as u32,
    })?;

    let table = substitutions.ok_or(Error::Malformed {
        what: "substitution token outside a TemplateInstance",
        offset: raw_base + (*pos - 3) as u32,
    })?;
    let slot = table.get(index).ok_or(Error::Malformed {
        what: "substitution index out of range",
        offset: raw_base + (*pos - 3) as u32,
    })?;

    if optional && (slot.ty == ValueType::Null || slot.bytes.is_empty()) {
        return Ok(());
    }
    // A descriptor with a non-Null type but zero size is ambiguous (§9); a
    // NormalSubstitution treats it the same as an OptionalSubstitution would:
    // absent, not an empty segment.
    if slot.bytes.is_empty() && slot.ty != ValueType::Null {
        return Ok(());
    }

    set_value(target, token_ty, is_array, slot.bytes.clone())
}

/// Split an array substitution's payload into per-element segments. Types
/// with a known fixed width split evenly (erroring if the total doesn't
/// divide evenly); variable-width types are kept as a single segment, since
/// the format doesn't carry a per-element length for them.
fn split_array_segments(ty: ValueType, data: Vec<u8>) -> Vec<Vec<u8>> {
    match fixed_width(ty) {
        Some(w) if w > 0 && data.len() % w == 0 && !data.is_empty() => {
            data.chunks_exact(w).map(|c| c.to_vec()).collect()
        }
        _ => {
            if data.is_empty() {
                Vec::new()
            } else {
                vec![data]
            }
        }
    }
}

fn fixed_width(ty: ValueType) -> Option<usize> {
    match ty {
        ValueType::I8 | ValueType::U8 => Some(1),
        ValueType::I16 | ValueType::U16 => Some(2),
        ValueType::I32 | ValueType::U32 | ValueType::F32 | ValueType::HexU32 => Some(4),
        ValueType::I64
        | ValueType::U64
        | ValueType::F64
        | ValueType::Size
        | ValueType::FileTime
        | ValueType::HexU64 => Some(8),
        ValueType::Bool => Some(4),
        ValueType::Guid | ValueType::SystemTime => Some(16),
        _ => None,
    }
}

fn read_inline_value_bytes(
    raw: &[u8],
    pos: &mut usize,
    end: usize,
    raw_base: u32,
    ty: ValueType,
) -> Result<Vec<u8>> {
    match ty {
        ValueType::Null => Ok(Vec::new()),
        ValueType::Utf16String => read_len_prefixed_utf16(raw, pos, end, raw_base, "inline Utf16String"),
        ValueType::ByteStreamString => {
            need(*pos, 2, end, raw_base, "inline ByteStreamString length")?;
            let n = read_u16_named(raw, *pos, "inline ByteStreamString length")? as usize;
            *pos += 2;
            need(*pos, n, end, raw_base, "inline ByteStreamString data")?;
            let bytes = raw[*pos..*pos + n].to_vec();
            *pos += n;
            Ok(bytes)
        }
        ValueType::Sid => {
            need(*pos, 8, end, raw_base, "inline Sid header")?;
            let sub_authority_count = raw[*pos + 1] as usize;
            let total = 8 + 4 * sub_authority_count;
            need(*pos, total, end, raw_base, "inline Sid")?;
            let bytes = raw[*pos..*pos + total].to_vec();
            *pos += total;
            Ok(bytes)
        }
        ValueType::Binary | ValueType::BinaryXml => {
            need(*pos, 4, end, raw_base, "inline length-prefixed binary")?;
            let n = read_u32_named(raw, *pos, "inline length-prefixed binary")? as usize;
            *pos += 4;
            need(*pos, n, end, raw_base, "inline binary data")?;
            let bytes = raw[*pos..*pos + n].to_vec();
            *pos += n;
            Ok(bytes)
        }
        _ => {
            let w = fixed_width(ty).expect("every remaining ValueType has a fixed width");
            need(*pos, w, end, raw_base, "inline fixed-width value")?;
            let bytes = raw[*pos..*pos + w].to_vec();
            *pos += w;
            Ok(bytes)
        }
    }
}

fn entity_text(name: &str) -> String {
    match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "apos" => "'".to_string(),
        "quot" => "\"".to_string(),
        other => other
            .strip_prefix('#')
            .and_then(|n| {
                n.strip_prefix('x')
                    .and_then(|h| u32::from_str_radix(h, 16).ok())
                    .or_else(|| n.parse::<u32>().ok())
            })
            .and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| format!("&{other};")),
    }
}

fn handle_template_instance(
    raw: &[u8],
    pos: &mut usize,
    end: usize,
    raw_base: u32,
    ctx: &mut Ctx,
    resolver: &dyn TemplateResolver,
) -> Result<Tag> {
    need(*pos, 4, end, raw_base, "TemplateInstance reference")?;
    let template_ref = read_u32_named(raw, *pos, "TemplateInstance reference")?;
    *pos += 4;

    need(*pos, 4, end, raw_base, "TemplateInstance values-table count")?;
    let count = read_u32_named(raw, *pos, "TemplateInstance values-table count")? as usize;
    *pos += 4;

    let mut descriptors = Vec::with_capacity(count);
    for _ in 0..count {
        need(*pos, 4, end, raw_base, "TemplateInstance values-table descriptor")?;
        let size = read_u16_named(raw, *pos, "TemplateInstance values-table descriptor size")?;
        let type_byte = raw[*pos + 2];
        // byte at *pos + 3 is reserved.
        *pos += 4;
        descriptors.push((size, type_byte));
    }

    let mut substitutions = Vec::with_capacity(count);
    for (size, type_byte) in descriptors {
        let size = size as usize;
        need(*pos, size, end, raw_base, "TemplateInstance values-table payload")?;
        let bytes = raw[*pos..*pos + size].to_vec();
        *pos += size;
        let (ty, is_array) = ValueType::from_u8(type_byte).ok_or(Error::Malformed {
            what: "unrecognized TemplateInstance values-table type byte",
            offset: raw_base + *pos as u32,
        })?;
        substitutions.push(SubstitutionValue { ty, is_array, bytes });
    }

    let referenced = resolver.resolve(template_ref).ok_or(Error::Malformed {
        what: "TemplateInstance references a template this provider doesn't carry",
        offset: template_ref,
    })?;

    if ctx.expanding.contains(&referenced.offset) {
        return Err(Error::CyclicTemplateReference {
            offset: referenced.offset,
        });
    }
    ctx.expanding.insert(referenced.offset);
    let (rstart, rend) = referenced.binxml_bounds();
    let result = interpret_fragment(
        &referenced.raw,
        referenced.offset,
        rstart,
        rend,
        ctx,
        resolver,
        Some(&substitutions),
    );
    ctx.expanding.remove(&referenced.offset);
    result
}

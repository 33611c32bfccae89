//! Canonical XML emission (§4.C, §4.I): a recursive writer over a [`Tag`]
//! tree, escaping text and indenting children two spaces per depth level.
//!
//! Grounded in `binxml/ir_xml.rs`'s `XmlEmitter`: same node forms (plain
//! node, empty self-closing tag, CDATA, PI), same per-character escape
//! table. Unlike that renderer this crate's sizing and writing are
//! separate calls (§4.I) rather than one streaming pass, so both build on
//! a shared `render_*` core the way [`crate::value::XmlValue`]'s
//! `utf8_size`/`copy_utf8` pair already does for scalar values. Quotes and
//! apostrophes are never escaped here, in element text or in attribute
//! values — this crate's sole consumer never requires it, unlike the
//! teacher's stricter downstream parser.

use crate::error::{Error, Result};
use crate::tag::{Tag, TagKind};

const INDENT_WIDTH: usize = 2;

impl Tag {
    /// Render to a NUL-terminated UTF-8 string.
    pub fn as_xml_utf8(&self) -> Result<String> {
        let mut out = String::new();
        write_node(self, 0, &mut out)?;
        out.push('\0');
        Ok(out)
    }

    /// Render to a NUL-terminated UTF-16 string (as `u16` code units).
    pub fn as_xml_utf16(&self) -> Result<Vec<u16>> {
        let text = self.as_xml_utf8()?;
        Ok(text.trim_end_matches('\0').encode_utf16().chain(std::iter::once(0)).collect())
    }

    /// Number of UTF-8 bytes [`Self::write_xml_utf8`] would write, including
    /// the trailing NUL.
    pub fn xml_utf8_size(&self) -> Result<usize> {
        let mut out = String::new();
        write_node(self, 0, &mut out)?;
        Ok(out.len() + 1)
    }

    /// Write the UTF-8 rendering (with trailing NUL) into `dst`. Fails with
    /// `BufferTooSmall` if `dst` is shorter than [`Self::xml_utf8_size`].
    pub fn write_xml_utf8(&self, dst: &mut [u8]) -> Result<usize> {
        let mut out = String::new();
        write_node(self, 0, &mut out)?;
        let need = out.len() + 1;
        if dst.len() < need {
            return Err(Error::BufferTooSmall { need, have: dst.len() });
        }
        dst[..out.len()].copy_from_slice(out.as_bytes());
        dst[out.len()] = 0;
        Ok(need)
    }

    /// Number of UTF-16 code units [`Self::write_xml_utf16`] would write,
    /// including the trailing NUL.
    pub fn xml_utf16_size(&self) -> Result<usize> {
        Ok(self.as_xml_utf16()?.len())
    }

    /// Write the UTF-16 rendering (with trailing NUL) into `dst`. Fails
    /// with `BufferTooSmall` if `dst` is shorter than
    /// [`Self::xml_utf16_size`].
    pub fn write_xml_utf16(&self, dst: &mut [u16]) -> Result<usize> {
        let units = self.as_xml_utf16()?;
        if dst.len() < units.len() {
            return Err(Error::BufferTooSmall { need: units.len(), have: dst.len() });
        }
        dst[..units.len()].copy_from_slice(&units);
        Ok(units.len())
    }
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level * INDENT_WIDTH {
        out.push(' ');
    }
}

fn write_node(tag: &Tag, depth: usize, out: &mut String) -> Result<()> {
    match tag.kind {
        TagKind::Cdata => {
            out.push_str("<![CDATA[");
            write_value_raw(tag, out)?;
            out.push_str("]]>");
            out.push('\n');
            return Ok(());
        }
        TagKind::Pi => {
            out.push_str("<?");
            out.push_str(&tag.name_utf8());
            if tag.value.is_some() {
                out.push(' ');
                write_value_raw(tag, out)?;
            }
            out.push_str("?>");
            out.push('\n');
            return Ok(());
        }
        TagKind::Node => {}
    }

    indent(out, depth);
    out.push('<');
    out.push_str(&tag.name_utf8());
    for attr in &tag.attributes {
        if attribute_is_empty(attr)? {
            continue;
        }
        out.push(' ');
        out.push_str(&attr.name_utf8());
        out.push_str("=\"");
        write_value_escaped(attr, out)?;
        out.push('"');
    }

    if tag.is_effectively_empty() {
        out.push_str("/>");
        out.push('\n');
        return Ok(());
    }
    out.push('>');

    if tag.elements.is_empty() {
        write_value_escaped(tag, out)?;
    } else {
        out.push('\n');
        for child in &tag.elements {
            write_node(child, depth + 1, out)?;
        }
        indent(out, depth);
    }

    out.push_str("</");
    out.push_str(&tag.name_utf8());
    out.push('>');
    out.push('\n');
    Ok(())
}

fn attribute_is_empty(attr: &Tag) -> Result<bool> {
    Ok(attr.is_effectively_empty() && attr.value.is_none())
}

fn write_value_escaped(tag: &Tag, out: &mut String) -> Result<()> {
    let Some(value) = &tag.value else { return Ok(()) };
    escape_into(&value.render_all_utf8(&crate::codepage::CodePage::default())?, out);
    Ok(())
}

fn write_value_raw(tag: &Tag, out: &mut String) -> Result<()> {
    let Some(value) = &tag.value else { return Ok(()) };
    out.push_str(&value.render_all_utf8(&crate::codepage::CodePage::default())?);
    Ok(())
}

/// Escape `&`, `<`, `>`; apostrophe and quote are left alone everywhere,
/// including attribute values (§4.C).
fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn utf16_segment(s: &str) -> Vec<u8> {
        let mut raw: Vec<u8> = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw
    }

    #[test]
    fn s4_tag_escaping() {
        let mut tag = Tag::new(TagKind::Node);
        tag.set_name_utf16("a".encode_utf16().collect());
        let v = tag.value_mut_of_type(ValueType::Utf16String).unwrap();
        v.push_segment(ValueType::Utf16String, utf16_segment("1 < 2 & 3 > 0")).unwrap();

        assert_eq!(tag.as_xml_utf8().unwrap(), "<a>1 &lt; 2 &amp; 3 &gt; 0</a>\n\0");
    }

    #[test]
    fn s5_lone_lf_elision() {
        let mut tag = Tag::new(TagKind::Node);
        tag.set_name_utf16("x".encode_utf16().collect());
        let v = tag.value_mut_of_type(ValueType::Utf16String).unwrap();
        v.push_segment(ValueType::Utf16String, utf16_segment("\n")).unwrap();

        assert_eq!(tag.as_xml_utf8().unwrap(), "<x/>\n\0");
    }

    #[test]
    fn quotes_and_apostrophes_never_escaped() {
        let mut root = Tag::new(TagKind::Node);
        root.set_name_utf16("r".encode_utf16().collect());
        let mut attr = Tag::new(TagKind::Node);
        attr.set_name_utf16("q".encode_utf16().collect());
        let v = attr.value_mut_of_type(ValueType::Utf16String).unwrap();
        v.push_segment(ValueType::Utf16String, utf16_segment("it's \"ok\"")).unwrap();
        root.push_attribute(attr);

        let xml = root.as_xml_utf8().unwrap();
        assert!(xml.contains("it's \"ok\""));
    }

    #[test]
    fn write_xml_utf8_reports_buffer_too_small() {
        let mut tag = Tag::new(TagKind::Node);
        tag.set_name_utf16("a".encode_utf16().collect());
        let mut buf = [0u8; 2];
        let err = tag.write_xml_utf8(&mut buf).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { .. }));
    }

    #[test]
    fn nested_elements_are_indented_two_spaces_per_depth() {
        let mut root = Tag::new(TagKind::Node);
        root.set_name_utf16("r".encode_utf16().collect());
        let mut child = Tag::new(TagKind::Node);
        child.set_name_utf16("c".encode_utf16().collect());
        root.push_element(child);

        let xml = root.as_xml_utf8().unwrap();
        assert_eq!(xml, "<r>\n  <c/>\n</r>\n\0");
    }
}

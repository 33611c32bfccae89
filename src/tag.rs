//! In-memory XML tag tree (§4.C): the structure the BXML interpreter builds
//! and the serializer walks.
//!
//! Grounded in the teacher's `binxml::model`/`ir.rs` node shape, reworked
//! from a borrowed, string-table-indexed tree into one that owns its bytes
//! outright — this crate's BXML dialect stores names inline rather than in
//! a shared string table, so there is nothing left to borrow from.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::value::{ValueType, XmlValue};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TagFlags: u32 {
        const IS_TEMPLATE_DEFINITION = 0x01;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Node,
    Cdata,
    Pi,
}

/// A node in the tag tree. Attributes are themselves `Tag`s, held in
/// `attributes` rather than `elements`, matching §3's "attribute children"
/// wording — a reader distinguishes them by which list they're stored in,
/// not by a field on the attribute itself.
#[derive(Debug, Clone)]
pub struct Tag {
    pub kind: TagKind,
    name: Vec<u16>,
    pub attributes: Vec<Tag>,
    pub elements: Vec<Tag>,
    pub value: Option<XmlValue>,
    pub flags: TagFlags,
}

impl Tag {
    pub fn new(kind: TagKind) -> Self {
        Tag {
            kind,
            name: Vec::new(),
            attributes: Vec::new(),
            elements: Vec::new(),
            value: None,
            flags: TagFlags::empty(),
        }
    }

    pub fn set_name_utf16(&mut self, units: Vec<u16>) {
        self.name = units;
    }

    pub fn name_utf16(&self) -> &[u16] {
        &self.name
    }

    pub fn name_utf8(&self) -> String {
        String::from_utf16_lossy(&self.name)
    }

    pub fn push_attribute(&mut self, attr: Tag) {
        self.attributes.push(attr);
    }

    pub fn push_element(&mut self, child: Tag) {
        self.elements.push(child);
    }

    /// Set or lazily create the value with the given type. Fails with
    /// `TypeMismatch` if a value already exists with a different base type.
    pub fn value_mut_of_type(&mut self, ty: ValueType) -> Result<&mut XmlValue> {
        match &self.value {
            None => self.value = Some(XmlValue::new(ty)),
            Some(v) if v.ty() == ty => {}
            Some(v) => {
                return Err(Error::TypeMismatch {
                    what: "Tag::value",
                    expected: v.ty(),
                    found: ty,
                });
            }
        }
        Ok(self.value.as_mut().expect("just set"))
    }

    pub fn attribute_by_index(&self, i: usize) -> Option<&Tag> {
        self.attributes.get(i)
    }

    pub fn element_by_index(&self, i: usize) -> Option<&Tag> {
        self.elements.get(i)
    }

    /// Case-insensitive lookup by UTF-8 name, comparing code point by code
    /// point after uppercasing both sides (§4.C).
    pub fn attribute_by_name(&self, name: &str) -> Option<&Tag> {
        self.attributes.iter().find(|a| names_match(&a.name_utf8(), name))
    }

    pub fn element_by_name(&self, name: &str) -> Option<&Tag> {
        self.elements.iter().find(|e| names_match(&e.name_utf8(), name))
    }

    /// Case-insensitive lookup by UTF-16 name.
    pub fn attribute_by_name_utf16(&self, name: &[u16]) -> Option<&Tag> {
        self.attributes
            .iter()
            .find(|a| names_match_utf16(&a.name, name))
    }

    pub fn element_by_name_utf16(&self, name: &[u16]) -> Option<&Tag> {
        self.elements
            .iter()
            .find(|e| names_match_utf16(&e.name, name))
    }

    /// §4.C's special case: a single-segment `Utf16String` value of exactly
    /// one UTF-8 linefeed is treated as empty for the purpose of deciding
    /// whether the node renders as an empty tag.
    pub fn is_effectively_empty(&self) -> bool {
        if !self.elements.is_empty() {
            return false;
        }
        match &self.value {
            None => true,
            Some(v) => is_lone_linefeed(v),
        }
    }
}

fn is_lone_linefeed(v: &XmlValue) -> bool {
    if v.ty() != ValueType::Utf16String || v.is_array() || v.number_of_segments() != 1 {
        return false;
    }
    matches!(v.render_segment_utf8(0, &crate::codepage::CodePage::default()), Ok(s) if s == "\n")
}

fn names_match(a: &str, b: &str) -> bool {
    let mut ai = a.chars().flat_map(char::to_uppercase);
    let mut bi = b.chars().flat_map(char::to_uppercase);
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x == y => continue,
            _ => return false,
        }
    }
}

fn names_match_utf16(a: &[u16], b: &[u16]) -> bool {
    let a = String::from_utf16_lossy(a);
    let b = String::from_utf16_lossy(b);
    names_match(&a, &b)
}

//! End-to-end scenarios against the public [`wevt_templates`] surface,
//! covering the testable-property scenarios this decoder was validated
//! against: an empty manifest, a dangling event→template reference, and a
//! full provider render from `CRIM` bytes down to serialized XML.
//!
//! Grounded in the teacher's own `tests/test_wevt_templates.rs`, which
//! builds a synthetic `CRIM`/`WEVT`/`EVNT`/`TTBL` blob by hand rather than
//! shipping a binary fixture — this crate's element-table index shape
//! differs (the type-code-triple layout, not the teacher's descriptor
//! pairs), so the byte offsets below are this crate's own, not copied.

use wevt_templates::binxml::{interpret, TemplateResolver};
use wevt_templates::open_manifest;

fn name_record(name: &str) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let mut out = Vec::new();
    out.extend_from_slice(&0u16.to_le_bytes()); // hash, unused
    out.extend_from_slice(&(units.len() as u16).to_le_bytes());
    for u in &units {
        out.extend_from_slice(&u.to_le_bytes());
    }
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

#[test]
fn s1_empty_manifest_opens_with_no_providers() {
    let mut blob = Vec::new();
    blob.extend_from_slice(b"CRIM");
    blob.extend_from_slice(&16u32.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());

    let manifest = open_manifest(&blob).unwrap();
    assert_eq!((manifest.major_version, manifest.minor_version), (1, 1));
    assert_eq!(manifest.providers.len(), 0);
}

/// Builds a single-provider `CRIM` blob whose provider carries one event
/// (pointing at a template, or not) and, optionally, one template with a
/// trivial `<Event/>` BXML body.
struct ManifestBuilder {
    template_offset_field: u32,
    include_template: bool,
}

impl ManifestBuilder {
    fn build(&self) -> Vec<u8> {
        let provider_off = 16u32 + 20;
        let wevt_header_size = 16u32;

        let event_name = name_record("Event");
        let mut bxml_tokens = Vec::new();
        bxml_tokens.extend_from_slice(&[0x0f, 1, 1, 0]);
        bxml_tokens.push(0x01);
        bxml_tokens.extend_from_slice(&0u32.to_le_bytes());
        let name_off_pos = bxml_tokens.len();
        bxml_tokens.extend_from_slice(&0u32.to_le_bytes());
        bxml_tokens.push(0x03);
        bxml_tokens.push(0x00);

        let temp_size = if self.include_template {
            40 + bxml_tokens.len() as u32 + event_name.len() as u32
        } else {
            0
        };

        // Layout: WEVT header, EVTN entry (type_code=7), TTBL entry
        // (type_code=6) if a template is present.
        let num_entries: u32 = if self.include_template { 2 } else { 1 };
        let entries_off = provider_off + wevt_header_size;
        let evtn_items_offset = entries_off + num_entries * 12;
        let evtn_size = 4 + 48u32; // signature + one 48-byte event record
        let ttbl_items_offset = evtn_items_offset + evtn_size;
        let temp_off = ttbl_items_offset + 4;

        let template_offset = if self.include_template {
            temp_off
        } else {
            self.template_offset_field
        };

        let mut blob = Vec::new();
        // CRIM header, patched with the real size at the end.
        blob.extend_from_slice(b"CRIM");
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&1u32.to_le_bytes());
        blob.extend_from_slice(&[0u8; 16]);
        blob.extend_from_slice(&provider_off.to_le_bytes());
        assert_eq!(blob.len() as u32, provider_off);

        // WEVT header
        blob.extend_from_slice(b"WEVT");
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        blob.extend_from_slice(&num_entries.to_le_bytes());
        assert_eq!(blob.len() as u32, entries_off);

        // entry 0: EVTN
        blob.extend_from_slice(&7u32.to_le_bytes());
        blob.extend_from_slice(&1u32.to_le_bytes());
        blob.extend_from_slice(&evtn_items_offset.to_le_bytes());
        if self.include_template {
            // entry 1: TTBL
            blob.extend_from_slice(&6u32.to_le_bytes());
            blob.extend_from_slice(&1u32.to_le_bytes());
            blob.extend_from_slice(&ttbl_items_offset.to_le_bytes());
        }
        assert_eq!(blob.len() as u32, evtn_items_offset);

        // EVTN table
        blob.extend_from_slice(b"EVTN");
        let mut ev = vec![0u8; 48];
        ev[0..2].copy_from_slice(&7u16.to_le_bytes()); // identifier
        ev[20..24].copy_from_slice(&template_offset.to_le_bytes());
        blob.extend_from_slice(&ev);
        assert_eq!(blob.len() as u32, ttbl_items_offset);

        if self.include_template {
            blob.extend_from_slice(b"TTBL");
            assert_eq!(blob.len() as u32, temp_off);

            bxml_tokens[name_off_pos..name_off_pos + 4]
                .copy_from_slice(&(temp_off + 40 + bxml_tokens.len() as u32).to_le_bytes());

            blob.extend_from_slice(b"TEMP");
            blob.extend_from_slice(&temp_size.to_le_bytes());
            blob.extend_from_slice(&0u32.to_le_bytes()); // num_descriptors
            blob.extend_from_slice(&1u32.to_le_bytes()); // num_names
            blob.extend_from_slice(&0u32.to_le_bytes()); // items_offset == none
            blob.extend_from_slice(&0u32.to_le_bytes()); // reserved
            blob.extend_from_slice(&[0u8; 16]); // identifier
            blob.extend_from_slice(&bxml_tokens);
            blob.extend_from_slice(&event_name);
        }

        let total = blob.len() as u32;
        blob[4..8].copy_from_slice(&total.to_le_bytes());
        blob
    }
}

#[test]
fn s7_dangling_event_reports_diagnostic_and_still_opens() {
    let blob = ManifestBuilder { template_offset_field: 0x1000, include_template: false }.build();
    let manifest = open_manifest(&blob).unwrap();
    assert_eq!(manifest.providers.len(), 1);
    let provider = &manifest.providers[0];
    assert_eq!(provider.events.len(), 1);
    assert_eq!(provider.events[0].template_offset, Some(0x1000));

    assert_eq!(manifest.diagnostics.len(), 1);
    assert!(matches!(
        &manifest.diagnostics[0],
        wevt_templates::diagnostics::Diagnostic::DanglingReference { template_offset: 0x1000, .. }
    ));
}

#[test]
fn renders_event_template_and_serializes_to_xml() {
    let blob = ManifestBuilder { template_offset_field: 0, include_template: true }.build();
    let manifest = open_manifest(&blob).unwrap();
    assert!(manifest.diagnostics.is_empty());

    let provider = &manifest.providers[0];
    assert_eq!(provider.templates.len(), 1);
    let event = &provider.events[0];
    let template_offset = event.template_offset.expect("event references a template");
    let template = provider.resolve(template_offset).expect("template resolves");

    let root = interpret(template, provider).unwrap();
    assert_eq!(root.name_utf8(), "Event");

    let xml = root.as_xml_utf8().unwrap();
    assert_eq!(xml, "<Event/>\n\0");
}

use isobox::known_boxes::SCHEMAS;
use isobox::{Layout, default_registry};

#[test]
fn known_box_ftyp() {
    let ftyp = default_registry().get(b"ftyp").unwrap();
    assert_eq!(ftyp.name, "File Type Box");
    assert!(!ftyp.full_box);
    assert!(matches!(ftyp.layout, Layout::Fields(_)));
}

#[test]
fn known_box_classifies_container() {
    for code in [b"moov", b"trak", b"mdia", b"minf", b"stbl", b"moof", b"traf"] {
        let entry = default_registry().get(code).unwrap();
        assert_eq!(entry.layout, Layout::Container, "{}", String::from_utf8_lossy(code));
    }
    assert!(!matches!(default_registry().get(b"ftyp").unwrap().layout, Layout::Container));
}

#[test]
fn known_box_classifies_full_box() {
    assert!(default_registry().get(b"mvhd").unwrap().full_box);
    assert!(!default_registry().get(b"mdat").unwrap().full_box);

    // ISO meta is a full box that holds children.
    let meta = default_registry().get(b"meta").unwrap();
    assert!(meta.full_box);
    assert_eq!(meta.layout, Layout::Container);
}

#[test]
fn media_payloads_are_streamed() {
    for code in [b"mdat", b"imda"] {
        assert_eq!(default_registry().get(code).unwrap().layout, Layout::Stream);
    }
    assert_eq!(default_registry().get(b"free").unwrap().layout, Layout::Raw);
}

#[test]
fn every_entry_has_a_name() {
    assert_eq!(SCHEMAS.len(), default_registry().len());
    for entry in SCHEMAS {
        assert!(!entry.name.is_empty(), "{} has no name", entry.key);
    }
}

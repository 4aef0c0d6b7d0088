use isobox::boxes::{BoxKey, FourCC};
use isobox::schema::{Count, FieldDescriptor, FieldKind, IntSpec, IntType, Layout};
use isobox::{Codec, Registry, SchemaEntry, Value};

const PIFF_TRACK_ENCRYPTION: [u8; 16] = [
    0x89, 0x74, 0xDB, 0xCE, 0x7B, 0xE7, 0x4C, 0x51, 0x84, 0xF9, 0x71, 0x48, 0xF9, 0x88, 0x25, 0x54,
];

static TRACK_ENCRYPTION: &[FieldDescriptor] = &[
    FieldDescriptor::new("default_algorithm_id", FieldKind::Int(IntSpec::Fixed(IntType::U32))),
    FieldDescriptor::new("default_kid", FieldKind::Bytes(Count::Fixed(16))),
];

#[test]
fn uuid_keyed_schema_decodes_fields() -> anyhow::Result<()> {
    let reg = Registry::builtin()?.with_schema(SchemaEntry {
        key: BoxKey::Uuid(PIFF_TRACK_ENCRYPTION),
        name: "PIFF Track Encryption Box",
        full_box: true,
        layout: Layout::Fields(TRACK_ENCRYPTION),
    })?;

    let mut data = Vec::new();
    data.extend_from_slice(&48u32.to_be_bytes());
    data.extend_from_slice(b"uuid");
    data.extend_from_slice(&PIFF_TRACK_ENCRYPTION);
    data.extend_from_slice(&[0, 0, 0, 0]); // version, flags
    data.extend_from_slice(&1u32.to_be_bytes()); // AES-CTR
    data.extend_from_slice(&[0x42; 16]);

    let codec = Codec::new(&reg);
    let tree = codec.decode(&data)?;
    let b = &tree.boxes[0];
    assert_eq!(b.typ, FourCC::UUID);
    assert_eq!(b.key(), BoxKey::Uuid(PIFF_TRACK_ENCRYPTION));
    assert_eq!(b.field("default_algorithm_id"), Some(&Value::UInt(1)));
    assert_eq!(b.field("default_kid"), Some(&Value::Bytes(vec![0x42; 16])));
    assert_eq!(codec.encode(&tree)?, data);

    // Other uuid boxes are still opaque.
    let mut other = data.clone();
    other[8] ^= 0xFF;
    assert!(codec.decode(&other)?.boxes[0].fields().is_none());
    Ok(())
}

#[test]
fn custom_table_replaces_builtin_dispatch() -> anyhow::Result<()> {
    // A registry that treats `udta` as raw bytes instead of a container.
    let reg = Registry::from_entries(&[SchemaEntry {
        key: BoxKey::FourCC(FourCC(*b"udta")),
        name: "User Data Box",
        full_box: false,
        layout: Layout::Raw,
    }])?;

    let data = [0, 0, 0, 17, b'u', b'd', b't', b'a', 0, 0, 0, 9, b'n', b'a', b'm', b'e', 0];
    let tree = Codec::new(&reg).decode(&data)?;
    assert_eq!(tree.boxes[0].children().count(), 0);

    let tree = isobox::decode(&data)?;
    assert_eq!(tree.boxes[0].children().count(), 1);
    Ok(())
}

use isobox::{BoxTree, Fields, FourCC, InvalidFourCC, decode, encode};
use serde_json::{self, Value};

/// Build a minimal MP4-ish file:
/// [ftyp] [free] [uuid]
fn make_minimal_mp4() -> Vec<u8> {
    // ftyp: size=24, type="ftyp", payload=16 bytes
    let mut data = Vec::new();

    // size (24)
    data.extend_from_slice(&24u32.to_be_bytes());
    // type "ftyp"
    data.extend_from_slice(b"ftyp");
    // major brand "isom"
    data.extend_from_slice(b"isom");
    // minor version 512
    data.extend_from_slice(&512u32.to_be_bytes());
    // one compatible brand "avc1"
    data.extend_from_slice(b"avc1");

    // free: size=8, type="free", no payload
    data.extend_from_slice(&8u32.to_be_bytes());
    data.extend_from_slice(b"free");

    // uuid: size=26, 16-byte extended type, 2 bytes payload
    data.extend_from_slice(&26u32.to_be_bytes());
    data.extend_from_slice(b"uuid");
    data.extend_from_slice(&[0xA5; 16]);
    data.extend_from_slice(&[1, 2]);

    data
}

#[test]
fn analyze_and_serialize_to_json() {
    let tree = decode(&make_minimal_mp4()).expect("decode failed");

    let json_str = tree.to_json().expect("serialize to JSON failed");
    let v: Value = serde_json::from_str(&json_str).expect("parse JSON failed");

    let boxes = v["boxes"].as_array().unwrap();
    assert_eq!(boxes.len(), 3);

    let ftyp = &boxes[0];
    assert_eq!(ftyp["typ"], "ftyp");
    assert_eq!(ftyp["size"], 24);
    assert_eq!(ftyp["payload"]["Fields"]["major_brand"]["FourCC"], "isom");
    assert_eq!(ftyp["payload"]["Fields"]["minor_version"]["UInt"], 512);

    let uuid = &boxes[2];
    assert_eq!(uuid["uuid"], "a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5");
    assert!(ftyp.get("uuid").is_none());
}

#[test]
fn json_reloads_into_an_equal_tree() {
    let bytes = make_minimal_mp4();
    let tree = decode(&bytes).unwrap();

    let reloaded: BoxTree = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
    assert_eq!(reloaded, tree);
    assert_eq!(encode(&reloaded).unwrap(), bytes);
}

#[test]
fn unprintable_fourcc_serializes_as_hex() {
    let mut data = Vec::new();
    data.extend_from_slice(&8u32.to_be_bytes());
    data.extend_from_slice(&[0xA9, b'n', b'a', b'm']);
    let tree = decode(&data).unwrap();

    let v: Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
    assert_eq!(v["boxes"][0]["typ"], "a96e616d");

    let reloaded: BoxTree = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
    assert_eq!(encode(&reloaded).unwrap(), data);
}

#[test]
fn duplicate_field_names_are_rejected() {
    let fields: Fields = serde_json::from_str(r#"{"minor_version":{"UInt":1},"major_brand":{"FourCC":"isom"}}"#).unwrap();
    assert_eq!(fields.uint("minor_version"), Some(1));

    let err = serde_json::from_str::<Fields>(r#"{"minor_version":{"UInt":1},"minor_version":{"UInt":2}}"#)
        .unwrap_err();
    assert!(err.to_string().contains("duplicate field `minor_version`"), "{err}");
}

#[test]
fn fourcc_parses_from_text() {
    assert_eq!("isom".parse::<FourCC>(), Ok(FourCC(*b"isom")));
    assert_eq!("mp4".parse::<FourCC>(), Err(InvalidFourCC { len: 3 }));
    assert_eq!("avc1x".parse::<FourCC>(), Err(InvalidFourCC { len: 5 }));
}

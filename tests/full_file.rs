use isobox::boxes::{FourCC, Payload};
use isobox::{Codec, StreamRange, Value, decode, default_registry};
use std::io::Cursor;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

fn full_box(typ: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut v = vec![version];
    v.extend_from_slice(&flags.to_be_bytes()[1..]);
    v.extend_from_slice(payload);
    boxed(typ, &v)
}

fn be32(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

const IDENTITY: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

fn mvhd() -> Vec<u8> {
    let mut p = be32(&[0, 0, 1000, 3000, 0x0001_0000]);
    p.extend_from_slice(&[0x01, 0x00]); // volume
    p.extend_from_slice(&[0; 10]);
    p.extend(be32(&IDENTITY));
    p.extend_from_slice(&[0; 24]);
    p.extend(be32(&[2]));
    full_box(b"mvhd", 0, 0, &p)
}

fn tkhd() -> Vec<u8> {
    let mut p = be32(&[0, 0, 1, 0, 3000]);
    p.extend_from_slice(&[0; 8]);
    p.extend_from_slice(&[0; 8]); // layer, alternate_group, volume, reserved
    p.extend(be32(&IDENTITY));
    p.extend(be32(&[320 << 16, 240 << 16]));
    full_box(b"tkhd", 0, 3, &p)
}

fn avc1() -> Vec<u8> {
    let mut p = vec![0u8; 6];
    p.extend_from_slice(&[0, 1]); // data_reference_index
    p.extend_from_slice(&[0; 16]); // pre_defined, reserved, pre_defined[3]
    p.extend_from_slice(&320u16.to_be_bytes());
    p.extend_from_slice(&240u16.to_be_bytes());
    p.extend(be32(&[0x0048_0000, 0x0048_0000, 0]));
    p.extend_from_slice(&1u16.to_be_bytes()); // frame_count
    let mut name = [0u8; 32];
    name[0] = 4;
    name[1..5].copy_from_slice(b"test");
    p.extend_from_slice(&name);
    p.extend_from_slice(&0x0018u16.to_be_bytes()); // depth
    p.extend_from_slice(&(-1i16).to_be_bytes());

    let avcc = boxed(
        b"avcC",
        &[1, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, 0x01, 0x00, 0x02, 0x68, 0xEE],
    );
    let pasp = boxed(b"pasp", &be32(&[1, 1]));
    p.extend(avcc);
    p.extend(pasp);
    boxed(b"avc1", &p)
}

fn stbl() -> Vec<u8> {
    let stsd = full_box(b"stsd", 0, 0, &concat(&[be32(&[1]), avc1()]));
    let stts = full_box(b"stts", 0, 0, &be32(&[1, 3, 1000]));
    let stsc = full_box(b"stsc", 0, 0, &be32(&[1, 1, 3, 1]));
    let stsz = full_box(b"stsz", 0, 0, &be32(&[0, 3, 3, 4, 5]));
    let stco = full_box(b"stco", 0, 0, &be32(&[1, 0]));
    let stss = full_box(b"stss", 0, 0, &be32(&[1, 1]));
    boxed(b"stbl", &concat(&[stsd, stts, stsc, stsz, stco, stss]))
}

fn file() -> Vec<u8> {
    let ftyp = boxed(b"ftyp", &concat(&[b"isom".to_vec(), be32(&[0x200]), b"isomavc1".to_vec()]));

    let mut hdlr = be32(&[0]);
    hdlr.extend_from_slice(b"vide");
    hdlr.extend_from_slice(&[0; 12]);
    hdlr.extend_from_slice(b"VideoHandler\0");
    let hdlr = full_box(b"hdlr", 0, 0, &hdlr);

    let mdhd = full_box(b"mdhd", 0, 0, &concat(&[be32(&[0, 0, 1000, 3000]), vec![0x55, 0xC4, 0, 0]]));
    let vmhd = full_box(b"vmhd", 0, 1, &[0; 8]);
    let url = full_box(b"url ", 0, 1, &[]);
    let dref = full_box(b"dref", 0, 0, &concat(&[be32(&[1]), url]));
    let dinf = boxed(b"dinf", &dref);
    let minf = boxed(b"minf", &concat(&[vmhd, dinf, stbl()]));
    let mdia = boxed(b"mdia", &concat(&[mdhd, hdlr, minf]));
    let trak = boxed(b"trak", &concat(&[tkhd(), mdia]));
    let udta = boxed(b"udta", &boxed(b"\xA9too", b"\0\x05\0\0lavf\0"));
    let moov = boxed(b"moov", &concat(&[mvhd(), trak, udta]));
    let mdat = boxed(b"mdat", &[0xAA; 12]);

    concat(&[ftyp, moov, mdat])
}

#[test]
fn progressive_file_round_trips() {
    init_tracing();
    let bytes = file();
    let codec = Codec::new(default_registry());
    let mut src = Cursor::new(bytes.clone());
    let tree = codec.decode_from(&mut src).unwrap();

    let types: Vec<String> = tree.boxes.iter().map(|b| b.typ.to_string()).collect();
    assert_eq!(types, ["ftyp", "moov", "mdat"]);

    let mut out = Vec::new();
    let written = codec.encode_with_source(&tree, &mut src, &mut out).unwrap();
    assert_eq!(written, bytes.len() as u64);
    assert_eq!(out, bytes);
}

#[test]
fn nested_sample_entries_are_reachable() {
    init_tracing();
    let tree = decode(&file()).unwrap();

    let avc1 = tree.find("moov/trak/mdia/minf/stbl/stsd/avc1").expect("avc1");
    assert_eq!(avc1.field("width"), Some(&Value::UInt(320)));
    assert_eq!(avc1.field("pre_defined_3"), Some(&Value::Int(-1)));

    let avcc = avc1.child(b"avcC").unwrap();
    assert_eq!(avcc.field("avc_profile_indication"), Some(&Value::UInt(0x64)));
    assert_eq!(avcc.field("length_size_minus_one"), Some(&Value::UInt(3)));
    assert_eq!(avcc.field("reserved"), Some(&Value::UInt(0x3F)));

    let pasp = tree.find("moov/trak/mdia/minf/stbl/stsd/avc1/pasp").unwrap();
    assert_eq!(pasp.field("h_spacing"), Some(&Value::UInt(1)));

    let hdlr = tree.find("moov/trak/mdia/hdlr").unwrap();
    assert_eq!(hdlr.field("handler_type"), Some(&Value::FourCC(FourCC(*b"vide"))));
    assert_eq!(hdlr.field("name"), Some(&Value::Bytes(b"VideoHandler\0".to_vec())));

    let url = tree.find("moov/trak/mdia/minf/dinf/dref/url ").unwrap();
    assert_eq!(url.flags(), Some(1));

    // Unregistered boxes survive as opaque bytes.
    let too = tree.find("moov/udta").unwrap().children().next().unwrap();
    assert_eq!(too.typ, FourCC(*b"\xA9too"));
    assert!(matches!(too.payload, Payload::Raw(_)));

    let mdat = &tree.boxes[2];
    let range = StreamRange::new(bytes_before_mdat_payload(), 12);
    assert_eq!(mdat.payload, Payload::Stream(range));
}

fn bytes_before_mdat_payload() -> u64 {
    file().len() as u64 - 12
}

#[test]
fn edits_resize_every_ancestor() {
    let tree = decode(&file()).unwrap();
    let stco = tree.find("moov/trak/mdia/minf/stbl/stco").unwrap().clone();
    let stco = stco
        .with_counted_array(
            default_registry(),
            "chunk_offset",
            Value::Array(vec![Value::UInt(100), Value::UInt(200), Value::UInt(300)]),
        )
        .unwrap();

    // Swap the new stco into a copy of the tree by rebuilding the path.
    let replace = |b: &isobox::Mp4Box, kids: Vec<isobox::Mp4Box>| b.clone().with_children(kids);
    let moov = &tree.boxes[1];
    let trak = moov.child(b"trak").unwrap();
    let mdia = trak.child(b"mdia").unwrap();
    let minf = mdia.child(b"minf").unwrap();
    let stbl = minf.child(b"stbl").unwrap();

    let swap = |parent: &isobox::Mp4Box, typ: &[u8; 4], new: isobox::Mp4Box| {
        let kids = parent
            .children()
            .map(|c| if &c.typ.0 == typ { new.clone() } else { c.clone() })
            .collect();
        replace(parent, kids)
    };
    let stbl = swap(stbl, b"stco", stco);
    let minf = swap(minf, b"stbl", stbl);
    let mdia = swap(mdia, b"minf", minf);
    let trak = swap(trak, b"mdia", mdia);
    let moov = swap(moov, b"trak", trak);

    let edited = isobox::BoxTree::new(vec![tree.boxes[0].clone(), moov, isobox::Mp4Box::new_raw(b"mdat", vec![0xAA; 12])]);
    let bytes = isobox::encode(&edited).unwrap();
    assert_eq!(bytes.len(), file().len() + 8);

    let again = decode(&bytes).unwrap();
    assert_eq!(again.boxes[1].size, tree.boxes[1].size + 8);
    assert_eq!(
        again.find("moov/trak/mdia/minf/stbl/stco").unwrap().field("entry_count"),
        Some(&Value::UInt(3))
    );
}

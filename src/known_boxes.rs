//! Built-in schemas for common MP4 / ISOBMFF boxes.
//!
//! Anything not in this table is kept as opaque bytes.

use crate::boxes::{BoxKey, FourCC};
use crate::schema::{
    Count, Element, FieldDescriptor as F, FieldKind as K, IntSpec, IntType, Layout, ListBound, Presence, SchemaEntry,
    V0_I32_V1_I64, V0_U16_V1_U32, V0_U32_V1_I32, V0_U32_V1_U64, VersionTable,
};

// ---------- Entry helpers ----------

const fn entry(code: &[u8; 4], name: &'static str, full_box: bool, layout: Layout) -> SchemaEntry {
    SchemaEntry {
        key: BoxKey::FourCC(FourCC(*code)),
        name,
        full_box,
        layout,
    }
}

const fn container(code: &[u8; 4], name: &'static str) -> SchemaEntry {
    entry(code, name, false, Layout::Container)
}

const fn raw(code: &[u8; 4], name: &'static str) -> SchemaEntry {
    entry(code, name, false, Layout::Raw)
}

const fn stream(code: &[u8; 4], name: &'static str) -> SchemaEntry {
    entry(code, name, false, Layout::Stream)
}

const fn plain(code: &[u8; 4], name: &'static str, fields: &'static [F]) -> SchemaEntry {
    entry(code, name, false, Layout::Fields(fields))
}

const fn full(code: &[u8; 4], name: &'static str, fields: &'static [F]) -> SchemaEntry {
    entry(code, name, true, Layout::Fields(fields))
}

// ---------- Field helpers ----------

const fn int(name: &'static str, t: IntType) -> F {
    F::new(name, K::Int(IntSpec::Fixed(t)))
}

const fn u8f(name: &'static str) -> F {
    int(name, IntType::U8)
}

const fn u16f(name: &'static str) -> F {
    int(name, IntType::U16)
}

const fn u32f(name: &'static str) -> F {
    int(name, IntType::U32)
}

const fn u64f(name: &'static str) -> F {
    int(name, IntType::U64)
}

const fn i16f(name: &'static str) -> F {
    int(name, IntType::I16)
}

const fn i32f(name: &'static str) -> F {
    int(name, IntType::I32)
}

const fn versioned(name: &'static str, table: VersionTable) -> F {
    F::new(name, K::Int(IntSpec::ByVersion(table)))
}

const fn bits(name: &'static str, host: IntType, offset: u8, width: u8) -> F {
    F::new(name, K::Bits { host, offset, width })
}

const fn fourcc(name: &'static str) -> F {
    F::new(name, K::FourCC)
}

const fn bytes(name: &'static str, n: u32) -> F {
    F::new(name, K::Bytes(Count::Fixed(n)))
}

const fn rest(name: &'static str) -> F {
    F::new(name, K::RawToEnd)
}

const fn array(name: &'static str, element: Element, count: Count) -> F {
    F::new(name, K::Array { element, count })
}

const fn records(name: &'static str, record: &'static [F], count: &'static str) -> F {
    array(name, Element::Record(record), Count::Field(count))
}

const fn counted_boxes(name: &'static str, count: &'static str) -> F {
    F::new(name, K::Boxes(ListBound::Count(count)))
}

const fn child_boxes(name: &'static str) -> F {
    F::new(name, K::Boxes(ListBound::ToEnd))
}

const U32_ELEM: Element = Element::Int(IntSpec::Fixed(IntType::U32));
const I32_ELEM: Element = Element::Int(IntSpec::Fixed(IntType::I32));

// ---------- File level ----------

const FTYP: &[F] = &[
    fourcc("major_brand"),
    u32f("minor_version"),
    array("compatible_brands", Element::FourCC, Count::ToEnd),
];

const MVHD: &[F] = &[
    versioned("creation_time", V0_U32_V1_U64),
    versioned("modification_time", V0_U32_V1_U64),
    u32f("timescale"),
    versioned("duration", V0_U32_V1_U64),
    i32f("rate"),
    i16f("volume"),
    bytes("reserved", 10),
    array("matrix", I32_ELEM, Count::Fixed(9)),
    bytes("pre_defined", 24),
    u32f("next_track_id"),
];

const TKHD: &[F] = &[
    versioned("creation_time", V0_U32_V1_U64),
    versioned("modification_time", V0_U32_V1_U64),
    u32f("track_id"),
    u32f("reserved_1"),
    versioned("duration", V0_U32_V1_U64),
    bytes("reserved_2", 8),
    i16f("layer"),
    i16f("alternate_group"),
    i16f("volume"),
    u16f("reserved_3"),
    array("matrix", I32_ELEM, Count::Fixed(9)),
    u32f("width"),
    u32f("height"),
];

const MDHD: &[F] = &[
    versioned("creation_time", V0_U32_V1_U64),
    versioned("modification_time", V0_U32_V1_U64),
    u32f("timescale"),
    versioned("duration", V0_U32_V1_U64),
    bits("pad", IntType::U16, 0, 1),
    bits("language", IntType::U16, 1, 15),
    u16f("pre_defined"),
];

const HDLR: &[F] = &[
    u32f("pre_defined"),
    fourcc("handler_type"),
    bytes("reserved", 12),
    rest("name"),
];

const VMHD: &[F] = &[
    u16f("graphicsmode"),
    array("opcolor", Element::Int(IntSpec::Fixed(IntType::U16)), Count::Fixed(3)),
];

const SMHD: &[F] = &[i16f("balance"), u16f("reserved")];

const HMHD: &[F] = &[
    u16f("max_pdu_size"),
    u16f("avg_pdu_size"),
    u32f("max_bitrate"),
    u32f("avg_bitrate"),
    u32f("reserved"),
];

const EMPTY: &[F] = &[];

const DREF: &[F] = &[u32f("entry_count"), counted_boxes("entries", "entry_count")];

const DATA_ENTRY: &[F] = &[rest("location")];

// ---------- Sample tables ----------

const STSD: &[F] = &[u32f("entry_count"), counted_boxes("entries", "entry_count")];

const STTS_ENTRY: &[F] = &[u32f("sample_count"), u32f("sample_delta")];
const STTS: &[F] = &[u32f("entry_count"), records("entries", STTS_ENTRY, "entry_count")];

const CTTS_ENTRY: &[F] = &[u32f("sample_count"), versioned("sample_offset", V0_U32_V1_I32)];
const CTTS: &[F] = &[u32f("entry_count"), records("entries", CTTS_ENTRY, "entry_count")];

const STSC_ENTRY: &[F] = &[
    u32f("first_chunk"),
    u32f("samples_per_chunk"),
    u32f("sample_description_index"),
];
const STSC: &[F] = &[u32f("entry_count"), records("entries", STSC_ENTRY, "entry_count")];

const STSZ: &[F] = &[
    u32f("sample_size"),
    u32f("sample_count"),
    array("entry_size", U32_ELEM, Count::Field("sample_count")).when(Presence::FieldIs("sample_size", 0)),
];

// Entry width depends on field_size (4, 8 or 16 bits), so entries stay packed.
const STZ2: &[F] = &[
    bytes("reserved", 3),
    u8f("field_size"),
    u32f("sample_count"),
    rest("entries"),
];

const STCO: &[F] = &[
    u32f("entry_count"),
    array("chunk_offset", U32_ELEM, Count::Field("entry_count")),
];

const CO64: &[F] = &[
    u32f("entry_count"),
    array("chunk_offset", Element::Int(IntSpec::Fixed(IntType::U64)), Count::Field("entry_count")),
];

const STSS: &[F] = &[
    u32f("entry_count"),
    array("sample_number", U32_ELEM, Count::Field("entry_count")),
];

const STSH_ENTRY: &[F] = &[u32f("shadowed_sample_number"), u32f("sync_sample_number")];
const STSH: &[F] = &[u32f("entry_count"), records("entries", STSH_ENTRY, "entry_count")];

const SDTP: &[F] = &[rest("sample_dependency")];

const ELST_ENTRY: &[F] = &[
    versioned("segment_duration", V0_U32_V1_U64),
    versioned("media_time", V0_I32_V1_I64),
    i16f("media_rate_integer"),
    i16f("media_rate_fraction"),
];
const ELST: &[F] = &[u32f("entry_count"), records("entries", ELST_ENTRY, "entry_count")];

const CSLG: &[F] = &[
    versioned("composition_to_dts_shift", V0_I32_V1_I64),
    versioned("least_decode_to_display_delta", V0_I32_V1_I64),
    versioned("greatest_decode_to_display_delta", V0_I32_V1_I64),
    versioned("composition_start_time", V0_I32_V1_I64),
    versioned("composition_end_time", V0_I32_V1_I64),
];

// ---------- Fragments ----------

const MEHD: &[F] = &[versioned("fragment_duration", V0_U32_V1_U64)];

const TREX: &[F] = &[
    u32f("track_id"),
    u32f("default_sample_description_index"),
    u32f("default_sample_duration"),
    u32f("default_sample_size"),
    bits("reserved", IntType::U32, 0, 4),
    bits("is_leading", IntType::U32, 4, 2),
    bits("sample_depends_on", IntType::U32, 6, 2),
    bits("sample_is_depended_on", IntType::U32, 8, 2),
    bits("sample_has_redundancy", IntType::U32, 10, 2),
    bits("sample_padding_value", IntType::U32, 12, 3),
    bits("sample_is_non_sync_sample", IntType::U32, 15, 1),
    bits("sample_degradation_priority", IntType::U32, 16, 16),
];

const MFHD: &[F] = &[u32f("sequence_number")];

const TFHD: &[F] = &[
    u32f("track_id"),
    u64f("base_data_offset").when(Presence::FlagsAny(0x01)),
    u32f("sample_description_index").when(Presence::FlagsAny(0x02)),
    u32f("default_sample_duration").when(Presence::FlagsAny(0x08)),
    u32f("default_sample_size").when(Presence::FlagsAny(0x10)),
    u32f("default_sample_flags").when(Presence::FlagsAny(0x20)),
];

const TFDT: &[F] = &[versioned("base_media_decode_time", V0_U32_V1_U64)];

const TRUN_SAMPLE: &[F] = &[
    u32f("sample_duration").when(Presence::FlagsAny(0x100)),
    u32f("sample_size").when(Presence::FlagsAny(0x200)),
    u32f("sample_flags").when(Presence::FlagsAny(0x400)),
    versioned("sample_composition_time_offset", V0_U32_V1_I32).when(Presence::FlagsAny(0x800)),
];
const TRUN: &[F] = &[
    u32f("sample_count"),
    i32f("data_offset").when(Presence::FlagsAny(0x01)),
    u32f("first_sample_flags").when(Presence::FlagsAny(0x04)),
    records("samples", TRUN_SAMPLE, "sample_count"),
];

// traf/trun/sample numbers are (length_size + 1) bytes wide, so entries stay packed.
const TFRA: &[F] = &[
    u32f("track_id"),
    bits("reserved", IntType::U32, 0, 26),
    bits("length_size_of_traf_num", IntType::U32, 26, 2),
    bits("length_size_of_trun_num", IntType::U32, 28, 2),
    bits("length_size_of_sample_num", IntType::U32, 30, 2),
    u32f("number_of_entry"),
    rest("entries"),
];

const MFRO: &[F] = &[u32f("mfra_size")];

const SIDX_REFERENCE: &[F] = &[
    bits("reference_type", IntType::U32, 0, 1),
    bits("referenced_size", IntType::U32, 1, 31),
    u32f("subsegment_duration"),
    bits("starts_with_sap", IntType::U32, 0, 1),
    bits("sap_type", IntType::U32, 1, 3),
    bits("sap_delta_time", IntType::U32, 4, 28),
];
const SIDX: &[F] = &[
    u32f("reference_id"),
    u32f("timescale"),
    versioned("earliest_presentation_time", V0_U32_V1_U64),
    versioned("first_offset", V0_U32_V1_U64),
    u16f("reserved"),
    u16f("reference_count"),
    records("references", SIDX_REFERENCE, "reference_count"),
];

const PRFT: &[F] = &[
    u32f("reference_track_id"),
    u64f("ntp_timestamp"),
    versioned("media_time", V0_U32_V1_U64),
];

// Version 0 starts with two null-terminated strings.
const EMSG: &[F] = &[rest("data")];

// ---------- Protection ----------

const PSSH: &[F] = &[
    bytes("system_id", 16),
    u32f("kid_count").when(Presence::MinVersion(1)),
    array("kids", Element::Bytes(16), Count::Field("kid_count")).when(Presence::MinVersion(1)),
    u32f("data_size"),
    F::new("data", K::Bytes(Count::Field("data_size"))),
];

const SAIZ: &[F] = &[
    fourcc("aux_info_type").when(Presence::FlagsAny(0x01)),
    u32f("aux_info_type_parameter").when(Presence::FlagsAny(0x01)),
    u8f("default_sample_info_size"),
    u32f("sample_count"),
    array(
        "sample_info_size",
        Element::Int(IntSpec::Fixed(IntType::U8)),
        Count::Field("sample_count"),
    )
    .when(Presence::FieldIs("default_sample_info_size", 0)),
];

const SAIO: &[F] = &[
    fourcc("aux_info_type").when(Presence::FlagsAny(0x01)),
    u32f("aux_info_type_parameter").when(Presence::FlagsAny(0x01)),
    u32f("entry_count"),
    array(
        "offsets",
        Element::Int(IntSpec::ByVersion(V0_U32_V1_U64)),
        Count::Field("entry_count"),
    ),
];

// Per-sample IV size lives in tenc, so samples stay packed.
const SENC: &[F] = &[u32f("sample_count"), rest("samples")];

const FRMA: &[F] = &[fourcc("data_format")];

const SCHM: &[F] = &[
    fourcc("scheme_type"),
    u32f("scheme_version"),
    rest("scheme_uri").when(Presence::FlagsAny(0x01)),
];

const TENC: &[F] = &[
    u8f("reserved"),
    bits("default_crypt_byte_block", IntType::U8, 0, 4),
    bits("default_skip_byte_block", IntType::U8, 4, 4),
    u8f("default_is_protected"),
    u8f("default_per_sample_iv_size"),
    bytes("default_kid", 16),
    rest("default_constant_iv"),
];

// ---------- Sample entries and codec configuration ----------

const VISUAL_SAMPLE_ENTRY: &[F] = &[
    bytes("reserved", 6),
    u16f("data_reference_index"),
    u16f("pre_defined"),
    u16f("reserved_2"),
    bytes("pre_defined_2", 12),
    u16f("width"),
    u16f("height"),
    u32f("horizresolution"),
    u32f("vertresolution"),
    u32f("reserved_3"),
    u16f("frame_count"),
    bytes("compressorname", 32),
    u16f("depth"),
    i16f("pre_defined_3"),
    child_boxes("children"),
];

const AUDIO_SAMPLE_ENTRY: &[F] = &[
    bytes("reserved", 6),
    u16f("data_reference_index"),
    u16f("entry_version"),
    bytes("reserved_2", 6),
    u16f("channel_count"),
    u16f("sample_size"),
    u16f("pre_defined"),
    u16f("reserved_3"),
    u32f("sample_rate"),
    u32f("samples_per_packet").when(Presence::FieldIs("entry_version", 1)),
    u32f("bytes_per_packet").when(Presence::FieldIs("entry_version", 1)),
    u32f("bytes_per_frame").when(Presence::FieldIs("entry_version", 1)),
    u32f("bytes_per_sample").when(Presence::FieldIs("entry_version", 1)),
    child_boxes("children"),
];

const PASP: &[F] = &[u32f("h_spacing"), u32f("v_spacing")];

const BTRT: &[F] = &[u32f("buffer_size_db"), u32f("max_bitrate"), u32f("avg_bitrate")];

const COLR: &[F] = &[fourcc("colour_type"), rest("data")];

const CLAP: &[F] = &[
    u32f("clean_aperture_width_n"),
    u32f("clean_aperture_width_d"),
    u32f("clean_aperture_height_n"),
    u32f("clean_aperture_height_d"),
    u32f("horiz_off_n"),
    u32f("horiz_off_d"),
    u32f("vert_off_n"),
    u32f("vert_off_d"),
];

const AVCC: &[F] = &[
    u8f("configuration_version"),
    u8f("avc_profile_indication"),
    u8f("profile_compatibility"),
    u8f("avc_level_indication"),
    bits("reserved", IntType::U8, 0, 6),
    bits("length_size_minus_one", IntType::U8, 6, 2),
    rest("parameter_sets"),
];

const ESDS: &[F] = &[rest("descriptors")];

// ---------- Misc ----------

const CPRT: &[F] = &[
    bits("pad", IntType::U16, 0, 1),
    bits("language", IntType::U16, 1, 15),
    rest("notice"),
];

const ISPE: &[F] = &[u32f("image_width"), u32f("image_height")];

const PITM: &[F] = &[versioned("item_id", V0_U16_V1_U32)];

/// The built-in table behind [`crate::registry::default_registry`].
pub static SCHEMAS: &[SchemaEntry] = &[
    // File level
    plain(b"ftyp", "File Type Box", FTYP),
    plain(b"styp", "Segment Type Box", FTYP),
    stream(b"mdat", "Media Data Box"),
    stream(b"imda", "Identified Media Data Box"),
    raw(b"free", "Free Space Box"),
    raw(b"skip", "Free Space Box"),
    raw(b"wide", "Wide Box"),
    entry(b"meta", "Meta Box", true, Layout::Container),
    full(b"pssh", "Protection System Specific Header Box", PSSH),
    full(b"sidx", "Segment Index Box", SIDX),
    full(b"prft", "Producer Reference Time Box", PRFT),
    full(b"emsg", "Event Message Box", EMSG),
    container(b"mfra", "Movie Fragment Random Access Box"),
    full(b"tfra", "Track Fragment Random Access Box", TFRA),
    full(b"mfro", "Movie Fragment Random Access Offset Box", MFRO),
    // moov
    container(b"moov", "Movie Box"),
    full(b"mvhd", "Movie Header Box", MVHD),
    container(b"trak", "Track Box"),
    container(b"mvex", "Movie Extends Box"),
    full(b"mehd", "Movie Extends Header Box", MEHD),
    full(b"trex", "Track Extends Box", TREX),
    container(b"udta", "User Data Box"),
    full(b"cprt", "Copyright Box", CPRT),
    // trak
    full(b"tkhd", "Track Header Box", TKHD),
    container(b"edts", "Edit Box"),
    full(b"elst", "Edit List Box", ELST),
    container(b"tref", "Track Reference Box"),
    container(b"meco", "Additional Metadata Container Box"),
    container(b"mdia", "Media Box"),
    full(b"mdhd", "Media Header Box", MDHD),
    full(b"hdlr", "Handler Reference Box", HDLR),
    container(b"minf", "Media Information Box"),
    full(b"vmhd", "Video Media Header Box", VMHD),
    full(b"smhd", "Sound Media Header Box", SMHD),
    full(b"hmhd", "Hint Media Header Box", HMHD),
    full(b"nmhd", "Null Media Header Box", EMPTY),
    container(b"dinf", "Data Information Box"),
    full(b"dref", "Data Reference Box", DREF),
    full(b"url ", "Data Entry Url Box", DATA_ENTRY),
    full(b"urn ", "Data Entry Urn Box", DATA_ENTRY),
    // stbl
    container(b"stbl", "Sample Table Box"),
    full(b"stsd", "Sample Description Box", STSD),
    full(b"stts", "Decoding Time to Sample Box", STTS),
    full(b"ctts", "Composition Time to Sample Box", CTTS),
    full(b"cslg", "Composition to Decode Box", CSLG),
    full(b"stsc", "Sample To Chunk Box", STSC),
    full(b"stsz", "Sample Size Box", STSZ),
    full(b"stz2", "Compact Sample Size Box", STZ2),
    full(b"stco", "Chunk Offset Box", STCO),
    full(b"co64", "Chunk Large Offset Box", CO64),
    full(b"stss", "Sync Sample Box", STSS),
    full(b"stsh", "Shadow Sync Sample Box", STSH),
    full(b"sdtp", "Independent and Disposable Samples Box", SDTP),
    full(b"saiz", "Sample Auxiliary Information Sizes Box", SAIZ),
    full(b"saio", "Sample Auxiliary Information Offsets Box", SAIO),
    full(b"senc", "Sample Encryption Box", SENC),
    // Fragments
    container(b"moof", "Movie Fragment Box"),
    full(b"mfhd", "Movie Fragment Header Box", MFHD),
    container(b"traf", "Track Fragment Box"),
    full(b"tfhd", "Track Fragment Header Box", TFHD),
    full(b"tfdt", "Track Fragment Decode Time Box", TFDT),
    full(b"trun", "Track Fragment Run Box", TRUN),
    // Protection
    container(b"sinf", "Protection Scheme Information Box"),
    plain(b"frma", "Original Format Box", FRMA),
    full(b"schm", "Scheme Type Box", SCHM),
    container(b"schi", "Scheme Information Box"),
    full(b"tenc", "Track Encryption Box", TENC),
    // Visual sample entries
    plain(b"avc1", "AVC Sample Entry", VISUAL_SAMPLE_ENTRY),
    plain(b"avc3", "AVC Sample Entry", VISUAL_SAMPLE_ENTRY),
    plain(b"hvc1", "HEVC Sample Entry", VISUAL_SAMPLE_ENTRY),
    plain(b"hev1", "HEVC Sample Entry", VISUAL_SAMPLE_ENTRY),
    plain(b"vp09", "VP9 Sample Entry", VISUAL_SAMPLE_ENTRY),
    plain(b"av01", "AV1 Sample Entry", VISUAL_SAMPLE_ENTRY),
    plain(b"mp4v", "MPEG-4 Visual Sample Entry", VISUAL_SAMPLE_ENTRY),
    plain(b"encv", "Encrypted Video Sample Entry", VISUAL_SAMPLE_ENTRY),
    // Audio sample entries
    plain(b"mp4a", "MPEG-4 Audio Sample Entry", AUDIO_SAMPLE_ENTRY),
    plain(b"ac-3", "AC-3 Sample Entry", AUDIO_SAMPLE_ENTRY),
    plain(b"ec-3", "E-AC-3 Sample Entry", AUDIO_SAMPLE_ENTRY),
    plain(b"Opus", "Opus Sample Entry", AUDIO_SAMPLE_ENTRY),
    plain(b"alac", "ALAC Sample Entry", AUDIO_SAMPLE_ENTRY),
    plain(b"fLaC", "FLAC Sample Entry", AUDIO_SAMPLE_ENTRY),
    plain(b"enca", "Encrypted Audio Sample Entry", AUDIO_SAMPLE_ENTRY),
    // Codec configuration and sample entry extensions
    plain(b"avcC", "AVC Configuration Box", AVCC),
    raw(b"hvcC", "HEVC Configuration Box"),
    full(b"esds", "Elementary Stream Descriptor Box", ESDS),
    plain(b"pasp", "Pixel Aspect Ratio Box", PASP),
    plain(b"btrt", "Bit Rate Box", BTRT),
    plain(b"colr", "Colour Information Box", COLR),
    plain(b"clap", "Clean Aperture Box", CLAP),
    // Items
    container(b"iprp", "Item Properties Box"),
    container(b"ipco", "Item Property Container Box"),
    full(b"ispe", "Image Spatial Extents Property", ISPE),
    full(b"pitm", "Primary Item Box", PITM),
];

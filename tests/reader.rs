use bsdiff_format::*;
use test_utils::*;

fn legacy_sample() -> Vec<u8> {
    let mut writer = BsdiffPatchWriter::new(Vec::new());
    feed(&mut writer, &Script::sample(), Order::Nice).unwrap();
    writer.into_inner()
}

#[test]
fn detects_formats() {
    let legacy = legacy_sample();
    assert_eq!(&legacy[..8], b"BSDIFF40");
    let reader = open_patch(&legacy[..], CompressorType::NoCompression).unwrap();
    assert_eq!(reader.format(), BsdiffFormat::Legacy);
    assert_eq!(reader.compressor_types(), &[CompressorType::BZ2; 3]);

    let mut bsdf2 = Vec::new();
    {
        let mut writer = PatchConfig::new(BsdiffFormat::Bsdf2)
            .compressor(CompressorType::Brotli)
            .writer(&mut bsdf2)
            .unwrap();
        feed(&mut writer, &Script::sample(), Order::Nice).unwrap();
    }
    assert_eq!(&bsdf2[..8], b"BSDF2\x02\x02\x02");
    let reader = open_patch(&bsdf2[..], CompressorType::NoCompression).unwrap();
    assert_eq!(reader.format(), BsdiffFormat::Bsdf2);
    assert_eq!(reader.compressor_types(), &[CompressorType::Brotli; 3]);
}

#[test]
fn rejects_unknown_or_short_patches() {
    let legacy = legacy_sample();
    assert!(open_patch(&legacy[..31], CompressorType::NoCompression).is_err());
    assert!(open_patch(b"", CompressorType::NoCompression).is_err());
    assert!(open_patch(&[0; 64], CompressorType::NoCompression).is_err());

    let mut bad = legacy.clone();
    bad[7] = b'1';
    assert!(open_patch(&bad[..], CompressorType::NoCompression).is_err());
}

#[test]
fn rejects_inconsistent_lengths() {
    let legacy = legacy_sample();

    let mut negative = legacy.clone();
    negative[15] |= 0x80;
    assert!(BsdiffPatchReader::new(&negative[..]).is_err());

    let mut overflow = legacy.clone();
    overflow[8..16].copy_from_slice(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f]);
    overflow[16..24].copy_from_slice(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f]);
    assert!(BsdiffPatchReader::new(&overflow[..]).is_err());

    let truncated = &legacy[..legacy.len() - 1];
    let mut reader = BsdiffPatchReader::new(truncated).unwrap();
    assert!(read_back(&mut reader).is_err());
}

#[test]
fn trailing_garbage_fails() {
    let mut legacy = legacy_sample();
    legacy.extend_from_slice(b"garbage");
    let mut reader = BsdiffPatchReader::new(&legacy[..]).unwrap();
    assert!(read_back(&mut reader).is_err());
}

#[test]
fn endsley_needs_the_right_codec() {
    let mut writer = EndsleyPatchWriter::new(Vec::new(), CompressorType::BZ2, 9);
    feed(&mut writer, &Script::sample(), Order::Nice).unwrap();
    let patch = writer.into_inner();

    let mut reader = open_patch(&patch[..], CompressorType::BZ2).unwrap();
    assert_eq!(reader.format(), BsdiffFormat::Endsley);
    assert_eq!(read_back(&mut reader).unwrap(), Script::sample());

    let mut reader = open_patch(&patch[..], CompressorType::NoCompression).unwrap();
    assert!(read_back(&mut reader).is_err());
}

use bsdiff_format::*;
use test_utils::*;

fn configs() -> Vec<PatchConfig> {
    use BsdiffFormat::*;
    use CompressorType::*;
    vec![
        PatchConfig::new(Legacy),
        PatchConfig::new(Bsdf2).compressors(&[BZ2, Brotli]),
        PatchConfig::new(Endsley).compressor(NoCompression),
        PatchConfig::new(Endsley).compressor(Brotli),
    ]
}

fn write_patch(config: &PatchConfig, script: &Script) -> Vec<u8> {
    let mut patch = Vec::new();
    {
        let mut writer = config.writer(&mut patch).unwrap();
        feed(&mut writer, script, Order::Shuffled(3)).unwrap();
    }
    patch
}

#[test]
fn converts_between_formats() {
    let (_, script) = default_random_scripts()[3].generate();
    for from in configs().iter() {
        let patch = write_patch(from, &script);
        for to in configs().iter() {
            let codec = from.compressor_types()[0];
            let mut reader = open_patch(&patch[..], codec).unwrap();
            let mut out = Vec::new();
            {
                let mut writer = to.writer(&mut out).unwrap();
                assert_eq!(repack(&mut reader, &mut writer).unwrap(), script.new_size());
            }
            assert_eq!(detect_format(&out[..]), Some(to.format()));
            let mut reader = open_patch(&out[..], to.compressor_types()[0]).unwrap();
            assert!(read_back(&mut reader).unwrap() == script, "{:?} to {:?}", from, to);
        }
    }
}

#[test]
fn forwards_every_call() {
    let patch = write_patch(&PatchConfig::new(BsdiffFormat::Legacy), &Script::sample());
    let mut reader = BsdiffPatchReader::new(&patch[..]).unwrap();
    let mut writer = RecordingPatchWriter::default();
    repack(&mut reader, &mut writer).unwrap();
    assert_eq!(
        writer.calls,
        vec![
            Call::Init(10),
            Call::Control(ControlEntry::new(2, 3, -2)),
            Call::Diff(b"ab".to_vec()),
            Call::Extra(b"cde".to_vec()),
            Call::Control(ControlEntry::new(0, 5, 1024)),
            Call::Extra(b"FGHIJ".to_vec()),
            Call::Close,
        ]
    );
}

#[test]
fn truncated_input_fails() {
    let patch = write_patch(&PatchConfig::new(BsdiffFormat::Endsley), &Script::sample());
    let truncated = &patch[..patch.len() - 1];
    let mut reader = EndsleyPatchReader::new(truncated, CompressorType::NoCompression).unwrap();
    let mut writer = RecordingPatchWriter::default();
    assert!(repack(&mut reader, &mut writer).is_err());
    assert!(!writer.calls.contains(&Call::Close));
}

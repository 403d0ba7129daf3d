use super::PatchReader;
use crate::compress::{create_decompressor, Decompressor};
use crate::error::{Error, Result};
use crate::format::*;
use crate::utils::*;
use log::{debug, error};

/// Reader of the interleaved `ENDSLEY/BSDIFF43` format.
///
/// The body is one stream, so reads must follow the record layout exactly:
/// each control entry, then all of its diff bytes, then all of its extra
/// bytes.
pub struct EndsleyPatchReader<'a> {
    kind: [CompressorType; 1],
    new_size: u64,
    body: Box<dyn Decompressor<'a> + 'a>,
    pending_diff: u64,
    pending_extra: u64,
    finished: bool,
}

impl<'a> EndsleyPatchReader<'a> {
    /// Parses the header, the body is decoded with `kind`.
    pub fn new(patch: &'a [u8], kind: CompressorType) -> Result<Self> {
        if patch.len() < ENDSLEY_HEADER_SIZE {
            error!("patch too short: {} bytes", patch.len());
            return Err(Error::format("patch is shorter than its header"));
        }
        if !patch.starts_with(ENDSLEY_MAGIC) {
            error!("unrecognized patch magic");
            return Err(Error::format("not an endsley patch"));
        }
        let new_size = decode_int(&patch[16..24]);
        if new_size < 0 {
            error!("negative new size {}", new_size);
            return Err(Error::format("corrupt patch header"));
        }

        let mut body = create_decompressor(kind);
        body.set_input_data(&patch[ENDSLEY_HEADER_SIZE..])?;
        debug!("endsley patch, codec {}, new size {}", kind, new_size);
        Ok(EndsleyPatchReader {
            kind: [kind],
            new_size: new_size as u64,
            body,
            pending_diff: 0,
            pending_extra: 0,
            finished: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.finished {
            Err(Error::sequence("patch reader is finished"))
        } else {
            Ok(())
        }
    }
}

impl<'a> PatchReader for EndsleyPatchReader<'a> {
    fn format(&self) -> BsdiffFormat {
        BsdiffFormat::Endsley
    }

    fn compressor_types(&self) -> &[CompressorType] {
        &self.kind[..]
    }

    fn new_file_size(&self) -> u64 {
        self.new_size
    }

    fn parse_control_entry(&mut self) -> Result<ControlEntry> {
        self.check_open()?;
        if self.pending_diff != 0 || self.pending_extra != 0 {
            error!(
                "{} diff and {} extra bytes of the previous entry are unread",
                self.pending_diff, self.pending_extra
            );
            return Err(Error::sequence("previous record is not fully read"));
        }
        let mut b = [0; CONTROL_ENTRY_SIZE];
        self.body.read(&mut b[..])?;
        let entry = ControlEntry::decode(&b)?;
        self.pending_diff = entry.diff_size;
        self.pending_extra = entry.extra_size;
        Ok(entry)
    }

    fn read_diff_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        if buf.len() as u64 > self.pending_diff {
            error!(
                "reading {} diff bytes, the entry has {} left",
                buf.len(),
                self.pending_diff
            );
            return Err(Error::sequence("diff read exceeds the control entry"));
        }
        self.body.read(buf)?;
        self.pending_diff -= buf.len() as u64;
        Ok(())
    }

    fn read_extra_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        if buf.is_empty() {
            return Ok(());
        }
        if self.pending_diff != 0 {
            error!("{} diff bytes must be read before extra data", self.pending_diff);
            return Err(Error::sequence("extra read before the diff data"));
        }
        if buf.len() as u64 > self.pending_extra {
            error!(
                "reading {} extra bytes, the entry has {} left",
                buf.len(),
                self.pending_extra
            );
            return Err(Error::sequence("extra read exceeds the control entry"));
        }
        self.body.read(buf)?;
        self.pending_extra -= buf.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.check_open()?;
        self.finished = true;
        if self.pending_diff != 0 || self.pending_extra != 0 {
            return Err(Error::sequence("last record is not fully read"));
        }
        self.body.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{EndsleyPatchWriter, PatchWriter};

    fn sample(kind: CompressorType) -> Vec<u8> {
        let mut writer = EndsleyPatchWriter::new(Vec::new(), kind, 9);
        writer.init(10).unwrap();
        writer.add_control_entry(ControlEntry::new(2, 3, -2)).unwrap();
        writer.add_control_entry(ControlEntry::new(0, 5, 1024)).unwrap();
        writer.write_diff_stream(b"ab").unwrap();
        writer.write_extra_stream(b"cdeFGHIJ").unwrap();
        writer.close().unwrap();
        writer.into_inner()
    }

    #[test]
    fn reads_records_in_order() {
        for &kind in [CompressorType::NoCompression, CompressorType::BZ2, CompressorType::Brotli].iter() {
            let p = sample(kind);
            let mut reader = EndsleyPatchReader::new(&p[..], kind).unwrap();
            assert_eq!(reader.format(), BsdiffFormat::Endsley);
            assert_eq!(reader.compressor_types(), &[kind]);
            assert_eq!(reader.new_file_size(), 10);

            let mut buf = [0; 5];
            assert_eq!(reader.parse_control_entry().unwrap(), ControlEntry::new(2, 3, -2));
            reader.read_diff_stream(&mut buf[..1]).unwrap();
            reader.read_diff_stream(&mut buf[1..2]).unwrap();
            assert_eq!(&buf[..2], b"ab");
            reader.read_extra_stream(&mut buf[..3]).unwrap();
            assert_eq!(&buf[..3], b"cde");
            assert_eq!(reader.parse_control_entry().unwrap(), ControlEntry::new(0, 5, 1024));
            reader.read_diff_stream(&mut []).unwrap();
            reader.read_extra_stream(&mut buf[..]).unwrap();
            assert_eq!(&buf[..], b"FGHIJ");
            reader.finish().unwrap();
        }
    }

    #[test]
    fn enforces_record_order() {
        let p = sample(CompressorType::NoCompression);
        let mut reader = EndsleyPatchReader::new(&p[..], CompressorType::NoCompression).unwrap();
        assert!(reader.read_diff_stream(&mut [0]).is_err());

        let mut reader = EndsleyPatchReader::new(&p[..], CompressorType::NoCompression).unwrap();
        reader.parse_control_entry().unwrap();
        assert!(reader.read_extra_stream(&mut [0]).is_err());

        let mut reader = EndsleyPatchReader::new(&p[..], CompressorType::NoCompression).unwrap();
        reader.parse_control_entry().unwrap();
        assert!(reader.read_diff_stream(&mut [0; 3]).is_err());

        let mut reader = EndsleyPatchReader::new(&p[..], CompressorType::NoCompression).unwrap();
        reader.parse_control_entry().unwrap();
        reader.read_diff_stream(&mut [0; 2]).unwrap();
        assert!(reader.parse_control_entry().is_err());

        let mut reader = EndsleyPatchReader::new(&p[..], CompressorType::NoCompression).unwrap();
        reader.parse_control_entry().unwrap();
        assert!(reader.finish().is_err());
    }

    #[test]
    fn trailing_body_fails() {
        let mut p = sample(CompressorType::NoCompression);
        p.push(0);
        let mut reader = EndsleyPatchReader::new(&p[..], CompressorType::NoCompression).unwrap();
        let mut buf = [0; 8];
        reader.parse_control_entry().unwrap();
        reader.read_diff_stream(&mut buf[..2]).unwrap();
        reader.read_extra_stream(&mut buf[..3]).unwrap();
        reader.parse_control_entry().unwrap();
        reader.read_extra_stream(&mut buf[..5]).unwrap();
        assert!(reader.finish().is_err());
    }

    #[test]
    fn rejects_bad_headers() {
        let p = sample(CompressorType::NoCompression);
        assert!(EndsleyPatchReader::new(&p[..23], CompressorType::NoCompression).is_err());
        assert!(EndsleyPatchReader::new(b"ENDSLEY/BSDIFF44\0\0\0\0\0\0\0\0", CompressorType::BZ2).is_err());

        let mut negative = p[..ENDSLEY_HEADER_SIZE].to_vec();
        encode_int(-1, &mut negative[16..24]);
        assert!(EndsleyPatchReader::new(&negative[..], CompressorType::NoCompression).is_err());
    }

    #[test]
    fn wrong_codec_fails() {
        let p = sample(CompressorType::Brotli);
        let mut reader = EndsleyPatchReader::new(&p[..], CompressorType::BZ2).unwrap();
        assert!(reader.parse_control_entry().is_err());
    }
}

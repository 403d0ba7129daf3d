use bsdiff_format::{ControlEntry, Error, PatchReader, PatchWriter, Result};
use rand::distributions::uniform::{SampleUniform, Uniform};
use rand::prelude::*;

/// One control entry with its diff and extra bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub entry: ControlEntry,
    pub diff: Vec<u8>,
    pub extra: Vec<u8>,
}

impl Record {
    /// Create a record, the sizes are taken from the data.
    pub fn new(diff: &[u8], extra: &[u8], offset_increment: i64) -> Self {
        Record {
            entry: ControlEntry::new(diff.len() as u64, extra.len() as u64, offset_increment),
            diff: diff.to_vec(),
            extra: extra.to_vec(),
        }
    }
}

/// The whole content of a patch, as a diff algorithm would produce it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Script {
    pub records: Vec<Record>,
}

impl Script {
    /// `abcdeFGHIJ` split into 2 diff + 3 extra bytes, then 5 extra bytes.
    pub fn sample() -> Self {
        Script {
            records: vec![Record::new(b"ab", b"cde", -2), Record::new(b"", b"FGHIJ", 1024)],
        }
    }

    /// Size of the new file.
    pub fn new_size(&self) -> u64 {
        self.records.iter().map(|r| r.entry.output_size()).sum()
    }

    /// Concatenation of the diff bytes.
    pub fn diff_stream(&self) -> Vec<u8> {
        self.records.iter().flat_map(|r| r.diff.iter().cloned()).collect()
    }

    /// Concatenation of the extra bytes.
    pub fn extra_stream(&self) -> Vec<u8> {
        self.records.iter().flat_map(|r| r.extra.iter().cloned()).collect()
    }
}

/// Description of a random script.
pub struct RandomScript {
    pub name: &'static str,
    pub seed: u64,
    /// Size of the old file the script is applied to.
    pub old_size: usize,
    pub records: usize,
    pub max_diff: usize,
    pub max_extra: usize,
}

impl RandomScript {
    /// Generate the old file and a script that stays inside it.
    pub fn generate(&self) -> (Vec<u8>, Script) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let old = random_bytes(&mut rng, self.old_size);

        let mut pos = 0usize;
        let mut records = Vec::with_capacity(self.records);
        for i in 0..self.records {
            let dsize = random_between(&mut rng, 0, Ord::min(self.max_diff, self.old_size - pos));
            let mut esize = random_between(&mut rng, 0, self.max_extra);
            if i + 1 == self.records && dsize + esize == 0 {
                esize = 1;
            }
            let diff = random_bytes(&mut rng, dsize);
            let extra = random_bytes(&mut rng, esize);
            pos += dsize;
            let next = random_between(&mut rng, 0, self.old_size);
            records.push(Record::new(&diff[..], &extra[..], next as i64 - pos as i64));
            pos = next;
        }
        (old, Script { records })
    }
}

/// Default random script descriptions.
pub fn default_random_scripts() -> Vec<RandomScript> {
    vec![
        RandomScript {
            name: "empty",
            seed: 1,
            old_size: 0,
            records: 0,
            max_diff: 0,
            max_extra: 0,
        },
        RandomScript {
            name: "extra-only",
            seed: 2,
            old_size: 0,
            records: 8,
            max_diff: 0,
            max_extra: 300,
        },
        RandomScript {
            name: "small",
            seed: 3,
            old_size: 4096,
            records: 32,
            max_diff: 512,
            max_extra: 64,
        },
        RandomScript {
            name: "sparse",
            seed: 4,
            old_size: 64 * 1024,
            records: 200,
            max_diff: 16,
            max_extra: 4,
        },
        RandomScript {
            name: "large",
            seed: 5,
            old_size: 1024 * 1024,
            records: 48,
            max_diff: 96 * 1024,
            max_extra: 32 * 1024,
        },
    ]
}

/// Order in which a script is fed to a writer.
#[derive(Copy, Clone, Debug)]
pub enum Order {
    /// Each control entry, then its diff bytes, then its extra bytes.
    Nice,
    /// All diff bytes, then all extra bytes, then all control entries.
    Bad,
    /// All control entries, then the data.
    ControlsFirst,
    /// Random interleaving of randomly sized pieces, each stream in order.
    Shuffled(u64),
}

/// Initialize the writer, feed the script in the given order and close it.
pub fn feed<W: PatchWriter + ?Sized>(writer: &mut W, script: &Script, order: Order) -> Result<()> {
    writer.init(script.new_size())?;
    match order {
        Order::Nice => {
            for r in script.records.iter() {
                writer.add_control_entry(r.entry)?;
                writer.write_diff_stream(&r.diff[..])?;
                writer.write_extra_stream(&r.extra[..])?;
            }
        }
        Order::Bad => {
            writer.write_diff_stream(&script.diff_stream()[..])?;
            writer.write_extra_stream(&script.extra_stream()[..])?;
            for r in script.records.iter() {
                writer.add_control_entry(r.entry)?;
            }
        }
        Order::ControlsFirst => {
            for r in script.records.iter() {
                writer.add_control_entry(r.entry)?;
            }
            for r in script.records.iter() {
                writer.write_diff_stream(&r.diff[..])?;
                writer.write_extra_stream(&r.extra[..])?;
            }
        }
        Order::Shuffled(seed) => feed_shuffled(writer, script, seed)?,
    }
    writer.close()
}

fn feed_shuffled<W: PatchWriter + ?Sized>(writer: &mut W, script: &Script, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let diff = script.diff_stream();
    let extra = script.extra_stream();
    let mut next_entry = 0;
    let mut next_diff = 0;
    let mut next_extra = 0;

    while next_entry < script.records.len() || next_diff < diff.len() || next_extra < extra.len() {
        match rng.gen_range(0..3) {
            0 if next_entry < script.records.len() => {
                writer.add_control_entry(script.records[next_entry].entry)?;
                next_entry += 1;
            }
            1 if next_diff < diff.len() => {
                let n = random_between(&mut rng, 1, Ord::min(diff.len() - next_diff, 4096));
                writer.write_diff_stream(&diff[next_diff..next_diff + n])?;
                next_diff += n;
            }
            2 if next_extra < extra.len() => {
                let n = random_between(&mut rng, 1, Ord::min(extra.len() - next_extra, 4096));
                writer.write_extra_stream(&extra[next_extra..next_extra + n])?;
                next_extra += n;
            }
            _ => (),
        }
    }
    Ok(())
}

/// Read every record of a patch back, then finish the reader.
pub fn read_back<R: PatchReader + ?Sized>(reader: &mut R) -> Result<Script> {
    let new_size = reader.new_file_size();
    let mut script = Script::default();
    let mut written = 0;
    while written < new_size {
        let entry = reader.parse_control_entry()?;
        if entry.output_size() > new_size - written {
            return Err(Error::format("control entry overruns the new file"));
        }
        let mut diff = vec![0; entry.diff_size as usize];
        reader.read_diff_stream(&mut diff[..])?;
        let mut extra = vec![0; entry.extra_size as usize];
        reader.read_extra_stream(&mut extra[..])?;
        written += entry.output_size();
        script.records.push(Record { entry, diff, extra });
    }
    reader.finish()?;
    Ok(script)
}

/// Apply a patch to the old file, the way bspatch does.
pub fn apply<R: PatchReader + ?Sized>(old: &[u8], reader: &mut R) -> Result<Vec<u8>> {
    let new_size = reader.new_file_size() as usize;
    let mut new = Vec::with_capacity(new_size);
    let mut pos = 0i64;
    while new.len() < new_size {
        let entry = reader.parse_control_entry()?;
        if entry.output_size() > (new_size - new.len()) as u64 {
            return Err(Error::format("control entry overruns the new file"));
        }

        let start = new.len();
        new.resize(start + entry.diff_size as usize, 0);
        reader.read_diff_stream(&mut new[start..])?;
        let end = pos + entry.diff_size as i64;
        if pos < 0 || end > old.len() as i64 {
            return Err(Error::format("diff span outside of the old file"));
        }
        for (x, &y) in new[start..].iter_mut().zip(old[pos as usize..end as usize].iter()) {
            *x = x.wrapping_add(y);
        }

        let start = new.len();
        new.resize(start + entry.extra_size as usize, 0);
        reader.read_extra_stream(&mut new[start..])?;
        pos = end + entry.offset_increment;
    }
    reader.finish()?;
    Ok(new)
}

/// A call made on a patch writer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Init(u64),
    Control(ControlEntry),
    Diff(Vec<u8>),
    Extra(Vec<u8>),
    Close,
}

/// Patch writer that only records the calls made on it.
#[derive(Debug, Default)]
pub struct RecordingPatchWriter {
    pub calls: Vec<Call>,
}

impl PatchWriter for RecordingPatchWriter {
    fn init(&mut self, new_size: u64) -> Result<()> {
        self.calls.push(Call::Init(new_size));
        Ok(())
    }

    fn write_diff_stream(&mut self, data: &[u8]) -> Result<()> {
        self.calls.push(Call::Diff(data.to_vec()));
        Ok(())
    }

    fn write_extra_stream(&mut self, data: &[u8]) -> Result<()> {
        self.calls.push(Call::Extra(data.to_vec()));
        Ok(())
    }

    fn add_control_entry(&mut self, entry: ControlEntry) -> Result<()> {
        self.calls.push(Call::Control(entry));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.calls.push(Call::Close);
        Ok(())
    }
}

fn random_bytes<G: Rng>(rng: &mut G, n: usize) -> Vec<u8> {
    let mut bytes = vec![0; n];
    rng.fill_bytes(&mut bytes[..]);
    bytes
}

fn random_between<G: Rng, X: SampleUniform>(rng: &mut G, lo: X, hi: X) -> X {
    Uniform::new_inclusive(lo, hi).sample(rng)
}

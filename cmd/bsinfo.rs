#![forbid(unsafe_code)]
use std::fs;
use std::io;
use std::io::prelude::*;
use std::process;

use bsdiff_format::{open_patch, CompressorType, PatchReader};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "bsinfo",
    version,
    about = "describe and verify a bsdiff patch container",
    long_about = None,
)]
struct InfoArgs {
    /// patch file
    #[arg(value_name = "PATCH")]
    patch_path: String,

    /// print every control entry
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// codec of ENDSLEY/BSDIFF43 patches
    #[arg(long = "endsley-codec", value_name = "TYPE", default_value = "nocompression")]
    endsley_codec: CompressorType,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = InfoArgs::parse();
    if let Err(e) = execute(args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn execute(args: InfoArgs) -> io::Result<()> {
    let mut patch;
    if args.patch_path == "-" {
        patch = Vec::new();
        io::stdin().read_to_end(&mut patch)?;
    } else {
        patch = fs::read(&args.patch_path)?;
    }

    let mut reader = open_patch(&patch[..], args.endsley_codec)?;
    let codecs: Vec<String> = reader.compressor_types().iter().map(|k| k.to_string()).collect();
    println!("format:     {}", reader.format());
    println!("codecs:     {}", codecs.join(":"));
    println!("patch size: {}", patch.len());
    println!("new size:   {}", reader.new_file_size());

    let stats = walk(&mut reader, args.verbose)?;
    println!("entries:    {}", stats.entries);
    println!("diff:       {}", stats.diff);
    println!("extra:      {}", stats.extra);
    Ok(())
}

#[derive(Default)]
struct Stats {
    entries: u64,
    diff: u64,
    extra: u64,
}

/// Reads through the whole patch, which also verifies it.
fn walk<R: PatchReader + ?Sized>(reader: &mut R, verbose: bool) -> io::Result<Stats> {
    let new_size = reader.new_file_size();
    let mut stats = Stats::default();
    let mut buf = vec![0; 64 * 1024];
    while stats.diff + stats.extra < new_size {
        let entry = reader.parse_control_entry()?;
        if verbose {
            println!(
                "{:8}: diff {:10} extra {:10} seek {:+}",
                stats.entries, entry.diff_size, entry.extra_size, entry.offset_increment
            );
        }
        if entry.output_size() > new_size - stats.diff - stats.extra {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "control entry overruns the new file",
            ));
        }
        skip(entry.diff_size, &mut buf[..], |b| reader.read_diff_stream(b))?;
        skip(entry.extra_size, &mut buf[..], |b| reader.read_extra_stream(b))?;
        stats.entries += 1;
        stats.diff += entry.diff_size;
        stats.extra += entry.extra_size;
    }
    reader.finish()?;
    Ok(stats)
}

fn skip<F>(mut size: u64, buf: &mut [u8], mut read: F) -> io::Result<()>
where
    F: FnMut(&mut [u8]) -> bsdiff_format::Result<()>,
{
    while size > 0 {
        let n = Ord::min(size, buf.len() as u64) as usize;
        read(&mut buf[..n])?;
        size -= n as u64;
    }
    Ok(())
}

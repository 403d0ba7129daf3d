#![forbid(unsafe_code)]
use std::fs;
use std::io;
use std::io::prelude::*;
use std::process;

use bsdiff_format::{open_patch, parse_compressor_types, repack, BsdiffFormat, CompressorType, PatchConfig};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "bsrepack",
    version,
    about = "convert a bsdiff patch between container formats and codecs",
    long_about = None,
)]
struct RepackArgs {
    /// input patch file
    #[arg(value_name = "INPUT")]
    input_path: String,

    /// output patch file
    #[arg(value_name = "OUTPUT")]
    output_path: String,

    /// output format: legacy, bsdf2 or endsley
    #[arg(long = "format", value_name = "FORMAT")]
    format: BsdiffFormat,

    /// output codecs, such as bz2 or bz2:brotli
    #[arg(long = "type", value_name = "TYPE[:TYPE]")]
    types: Option<String>,

    /// brotli quality (0-11)
    #[arg(long = "quality", value_name = "QUALITY")]
    quality: Option<u32>,

    /// codec of the input if it is an ENDSLEY/BSDIFF43 patch
    #[arg(long = "endsley-codec", value_name = "TYPE", default_value = "nocompression")]
    endsley_codec: CompressorType,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = RepackArgs::parse();
    if let Err(e) = execute(args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn execute(args: RepackArgs) -> io::Result<()> {
    // setup the output configuration first, so bad options write nothing
    let mut config = PatchConfig::new(args.format);
    if let Some(ref types) = args.types {
        config = config.compressors(&parse_compressor_types(types)?[..]);
    }
    if let Some(quality) = args.quality {
        config = config.brotli_quality(quality);
    }
    config.validate()?;

    // setup input/output
    let mut input;
    if args.input_path == "-" {
        input = Vec::new();
        io::stdin().read_to_end(&mut input)?;
    } else {
        input = fs::read(&args.input_path)?;
    }
    let output: Box<dyn Write>;
    if args.output_path == "-" {
        output = Box::new(io::stdout());
    } else {
        output = Box::new(io::BufWriter::new(fs::File::create(&args.output_path)?));
    }

    // convert
    let mut reader = open_patch(&input[..], args.endsley_codec)?;
    let mut writer = config.writer(output)?;
    repack(&mut reader, &mut writer)?;
    Ok(())
}

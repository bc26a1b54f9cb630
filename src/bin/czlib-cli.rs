//! czlib-cli - Command-line interface for czlib
//!
//! Compresses and decompresses files as raw DEFLATE, zlib or gzip by
//! streaming them through the library's writer and reader.

use clap::{Parser, Subcommand, ValueEnum};
use czlib::{
    detect_framing, DeflateWriter, Framing, InflateReader, Level, StreamOptions, MIN_STREAM_BUFFER,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "czlib-cli")]
#[command(about = "A CLI tool for DEFLATE, zlib and gzip compression")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file
    Compress {
        /// Input file to compress
        input: PathBuf,

        /// Output compressed file
        output: PathBuf,

        /// Output framing
        #[arg(short = 'F', long, value_enum, default_value_t = CliFraming::Zlib)]
        framing: CliFraming,

        /// Compression level (-1 for default, 0-9)
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        level: i32,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Decompress a file
    Decompress {
        /// Input compressed file
        input: PathBuf,

        /// Output decompressed file
        output: PathBuf,

        /// Input framing (auto detects zlib and gzip)
        #[arg(short = 'F', long, value_enum, default_value_t = CliInputFraming::Auto)]
        framing: CliInputFraming,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Get information about a compressed file
    Info {
        /// Compressed file to analyze
        input: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CliFraming {
    /// Headerless DEFLATE
    Raw,
    /// zlib wrapper - Default
    Zlib,
    /// gzip wrapper
    Gzip,
}

impl From<CliFraming> for Framing {
    fn from(framing: CliFraming) -> Self {
        match framing {
            CliFraming::Raw => Framing::Raw,
            CliFraming::Zlib => Framing::Zlib,
            CliFraming::Gzip => Framing::Gzip,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CliInputFraming {
    /// Detect zlib or gzip from the header - Default
    Auto,
    /// Headerless DEFLATE
    Raw,
    /// zlib wrapper
    Zlib,
    /// gzip wrapper
    Gzip,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            framing,
            level,
            force,
        } => compress_file(&input, &output, framing.into(), level, force, cli.verbose, cli.quiet),
        Commands::Decompress {
            input,
            output,
            framing,
            force,
        } => decompress_file(&input, &output, framing, force, cli.verbose, cli.quiet),
        Commands::Info { input } => show_file_info(&input, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn check_paths(input: &Path, output: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }
    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }
    Ok(())
}

fn progress_bar(total: u64, quiet: bool, message: &'static str) -> Option<ProgressBar> {
    if quiet || total <= 1024 * 1024 {
        return None;
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message);
    Some(pb)
}

/// Copy `reader` to `writer` in stream-window sized chunks, ticking `progress`
fn pump(
    reader: &mut impl Read,
    writer: &mut impl Write,
    progress: Option<&ProgressBar>,
) -> io::Result<u64> {
    let mut buf = vec![0u8; MIN_STREAM_BUFFER];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
        if let Some(pb) = progress {
            pb.inc(n as u64);
        }
    }
}

/// Copy all decompressed bytes from `reader` to `writer`, moving `progress`
/// along with the compressed bytes consumed (the bar's total is the input size)
fn drain_reader<R: Read>(
    reader: &mut InflateReader<R>,
    writer: &mut impl Write,
    progress: Option<&ProgressBar>,
) -> Result<u64, Box<dyn std::error::Error>> {
    let mut buf = vec![0u8; MIN_STREAM_BUFFER];
    let mut total = 0u64;
    loop {
        let n = reader.read_chunk(&mut buf)?;
        if let Some(pb) = progress {
            pb.set_position(reader.source_bytes());
        }
        if n == 0 {
            return Ok(total);
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
}

fn compress_file(
    input: &Path,
    output: &Path,
    framing: Framing,
    level: i32,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    check_paths(input, output, force)?;
    let level = Level::new(level)?;

    if verbose {
        println!("Compressing '{}' to '{}'", input.display(), output.display());
        println!("Framing: {}, Level: {}", framing.name(), level.get());
    }

    let start_time = Instant::now();
    let input_size = fs::metadata(input)?.len();
    let progress = progress_bar(input_size, quiet, "Compressing...");

    let mut source = BufReader::new(File::open(input)?);
    let options = StreamOptions::default().with_framing(framing).with_level(level);
    let mut writer = DeflateWriter::with_options(BufWriter::new(File::create(output)?), options)?;
    pump(&mut source, &mut writer, progress.as_ref())?;
    writer.finish()?.flush()?;

    if let Some(pb) = progress {
        pb.finish_with_message("Compression complete");
    }

    let output_size = fs::metadata(output)?.len();
    if !quiet {
        println!("✓ Compression successful!");
        println!("  Input:  {} bytes", input_size);
        println!("  Output: {} bytes", output_size);
        if input_size > 0 {
            println!("  Ratio:  {:.1}%", output_size as f64 / input_size as f64 * 100.0);
        }
        println!("  Time:   {:.2?}", start_time.elapsed());
    }

    Ok(())
}

fn decompress_file(
    input: &Path,
    output: &Path,
    framing: CliInputFraming,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    check_paths(input, output, force)?;

    if verbose {
        println!("Decompressing '{}' to '{}'", input.display(), output.display());
    }

    let start_time = Instant::now();
    let input_size = fs::metadata(input)?.len();
    let progress = progress_bar(input_size, quiet, "Decompressing...");

    let source = BufReader::new(File::open(input)?);
    let mut reader = match framing {
        CliInputFraming::Auto => InflateReader::new(source)?,
        CliInputFraming::Raw => InflateReader::with_framing(source, Framing::Raw)?,
        CliInputFraming::Zlib => InflateReader::with_framing(source, Framing::Zlib)?,
        CliInputFraming::Gzip => InflateReader::with_framing(source, Framing::Gzip)?,
    };
    let mut sink = BufWriter::new(File::create(output)?);
    let output_size = drain_reader(&mut reader, &mut sink, progress.as_ref())?;
    sink.flush()?;

    if let Some(pb) = progress {
        pb.finish_with_message("Decompression complete");
    }

    if !quiet {
        println!("✓ Decompression successful!");
        println!("  Input:  {} bytes", input_size);
        println!("  Output: {} bytes", output_size);
        println!("  Time:   {:.2?}", start_time.elapsed());
    }

    Ok(())
}

fn show_file_info(input: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("File '{}' does not exist", input.display()).into());
    }

    let mut header = [0u8; 10];
    let mut file = File::open(input)?;
    let read = file.read(&mut header)?;
    let file_size = fs::metadata(input)?.len();

    println!("File: {}", input.display());
    println!("Size: {} bytes", file_size);

    match detect_framing(&header[..read]) {
        Ok(Framing::Zlib) => {
            let window = 1u32 << ((header[0] >> 4) + 8);
            let flevel = header[1] >> 6;
            println!("Framing: zlib (RFC 1950)");
            println!("Window:  {} bytes", window);
            println!("FLEVEL:  {}", flevel);
            if verbose {
                println!("Preset dictionary: {}", header[1] & 0x20 != 0);
            }
        }
        Ok(Framing::Gzip) => {
            println!("Framing: gzip (RFC 1952)");
            if read >= 10 {
                let mtime = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
                println!("Method:  {}", header[2]);
                println!("Flags:   {:#04x}", header[3]);
                println!("MTIME:   {}", mtime);
                if verbose {
                    println!("XFL:     {}", header[8]);
                    println!("OS:      {}", header[9]);
                }
            }
        }
        Ok(Framing::Raw) | Err(_) => {
            println!("Framing: unknown (possibly raw DEFLATE; use --framing raw to decompress)");
        }
    }

    Ok(())
}

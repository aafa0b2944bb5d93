// Command-line front end for Oxipatch.
//
// Subcommands with long-form options; the decoders themselves only see
// in-memory buffers, so everything here is file handling and reporting.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::engine::{PatchOptions, PatchStatus};
use crate::formats::{BpsHeader, PatchFormat, UpsHeader, ips};
use crate::io::{self as patch_io, ApplyStats};

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// IPS / UPS / BPS patch applier.
#[derive(Parser, Debug)]
#[command(
    name = "oxipatch",
    version,
    about = "Apply IPS, UPS and BPS patches",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Apply a patch to a source file.
    Apply(ApplyArgs),
    /// Print the header of a patch file.
    Info(InfoArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Ips,
    Ups,
    Bps,
}

impl From<FormatArg> for PatchFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Ips => PatchFormat::Ips,
            FormatArg::Ups => PatchFormat::Ups,
            FormatArg::Bps => PatchFormat::Bps,
        }
    }
}

#[derive(Args, Debug)]
struct ValidationArgs {
    /// Reject patches that read past their own end.
    #[arg(long)]
    strict: bool,

    /// Check the stored source CRC-32 (UPS/BPS).
    #[arg(long = "verify-source")]
    verify_source: bool,

    /// Check the stored patch CRC-32 (UPS/BPS).
    #[arg(long = "verify-patch")]
    verify_patch: bool,

    /// Strict reads and all checksums.
    #[arg(long, conflicts_with_all = ["strict", "verify_source", "verify_patch"])]
    hardened: bool,

    /// Refuse outputs larger than this (supports K/M/G suffix).
    #[arg(long = "max-output-size", value_parser = parse_byte_size)]
    max_output_size: Option<u64>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// File to patch.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// Patch format (default: from extension, then header).
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Check/compute only (do not write output).
    #[arg(long = "check-only")]
    no_output: bool,

    /// Keep the output even if its checksum does not match.
    #[arg(long = "ignore-checksum")]
    ignore_checksum: bool,

    #[command(flatten)]
    validation: ValidationArgs,

    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Patch format (default: from extension, then header).
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Command {
    Apply,
    Info,
    #[default]
    Config,
}

#[derive(Debug, Default)]
struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    no_output: bool,
    ignore_checksum: bool,
    strict: bool,
    verify_source: bool,
    verify_patch: bool,
    max_output_size: Option<u64>,
    format: Option<PatchFormat>,
    source_file: Option<PathBuf>,
    patch_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    json_output: bool,
}

fn resolve_options(cli: Cli) -> Options {
    let base = Options {
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        force: cli.force,
        json_output: cli.json_output,
        ..Default::default()
    };

    match cli.command {
        Cmd::Apply(args) => {
            let v = args.validation;
            Options {
                command: Command::Apply,
                use_stdout: args.stdout,
                no_output: args.no_output,
                ignore_checksum: args.ignore_checksum,
                strict: v.strict || v.hardened,
                verify_source: v.verify_source || v.hardened,
                verify_patch: v.verify_patch || v.hardened,
                max_output_size: v.max_output_size,
                format: args.format.map(PatchFormat::from),
                source_file: Some(args.source),
                patch_file: Some(args.patch),
                output_file: args.output.or(args.output_pos),
                ..base
            }
        }
        Cmd::Info(args) => Options {
            command: Command::Info,
            format: args.format.map(PatchFormat::from),
            patch_file: Some(args.patch),
            ..base
        },
        Cmd::Config => Options {
            command: Command::Config,
            ..base
        },
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxipatch".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_patch_options(&opts);
    }
}

// ---------------------------------------------------------------------------
// Build PatchOptions from CLI options
// ---------------------------------------------------------------------------

fn build_patch_options(opts: &Options) -> PatchOptions {
    PatchOptions {
        strict: opts.strict,
        verify_source_crc: opts.verify_source,
        verify_patch_crc: opts.verify_patch,
        max_output_size: opts.max_output_size,
    }
}

fn print_json(json: &serde_json::Value) {
    if let Ok(text) = serde_json::to_string_pretty(json) {
        eprintln!("{text}");
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxipatch version {version} (Rust), Copyright (C) oxipatch contributors");
    eprintln!("Licensed under the MIT License");

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();
    let defaults = PatchOptions::default();

    eprintln!("FORMATS=IPS,UPS,BPS");
    eprintln!("FILE_IO={file_io}");
    eprintln!("STRICT={}", defaults.strict as u8);
    eprintln!("VERIFY_SOURCE_CRC={}", defaults.verify_source_crc as u8);
    eprintln!("VERIFY_PATCH_CRC={}", defaults.verify_patch_crc as u8);
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn report_apply(opts: &Options, stats: &ApplyStats) {
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxipatch: {} patch: source {} bytes, patch {} bytes, output {} bytes, crc32 {:08x}: {}",
            stats.format,
            stats.source_size,
            stats.patch_size,
            stats.output_size,
            stats.output_crc32,
            stats.status
        );
        if opts.verbose > 1
            && let Some(sha) = &stats.output_sha256
        {
            eprintln!("oxipatch: output sha256 {}", patch_io::hex(sha));
        }
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": "apply",
            "format": stats.format.name(),
            "status": stats.status.as_str(),
            "code": stats.status.code(),
            "source_size": stats.source_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "output_crc32": format!("{:08x}", stats.output_crc32),
            "output_sha256": stats.output_sha256.as_ref().map(|h| patch_io::hex(h)),
        });
        print_json(&json);
    }
}

fn cmd_apply(opts: &Options) -> i32 {
    let (Some(source_path), Some(patch_path)) = (&opts.source_file, &opts.patch_file) else {
        eprintln!("oxipatch: apply requires a source and a patch file");
        return 1;
    };

    let write_file = !opts.no_output && !opts.use_stdout;
    if write_file
        && let Some(path) = &opts.output_file
        && path.exists()
        && !opts.force
    {
        eprintln!(
            "oxipatch: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return 1;
    }

    let patch_options = build_patch_options(opts);
    let (out, stats) =
        match patch_io::apply_file(source_path, patch_path, opts.format, &patch_options) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("oxipatch: {e}");
                return 1;
            }
        };

    report_apply(opts, &stats);

    match out.status {
        PatchStatus::Success => {}
        PatchStatus::ChecksumMismatch if opts.ignore_checksum => {
            if !opts.quiet {
                eprintln!("oxipatch: warning: output checksum mismatch, keeping output anyway");
            }
        }
        PatchStatus::ChecksumMismatch => {
            eprintln!(
                "oxipatch: output checksum mismatch (use --ignore-checksum to keep the output)"
            );
            return 1;
        }
        status => {
            eprintln!("oxipatch: {}: patch failed: {status}", patch_path.display());
            return 1;
        }
    }

    if opts.no_output {
        return 0;
    }

    match (&opts.output_file, write_file) {
        (Some(path), true) => {
            if let Err(e) = patch_io::write_output(path, &out.data) {
                eprintln!("oxipatch: output file: {}: {e}", path.display());
                return 1;
            }
        }
        _ => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(&out.data).and_then(|_| stdout.flush()) {
                eprintln!("oxipatch: write error: {e}");
                return 1;
            }
        }
    }

    0
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let Some(patch_path) = &opts.patch_file else {
        eprintln!("oxipatch: info requires a patch file");
        return 1;
    };
    let patch = match std::fs::read(patch_path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("oxipatch: {}: {e}", patch_path.display());
            return 1;
        }
    };
    let Some(format) = patch_io::resolve_format(opts.format, patch_path, &patch) else {
        eprintln!(
            "oxipatch: cannot determine patch format of {}",
            patch_path.display()
        );
        return 1;
    };

    println!("Patch:          {}", patch_path.display());
    println!("Format:         {format}");
    println!("Patch size:     {}", patch.len());

    let json = match format {
        PatchFormat::Ips => {
            if !patch.starts_with(ips::MAGIC) {
                eprintln!("oxipatch: invalid IPS header");
                return 1;
            }
            let scan = ips::scan(&patch);
            println!("Records:        {} ({} RLE)", scan.records, scan.rle_records);
            println!("Output size:    {}", scan.output_size);
            if let Some(size) = scan.footer_size {
                println!("Footer size:    {size}");
            }
            println!("EOF marker:     {}", if scan.eof { "yes" } else { "no" });
            serde_json::json!({
                "format": format.name(),
                "records": scan.records,
                "rle_records": scan.rle_records,
                "output_size": scan.output_size,
                "footer_size": scan.footer_size,
                "eof": scan.eof,
            })
        }
        PatchFormat::Ups => {
            let Ok(header) = UpsHeader::parse(&patch) else {
                eprintln!("oxipatch: invalid UPS header");
                return 1;
            };
            println!("Input size:     {}", header.input_size);
            println!("Output size:    {}", header.output_size);
            println!("Input CRC-32:   {:08x}", header.checksums.input);
            println!("Output CRC-32:  {:08x}", header.checksums.output);
            println!("Patch CRC-32:   {:08x}", header.checksums.patch);
            serde_json::json!({
                "format": format.name(),
                "input_size": header.input_size,
                "output_size": header.output_size,
                "input_crc32": format!("{:08x}", header.checksums.input),
                "output_crc32": format!("{:08x}", header.checksums.output),
                "patch_crc32": format!("{:08x}", header.checksums.patch),
            })
        }
        PatchFormat::Bps => {
            let Ok(header) = BpsHeader::parse(&patch) else {
                eprintln!("oxipatch: invalid BPS header");
                return 1;
            };
            println!("Input size:     {}", header.input_size);
            println!("Output size:    {}", header.output_size);
            println!("Metadata size:  {}", header.metadata_size);
            println!("Input CRC-32:   {:08x}", header.checksums.input);
            println!("Output CRC-32:  {:08x}", header.checksums.output);
            println!("Patch CRC-32:   {:08x}", header.checksums.patch);
            let metadata = header.metadata(&patch);
            if opts.verbose > 0 && !metadata.is_empty() {
                println!("Metadata:       {}", String::from_utf8_lossy(metadata));
            }
            serde_json::json!({
                "format": format.name(),
                "input_size": header.input_size,
                "output_size": header.output_size,
                "metadata_size": header.metadata_size,
                "input_crc32": format!("{:08x}", header.checksums.input),
                "output_crc32": format!("{:08x}", header.checksums.output),
                "patch_crc32": format!("{:08x}", header.checksums.patch),
            })
        }
    };

    if opts.json_output {
        print_json(&json);
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    // Warn if -c overrides output filename.
    if opts.use_stdout && !opts.quiet
        && let Some(path) = &opts.output_file
    {
        eprintln!(
            "oxipatch: warning: -c option overrides output filename: {}",
            path.display()
        );
        opts.output_file = None;
    }

    let exit_code = match opts.command {
        Command::Apply => cmd_apply(&opts),
        Command::Info => cmd_info(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Hand-rolled argument parsing for the entry point, in the style of this
//! project's other command-line tools (see `mount`/`mkfs` in the teacher
//! repo): a usage string, a loop over `env::args_os()`, no parsing crate.

use std::env::ArgsOs;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::exit;

/// Parsed command line: the mountpoint, the backing image path, and any
/// leftover flags forwarded to the host FUSE binding unparsed (spec §6.3).
pub struct Args {
    pub mountpoint: PathBuf,
    pub image_path: PathBuf,
    pub mount_options: Vec<OsString>,
}

fn print_usage(bin: &str) {
    eprintln!("Usage:");
    eprintln!(" {bin} [-h]");
    eprintln!(" {bin} [mount-options]... <mountpoint> <image-path>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -h, --help:\tprints usage");
    eprintln!(" mount-options:\tforwarded to the FUSE mount call unparsed");
}

/// Returns the command's name along with an iterator over its arguments,
/// mirroring `utils::args` in the teacher crate.
pub fn args(raw: ArgsOs) -> (String, Vec<OsString>) {
    let mut raw = raw;
    let bin = raw
        .next()
        .map(PathBuf::from)
        .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_owned))
        .unwrap_or_else(|| "imgfs".to_owned());
    (bin, raw.collect())
}

/// Parses the command line, printing usage and exiting non-zero on any
/// malformed or missing positional argument.
pub fn parse(bin: &str, args: Vec<OsString>) -> Args {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(bin);
        exit(0);
    }
    if args.len() < 2 {
        print_usage(bin);
        exit(1);
    }
    let mut positional: Vec<OsString> = Vec::new();
    let mut mount_options: Vec<OsString> = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let is_flag = arg.to_str().map(|s| s.starts_with('-')).unwrap_or(false);
        if !is_flag {
            positional.push(arg);
            continue;
        }
        // "-o" takes an operand (the comma-separated option list); keep the
        // pair together so it never gets counted as a positional argument.
        let takes_operand = arg == "-o";
        mount_options.push(arg);
        if takes_operand {
            if let Some(value) = iter.next() {
                mount_options.push(value);
            }
        }
    }
    let [mountpoint, image_path] = <[OsString; 2]>::try_from(positional).unwrap_or_else(|_| {
        print_usage(bin);
        exit(1);
    });
    Args {
        mountpoint: PathBuf::from(mountpoint),
        image_path: PathBuf::from(image_path),
        mount_options,
    }
}

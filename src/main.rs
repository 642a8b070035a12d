//! Entry point: parses the command line, opens the image, and mounts it
//! through FUSE (spec §6.3). Logging is initialized here and nowhere else in
//! the core (spec §6.2b).

mod adapter;
mod cli;

use adapter::Adapter;
use fuser::MountOption;
use imgfs_core::Volume;
use std::process::exit;

/// Translates the hand-parsed `-o name[,name...]` / `-f` flags this project's
/// other tools accept into the host binding's mount-option type.
fn mount_options(raw: &[std::ffi::OsString]) -> Vec<MountOption> {
    let mut options = vec![MountOption::FSName("imgfs".to_owned()), MountOption::AutoUnmount];
    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.to_str() {
            Some("-o") => {
                if let Some(list) = iter.next().and_then(|s| s.to_str()) {
                    for name in list.split(',') {
                        match name {
                            "allow_other" => options.push(MountOption::AllowOther),
                            "allow_root" => options.push(MountOption::AllowRoot),
                            "ro" => options.push(MountOption::RO),
                            "default_permissions" => options.push(MountOption::DefaultPermissions),
                            _ => log::warn!("ignoring unrecognized mount option {name:?}"),
                        }
                    }
                }
            }
            Some("-f") | Some("--foreground") => {
                // fuser::mount2 already blocks the calling thread; there is
                // no background/daemonize mode to opt out of here.
            }
            _ => log::warn!("ignoring unrecognized argument {arg:?}"),
        }
    }
    options
}

fn main() {
    env_logger::init();

    let (bin, raw_args) = cli::args(std::env::args_os());
    let args = cli::parse(&bin, raw_args);

    let volume = Volume::open(&args.image_path).unwrap_or_else(|e| {
        eprintln!("{bin}: error: opening image {:?}: {e}", args.image_path);
        exit(1);
    });

    let options = mount_options(&args.mount_options);
    let adapter = Adapter::new(volume);

    log::info!("mounting {:?} at {:?}", args.image_path, args.mountpoint);
    if let Err(e) = fuser::mount2(adapter, &args.mountpoint, &options) {
        eprintln!("{bin}: error: mount failed: {e}");
        exit(1);
    }
}

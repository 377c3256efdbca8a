//
//  setquota: report or change the disk quota of a user.
//
//  setquota user path [-b soft:hard] [-f soft:hard]
//
//  Without options the current usage and limits are printed.
//
#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

mod config;
mod report;
mod unixuser;

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;

use env_logger;

use fs_quota::*;

#[derive(Debug)]
struct Opts {
    user:    String,
    path:    PathBuf,
    mnttab:  PathBuf,
    min_uid: u32,
    // in kilobytes.
    blocks:  Option<(u32, u32)>,
    files:   Option<(u32, u32)>,
}

impl Opts {
    fn from_args() -> Result<Opts, Box<dyn Error>> {
        let matches = clap_app!(setquota =>
            (version: crate_version!())
            (about: "Report or change the disk quota of a user")
            (@arg CONFIG: -c --config +takes_value "configuration file")
            (@arg MNTTAB: -m --mnttab +takes_value "mount table to read")
            (@arg BLOCKS: -b +takes_value "set soft and hard block quota (kilobytes), as soft:hard")
            (@arg FILES: -f +takes_value "set soft and hard file quota, as soft:hard")
            (@arg USER: +required "user name or uid")
            (@arg PATH: +required "any path on the filesystem")
        )
        .get_matches();

        let mut cfg = config::Config::default();
        if let Some(file) = matches.value_of("CONFIG") {
            cfg = config::read(file).map_err(|e| format!("{}: {}", file, e))?;
            config::check(file, &cfg)?;
        }

        let mnttab = matches
            .value_of("MNTTAB")
            .map(|s| s.to_string())
            .or(cfg.quota.mnttab)
            .unwrap_or_else(|| DEFAULT_MNTTAB.to_string());

        Ok(Opts {
            user:    matches.value_of("USER").unwrap_or_default().to_string(),
            path:    PathBuf::from(matches.value_of("PATH").unwrap_or_default()),
            mnttab:  PathBuf::from(mnttab),
            min_uid: cfg.unix.min_uid.unwrap_or(1),
            blocks:  matches.value_of("BLOCKS").map(parse_pair).transpose()?,
            files:   matches.value_of("FILES").map(parse_pair).transpose()?,
        })
    }

    // The new limits and the mask of fields they apply to.
    fn limits(&self) -> Result<(QuotaLimits, UpdateMask), FqError> {
        let mut q = QuotaLimits::default();
        let mut mask = UpdateMask::empty();
        if let Some((soft, hard)) = self.blocks {
            q.block_soft_limit = kb_to_blocks(soft)?;
            q.block_hard_limit = kb_to_blocks(hard)?;
            mask |= UpdateMask::BLOCKS;
        }
        if let Some((soft, hard)) = self.files {
            q.file_soft_limit = soft;
            q.file_hard_limit = hard;
            mask |= UpdateMask::FILES;
        }
        Ok((q, mask))
    }
}

fn run<B: QuotaBackend>(opts: &Opts, store: &QuotaStore<B>, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
    let id = unixuser::resolve(&opts.user, opts.min_uid)?;
    let (limits, mask) = opts.limits()?;

    let mount = resolve_mount_point(&opts.path, &opts.mnttab)?;
    let qfile = quota_file(&mount);

    if mask.is_empty() {
        let q = store.get_quota(id, &qfile)?;
        out.write_all(report::format(&mount, &q).as_bytes())?;
    } else {
        store.set_quota(id, &qfile, &limits, mask)?;
        info!("uid {} on {}: set {:?}", id, mount.display(), mask);
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let res = Opts::from_args().and_then(|opts| {
        debug!("{:?}", opts);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        run(&opts, &QuotaStore::new(), &mut out)
    });
    if let Err(e) = res {
        eprintln!("** Error: {}", e);
        exit(1);
    }
}

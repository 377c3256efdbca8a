//
// Mount table parsing, and finding the mount point of a path.
//
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::io::BufReader;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::FqError;

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device:    String,
    pub directory: PathBuf,
    pub fstype:    String,
}

/// The `(st_dev, st_rdev)` pair of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevIds {
    pub dev:  u64,
    pub rdev: u64,
}

/// The filesystem primitives mount resolution needs.
pub trait FsStat {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
    fn dev_ids(&self, path: &Path) -> io::Result<DevIds>;
}

/// `FsStat` on the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemStat;

impl FsStat for SystemStat {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn dev_ids(&self, path: &Path) -> io::Result<DevIds> {
        let meta = std::fs::metadata(path)?;
        Ok(DevIds {
            dev:  meta.dev(),
            rdev: meta.rdev(),
        })
    }
}

// mount tables escape whitespace in paths as \040 and friends.
fn unescape(b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i] == b'\\' && i + 3 < b.len() && b[i + 1..i + 4].iter().all(|c| (b'0'..=b'7').contains(c)) {
            let v = (b[i + 1] - b'0') as u32 * 64 + (b[i + 2] - b'0') as u32 * 8 + (b[i + 3] - b'0') as u32;
            if v <= 0xff {
                out.push(v as u8);
                i += 4;
                continue;
            }
        }
        out.push(b[i]);
        i += 1;
    }
    out
}

fn lossy(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}

/// Read all entries of a mount table.
///
/// Both the Solaris `/etc/mnttab` and the Linux `/etc/mtab` put the
/// special device first and the mount point second. Lines are taken as
/// raw bytes, mount points do not have to be UTF-8.
pub fn read_mtab(mtab: impl AsRef<Path>) -> io::Result<Vec<MountEntry>> {
    let f = File::open(mtab.as_ref())?;
    let reader = BufReader::new(f);
    let mut result = Vec::new();
    for l in reader.split(b'\n') {
        let line = l?;
        let words = line
            .split(|c| c.is_ascii_whitespace())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>();
        if words.len() < 2 || words[0].starts_with(b"#") {
            continue;
        }
        result.push(MountEntry {
            device:    lossy(&unescape(words[0])),
            directory: PathBuf::from(OsStr::from_bytes(&unescape(words[1]))),
            fstype:    words.get(2).map(|s| lossy(s)).unwrap_or_default(),
        });
    }
    Ok(result)
}

/// Maps a path to the mount point that owns it.
#[derive(Debug, Clone)]
pub struct MountResolver<S = SystemStat> {
    mtab: PathBuf,
    stat: S,
}

impl MountResolver<SystemStat> {
    pub fn new(mtab: impl AsRef<Path>) -> MountResolver<SystemStat> {
        MountResolver::with_stat(mtab, SystemStat)
    }
}

impl<S: FsStat> MountResolver<S> {
    pub fn with_stat(mtab: impl AsRef<Path>, stat: S) -> MountResolver<S> {
        MountResolver {
            mtab: mtab.as_ref().to_path_buf(),
            stat,
        }
    }

    /// Find the mount point of `path`.
    ///
    /// The mount table is scanned in order, and the first entry that is on
    /// the same device as `path` and has a zero `st_rdev` wins. The
    /// `st_rdev` check skips loopback and bind mounts of the device, only
    /// the top mount qualifies.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, FqError> {
        let path = path.as_ref();
        let rp = self
            .stat
            .canonicalize(path)
            .map_err(|e| FqError::Resolve(path.to_path_buf(), e))?;
        let target = self
            .stat
            .dev_ids(&rp)
            .map_err(|e| FqError::Resolve(rp.clone(), e))?;
        debug!("resolve: {:?} -> {:?} dev {:#x}", path, rp, target.dev);

        let entries = read_mtab(&self.mtab).map_err(|e| FqError::MountTable(self.mtab.clone(), e))?;
        for entry in entries {
            let ids = match self.stat.dev_ids(&entry.directory) {
                Ok(ids) => ids,
                Err(e) => {
                    debug!("resolve: skipping {:?}: {}", entry.directory, e);
                    continue;
                },
            };
            if ids.dev == target.dev && ids.rdev == 0 {
                debug!("resolve: {:?} is on {} ({:?})", rp, entry.directory.display(), entry.device);
                return Ok(entry.directory);
            }
        }
        Err(FqError::MountNotFound(rp))
    }
}

/// Find the mount point of `path` using the mount table in `mtab`.
pub fn resolve_mount_point(path: impl AsRef<Path>, mtab: impl AsRef<Path>) -> Result<PathBuf, FqError> {
    MountResolver::new(mtab).resolve(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    // A fake filesystem: path -> (canonical path, dev ids).
    #[derive(Default)]
    struct FakeStat {
        links: HashMap<PathBuf, PathBuf>,
        ids:   HashMap<PathBuf, DevIds>,
    }

    impl FakeStat {
        fn node(mut self, path: &str, dev: u64, rdev: u64) -> Self {
            self.ids.insert(PathBuf::from(path), DevIds { dev, rdev });
            self
        }

        fn link(mut self, from: &str, to: &str) -> Self {
            self.links.insert(PathBuf::from(from), PathBuf::from(to));
            self
        }
    }

    impl FsStat for FakeStat {
        fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
            let p = self.links.get(path).cloned().unwrap_or_else(|| path.to_path_buf());
            if self.ids.contains_key(&p) {
                Ok(p)
            } else {
                Err(io::Error::from(io::ErrorKind::NotFound))
            }
        }

        fn dev_ids(&self, path: &Path) -> io::Result<DevIds> {
            self.ids
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    fn mtab(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    const MNTTAB: &str = "\
/dev/dsk/c0t0d0s0\t/\tufs\trw,intr,largefiles\t1113912345
/proc\t/proc\tproc\tdev=4300000\t1113912345
# a comment

/export/home\t/alias\tlofs\tdev=1d80008\t1113912345
/dev/dsk/c0t0d0s7\t/export/home\tufs\trw,intr,largefiles\t1113912345
";

    fn fake() -> FakeStat {
        FakeStat::default()
            .node("/", 1, 0)
            .node("/proc", 2, 0)
            .node("/alias", 7, 5)
            .node("/export/home", 7, 0)
            .node("/export/home/joe/docs", 7, 0)
            .node("/usr/bin", 1, 0)
            .link("/home/joe", "/export/home/joe/docs")
    }

    #[test]
    fn parse_mnttab() {
        let f = mtab(MNTTAB);
        let ents = read_mtab(f.path()).unwrap();
        assert_eq!(ents.len(), 4);
        assert_eq!(ents[0].device, "/dev/dsk/c0t0d0s0");
        assert_eq!(ents[0].directory, PathBuf::from("/"));
        assert_eq!(ents[3].fstype, "ufs");
    }

    #[test]
    fn parse_escaped_paths() {
        let f = mtab("/dev/sdb1 /mnt/my\\040disk ext4 rw 0 0\nshort\n");
        let ents = read_mtab(f.path()).unwrap();
        assert_eq!(ents.len(), 1);
        assert_eq!(ents[0].directory, PathBuf::from("/mnt/my disk"));
        assert_eq!(unescape(b"a\\134b"), b"a\\b".to_vec());
        assert_eq!(unescape(b"trailing\\04"), b"trailing\\04".to_vec());
    }

    #[test]
    fn resolve_below_mount() {
        let f = mtab(MNTTAB);
        let r = MountResolver::with_stat(f.path(), fake());
        assert_eq!(r.resolve("/usr/bin").unwrap(), PathBuf::from("/"));
        assert_eq!(r.resolve("/export/home/joe/docs").unwrap(), PathBuf::from("/export/home"));
    }

    #[test]
    fn resolve_follows_symlinks() {
        let f = mtab(MNTTAB);
        let r = MountResolver::with_stat(f.path(), fake());
        assert_eq!(r.resolve("/home/joe").unwrap(), PathBuf::from("/export/home"));
    }

    #[test]
    fn resolve_skips_alias() {
        // /alias shares the device of /export/home and comes first in the table.
        let f = mtab(MNTTAB);
        let r = MountResolver::with_stat(f.path(), fake());
        assert_eq!(r.resolve("/alias").unwrap(), PathBuf::from("/export/home"));
    }

    #[test]
    fn resolve_skips_unstatable_entries() {
        let f = mtab("/dev/gone /gone ufs rw 0\n/dev/dsk/c0t0d0s7 /export/home ufs rw 0\n");
        let r = MountResolver::with_stat(f.path(), fake());
        assert_eq!(r.resolve("/export/home/joe/docs").unwrap(), PathBuf::from("/export/home"));
    }

    #[test]
    fn resolve_not_found() {
        let f = mtab("/proc /proc proc rw 0\n");
        let r = MountResolver::with_stat(f.path(), fake());
        assert_eq!(
            r.resolve("/usr/bin"),
            Err(FqError::MountNotFound(PathBuf::from("/usr/bin")))
        );
    }

    #[test]
    fn resolve_bad_path() {
        let f = mtab(MNTTAB);
        let r = MountResolver::with_stat(f.path(), fake());
        match r.resolve("/does/not/exist") {
            Err(FqError::Resolve(p, e)) => {
                assert_eq!(p, PathBuf::from("/does/not/exist"));
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resolve_missing_mtab() {
        let r = MountResolver::with_stat("/nonexistent/mnttab", fake());
        match r.resolve("/usr/bin") {
            Err(FqError::MountTable(..)) => {},
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resolve_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let top = std::fs::canonicalize(dir.path()).unwrap();
        let f = mtab(&format!("/dev/fake {} tmpfs rw 0 0\n", top.display()));
        assert_eq!(resolve_mount_point(&sub, f.path()).unwrap(), top);
    }

    #[test]
    fn non_utf8_entry_does_not_break_scan() {
        let dir = tempfile::tempdir().unwrap();
        let top = std::fs::canonicalize(dir.path()).unwrap();
        let mut content = format!("/dev/fake {} tmpfs rw 0 0\n", top.display()).into_bytes();
        content.extend_from_slice(b"/dev/sdz1 /mnt/caf\xe9 ext4 rw 0 0\n");
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&content).unwrap();
        f.flush().unwrap();

        let ents = read_mtab(f.path()).unwrap();
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[1].directory.as_os_str().as_bytes(), b"/mnt/caf\xe9");
        assert_eq!(resolve_mount_point(&top, f.path()).unwrap(), top);
    }
}

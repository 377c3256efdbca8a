#![doc(html_root_url = "https://docs.rs/fs-quota/0.1.0")]
//! Read and change per-user disk quota on a mounted filesystem.
//!
//! The crate is split in three parts:
//!
//! - [`parse_number`] / [`parse_pair`] turn user input into limits.
//! - [`MountResolver`] finds the mount point that owns a path by matching
//!   device ids against the mount table.
//! - [`QuotaStore`] reads a quota record, or merges the requested fields
//!   into the existing record and writes it back.
//!
//! The kernel interface is hidden behind the [`QuotaBackend`] trait. The
//! backend for the platform we are compiled on is [`SystemBackend`].
//!
//! ```no_run
//! use fs_quota::*;
//!
//! let mount = resolve_mount_point("/export/home/joe", DEFAULT_MNTTAB)?;
//! let id = UserIdentity::new(1001)?;
//! let q = QuotaStore::new().get_quota(id, quota_file(&mount))?;
//! println!("{} KB used", blocks_to_kb(q.block_usage));
//! # Ok::<(), FqError>(())
//! ```
#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

pub mod mock;
mod mtab;
mod numeric;
mod store;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use crate::linux as sys;

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
mod solaris;
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
use crate::solaris as sys;

#[cfg(not(any(target_os = "linux", target_os = "solaris", target_os = "illumos")))]
mod generic_os;
#[cfg(not(any(target_os = "linux", target_os = "solaris", target_os = "illumos")))]
use crate::generic_os as sys;

pub use crate::mtab::{read_mtab, resolve_mount_point, DevIds, FsStat, MountEntry, MountResolver, SystemStat};
pub use crate::numeric::{parse_number, parse_pair, PairSide, ParseError};
pub use crate::store::{OpenMode, QuotaBackend, QuotaControl, QuotaStore};
pub use crate::sys::{SystemBackend, DEFAULT_MNTTAB};

/// Name of the quota file in the root of a filesystem.
pub const QUOTA_FILE: &str = "quotas";

/// Size in bytes of the blocks that block limits and usage are counted in.
pub const QUOTA_BLOCK_SIZE: u32 = 512;

/// One user's quota record on one filesystem.
///
/// Block fields are in units of [`QUOTA_BLOCK_SIZE`]. The usage and time
/// fields are maintained by the kernel; a nonzero time limit means the
/// grace period has run out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub block_soft_limit: u32,
    pub block_hard_limit: u32,
    pub block_usage:      u32,
    pub file_soft_limit:  u32,
    pub file_hard_limit:  u32,
    pub file_usage:       u32,
    pub block_time_limit: u32,
    pub file_time_limit:  u32,
}

bitflags! {
    /// The fields of a [`QuotaLimits`] that a set operation may change.
    #[derive(Default)]
    pub struct UpdateMask: u16 {
        const BLOCK_SOFT = 0x01;
        const BLOCK_HARD = 0x02;
        const FILE_SOFT  = 0x04;
        const FILE_HARD  = 0x08;
        const BLOCK_TIME = 0x10;
        const FILE_TIME  = 0x20;
        const BLOCKS = Self::BLOCK_SOFT.bits | Self::BLOCK_HARD.bits;
        const FILES  = Self::FILE_SOFT.bits | Self::FILE_HARD.bits;
        const TIMES  = Self::BLOCK_TIME.bits | Self::FILE_TIME.bits;
    }
}

impl QuotaLimits {
    /// Copy the fields selected by `mask` from `new` into `self`.
    /// Everything else keeps its current value.
    pub fn merge(&mut self, new: &QuotaLimits, mask: UpdateMask) {
        if mask.contains(UpdateMask::BLOCK_SOFT) {
            self.block_soft_limit = new.block_soft_limit;
        }
        if mask.contains(UpdateMask::BLOCK_HARD) {
            self.block_hard_limit = new.block_hard_limit;
        }
        if mask.contains(UpdateMask::FILE_SOFT) {
            self.file_soft_limit = new.file_soft_limit;
        }
        if mask.contains(UpdateMask::FILE_HARD) {
            self.file_hard_limit = new.file_hard_limit;
        }
        if mask.contains(UpdateMask::BLOCK_TIME) {
            self.block_time_limit = new.block_time_limit;
        }
        if mask.contains(UpdateMask::FILE_TIME) {
            self.file_time_limit = new.file_time_limit;
        }
    }

    pub fn block_grace_expired(&self) -> bool {
        self.block_time_limit != 0
    }

    pub fn file_grace_expired(&self) -> bool {
        self.file_time_limit != 0
    }
}

/// Convert kilobytes to quota blocks. Fails if the result does not fit.
pub fn kb_to_blocks(kb: u32) -> Result<u32, ParseError> {
    kb.checked_mul(1024 / QUOTA_BLOCK_SIZE)
        .ok_or_else(|| ParseError::Overflow(kb.to_string()))
}

/// Convert quota blocks to kilobytes, rounding down.
pub fn blocks_to_kb(blocks: u32) -> u32 {
    blocks / (1024 / QUOTA_BLOCK_SIZE)
}

/// Path of the quota file for a mount point.
pub fn quota_file(mount_point: impl AsRef<Path>) -> PathBuf {
    mount_point.as_ref().join(QUOTA_FILE)
}

/// A numeric user id that quota may be changed for.
///
/// Root can never be represented, so nothing in this crate will ever
/// touch root's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIdentity(u32);

impl UserIdentity {
    pub fn new(uid: u32) -> Result<UserIdentity, FqError> {
        UserIdentity::with_min_uid(uid, 1)
    }

    /// Like `new`, but also refuse every uid below `min_uid`.
    pub fn with_min_uid(uid: u32, min_uid: u32) -> Result<UserIdentity, FqError> {
        if uid == 0 || uid < min_uid {
            return Err(FqError::ReservedIdentity(uid));
        }
        Ok(UserIdentity(uid))
    }

    pub fn uid(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure of a quota control operation (get or set).
#[derive(Debug)]
pub enum QuotaOpError {
    UserNotInQuotaFile,
    QuotaDisabled,
    PermissionDenied,
    Other(io::Error),
}

impl QuotaOpError {
    /// Map an error returned by the control operation to its kind.
    pub fn from_os_error(e: io::Error) -> QuotaOpError {
        match e.raw_os_error() {
            Some(errno) => sys::map_errno(errno).unwrap_or(QuotaOpError::Other(e)),
            None => QuotaOpError::Other(e),
        }
    }

    fn to_num(&self) -> u32 {
        match self {
            QuotaOpError::UserNotInQuotaFile => 1,
            QuotaOpError::QuotaDisabled => 2,
            QuotaOpError::PermissionDenied => 3,
            QuotaOpError::Other(_) => 4,
        }
    }
}

impl fmt::Display for QuotaOpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QuotaOpError::UserNotInQuotaFile => f.write_str("User not found in quota file"),
            QuotaOpError::QuotaDisabled => f.write_str("Kernel does not support QUOTA option"),
            QuotaOpError::PermissionDenied => f.write_str("You do not have root privileges"),
            QuotaOpError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for QuotaOpError {}

impl PartialEq for QuotaOpError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (QuotaOpError::Other(e), QuotaOpError::Other(o)) => e.kind() == o.kind(),
            (s, o) => s.to_num() == o.to_num(),
        }
    }
}

#[derive(Debug)]
pub enum FqError {
    Parse(ParseError),
    Resolve(PathBuf, io::Error),
    MountTable(PathBuf, io::Error),
    MountNotFound(PathBuf),
    Open(PathBuf, io::Error),
    Seek(io::Error),
    QuotaOp(QuotaOpError),
    IdentityNotFound(String),
    ReservedIdentity(u32),
}

impl fmt::Display for FqError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FqError::Parse(e) => write!(f, "{}", e),
            FqError::Resolve(p, e) => write!(f, "resolvepath({}): {}", p.display(), e),
            FqError::MountTable(p, e) => write!(f, "{}: {}", p.display(), e),
            FqError::MountNotFound(p) => write!(f, "{}: could not find mountpoint", p.display()),
            FqError::Open(p, e) => write!(f, "open({}): {}", p.display(), e),
            FqError::Seek(e) => write!(f, "lseek: {}", e),
            FqError::QuotaOp(e) => write!(f, "{}", e),
            FqError::IdentityNotFound(name) => write!(f, "{}: No such user", name),
            FqError::ReservedIdentity(0) => f.write_str("Refusing to set quota for user root"),
            FqError::ReservedIdentity(uid) => write!(f, "Refusing to set quota for system uid {}", uid),
        }
    }
}

impl std::error::Error for FqError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FqError::Parse(e) => Some(e),
            FqError::Resolve(_, e) | FqError::MountTable(_, e) | FqError::Open(_, e) | FqError::Seek(e) => {
                Some(e)
            },
            FqError::QuotaOp(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for FqError {
    fn from(e: ParseError) -> Self {
        FqError::Parse(e)
    }
}

impl From<QuotaOpError> for FqError {
    fn from(e: QuotaOpError) -> Self {
        FqError::QuotaOp(e)
    }
}

impl PartialEq for FqError {
    fn eq(&self, other: &Self) -> bool {
        use FqError::*;
        match (self, other) {
            (Parse(a), Parse(b)) => a == b,
            (Resolve(p, e), Resolve(q, o)) | (MountTable(p, e), MountTable(q, o)) | (Open(p, e), Open(q, o)) => {
                p == q && e.kind() == o.kind()
            },
            (MountNotFound(p), MountNotFound(q)) => p == q,
            (Seek(e), Seek(o)) => e.kind() == o.kind(),
            (QuotaOp(a), QuotaOp(b)) => a == b,
            (IdentityNotFound(a), IdentityNotFound(b)) => a == b,
            (ReservedIdentity(a), ReservedIdentity(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_masked_fields() {
        let mut base = QuotaLimits {
            block_usage: 300,
            file_soft_limit: 5,
            file_hard_limit: 10,
            file_usage: 7,
            ..QuotaLimits::default()
        };
        let new = QuotaLimits {
            block_soft_limit: 2000,
            block_hard_limit: 4000,
            file_soft_limit: 99,
            file_hard_limit: 99,
            block_usage: 1,
            ..QuotaLimits::default()
        };
        base.merge(&new, UpdateMask::BLOCKS);
        assert_eq!(base.block_soft_limit, 2000);
        assert_eq!(base.block_hard_limit, 4000);
        assert_eq!(base.block_usage, 300);
        assert_eq!(base.file_soft_limit, 5);
        assert_eq!(base.file_hard_limit, 10);
        assert_eq!(base.file_usage, 7);
    }

    #[test]
    fn merge_time_limits() {
        let mut base = QuotaLimits::default();
        let new = QuotaLimits {
            block_time_limit: 60,
            file_time_limit: 120,
            ..QuotaLimits::default()
        };
        base.merge(&new, UpdateMask::BLOCK_TIME);
        assert_eq!(base.block_time_limit, 60);
        assert_eq!(base.file_time_limit, 0);
        base.merge(&new, UpdateMask::TIMES);
        assert_eq!(base.file_time_limit, 120);
    }

    #[test]
    fn unit_conversion() {
        assert_eq!(kb_to_blocks(100).unwrap(), 200);
        assert_eq!(blocks_to_kb(200), 100);
        assert_eq!(blocks_to_kb(201), 100);
        assert!(kb_to_blocks(u32::max_value()).is_err());
    }

    #[test]
    fn root_is_refused() {
        assert_eq!(UserIdentity::new(0), Err(FqError::ReservedIdentity(0)));
        assert_eq!(UserIdentity::new(1).map(|u| u.uid()), Ok(1));
        assert_eq!(UserIdentity::with_min_uid(99, 100), Err(FqError::ReservedIdentity(99)));
        assert!(UserIdentity::with_min_uid(0, 0).is_err());
    }

    #[test]
    fn quota_file_path() {
        assert_eq!(quota_file("/export/home"), PathBuf::from("/export/home/quotas"));
        assert_eq!(quota_file("/"), PathBuf::from("/quotas"));
    }

    #[test]
    fn op_error_kinds_are_distinct() {
        assert_ne!(QuotaOpError::UserNotInQuotaFile, QuotaOpError::PermissionDenied);
        assert_ne!(
            QuotaOpError::UserNotInQuotaFile,
            QuotaOpError::Other(io::Error::from_raw_os_error(libc::EIO))
        );
        assert_eq!(
            QuotaOpError::from_os_error(io::Error::new(io::ErrorKind::Other, "boom")),
            QuotaOpError::Other(io::Error::new(io::ErrorKind::Other, "x"))
        );
    }
}

//
// Solaris / illumos UFS quota, through the Q_QUOTACTL ioctl on the
// quotas file in the root of the filesystem.
//
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Seek, SeekFrom};
use std::os::raw::{c_char, c_int};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::{OpenMode, QuotaBackend, QuotaControl, QuotaLimits, QuotaOpError};

pub const DEFAULT_MNTTAB: &str = "/etc/mnttab";

// <sys/fs/ufs_quota.h>
const Q_SETQUOTA: c_int = 3;
const Q_GETQUOTA: c_int = 4;
const Q_QUOTACTL: c_int = 0x00030189;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct Dqblk {
    dqb_bhardlimit: u32,
    dqb_bsoftlimit: u32,
    dqb_curblocks:  u32,
    dqb_fhardlimit: u32,
    dqb_fsoftlimit: u32,
    dqb_curfiles:   u32,
    dqb_btimelimit: u32,
    dqb_ftimelimit: u32,
}

#[repr(C)]
struct Quotctl {
    op:   c_int,
    uid:  libc::uid_t,
    addr: *mut c_char,
}

impl From<Dqblk> for QuotaLimits {
    fn from(d: Dqblk) -> QuotaLimits {
        QuotaLimits {
            block_hard_limit: d.dqb_bhardlimit,
            block_soft_limit: d.dqb_bsoftlimit,
            block_usage:      d.dqb_curblocks,
            file_hard_limit:  d.dqb_fhardlimit,
            file_soft_limit:  d.dqb_fsoftlimit,
            file_usage:       d.dqb_curfiles,
            block_time_limit: d.dqb_btimelimit,
            file_time_limit:  d.dqb_ftimelimit,
        }
    }
}

impl From<&QuotaLimits> for Dqblk {
    fn from(q: &QuotaLimits) -> Dqblk {
        Dqblk {
            dqb_bhardlimit: q.block_hard_limit,
            dqb_bsoftlimit: q.block_soft_limit,
            dqb_curblocks:  q.block_usage,
            dqb_fhardlimit: q.file_hard_limit,
            dqb_fsoftlimit: q.file_soft_limit,
            dqb_curfiles:   q.file_usage,
            dqb_btimelimit: q.block_time_limit,
            dqb_ftimelimit: q.file_time_limit,
        }
    }
}

pub(crate) fn map_errno(errno: c_int) -> Option<QuotaOpError> {
    match errno {
        libc::ESRCH => Some(QuotaOpError::UserNotInQuotaFile),
        libc::EINVAL => Some(QuotaOpError::QuotaDisabled),
        libc::EPERM => Some(QuotaOpError::PermissionDenied),
        _ => None,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

pub struct SystemHandle {
    file: File,
}

impl QuotaBackend for SystemBackend {
    type Handle = SystemHandle;

    fn open(&self, locator: &Path, mode: OpenMode) -> io::Result<SystemHandle> {
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(locator)?;
        Ok(SystemHandle { file })
    }
}

impl SystemHandle {
    fn quotactl(&self, op: c_int, uid: u32, dqblk: &mut Dqblk) -> Result<(), QuotaOpError> {
        let mut qctl = Quotctl {
            op,
            uid: uid as libc::uid_t,
            addr: dqblk as *mut Dqblk as *mut c_char,
        };
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), Q_QUOTACTL as _, &mut qctl as *mut Quotctl) };
        if rc < 0 {
            return Err(QuotaOpError::from_os_error(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl QuotaControl for SystemHandle {
    fn get_record(&mut self, uid: u32) -> Result<QuotaLimits, QuotaOpError> {
        let mut dqblk = Dqblk::default();
        self.quotactl(Q_GETQUOTA, uid, &mut dqblk)?;
        Ok(dqblk.into())
    }

    fn set_record(&mut self, uid: u32, record: &QuotaLimits) -> Result<(), QuotaOpError> {
        let mut dqblk = Dqblk::from(record);
        self.quotactl(Q_SETQUOTA, uid, &mut dqblk)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

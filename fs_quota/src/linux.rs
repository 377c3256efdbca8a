//
// Linux specific systemcalls for quota.
//
// Linux has no ioctl on a quota file, but quotactl_fd(2) does the same
// thing on any open file of the filesystem. If there is no quotas file
// (quota in hidden inodes, or aquota.user) the mount point itself is used.
//
use std::convert::TryFrom;
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Seek, SeekFrom};
use std::os::raw::{c_char, c_int, c_long, c_uint};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::{OpenMode, QuotaBackend, QuotaControl, QuotaLimits, QuotaOpError, QUOTA_BLOCK_SIZE};

pub const DEFAULT_MNTTAB: &str = "/etc/mtab";

// Same number on every architecture.
const SYS_QUOTACTL_FD: c_long = 443;

// <linux/quota.h>
const Q_GETQUOTA: c_uint = 0x800007;
const Q_SETQUOTA: c_uint = 0x800008;
const USRQUOTA: c_uint = 0;
const SUBCMDSHIFT: c_uint = 8;

const QIF_BLIMITS: u32 = 1;
const QIF_ILIMITS: u32 = 4;
const QIF_BTIME: u32 = 16;
const QIF_ITIME: u32 = 32;

// Limits are in 1 KiB units, usage in bytes.
const QIF_DQBLKSIZE: u64 = 1024;
const BLOCKS_PER_QIF: u64 = QIF_DQBLKSIZE / QUOTA_BLOCK_SIZE as u64;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct IfDqblk {
    dqb_bhardlimit: u64,
    dqb_bsoftlimit: u64,
    dqb_curspace:   u64,
    dqb_ihardlimit: u64,
    dqb_isoftlimit: u64,
    dqb_curinodes:  u64,
    dqb_btime:      u64,
    dqb_itime:      u64,
    dqb_valid:      u32,
}

fn qcmd(cmd: c_uint) -> c_uint {
    (cmd << SUBCMDSHIFT) | (USRQUOTA & 0x00ff)
}

fn sat(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::max_value())
}

impl From<IfDqblk> for QuotaLimits {
    fn from(d: IfDqblk) -> QuotaLimits {
        QuotaLimits {
            block_hard_limit: sat(d.dqb_bhardlimit.saturating_mul(BLOCKS_PER_QIF)),
            block_soft_limit: sat(d.dqb_bsoftlimit.saturating_mul(BLOCKS_PER_QIF)),
            block_usage:      sat(d.dqb_curspace / QUOTA_BLOCK_SIZE as u64),
            file_hard_limit:  sat(d.dqb_ihardlimit),
            file_soft_limit:  sat(d.dqb_isoftlimit),
            file_usage:       sat(d.dqb_curinodes),
            block_time_limit: sat(d.dqb_btime),
            file_time_limit:  sat(d.dqb_itime),
        }
    }
}

impl From<&QuotaLimits> for IfDqblk {
    fn from(q: &QuotaLimits) -> IfDqblk {
        let to_qif = |blocks: u32| (blocks as u64 + BLOCKS_PER_QIF - 1) / BLOCKS_PER_QIF;
        // usage is owned by the kernel, only limits and grace times are set.
        IfDqblk {
            dqb_bhardlimit: to_qif(q.block_hard_limit),
            dqb_bsoftlimit: to_qif(q.block_soft_limit),
            dqb_ihardlimit: q.file_hard_limit as u64,
            dqb_isoftlimit: q.file_soft_limit as u64,
            dqb_btime: q.block_time_limit as u64,
            dqb_itime: q.file_time_limit as u64,
            dqb_valid: QIF_BLIMITS | QIF_ILIMITS | QIF_BTIME | QIF_ITIME,
            ..IfDqblk::default()
        }
    }
}

pub(crate) fn map_errno(errno: c_int) -> Option<QuotaOpError> {
    match errno {
        libc::ESRCH | libc::ENOSYS => Some(QuotaOpError::QuotaDisabled),
        libc::EPERM | libc::EACCES => Some(QuotaOpError::PermissionDenied),
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
        let res = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(locator);
        let file = match (res, locator.parent()) {
            (Ok(file), _) => file,
            (Err(ref e), Some(dir)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("open: no {:?}, using {:?}", locator, dir);
                File::open(dir)?
            },
            (Err(e), _) => return Err(e),
        };
        Ok(SystemHandle { file })
    }
}

impl SystemHandle {
    fn quotactl_fd(&self, cmd: c_uint, uid: u32, dqblk: &mut IfDqblk) -> Result<(), QuotaOpError> {
        let rc = unsafe {
            libc::syscall(
                SYS_QUOTACTL_FD,
                self.file.as_raw_fd(),
                qcmd(cmd),
                uid,
                dqblk as *mut IfDqblk as *mut c_char,
            )
        };
        if rc < 0 {
            return Err(QuotaOpError::from_os_error(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl QuotaControl for SystemHandle {
    fn get_record(&mut self, uid: u32) -> Result<QuotaLimits, QuotaOpError> {
        let mut dqblk = IfDqblk::default();
        self.quotactl_fd(Q_GETQUOTA, uid, &mut dqblk)?;
        Ok(dqblk.into())
    }

    fn set_record(&mut self, uid: u32, record: &QuotaLimits) -> Result<(), QuotaOpError> {
        let mut dqblk = IfDqblk::from(record);
        self.quotactl_fd(Q_SETQUOTA, uid, &mut dqblk)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_encoding() {
        assert_eq!(qcmd(Q_GETQUOTA), 0x80000700);
        assert_eq!(qcmd(Q_SETQUOTA), 0x80000800);
    }

    #[test]
    fn unit_conversion() {
        let d = IfDqblk {
            dqb_bsoftlimit: 50,
            dqb_bhardlimit: 100,
            dqb_curspace:   102400,
            dqb_isoftlimit: 5,
            dqb_ihardlimit: 10,
            dqb_curinodes:  3,
            ..IfDqblk::default()
        };
        let q = QuotaLimits::from(d);
        assert_eq!(q.block_soft_limit, 100);
        assert_eq!(q.block_hard_limit, 200);
        assert_eq!(q.block_usage, 200);
        assert_eq!(q.file_soft_limit, 5);

        let back = IfDqblk::from(&q);
        assert_eq!(back.dqb_bsoftlimit, 50);
        assert_eq!(back.dqb_bhardlimit, 100);
        assert_eq!(back.dqb_ihardlimit, 10);
        assert_eq!(back.dqb_curspace, 0);
        // odd block counts round up to the next KiB.
        let odd = QuotaLimits {
            block_soft_limit: 3,
            ..QuotaLimits::default()
        };
        assert_eq!(IfDqblk::from(&odd).dqb_bsoftlimit, 2);
    }

    #[test]
    fn unlimited_saturates() {
        let d = IfDqblk {
            dqb_bhardlimit: u64::max_value(),
            ..IfDqblk::default()
        };
        assert_eq!(QuotaLimits::from(d).block_hard_limit, u32::max_value());
    }

    #[test]
    fn errno_mapping() {
        assert_eq!(map_errno(libc::ESRCH), Some(QuotaOpError::QuotaDisabled));
        assert_eq!(map_errno(libc::EPERM), Some(QuotaOpError::PermissionDenied));
        assert!(map_errno(libc::EIO).is_none());
    }

    #[test]
    fn open_falls_back_to_mount_point() {
        let dir = tempfile::tempdir().unwrap();
        let locator = dir.path().join("quotas");
        assert!(SystemBackend.open(&locator, OpenMode::ReadWrite).is_ok());
        let missing = dir.path().join("nope").join("quotas");
        assert!(SystemBackend.open(&missing, OpenMode::ReadOnly).is_err());
    }
}

//
// No-op implementations.
//
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Seek, SeekFrom};
use std::os::raw::c_int;
use std::path::Path;

use crate::{OpenMode, QuotaBackend, QuotaControl, QuotaLimits, QuotaOpError};

pub const DEFAULT_MNTTAB: &str = "/etc/mtab";

pub(crate) fn map_errno(_errno: c_int) -> Option<QuotaOpError> {
    None
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

impl QuotaControl for SystemHandle {
    fn get_record(&mut self, _uid: u32) -> Result<QuotaLimits, QuotaOpError> {
        Err(QuotaOpError::QuotaDisabled)
    }

    fn set_record(&mut self, _uid: u32, _record: &QuotaLimits) -> Result<(), QuotaOpError> {
        Err(QuotaOpError::QuotaDisabled)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

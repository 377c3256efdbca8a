//
// Get and set quota records through a QuotaBackend.
//
use std::io;
use std::path::Path;

use crate::{FqError, QuotaLimits, QuotaOpError, SystemBackend, UpdateMask, UserIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// An open quota control resource.
///
/// Dropping the value releases the resource.
pub trait QuotaControl {
    fn get_record(&mut self, uid: u32) -> Result<QuotaLimits, QuotaOpError>;
    fn set_record(&mut self, uid: u32, record: &QuotaLimits) -> Result<(), QuotaOpError>;
    /// Seek back to the start of the resource.
    fn rewind(&mut self) -> io::Result<()>;
}

/// Opens quota control resources.
pub trait QuotaBackend {
    type Handle: QuotaControl;
    fn open(&self, locator: &Path, mode: OpenMode) -> io::Result<Self::Handle>;
}

impl<'a, B: QuotaBackend + ?Sized> QuotaBackend for &'a B {
    type Handle = B::Handle;
    fn open(&self, locator: &Path, mode: OpenMode) -> io::Result<Self::Handle> {
        (**self).open(locator, mode)
    }
}

#[derive(Debug, Default, Clone)]
pub struct QuotaStore<B = SystemBackend> {
    backend: B,
}

impl QuotaStore<SystemBackend> {
    pub fn new() -> QuotaStore<SystemBackend> {
        QuotaStore::with_backend(SystemBackend)
    }
}

impl<B: QuotaBackend> QuotaStore<B> {
    pub fn with_backend(backend: B) -> QuotaStore<B> {
        QuotaStore { backend }
    }

    fn open(&self, locator: &Path, mode: OpenMode) -> Result<B::Handle, FqError> {
        debug!("open {:?} {:?}", locator, mode);
        self.backend
            .open(locator, mode)
            .map_err(|e| FqError::Open(locator.to_path_buf(), e))
    }

    /// Get the quota record of a user.
    pub fn get_quota(&self, id: UserIdentity, locator: impl AsRef<Path>) -> Result<QuotaLimits, FqError> {
        let mut handle = self.open(locator.as_ref(), OpenMode::ReadOnly)?;
        let q = handle.get_record(id.uid())?;
        debug!("get_quota uid {}: {:?}", id, q);
        Ok(q)
    }

    /// Change the fields in `mask` of a user's quota record to the values
    /// in `limits`. All other fields keep the value they have now.
    ///
    /// A user that has no record yet starts from an all-zero record. An
    /// empty mask does nothing, not even open the resource.
    pub fn set_quota(
        &self,
        id: UserIdentity,
        locator: impl AsRef<Path>,
        limits: &QuotaLimits,
        mask: UpdateMask,
    ) -> Result<(), FqError>
    {
        if mask.is_empty() {
            return Ok(());
        }
        let mut handle = self.open(locator.as_ref(), OpenMode::ReadWrite)?;

        let mut record = match handle.get_record(id.uid()) {
            Ok(q) => q,
            Err(QuotaOpError::UserNotInQuotaFile) => {
                debug!("set_quota uid {}: not in quota file, adding", id);
                QuotaLimits::default()
            },
            Err(e) => return Err(e.into()),
        };
        handle.rewind().map_err(FqError::Seek)?;

        record.merge(limits, mask);
        debug!("set_quota uid {}: {:?} mask {:?}", id, record, mask);
        handle.set_record(id.uid(), &record)?;
        Ok(())
    }
}

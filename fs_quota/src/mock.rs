//! In-memory quota backend, for testing.
//!
//! Records live in a map keyed by uid, the locator is only remembered.
//! Every open, rewind and set is recorded so tests can check what the
//! store did, and failures can be injected for the next open, get or set.
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::{OpenMode, QuotaBackend, QuotaControl, QuotaLimits, QuotaOpError};

#[derive(Default)]
struct State {
    records:   HashMap<u32, QuotaLimits>,
    opens:     Vec<(PathBuf, OpenMode)>,
    sets:      Vec<(u32, QuotaLimits)>,
    rewinds:   usize,
    handles:   usize,
    fail_open: Option<io::ErrorKind>,
    fail_get:  Option<QuotaOpError>,
    fail_set:  Option<QuotaOpError>,
}

#[derive(Default, Clone)]
pub struct MemoryBackend {
    state: Rc<RefCell<State>>,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    pub fn insert(&self, uid: u32, record: QuotaLimits) {
        self.state.borrow_mut().records.insert(uid, record);
    }

    pub fn get(&self, uid: u32) -> Option<QuotaLimits> {
        self.state.borrow().records.get(&uid).cloned()
    }

    /// Every `open` so far, in order.
    pub fn opens(&self) -> Vec<(PathBuf, OpenMode)> {
        self.state.borrow().opens.clone()
    }

    /// Every successful `set_record` so far, in order.
    pub fn sets(&self) -> Vec<(u32, QuotaLimits)> {
        self.state.borrow().sets.clone()
    }

    pub fn rewinds(&self) -> usize {
        self.state.borrow().rewinds
    }

    /// Number of handles that are open right now.
    pub fn open_handles(&self) -> usize {
        self.state.borrow().handles
    }

    pub fn fail_open(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().fail_open = Some(kind);
    }

    pub fn fail_get(&self, e: QuotaOpError) {
        self.state.borrow_mut().fail_get = Some(e);
    }

    pub fn fail_set(&self, e: QuotaOpError) {
        self.state.borrow_mut().fail_set = Some(e);
    }
}

pub struct MemoryHandle {
    state: Rc<RefCell<State>>,
}

impl QuotaBackend for MemoryBackend {
    type Handle = MemoryHandle;

    fn open(&self, locator: &Path, mode: OpenMode) -> io::Result<MemoryHandle> {
        let mut state = self.state.borrow_mut();
        state.opens.push((locator.to_path_buf(), mode));
        if let Some(kind) = state.fail_open.take() {
            return Err(io::Error::from(kind));
        }
        state.handles += 1;
        Ok(MemoryHandle {
            state: self.state.clone(),
        })
    }
}

impl QuotaControl for MemoryHandle {
    fn get_record(&mut self, uid: u32) -> Result<QuotaLimits, QuotaOpError> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_get.take() {
            return Err(e);
        }
        state.records.get(&uid).cloned().ok_or(QuotaOpError::UserNotInQuotaFile)
    }

    fn set_record(&mut self, uid: u32, record: &QuotaLimits) -> Result<(), QuotaOpError> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_set.take() {
            return Err(e);
        }
        state.records.insert(uid, *record);
        state.sets.push((uid, *record));
        Ok(())
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.state.borrow_mut().rewinds += 1;
        Ok(())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.state.borrow_mut().handles -= 1;
    }
}

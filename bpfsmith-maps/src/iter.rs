//! Lazy iteration adapters over a map's keys, values, and pairs
//! (spec.md §4.3 "Iteration"). These hold no kernel lock; concurrent
//! mutation may cause entries to appear, disappear, or repeat, which is
//! an accepted weak guarantee inherited from the kernel's own iterator.

use crate::error::KernelError;
use crate::handle::MapHandle;
use crate::syscall::BpfSyscall;

pub struct Keys<'a, S: BpfSyscall> {
    handle: &'a MapHandle<S>,
    cursor: Option<Vec<u8>>,
    done: bool,
}

impl<'a, S: BpfSyscall> Keys<'a, S> {
    pub(crate) fn new(handle: &'a MapHandle<S>) -> Self {
        Self { handle, cursor: None, done: false }
    }
}

impl<'a, S: BpfSyscall> Iterator for Keys<'a, S> {
    type Item = Result<Vec<u8>, KernelError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.handle.next_key(self.cursor.as_deref()) {
            Ok(Some(k)) => {
                self.cursor = Some(k.clone());
                Some(Ok(k))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

pub struct Pairs<'a, S: BpfSyscall> {
    keys: Keys<'a, S>,
}

impl<'a, S: BpfSyscall> Pairs<'a, S> {
    pub(crate) fn new(handle: &'a MapHandle<S>) -> Self {
        Self { keys: Keys::new(handle) }
    }
}

impl<'a, S: BpfSyscall> Iterator for Pairs<'a, S> {
    type Item = Result<(Vec<u8>, Vec<u8>), KernelError>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = match self.keys.next()? {
            Ok(k) => k,
            Err(e) => return Some(Err(e)),
        };
        match self.keys.handle.lookup(&key) {
            Ok(Some(v)) => Some(Ok((key, v))),
            Ok(None) => self.next(), // key vanished between next_key and lookup
            Err(e) => Some(Err(e)),
        }
    }
}

pub struct Values<'a, S: BpfSyscall> {
    pairs: Pairs<'a, S>,
}

impl<'a, S: BpfSyscall> Values<'a, S> {
    pub(crate) fn new(handle: &'a MapHandle<S>) -> Self {
        Self { pairs: Pairs::new(handle) }
    }
}

impl<'a, S: BpfSyscall> Iterator for Values<'a, S> {
    type Item = Result<Vec<u8>, KernelError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.pairs.next()? {
            Ok((_, v)) => Some(Ok(v)),
            Err(e) => Some(Err(e)),
        }
    }
}

impl<S: BpfSyscall> MapHandle<S> {
    pub fn keys(&self) -> Keys<'_, S> {
        Keys::new(self)
    }

    pub fn pairs(&self) -> Pairs<'_, S> {
        Pairs::new(self)
    }

    pub fn values(&self) -> Values<'_, S> {
        Values::new(self)
    }

    /// Consumes entries without materializing the full sequence.
    pub fn reduce<T>(
        &self,
        init: T,
        mut f: impl FnMut(T, Vec<u8>, Vec<u8>) -> T,
    ) -> Result<T, KernelError> {
        let mut acc = init;
        for pair in self.pairs() {
            let (k, v) = pair?;
            acc = f(acc, k, v);
        }
        Ok(acc)
    }
}

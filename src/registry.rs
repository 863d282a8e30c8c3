use super::{error::ProtocolViolation, handle::Handle, record::ExceptionRecord};
use std::collections::BTreeMap;

/// Live exceptions, keyed by their original handle.
// Invariant: every alias of every record resolves through `de_adjust` to exactly that record's
// key. `add_alias` refuses aliases that would break this.
#[derive(Debug, Default)]
pub struct Registry {
    records: BTreeMap<Handle, ExceptionRecord>,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.records.contains_key(&handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&ExceptionRecord> {
        self.records.get(&handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut ExceptionRecord> {
        self.records.get_mut(&handle)
    }

    /// Insert a freshly thrown record, returning the record it displaced, if any.
    pub fn insert(&mut self, record: ExceptionRecord) -> Option<ExceptionRecord> {
        self.records.insert(record.handle(), record)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<ExceptionRecord> {
        self.records.remove(&handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExceptionRecord> {
        self.records.values()
    }

    /// Drain all records, e.g. on teardown.
    pub fn take_all(&mut self) -> BTreeMap<Handle, ExceptionRecord> {
        core::mem::take(&mut self.records)
    }

    /// Map a possibly adjusted handle back to the key of the record it was derived from.
    ///
    /// Null handles and registry keys are returned as-is. Other values are looked up among the
    /// aliases of all live records, which is linear in the number of live exceptions. Nesting is
    /// shallow in practice, so a reverse index isn't worth maintaining.
    ///
    /// A value that is not an alias of any record is returned unchanged. This fallback is not
    /// authoritative: it usually means the value never went through matching, and hides the
    /// mistake rather than reporting it.
    pub fn de_adjust(&self, handle: Handle) -> Handle {
        if handle.is_null() || self.contains(handle) {
            return handle;
        }
        match self.owner_of(handle) {
            Some(owner) => {
                log::trace!("de-adjusted exception {handle} to {owner}");
                owner
            }
            None => {
                log::warn!("no de-adjustment for unknown exception {handle}");
                handle
            }
        }
    }

    fn owner_of(&self, alias: Handle) -> Option<Handle> {
        self.records
            .values()
            .find(|record| record.has_alias(alias))
            .map(ExceptionRecord::handle)
    }

    /// Record `alias` as another name for the exception keyed by `owner`.
    ///
    /// An alias that already names a different live exception is refused.
    pub fn add_alias(&mut self, owner: Handle, alias: Handle) {
        if alias.is_null() {
            return;
        }
        let other = if self.contains(alias) {
            Some(alias)
        } else {
            self.owner_of(alias)
        };
        if let Some(other) = other.filter(|&other| other != owner) {
            ProtocolViolation::AliasCollision {
                alias,
                owner,
                other,
            }
            .report();
            return;
        }
        if let Some(record) = self.records.get_mut(&owner) {
            record.add_alias(alias);
        }
    }
}

// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! The handle store: the registry later phases read handles from.
//!
//! Entries are written once and read any number of times. Each write, read
//! and phase completion is appended to a journal.

use crate::error::{Result, WebSysError};
use crate::plan::{Handle, Phase};
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

/// The kind of handle an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKind {
    /// A topic, keyed by topic key.
    Topic,
    /// The login client of an app, keyed by app name.
    AuthClient,
    /// The HTTP API, keyed by api name.
    Gateway,
    /// A function, keyed by logical key.
    Function,
}

impl StoreKind {
    /// The phase that writes entries of this kind, if reads are phase gated.
    ///
    /// Functions are written per branch while batch jobs of the same branch
    /// already read them, so they are not gated.
    pub fn owner(&self) -> Option<Phase> {
        match self {
            StoreKind::Topic => Some(Phase::Messaging),
            StoreKind::AuthClient => Some(Phase::Frontend),
            StoreKind::Gateway => Some(Phase::Gateway),
            StoreKind::Function => None,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            StoreKind::Topic => "topic",
            StoreKind::AuthClient => "auth client of app",
            StoreKind::Gateway => "gateway",
            StoreKind::Function => "lambda",
        }
    }
}

/// The namespace of an entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Shared by all branches.
    Shared,
    /// Owned by one branch.
    Branch(String),
}

impl Scope {
    /// `Branch(name)` when a branch is given, `Shared` otherwise.
    pub fn of(branch: Option<&str>) -> Scope {
        match branch {
            Some(name) => Scope::Branch(name.to_owned()),
            None => Scope::Shared,
        }
    }
}

/// Identity of a store entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    /// Kind of the handle.
    pub kind:  StoreKind,
    /// Namespace of the handle.
    pub scope: Scope,
    /// Logical key.
    pub key:   String,
}

impl StoreKey {
    /// Creates a key.
    pub fn new(kind: StoreKind, scope: Scope, key: &str) -> StoreKey {
        StoreKey {
            kind,
            scope,
            key: key.to_owned(),
        }
    }
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Scope::Shared => write!(f, "{} '{}'", self.kind.noun(), self.key),
            Scope::Branch(branch) => {
                write!(f, "{} '{}' of branch '{}'", self.kind.noun(), self.key, branch)
            }
        }
    }
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// An entry was written.
    Write(StoreKey),
    /// An entry was read (successfully or not).
    Read(StoreKey),
    /// A phase finished.
    PhaseCompleted(Phase),
}

/// Write-once registry of handles built by earlier phases.
#[derive(Debug, Default)]
pub struct HandleStore {
    entries:   HashMap<StoreKey, Handle>,
    completed: BTreeSet<Phase>,
    journal:   Vec<StoreEvent>,
}

impl HandleStore {
    /// Creates an empty store.
    pub fn new() -> HandleStore {
        HandleStore::default()
    }

    /// Registers `handle` under `key`. A key can only be written once.
    pub fn write(&mut self, key: StoreKey, handle: Handle) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Err(WebSysError::DuplicateResource(format!(
                "{} is registered twice",
                key
            )));
        }
        debug!("register {} -> {}", key, handle);
        self.journal.push(StoreEvent::Write(key.clone()));
        self.entries.insert(key, handle);
        Ok(())
    }

    /// Reads the handle registered under `key`.
    ///
    /// # Arguments
    /// * `key` - The entry to read.
    /// * `requested_by` - Who needs the entry, quoted in error messages.
    pub fn read(&mut self, key: &StoreKey, requested_by: &str) -> Result<Handle> {
        self.journal.push(StoreEvent::Read(key.clone()));
        if let Some(owner) = key.kind.owner() {
            if !self.is_completed(owner) {
                return Err(WebSysError::PhaseOrder(format!(
                    "{} read before the {} phase completed: requested by {}",
                    key, owner, requested_by
                )));
            }
        }
        self.entries.get(key).cloned().ok_or_else(|| {
            WebSysError::ReferentialIntegrity(format!(
                "{} not found: requested by {}",
                key, requested_by
            ))
        })
    }

    /// Whether `key` has an entry. Not journaled.
    pub fn contains(&self, key: &StoreKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Marks `phase` completed.
    pub fn complete(&mut self, phase: Phase) {
        debug!("{} phase completed", phase);
        self.completed.insert(phase);
        self.journal.push(StoreEvent::PhaseCompleted(phase));
    }

    /// Whether `phase` completed.
    pub fn is_completed(&self, phase: Phase) -> bool {
        self.completed.contains(&phase)
    }

    /// Consumes the store, returning its journal.
    pub fn into_journal(self) -> Vec<StoreEvent> {
        self.journal
    }
}

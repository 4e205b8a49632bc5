//! Defines [`OutputRegistry`], the record of which post owns which output
//! directory during a build. Workers claim directories concurrently; the
//! first claim wins and later claims fail with [`Conflict`]. After the
//! parallel phase the registry is the set of live post directories used when
//! pruning stale output.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maps output directories to the source directory of the post owning them.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    owners: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `source_dir` as the owner of `output_dir` unless another post
    /// already owns it.
    pub fn claim(&self, output_dir: &Path, source_dir: &Path) -> Result<(), Conflict> {
        let mut owners = self.owners.lock();
        match owners.get(output_dir) {
            Some(first) => Err(Conflict {
                output_dir: output_dir.to_owned(),
                first: first.clone(),
            }),
            None => {
                owners.insert(output_dir.to_owned(), source_dir.to_owned());
                Ok(())
            }
        }
    }

    /// Returns true if a post owns `output_dir`.
    pub fn contains(&self, output_dir: &Path) -> bool {
        self.owners.lock().contains_key(output_dir)
    }

    /// Returns the source directory of the post owning `output_dir`.
    pub fn owner(&self, output_dir: &Path) -> Option<PathBuf> {
        self.owners.lock().get(output_dir).cloned()
    }

    pub fn len(&self) -> usize {
        self.owners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returned when two posts resolve to the same output directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "output directory `{}` is already used by the post in `{}`",
    output_dir.display(),
    first.display()
)]
pub struct Conflict {
    pub output_dir: PathBuf,

    /// The source directory of the post that claimed the directory first.
    pub first: PathBuf,
}

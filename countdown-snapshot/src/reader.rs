// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, PoisonError};

use crate::{SnapshotCell, StatusSnapshot};

/// Reader of the status snapshot cell.
///
/// Readers never block the writer for longer than it takes to clone an `Arc`, and always get a
/// snapshot that was published whole.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    cell: Arc<SnapshotCell>,
}

impl SnapshotReader {
    pub(crate) fn new(cell: Arc<SnapshotCell>) -> SnapshotReader {
        SnapshotReader { cell }
    }

    /// The latest snapshot published.
    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        self.load().1
    }

    /// The generation of the latest snapshot published, 0 if only the placeholder is available.
    pub fn generation(&self) -> u64 {
        self.load().0
    }

    /// The generation and snapshot, read together.
    pub fn load(&self) -> (u64, Arc<StatusSnapshot>) {
        let published = self
            .cell
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        (published.generation, published.snapshot.clone())
    }
}

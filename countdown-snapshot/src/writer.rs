// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, PoisonError};

use crate::{SnapshotCell, StatusSnapshot};

/// Trait that a publisher of status snapshots has to implement.
pub trait SnapshotWrite {
    /// Replace the published snapshot with `snapshot`, as a whole.
    fn write(&mut self, snapshot: &StatusSnapshot);
}

/// Writer to the status snapshot cell.
///
/// There is only ever one writer per cell: the type is neither Clone nor Copy, and the only way to
/// get one is through `channel()`. Updates copy the snapshot out of the caller's hands before the
/// lock is taken, so the critical section is reduced to swapping a pointer and bumping the
/// generation number.
#[derive(Debug)]
pub struct SnapshotWriter {
    cell: Arc<SnapshotCell>,
}

impl SnapshotWriter {
    pub(crate) fn new(cell: Arc<SnapshotCell>) -> SnapshotWriter {
        SnapshotWriter { cell }
    }
}

impl SnapshotWrite for SnapshotWriter {
    /// Publish a new snapshot.
    ///
    /// The generation number rolls over but never goes back to 0, which is reserved for the
    /// placeholder installed when the cell is created.
    fn write(&mut self, snapshot: &StatusSnapshot) {
        let fresh = Arc::new(snapshot.clone());

        // A reader panicking while holding the lock cannot leave the content half-written, the
        // content is only ever swapped whole. Carry on with the inner value.
        let mut published = self
            .cell
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut generation = published.generation.wrapping_add(1);
        if generation == 0 {
            generation = 1;
        }
        published.generation = generation;
        published.snapshot = fresh;
    }
}

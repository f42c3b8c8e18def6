//! Checkpoint capture and restore.
//!
//! A snapshot is a serializable header (enough replicated metadata to
//! rebuild the layout) plus this rank's raw box buffers in local box
//! order. Buffers are byte images of the affine-ordered element data, so
//! capture and restore are straight copies with no per-cell walk. Restore
//! is only valid on the same number of ranks the snapshot was taken on;
//! repartitioning a checkpoint is a copy through `parallel_copy` after a
//! plain restore.

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use crate::data::field::BoxField;
use crate::error::BoxFieldError;
use crate::geom::{BoxArray, IVec, Layout, RankMap};

/// Replicated metadata of a checkpointed container.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub nprocs: usize,
    pub ncomp: usize,
    pub ngrow: IVec,
    pub boxes: BoxArray,
    pub ranks: RankMap,
}

/// One rank's checkpoint of one container.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub header: SnapshotHeader,
    /// Raw buffers of the local boxes, in local box order.
    pub buffers: Vec<Vec<u8>>,
}

impl<V: Pod + Clone + Default + Send + Sync> BoxField<V> {
    /// Capture this rank's part of the container.
    pub fn save_snapshot(&self, nprocs: usize) -> Snapshot {
        let header = SnapshotHeader {
            nprocs,
            ncomp: self.ncomp(),
            ngrow: self.ngrow(),
            boxes: self.layout().boxes().clone(),
            ranks: self.layout().ranks().clone(),
        };
        let mut buffers = Vec::with_capacity(self.n_local());
        self.for_each_box(|_, _, view| {
            buffers.push(bytemuck::cast_slice(view.as_slice()).to_vec());
        });
        Snapshot { header, buffers }
    }

    /// Rebuild a container from a snapshot taken on `nprocs` ranks.
    ///
    /// Fails when the process count differs from capture time or when a
    /// buffer does not match the size its box implies.
    pub fn from_snapshot(snap: &Snapshot, rank: usize, nprocs: usize) -> Result<Self, BoxFieldError> {
        if nprocs != snap.header.nprocs {
            return Err(BoxFieldError::SnapshotProcessCount {
                recorded: snap.header.nprocs,
                found: nprocs,
            });
        }
        let layout = Layout::new(snap.header.boxes.clone(), snap.header.ranks.clone())?;
        layout.ranks().validate(nprocs)?;
        let mut field = BoxField::new(&layout, snap.header.ncomp, snap.header.ngrow, rank)?;
        if snap.buffers.len() != field.n_local() {
            return Err(BoxFieldError::SnapshotBoxCount {
                expected: field.n_local(),
                found: snap.buffers.len(),
            });
        }
        let elem = std::mem::size_of::<V>();
        let indices: Vec<usize> = field.local_indices().collect();
        for (gidx, buf) in indices.into_iter().zip(&snap.buffers) {
            let dst = field.local_data_mut(gidx)?;
            if buf.len() != dst.len() * elem {
                return Err(BoxFieldError::SnapshotBufferLength {
                    index: gidx,
                    expected: dst.len() * elem,
                    found: buf.len(),
                });
            }
            dst.copy_from_slice(&bytemuck::pod_collect_to_vec::<u8, V>(buf));
        }
        Ok(field)
    }
}

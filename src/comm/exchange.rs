//! Plan-driven data exchange between containers.
//!
//! Every exchange runs the same two-phase protocol: post all receives,
//! pack and send per-peer buffers, service purely local regions through a
//! staging buffer, then wait and unpack. Within a peer buffer, regions
//! appear in the plan's global enumeration order with components outermost
//! and points in the view's affine order, so the receiver needs no framing
//! beyond the plan it derived itself.
//!
//! All ranks must call the same exchange with the same tag in the same
//! order. A mismatch is unrecoverable and aborts.

use std::ops::{Add, Range};

use bytemuck::Pod;
use log::trace;

use crate::comm::cache::{PlanCache, default_plan_cache};
use crate::comm::communicator::{Communicator, Wait};
use crate::comm::plan::{CopyRegion, ExchangePlan, PlanKind};
use crate::data::field::BoxField;
use crate::error::BoxFieldError;
use crate::geom::{IVec, Periodicity};

/// How unpacked values land in the destination.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CombineMode {
    Overwrite,
    Add,
}

/// Exchange context: a communicator, a periodicity, and a plan cache.
pub struct Exchanger<'a, C: Communicator> {
    comm: &'a C,
    period: Periodicity,
    cache: &'a PlanCache,
}

impl<'a, C: Communicator> Exchanger<'a, C> {
    pub fn new(comm: &'a C, period: Periodicity) -> Self {
        Self {
            comm,
            period,
            cache: default_plan_cache(),
        }
    }

    pub fn with_cache(comm: &'a C, period: Periodicity, cache: &'a PlanCache) -> Self {
        Self {
            comm,
            period,
            cache,
        }
    }

    #[inline]
    pub fn periodicity(&self) -> &Periodicity {
        &self.period
    }

    /// Fill `field`'s ghost cells from the valid cells that cover them,
    /// across boxes, ranks, and periodic wraps.
    pub fn fill_ghosts<V>(
        &self,
        field: &mut BoxField<V>,
        comps: Range<usize>,
        ngrow: IVec,
        tag: u16,
    ) -> Result<(), BoxFieldError>
    where
        V: Pod + Add<Output = V> + Send + Sync,
    {
        field.check_comps(&comps);
        field.check_ngrow(ngrow);
        let plan = self.cache.get(
            field.layout(),
            field.layout(),
            ngrow,
            &self.period,
            PlanKind::FillGhosts,
            self.comm.rank(),
        );
        self.run_same(&plan, field, comps, tag, CombineMode::Overwrite)
    }

    /// Combine values at points shared by multiple boxes of one container.
    /// With `CombineMode::Add` every box ends up holding the sum over all
    /// boxes touching the point.
    pub fn shared_points<V>(
        &self,
        field: &mut BoxField<V>,
        comps: Range<usize>,
        tag: u16,
        mode: CombineMode,
    ) -> Result<(), BoxFieldError>
    where
        V: Pod + Add<Output = V> + Send + Sync,
    {
        field.check_comps(&comps);
        let plan = self.cache.get(
            field.layout(),
            field.layout(),
            IVec::ZERO,
            &self.period,
            PlanKind::SharedPoints,
            self.comm.rank(),
        );
        self.run_same(&plan, field, comps, tag, mode)
    }

    /// Copy `src` valid cells into `dst` valid and ghost cells wherever the
    /// two layouts overlap. The layouts may partition the index space
    /// completely differently.
    pub fn parallel_copy<V>(
        &self,
        dst: &mut BoxField<V>,
        dcomp: usize,
        src: &BoxField<V>,
        scomp: usize,
        ncomp: usize,
        ngrow: IVec,
        tag: u16,
        mode: CombineMode,
    ) -> Result<(), BoxFieldError>
    where
        V: Pod + Add<Output = V> + Send + Sync,
    {
        dst.check_comps(&(dcomp..dcomp + ncomp));
        src.check_comps(&(scomp..scomp + ncomp));
        dst.check_ngrow(ngrow);
        assert_eq!(
            src.layout().index_type(),
            dst.layout().index_type(),
            "copy between differently centered layouts"
        );
        let plan = self.cache.get(
            src.layout(),
            dst.layout(),
            ngrow,
            &self.period,
            PlanKind::ParallelCopy,
            self.comm.rank(),
        );
        let recvs = self.post_recvs::<V>(&plan, ncomp, tag);
        let (sends, locals) = pack_all(&plan, src, scomp, ncomp)?;
        let pending = self.send_all(sends, tag);
        deliver_local(&plan, dst, dcomp, ncomp, locals, mode)?;
        self.finish(&plan, dst, dcomp, ncomp, recvs, pending, mode)
    }

    /// Same-container exchange (source and destination are one field).
    fn run_same<V>(
        &self,
        plan: &ExchangePlan,
        field: &mut BoxField<V>,
        comps: Range<usize>,
        tag: u16,
        mode: CombineMode,
    ) -> Result<(), BoxFieldError>
    where
        V: Pod + Add<Output = V> + Send + Sync,
    {
        let (comp0, ncomp) = (comps.start, comps.len());
        let recvs = self.post_recvs::<V>(plan, ncomp, tag);
        let (sends, locals) = pack_all(plan, field, comp0, ncomp)?;
        let pending = self.send_all(sends, tag);
        deliver_local(plan, field, comp0, ncomp, locals, mode)?;
        self.finish(plan, field, comp0, ncomp, recvs, pending, mode)
    }

    fn post_recvs<V>(
        &self,
        plan: &ExchangePlan,
        ncomp: usize,
        tag: u16,
    ) -> Vec<(usize, C::RecvHandle)> {
        plan.recv
            .keys()
            .map(|&peer| {
                let bytes = plan.recv_points(peer) * ncomp * std::mem::size_of::<V>();
                (peer, self.comm.irecv(peer, tag, bytes))
            })
            .collect()
    }

    fn send_all<V: Pod>(&self, sends: Vec<(usize, Vec<V>)>, tag: u16) -> Vec<C::SendHandle> {
        sends
            .into_iter()
            .map(|(peer, buf)| {
                trace!("send {} values to rank {peer} tag {tag}", buf.len());
                self.comm.isend(peer, tag, bytemuck::cast_slice(&buf))
            })
            .collect()
    }

    fn finish<V>(
        &self,
        plan: &ExchangePlan,
        dst: &mut BoxField<V>,
        dcomp: usize,
        ncomp: usize,
        recvs: Vec<(usize, C::RecvHandle)>,
        pending: Vec<C::SendHandle>,
        mode: CombineMode,
    ) -> Result<(), BoxFieldError>
    where
        V: Pod + Add<Output = V> + Send + Sync,
    {
        for (peer, handle) in recvs {
            let Some(bytes) = handle.wait() else {
                panic!("receive from rank {peer} completed without data");
            };
            let values: Vec<V> = bytemuck::pod_collect_to_vec(&bytes);
            let mut off = 0;
            for cr in &plan.recv[&peer] {
                let n = cr.num_points() * ncomp;
                unpack_region(dst, cr, dcomp, ncomp, &values[off..off + n], mode)?;
                off += n;
            }
            debug_assert_eq!(off, values.len());
        }
        for handle in pending {
            handle.wait();
        }
        Ok(())
    }
}

/// Pack every outgoing and local region from `src` into staging buffers.
fn pack_all<V: Pod>(
    plan: &ExchangePlan,
    src: &BoxField<V>,
    scomp: usize,
    ncomp: usize,
) -> Result<(Vec<(usize, Vec<V>)>, Vec<Vec<V>>), BoxFieldError> {
    let mut sends = Vec::with_capacity(plan.send.len());
    for (&peer, regions) in &plan.send {
        let mut buf = Vec::with_capacity(plan.send_points(peer) * ncomp);
        for cr in regions {
            pack_region(src, cr, scomp, ncomp, &mut buf)?;
        }
        sends.push((peer, buf));
    }
    let mut locals = Vec::with_capacity(plan.local.len());
    for cr in &plan.local {
        let mut buf = Vec::with_capacity(cr.num_points() * ncomp);
        pack_region(src, cr, scomp, ncomp, &mut buf)?;
        locals.push(buf);
    }
    Ok((sends, locals))
}

fn deliver_local<V>(
    plan: &ExchangePlan,
    dst: &mut BoxField<V>,
    dcomp: usize,
    ncomp: usize,
    locals: Vec<Vec<V>>,
    mode: CombineMode,
) -> Result<(), BoxFieldError>
where
    V: Pod + Add<Output = V>,
{
    for (cr, buf) in plan.local.iter().zip(locals) {
        unpack_region(dst, cr, dcomp, ncomp, &buf, mode)?;
    }
    Ok(())
}

fn pack_region<V: Pod>(
    src: &BoxField<V>,
    cr: &CopyRegion,
    scomp: usize,
    ncomp: usize,
    out: &mut Vec<V>,
) -> Result<(), BoxFieldError> {
    let view = src.view(cr.src_idx)?;
    let sbox = cr.region.shift(-cr.shift);
    for n in 0..ncomp {
        for p in sbox.points() {
            out.push(view.get(p[0], p[1], p[2], scomp + n));
        }
    }
    Ok(())
}

fn unpack_region<V>(
    dst: &mut BoxField<V>,
    cr: &CopyRegion,
    dcomp: usize,
    ncomp: usize,
    data: &[V],
    mode: CombineMode,
) -> Result<(), BoxFieldError>
where
    V: Pod + Add<Output = V>,
{
    let mut view = dst.view_mut(cr.dst_idx)?;
    let mut idx = 0;
    for n in 0..ncomp {
        for p in cr.region.points() {
            let v = data[idx];
            idx += 1;
            match mode {
                CombineMode::Overwrite => view.set(p[0], p[1], p[2], dcomp + n, v),
                CombineMode::Add => {
                    let cur = view.get(p[0], p[1], p[2], dcomp + n);
                    view.set(p[0], p[1], p[2], dcomp + n, cur + v);
                }
            }
        }
    }
    Ok(())
}

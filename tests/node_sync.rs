//! Ownership masks and shared-point synchronization on node-centered data.

use boxfield::prelude::*;

fn nodal_pair() -> Layout {
    let ty = IndexType::node();
    let ba = BoxArray::new(vec![
        IndexBox::new(IVec::ZERO, IVec::new(4, 4, 1)).convert(ty),
        IndexBox::new(IVec::new(4, 0, 0), IVec::new(8, 4, 1)).convert(ty),
    ])
    .unwrap();
    Layout::new(ba, RankMap::new(vec![0, 0])).unwrap()
}

#[test]
fn override_sync_imposes_the_owner_value_exactly() {
    let l = nodal_pair();
    let mut f = BoxField::<f64>::new(&l, 1, IVec::ZERO, 0).unwrap();
    // the two boxes disagree along the shared x=4 node plane
    f.par_for_each_box_mut(|idx, valid, mut v| {
        for p in valid.points() {
            v.set(p[0], p[1], p[2], 0, 1.0 + idx as f64 * f64::EPSILON);
        }
    });
    let comm = NoComm;
    let period = Periodicity::non_periodic();
    let owner = owner_mask(&l, 0, &period).unwrap();
    let cache = PlanCache::new();
    let ex = Exchanger::with_cache(&comm, period, &cache);
    override_sync(&mut f, &owner, 0..1, &ex, 120).unwrap();
    // box 0 has the lower index, so it owns the seam; box 1 now carries
    // box 0's bits there
    let v1 = f.view(1).unwrap();
    for j in 0..5i64 {
        assert_eq!(v1.get(4, j, 0, 0).to_bits(), 1.0f64.to_bits());
    }
    // box 1's interior is untouched
    assert_eq!(v1.get(5, 1, 0, 0).to_bits(), (1.0 + f64::EPSILON).to_bits());
}

#[test]
fn average_sync_blends_the_seam_and_nothing_else() {
    let l = nodal_pair();
    let mut f = BoxField::<f64>::new(&l, 1, IVec::ZERO, 0).unwrap();
    f.par_for_each_box_mut(|idx, valid, mut v| {
        for p in valid.points() {
            v.set(p[0], p[1], p[2], 0, if idx == 0 { 2.0 } else { 6.0 });
        }
    });
    let comm = NoComm;
    let cache = PlanCache::new();
    let ex = Exchanger::with_cache(&comm, Periodicity::non_periodic(), &cache);
    average_sync(&mut f, 0..1, &ex, 121).unwrap();
    let v0 = f.view(0).unwrap();
    let v1 = f.view(1).unwrap();
    for j in 0..5i64 {
        assert_eq!(v0.get(4, j, 0, 0), 4.0);
        assert_eq!(v1.get(4, j, 0, 0), 4.0);
    }
    assert_eq!(v0.get(2, 2, 0, 0), 2.0);
    assert_eq!(v1.get(6, 2, 0, 0), 6.0);
}

#[test]
fn masks_partition_shared_points() {
    let l = nodal_pair();
    let period = Periodicity::non_periodic();
    let owner = owner_mask(&l, 0, &period).unwrap();
    let overlap = overlap_mask(&l, 0, &period).unwrap();
    let total_points: usize = (0..l.len()).map(|i| l.bx(i).num_points()).sum();
    let mut owners = 0i64;
    let mut shared = 0i64;
    owner.for_each_box(|_, valid, v| {
        for p in valid.points() {
            owners += v.get(p[0], p[1], p[2], 0) as i64;
        }
    });
    overlap.for_each_box(|_, valid, v| {
        for p in valid.points() {
            if v.get(p[0], p[1], p[2], 0) > 1 {
                shared += 1;
            }
        }
    });
    // the node grid spans 9 x 5 x 2 points (the cell boxes are one cell
    // thick in z, so converting adds the closing node layer there)
    let unique = 9 * 5 * 2;
    assert_eq!(owners as usize, unique);
    // the x=4 seam plane of 5 x 2 nodes is stored twice and its overlap
    // count shows up in both copies
    assert_eq!(shared, 20);
    assert_eq!(total_points, unique + 10);
}

#[test]
fn periodic_wrap_assigns_one_owner_per_physical_node() {
    // single nodal box wrapping in x: node 0 and node 8 are one point
    let ty = IndexType::node();
    let domain = IndexBox::new(IVec::ZERO, IVec::new(8, 1, 1));
    let ba = BoxArray::new(vec![domain.convert(ty)]).unwrap();
    let l = Layout::new(ba, RankMap::new(vec![0])).unwrap();
    let period = Periodicity::periodic_axes(&domain, [true, false, false]);
    let owner = owner_mask(&l, 0, &period).unwrap();
    let v = owner.view(0).unwrap();
    assert_eq!(v.get(0, 0, 0, 0), 1);
    assert_eq!(v.get(8, 0, 0, 0), 0);
    assert_eq!(v.get(3, 0, 0, 0), 1);
}

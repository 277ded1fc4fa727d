//! End-to-end pointer resolution scenarios.

use std::time::Duration;

use symspace::il::{self, Expression};
use symspace::memory::{
    AddressSpace, MemoryObject, MemoryObjectRef, ObjectState, Pointer, ResolutionList,
};
use symspace::solver::{Constraints, ExhaustiveSolver, Solver};

fn flat_object(space: &mut AddressSpace, address: u64, size: u64, bits: usize) -> MemoryObjectRef {
    let mo = MemoryObject::new(address, il::expr_const(size, bits), 0, false);
    space.bind_object(mo.clone(), ObjectState::new(size as usize));
    mo
}

fn segmented_object(
    space: &mut AddressSpace,
    address: u64,
    size: u64,
    segment: u64,
    bits: usize,
) -> MemoryObjectRef {
    let mo = MemoryObject::new(address, il::expr_const(size, bits), segment, false);
    space.bind_object(mo.clone(), ObjectState::new(size as usize));
    mo
}

fn resolved_addresses(rl: &ResolutionList) -> Vec<u64> {
    rl.iter().map(|(mo, _)| mo.address()).collect()
}

#[test]
fn flat_concrete_in_bounds() {
    let mut space = AddressSpace::new();
    let a = flat_object(&mut space, 0x1000, 16, 64);
    let _b = flat_object(&mut space, 0x2000, 8, 64);

    let constraints = Constraints::new();
    let mut solver = ExhaustiveSolver::new();
    let pointer = Pointer::flat(il::expr_const(0x1004, 64));

    let hit = space
        .resolve_one(&constraints, &mut solver, &pointer)
        .unwrap()
        .expect("pointer is in bounds");
    assert_eq!(hit.0.address(), a.address());

    let mut rl = ResolutionList::new();
    let incomplete = space.resolve(&constraints, &mut solver, &pointer, &mut rl, 0, None);
    assert!(!incomplete);
    assert_eq!(resolved_addresses(&rl), vec![0x1000]);
}

#[test]
fn flat_concrete_gap() {
    let mut space = AddressSpace::new();
    let a = flat_object(&mut space, 0x1000, 16, 64);
    let b = flat_object(&mut space, 0x2000, 8, 64);

    let constraints = Constraints::new();
    let mut solver = ExhaustiveSolver::new();
    let pointer = Pointer::flat(il::expr_const(0x1800, 64));

    assert!(space
        .resolve_one(&constraints, &mut solver, &pointer)
        .unwrap()
        .is_none());

    let mut rl = ResolutionList::new();
    let incomplete = space.resolve(&constraints, &mut solver, &pointer, &mut rl, 0, None);
    assert!(!incomplete);
    assert!(rl.is_empty());

    // soundness of the complete enumeration: neither object can contain the
    // pointer under the (empty) constraints
    for mo in [&a, &b] {
        let outside = Expression::is_zero(mo.bounds_check_pointer(&pointer).unwrap()).unwrap();
        assert!(solver.must_be_true(&constraints, &outside).unwrap());
    }
}

#[test]
fn zero_sized_object() {
    let mut space = AddressSpace::new();
    let z = flat_object(&mut space, 0x3000, 0, 64);

    let constraints = Constraints::new();
    let mut solver = ExhaustiveSolver::new();

    let at_base = Pointer::flat(il::expr_const(0x3000, 64));
    let hit = space
        .resolve_one(&constraints, &mut solver, &at_base)
        .unwrap()
        .expect("zero-sized object is addressable at its base");
    assert_eq!(hit.0.address(), z.address());

    let mut rl = ResolutionList::new();
    assert!(!space.resolve(&constraints, &mut solver, &at_base, &mut rl, 0, None));
    assert_eq!(resolved_addresses(&rl), vec![0x3000]);

    let past_base = Pointer::flat(il::expr_const(0x3001, 64));
    assert!(space
        .resolve_one(&constraints, &mut solver, &past_base)
        .unwrap()
        .is_none());
}

#[test]
fn symbolic_segment_two_segments() {
    let mut space = AddressSpace::new();
    let a = segmented_object(&mut space, 0x1000, 16, 1, 16);
    let _b = segmented_object(&mut space, 0x2000, 16, 2, 16);

    let x = il::expr_scalar("x", 8);
    let mut constraints = Constraints::new();
    constraints
        .add(
            Expression::or(
                Expression::cmpeq(x.clone(), il::expr_const(1, 8)).unwrap(),
                Expression::cmpeq(x.clone(), il::expr_const(2, 8)).unwrap(),
            )
            .unwrap(),
        )
        .unwrap();

    let pointer = Pointer::new(x, il::expr_const(0, 16));
    let mut solver = ExhaustiveSolver::new();

    let mut rl = ResolutionList::new();
    let incomplete = space.resolve(&constraints, &mut solver, &pointer, &mut rl, 0, None);
    assert!(!incomplete);
    assert_eq!(resolved_addresses(&rl), vec![0x1000, 0x2000]);

    // the single resolver concretizes the segment with getValue, which for
    // the exhaustive solver is the smallest model: segment 1
    let hit = space
        .resolve_one(&constraints, &mut solver, &pointer)
        .unwrap()
        .expect("segment is resolvable");
    assert_eq!(hit.0.address(), a.address());
}

#[test]
fn resolution_cap_reports_incomplete() {
    let mut space = AddressSpace::new();
    flat_object(&mut space, 0x100, 16, 16);
    flat_object(&mut space, 0x200, 16, 16);
    flat_object(&mut space, 0x300, 16, 16);

    let constraints = Constraints::new();
    let mut solver = ExhaustiveSolver::new();
    let pointer = Pointer::flat(il::expr_scalar("o", 16));

    let mut rl = ResolutionList::new();
    let incomplete = space.resolve(&constraints, &mut solver, &pointer, &mut rl, 2, None);
    assert!(incomplete);
    assert_eq!(rl.len(), 2);

    // every returned object may contain the pointer
    for (mo, _) in &rl {
        let in_bounds = mo.bounds_check_pointer(&pointer).unwrap();
        assert!(solver.may_be_true(&constraints, &in_bounds).unwrap());
    }
}

#[test]
fn unbounded_resolution_finds_all_candidates() {
    let mut space = AddressSpace::new();
    flat_object(&mut space, 0x100, 16, 16);
    flat_object(&mut space, 0x200, 16, 16);
    flat_object(&mut space, 0x300, 16, 16);

    let constraints = Constraints::new();
    let mut solver = ExhaustiveSolver::new();
    let pointer = Pointer::flat(il::expr_scalar("o", 16));

    let mut rl = ResolutionList::new();
    let incomplete = space.resolve(&constraints, &mut solver, &pointer, &mut rl, 0, None);
    assert!(!incomplete);
    assert_eq!(resolved_addresses(&rl), vec![0x100, 0x200, 0x300]);
}

#[test]
fn constrained_symbolic_offset_is_unique() {
    let mut space = AddressSpace::new();
    let a = flat_object(&mut space, 0x100, 16, 16);
    let b = flat_object(&mut space, 0x200, 16, 16);

    let o = il::expr_scalar("o", 16);
    let mut constraints = Constraints::new();
    constraints
        .add(Expression::cmpgeu(o.clone(), il::expr_const(0x100, 16)).unwrap())
        .unwrap();
    constraints
        .add(Expression::cmpltu(o.clone(), il::expr_const(0x110, 16)).unwrap())
        .unwrap();

    let pointer = Pointer::flat(o);
    let mut solver = ExhaustiveSolver::new();

    let hit = space
        .resolve_one(&constraints, &mut solver, &pointer)
        .unwrap()
        .expect("constrained pointer must resolve");
    assert_eq!(hit.0.address(), a.address());

    let mut rl = ResolutionList::new();
    let incomplete = space.resolve(&constraints, &mut solver, &pointer, &mut rl, 0, None);
    assert!(!incomplete);
    assert_eq!(resolved_addresses(&rl), vec![0x100]);

    // soundness: the object outside the range cannot contain the pointer
    let outside = Expression::is_zero(b.bounds_check_pointer(&pointer).unwrap()).unwrap();
    assert!(solver.must_be_true(&constraints, &outside).unwrap());
}

#[test]
fn solver_failure_propagates() {
    let mut space = AddressSpace::new();
    flat_object(&mut space, 0x1000, 16, 64);

    let constraints = Constraints::new();
    // a 64-bit scalar exceeds the exhaustive model limit: every query fails
    let mut solver = ExhaustiveSolver::new();
    let pointer = Pointer::flat(il::expr_scalar("wide", 64));

    assert!(space
        .resolve_one(&constraints, &mut solver, &pointer)
        .is_err());

    let mut rl = ResolutionList::new();
    let incomplete = space.resolve(&constraints, &mut solver, &pointer, &mut rl, 0, None);
    assert!(incomplete);
    assert!(rl.is_empty());
}

#[test]
fn timeout_reports_incomplete() {
    let mut space = AddressSpace::new();
    segmented_object(&mut space, 0x1000, 16, 1, 16);
    segmented_object(&mut space, 0x2000, 16, 2, 16);

    let x = il::expr_scalar("x", 8);
    let mut constraints = Constraints::new();
    constraints
        .add(Expression::cmpneq(x.clone(), il::expr_const(0, 8)).unwrap())
        .unwrap();

    let pointer = Pointer::new(x, il::expr_const(0, 16));
    let mut solver = ExhaustiveSolver::new();

    let mut rl = ResolutionList::new();
    let incomplete = space.resolve(
        &constraints,
        &mut solver,
        &pointer,
        &mut rl,
        0,
        Some(Duration::from_nanos(1)),
    );
    assert!(incomplete);
}

#[test]
fn cow_fork_isolation() {
    let mut as1 = AddressSpace::new();
    let mo = MemoryObject::new(0x1000, il::expr_const(4, 64), 0, false);
    let mut os0 = ObjectState::new(4);
    os0.write8(0, 0x11);
    as1.bind_object(mo.clone(), os0);

    let mut as2 = as1.fork();
    assert_ne!(as1.cow_key(), as2.cow_key());

    let shared = as2.find_object(&mo).unwrap();
    let writeable = as2.get_writeable(&mo, &shared);
    writeable.borrow_mut().write8(0, 0x22);

    let in_as1 = as1.find_object(&mo).unwrap();
    let in_as2 = as2.find_object(&mo).unwrap();
    assert_eq!(in_as1.borrow().concrete_store(), &[0x11, 0, 0, 0]);
    assert_eq!(in_as2.borrow().concrete_store(), &[0x22, 0, 0, 0]);
}

//! The per-execution-state mapping of allocations, and the pointer
//! resolvers that run over it.

use log::trace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::il::{self, Expression};
use crate::map::PersistentMap;
use crate::memory::{MemoryObjectRef, ObjectState, ObjectStateRef, Pointer, ShadowMemory};
use crate::solver::{Constraints, Solver};
use crate::{Error, RC};

/// A resolved object together with its state in this address space.
pub type ObjectPair = (MemoryObjectRef, ObjectStateRef);

/// The objects a symbolic pointer may designate.
pub type ResolutionList = Vec<ObjectPair>;

/// Copy-on-write keys are allocated from a process-wide counter and never
/// reused; a retired key never matches a live address space.
static NEXT_COW_KEY: AtomicU64 = AtomicU64::new(1);

fn next_cow_key() -> u64 {
    NEXT_COW_KEY.fetch_add(1, Ordering::Relaxed)
}

fn budget_exceeded(start: Instant, timeout: Option<Duration>) -> bool {
    timeout.map_or(false, |timeout| start.elapsed() > timeout)
}

/// Outcome of testing a single candidate object during multi-resolution.
enum CheckResult {
    /// The pointer must be in this object; enumeration is finished.
    Done,
    /// A solver call failed or the resolution cap was reached.
    Incomplete,
    /// Not definitively this object; keep walking.
    Continue,
}

/// One execution state's view of memory.
///
/// The object map is keyed by concrete base address; the segment map indexes
/// the same objects by their non-zero segment ids. Both maps are persistent,
/// so `fork` is O(1) and object states are shared until a space writes to
/// one, at which point `get_writeable` clones it.
#[derive(Debug)]
pub struct AddressSpace {
    cow_key: u64,
    objects: PersistentMap<u64, ObjectPair>,
    segment_map: PersistentMap<u64, MemoryObjectRef>,
}

impl AddressSpace {
    pub fn new() -> AddressSpace {
        AddressSpace {
            cow_key: next_cow_key(),
            objects: PersistentMap::new(),
            segment_map: PersistentMap::new(),
        }
    }

    /// The copy-on-write key identifying this address space.
    pub fn cow_key(&self) -> u64 {
        self.cow_key
    }

    /// In-order iteration over all bound objects, by base address.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectPair> {
        self.objects.iter().map(|(_, pair)| pair)
    }

    /// In-order iteration over the segment index, by segment id.
    pub fn segments(&self) -> impl Iterator<Item = (&u64, &MemoryObjectRef)> {
        self.segment_map.iter()
    }

    /// Fork this address space.
    ///
    /// Both sides share all objects and states; both sides also receive
    /// fresh copy-on-write keys, so the first write to any shared state on
    /// either side upgrades it to a private copy.
    pub fn fork(&mut self) -> AddressSpace {
        self.cow_key = next_cow_key();
        AddressSpace {
            cow_key: next_cow_key(),
            objects: self.objects.clone(),
            segment_map: self.segment_map.clone(),
        }
    }

    /// Bind a fresh object state to an object in this address space.
    ///
    /// The state must be unowned; it becomes owned by this space.
    pub fn bind_object(&mut self, mo: MemoryObjectRef, mut os: ObjectState) {
        assert_eq!(
            os.copy_on_write_owner(),
            0,
            "object state already has an owner"
        );
        os.set_copy_on_write_owner(self.cow_key);
        let os = RC::new(std::cell::RefCell::new(os));
        if mo.segment() != 0 {
            self.segment_map = self.segment_map.insert(mo.segment(), mo.clone());
        }
        self.objects = self.objects.insert(mo.address(), (mo, os));
    }

    /// Remove an object from this address space only.
    pub fn unbind_object(&mut self, mo: &MemoryObjectRef) {
        if mo.segment() != 0 {
            self.segment_map = self.segment_map.remove(&mo.segment());
        }
        self.objects = self.objects.remove(&mo.address());
    }

    /// Find the state bound to the given object, if any.
    pub fn find_object(&self, mo: &MemoryObjectRef) -> Option<ObjectStateRef> {
        self.objects
            .lookup(&mo.address())
            .filter(|(bound, _)| RC::ptr_eq(bound, mo))
            .map(|(_, os)| os.clone())
    }

    /// Get a state that this address space may mutate in place.
    ///
    /// If the space already owns the state it is returned as-is; otherwise
    /// the state is cloned, the clone takes this space's key, and the
    /// binding is replaced. Read-only states may never be upgraded.
    pub fn get_writeable(&mut self, mo: &MemoryObjectRef, os: &ObjectStateRef) -> ObjectStateRef {
        assert!(
            !os.borrow().is_read_only(),
            "cannot get writeable state for a read-only object"
        );

        if os.borrow().copy_on_write_owner() == self.cow_key {
            return os.clone();
        }

        let mut copy = os.borrow().clone();
        copy.set_copy_on_write_owner(self.cow_key);
        let copy = RC::new(std::cell::RefCell::new(copy));
        self.objects = self.objects.insert(mo.address(), (mo.clone(), copy.clone()));
        copy
    }

    /// Resolve a fully concrete pointer to the at-most-one object containing
    /// it.
    ///
    /// A non-zero segment selects its object directly, with no bounds check:
    /// a segmented offset is relative to the object. A zero segment is an
    /// absolute address, matched against the floor object's concrete extent.
    /// Objects with symbolic size are unreachable through flat addressing.
    pub fn resolve_constant_address(&self, pointer: &Pointer) -> Option<ObjectPair> {
        let segment = pointer
            .segment()
            .as_constant()
            .expect("resolve_constant_address requires a concrete segment")
            .value();

        if segment != 0 {
            let mo = self.segment_map.lookup(&segment)?;
            let pair = self
                .objects
                .lookup(&mo.address())
                .expect("segment map out of sync with object map");
            return Some(pair.clone());
        }

        let address = pointer
            .offset()
            .as_constant()
            .expect("resolve_constant_address requires a concrete address")
            .value();

        let (_, pair) = self.objects.lookup_previous(&address)?;
        let mo = &pair.0;
        let size = mo.concrete_size()?;
        if (size == 0 && address == mo.address()) || address - mo.address() < size {
            Some(pair.clone())
        } else {
            None
        }
    }

    /// Try to commit a possibly-symbolic pointer to exactly one object.
    ///
    /// Returns `Ok(None)` when no object can contain the pointer under the
    /// current constraints. A solver failure propagates as `Err` and leaves
    /// no commitment.
    pub fn resolve_one(
        &self,
        constraints: &Constraints,
        solver: &mut dyn Solver,
        pointer: &Pointer,
    ) -> Result<Option<ObjectPair>, Error> {
        if pointer.is_constant() {
            return Ok(self.resolve_constant_address(pointer));
        }

        let segment = match pointer.segment().as_constant() {
            Some(constant) => constant.clone(),
            None => solver.get_value(constraints, pointer.segment())?,
        };

        if !segment.is_zero() {
            let pointer = Pointer::new(segment.into(), pointer.offset().clone());
            return Ok(self.resolve_constant_address(&pointer));
        }

        // Flat space with a symbolic offset. Sample a witness offset and
        // probe the floor object: for any in-bounds pointer this commits
        // after a single getValue.
        let example = solver.get_value(constraints, pointer.offset())?.value();
        trace!("resolve_one: sampled witness 0x{:x}", example);

        if let Some((_, pair)) = self.objects.lookup_previous(&example) {
            let mo = &pair.0;
            if let Some(size) = mo.concrete_size() {
                if example.wrapping_sub(mo.address()) < size {
                    return Ok(Some(pair.clone()));
                }
            }
        }

        // The witness fell outside every object. Walk outwards from it,
        // backwards first, pruning with the must-cutoffs.
        for (_, pair) in self.objects.iter_back_from(&example) {
            let mo = &pair.0;
            let in_bounds = mo.bounds_check_pointer(pointer)?;
            if solver.may_be_true(constraints, &in_bounds)? {
                trace!("resolve_one: committed to {}", mo);
                return Ok(Some(pair.clone()));
            }
            let at_or_above = Expression::cmpgeu(pointer.offset().clone(), mo.base_expr())?;
            if solver.must_be_true(constraints, &at_or_above)? {
                break;
            }
        }

        for (_, pair) in self.objects.iter_after(&example) {
            let mo = &pair.0;
            let below_base = Expression::cmpltu(pointer.offset().clone(), mo.base_expr())?;
            if solver.must_be_true(constraints, &below_base)? {
                break;
            }
            let in_bounds = mo.bounds_check_pointer(pointer)?;
            if solver.may_be_true(constraints, &in_bounds)? {
                trace!("resolve_one: committed to {}", mo);
                return Ok(Some(pair.clone()));
            }
        }

        Ok(None)
    }

    /// Enumerate the objects the pointer may designate into `rl`.
    ///
    /// `max_resolutions` of 0 means unbounded; `timeout` of `None` means no
    /// wall-clock budget. Returns `true` iff the enumeration is incomplete
    /// (timeout, solver failure or cap hit); the partial list remains valid.
    pub fn resolve(
        &self,
        constraints: &Constraints,
        solver: &mut dyn Solver,
        pointer: &Pointer,
        rl: &mut ResolutionList,
        max_resolutions: usize,
        timeout: Option<Duration>,
    ) -> bool {
        if pointer.segment().as_constant().is_some() {
            return self.resolve_constant_segment(
                constraints,
                solver,
                pointer,
                rl,
                max_resolutions,
                timeout,
            );
        }

        let start = Instant::now();

        // The segment is symbolic. If it may be zero the pointer may refer
        // into the flat space; resolve that case first.
        let is_flat = match Expression::is_zero(pointer.segment().clone()) {
            Ok(expr) => expr,
            Err(_) => return true,
        };
        match solver.may_be_true(constraints, &is_flat) {
            Err(_) => return true,
            Ok(true) => {
                let flat = Pointer::new(
                    il::expr_const(0, pointer.segment().bits()),
                    pointer.offset().clone(),
                );
                if self.resolve_constant_segment(
                    constraints,
                    solver,
                    &flat,
                    rl,
                    max_resolutions,
                    timeout,
                ) {
                    return true;
                }
            }
            Ok(false) => {}
        }

        // Then every segment the pointer may equal. Segmented pointers are
        // presumed intra-object, so no bounds check here.
        for (segment, mo) in self.segment_map.iter() {
            if budget_exceeded(start, timeout) {
                trace!("resolve: timeout during segment enumeration");
                return true;
            }
            let this_segment = match Expression::cmpeq(
                pointer.segment().clone(),
                il::expr_const(*segment, pointer.segment().bits()),
            ) {
                Ok(expr) => expr,
                Err(_) => return true,
            };
            match solver.may_be_true(constraints, &this_segment) {
                Err(_) => return true,
                Ok(true) => {
                    let pair = self
                        .objects
                        .lookup(&mo.address())
                        .expect("segment map out of sync with object map");
                    rl.push(pair.clone());
                }
                Ok(false) => {}
            }
        }

        false
    }

    /// Multi-resolution for a pointer whose segment is concrete.
    fn resolve_constant_segment(
        &self,
        constraints: &Constraints,
        solver: &mut dyn Solver,
        pointer: &Pointer,
        rl: &mut ResolutionList,
        max_resolutions: usize,
        timeout: Option<Duration>,
    ) -> bool {
        let segment = pointer
            .segment()
            .as_constant()
            .expect("resolve_constant_segment requires a concrete segment")
            .value();

        if segment != 0 {
            if let Some(pair) = self.resolve_constant_address(pointer) {
                rl.push(pair);
            }
            return false;
        }

        let start = Instant::now();

        let example = match solver.get_value(constraints, pointer.offset()) {
            Ok(constant) => constant.value(),
            Err(_) => return true,
        };

        // Walk backwards from the witness. The first candidate is the
        // object the pointer should be within, so an in-bounds pointer
        // finishes on the unique-result fast path.
        for (_, pair) in self.objects.iter_back_from(&example) {
            if budget_exceeded(start, timeout) {
                return true;
            }
            match self.check_pointer_in_object(
                constraints,
                solver,
                pointer,
                pair,
                rl,
                max_resolutions,
            ) {
                CheckResult::Done => return false,
                CheckResult::Incomplete => return true,
                CheckResult::Continue => {}
            }
            let at_or_above =
                match Expression::cmpgeu(pointer.offset().clone(), pair.0.base_expr()) {
                    Ok(expr) => expr,
                    Err(_) => return true,
                };
            match solver.must_be_true(constraints, &at_or_above) {
                Err(_) => return true,
                Ok(true) => break,
                Ok(false) => {}
            }
        }

        for (_, pair) in self.objects.iter_after(&example) {
            if budget_exceeded(start, timeout) {
                return true;
            }
            let below_base =
                match Expression::cmpltu(pointer.offset().clone(), pair.0.base_expr()) {
                    Ok(expr) => expr,
                    Err(_) => return true,
                };
            match solver.must_be_true(constraints, &below_base) {
                Err(_) => return true,
                Ok(true) => break,
                Ok(false) => {}
            }
            match self.check_pointer_in_object(
                constraints,
                solver,
                pointer,
                pair,
                rl,
                max_resolutions,
            ) {
                CheckResult::Done => return false,
                CheckResult::Incomplete => return true,
                CheckResult::Continue => {}
            }
        }

        false
    }

    /// Test one candidate object, appending to `rl` on a possible hit.
    ///
    /// A first hit that must be in bounds terminates enumeration early with
    /// a unique result; hitting `max_resolutions` reports the list as
    /// incomplete.
    fn check_pointer_in_object(
        &self,
        constraints: &Constraints,
        solver: &mut dyn Solver,
        pointer: &Pointer,
        pair: &ObjectPair,
        rl: &mut ResolutionList,
        max_resolutions: usize,
    ) -> CheckResult {
        let in_bounds = match pair.0.bounds_check_pointer(pointer) {
            Ok(expr) => expr,
            Err(_) => return CheckResult::Incomplete,
        };
        match solver.may_be_true(constraints, &in_bounds) {
            Err(_) => return CheckResult::Incomplete,
            Ok(false) => return CheckResult::Continue,
            Ok(true) => {}
        }

        trace!("resolve: candidate {}", pair.0);
        rl.push(pair.clone());

        if rl.len() == 1 {
            match solver.must_be_true(constraints, &in_bounds) {
                Err(_) => CheckResult::Incomplete,
                Ok(true) => CheckResult::Done,
                Ok(false) => CheckResult::Continue,
            }
        } else if rl.len() == max_resolutions {
            CheckResult::Incomplete
        } else {
            CheckResult::Continue
        }
    }

    /// Blit the concrete planes of all ordinary writable objects out to the
    /// shadow at their native addresses, ahead of an external call.
    pub fn copy_out_concretes(&self, shadow: &mut ShadowMemory) {
        for (_, (mo, os)) in self.objects.iter() {
            if mo.is_user_specified() {
                continue;
            }
            let os = os.borrow();
            if !os.is_read_only() {
                shadow.write(mo.address(), os.concrete_store());
            }
        }
    }

    /// Read the shadow back after an external call, upgrading any object
    /// whose native bytes diverged. Returns `false` if a read-only object
    /// diverged, which the caller must treat as a failed external call.
    pub fn copy_in_concretes(&mut self, shadow: &ShadowMemory) -> bool {
        let pairs: Vec<ObjectPair> = self
            .objects
            .iter()
            .map(|(_, pair)| pair.clone())
            .collect();

        for (mo, os) in pairs {
            if mo.is_user_specified() {
                continue;
            }
            if !self.copy_in_concrete(&mo, &os, shadow) {
                return false;
            }
        }
        true
    }

    fn copy_in_concrete(
        &mut self,
        mo: &MemoryObjectRef,
        os: &ObjectStateRef,
        shadow: &ShadowMemory,
    ) -> bool {
        let diverged = {
            let state = os.borrow();
            let native = shadow.read(mo.address(), state.size());
            if native.as_slice() == state.concrete_store() {
                None
            } else if state.is_read_only() {
                return false;
            } else {
                Some(native)
            }
        };

        if let Some(native) = diverged {
            let wos = self.get_writeable(mo, os);
            wos.borrow_mut().overwrite_concrete_store(&native);
        }
        true
    }
}

impl Default for AddressSpace {
    fn default() -> AddressSpace {
        AddressSpace::new()
    }
}

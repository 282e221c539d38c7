//! Deterministic bucket allocation inside shared randomization namespaces.
//!
//! Each namespace owns a family of isolation groups, numbered by `instance`.
//! A group is a fixed-size pool (default 10 000 buckets); the ranges inside it
//! never overlap, so experiments sharing a namespace cannot double-sample the
//! same users. When no group has room for a request, a fresh instance is
//! opened — deliberately naive: no packing across instances, no compaction,
//! no merging, because moving a live range re-buckets enrolled users.
//!
//! Allocation is a read-then-write over aggregate state and is therefore not
//! safe under interleaving; the whole replace/choose/insert sequence runs
//! inside one mutual-exclusion scope.

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::namespace::{Namespace, RandomizationUnit};

/// Default pool size of one isolation-group instance.
pub const DEFAULT_BUCKET_TOTAL: u32 = 10_000;

/// Caller-side rounding rule: `round(total * population_percent / 100)`.
///
/// Provided next to the allocator for convenience, but never applied inside
/// [`BucketStore::allocate`] — the engine takes the count precomputed.
pub fn bucket_count(total: u32, population_percent: f64) -> u32 {
    (f64::from(total) * population_percent / 100.0).round() as u32
}

/// A contiguous bucket range handed to one experiment or rollout.
///
/// Serializes in the camelCase shape the recipe's `bucketConfig` filter
/// expects; the numeric fields round-trip exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRange {
    pub namespace: Namespace,
    pub instance: u32,
    pub randomization_unit: RandomizationUnit,
    pub start: u32,
    pub count: u32,
    pub total: u32,
}

impl BucketRange {
    /// Inclusive end bucket (`start` when the range is empty).
    pub fn end(&self) -> u32 {
        self.start + self.count.saturating_sub(1)
    }
}

/// Snapshot of one isolation-group instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationGroup {
    pub name: Namespace,
    pub instance: u32,
    pub total: u32,
    pub randomization_unit: RandomizationUnit,
}

struct OwnedRange {
    owner: String,
    start: u32,
    count: u32,
}

struct GroupState {
    instance: u32,
    total: u32,
    randomization_unit: RandomizationUnit,
    ranges: Vec<OwnedRange>,
}

impl GroupState {
    /// First bucket past the highest occupied offset.
    ///
    /// A replace can leave a hole below a surviving neighbour; allocating past
    /// the highest offset (rather than at the sum of counts) keeps the
    /// non-overlap invariant even then, at the cost of not reusing the hole.
    fn next_start(&self) -> u32 {
        self.ranges.iter().map(|r| r.start + r.count).max().unwrap_or(0)
    }

    fn has_room(&self, count: u32) -> bool {
        self.total.saturating_sub(self.next_start()) >= count
    }
}

/// The isolation-group / bucket-range state machine.
///
/// Groups and ranges live only as long as the experiments that requested
/// them: re-allocation replaces the owner's previous range, and a group whose
/// last range disappears is deleted with it.
pub struct BucketStore {
    state: Mutex<BTreeMap<Namespace, Vec<GroupState>>>,
}

impl BucketStore {
    pub fn new() -> BucketStore {
        BucketStore { state: Mutex::new(BTreeMap::new()) }
    }

    /// Allocate `count` buckets for `owner` inside `namespace`.
    ///
    /// Replace semantics: the owner's previous range in this namespace is
    /// deleted first (and its group too, if emptied), so re-running allocation
    /// never leaves stale ranges behind. The lowest-instance group with room
    /// receives the new range; with no room anywhere, a fresh instance is
    /// opened at `max existing instance + 1` and the range starts at 0.
    ///
    /// # Panics
    ///
    /// `count > total` is a programmer error — population percent must be
    /// clamped to the pool upstream — and panics rather than degrading.
    pub fn allocate(
        &self,
        namespace: &Namespace,
        randomization_unit: RandomizationUnit,
        owner: &str,
        count: u32,
        total: u32,
    ) -> BucketRange {
        assert!(count <= total, "bucket count {count} exceeds pool total {total}; clamp population upstream");

        let mut state = self.lock();
        let groups = state.entry(namespace.clone()).or_default();

        Self::remove_owner(groups, namespace, owner);

        let chosen = match groups.iter().position(|g| g.has_room(count)) {
            Some(idx) => idx,
            None => {
                let instance = groups.iter().map(|g| g.instance).max().unwrap_or(0) + 1;
                debug!("opening isolation group {namespace} instance {instance} (total {total})");
                groups.push(GroupState { instance, total, randomization_unit, ranges: Vec::new() });
                groups.len() - 1
            }
        };

        let group = &mut groups[chosen];
        let start = group.next_start();
        group.ranges.push(OwnedRange { owner: owner.to_string(), start, count });
        debug!(
            "allocated buckets {start}..{} of {namespace} instance {} to {owner}",
            start + count,
            group.instance
        );

        BucketRange {
            namespace: namespace.clone(),
            instance: group.instance,
            randomization_unit: group.randomization_unit,
            start,
            count,
            total: group.total,
        }
    }

    /// Delete the owner's range in this namespace, and its group if emptied.
    /// Idempotent; used when an experiment ends without re-allocating.
    pub fn release(&self, namespace: &Namespace, owner: &str) {
        let mut state = self.lock();
        if let Some(groups) = state.get_mut(namespace) {
            Self::remove_owner(groups, namespace, owner);
            if groups.is_empty() {
                state.remove(namespace);
            }
        }
    }

    /// Live ranges in this namespace, ordered by `(instance, start)`.
    pub fn bucket_ranges(&self, namespace: &Namespace) -> Vec<BucketRange> {
        let state = self.lock();
        let mut ranges: Vec<BucketRange> = state
            .get(namespace)
            .into_iter()
            .flatten()
            .flat_map(|group| {
                group.ranges.iter().map(|r| BucketRange {
                    namespace: namespace.clone(),
                    instance: group.instance,
                    randomization_unit: group.randomization_unit,
                    start: r.start,
                    count: r.count,
                    total: group.total,
                })
            })
            .collect();
        ranges.sort_by_key(|r| (r.instance, r.start));
        ranges
    }

    /// Live isolation-group instances for this namespace, lowest first.
    pub fn isolation_groups(&self, namespace: &Namespace) -> Vec<IsolationGroup> {
        let state = self.lock();
        state
            .get(namespace)
            .into_iter()
            .flatten()
            .map(|group| IsolationGroup {
                name: namespace.clone(),
                instance: group.instance,
                total: group.total,
                randomization_unit: group.randomization_unit,
            })
            .collect()
    }

    fn remove_owner(groups: &mut Vec<GroupState>, namespace: &Namespace, owner: &str) {
        for group in groups.iter_mut() {
            let before = group.ranges.len();
            group.ranges.retain(|r| r.owner != owner);
            if group.ranges.len() < before {
                debug!("released buckets of {owner} in {namespace} instance {}", group.instance);
            }
        }
        // A group whose last range disappeared goes with it.
        groups.retain(|g| !g.ranges.is_empty());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Namespace, Vec<GroupState>>> {
        // The guarded state is plain data; a poisoned lock still holds a
        // consistent map, so recover it instead of propagating the panic.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BucketStore {
    fn default() -> BucketStore {
        BucketStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(key: &str) -> Namespace {
        Namespace::from(key)
    }

    fn unit() -> RandomizationUnit {
        RandomizationUnit::NormandyId
    }

    /// No two live ranges in any single group overlap, and none spill past
    /// the pool.
    fn assert_no_overlap(store: &BucketStore, namespace: &Namespace) {
        let ranges = store.bucket_ranges(namespace);
        for (i, a) in ranges.iter().enumerate() {
            assert!(a.start + a.count <= a.total, "range {a:?} spills past its pool");
            for b in ranges.iter().skip(i + 1) {
                if a.instance != b.instance || a.count == 0 || b.count == 0 {
                    continue;
                }
                let disjoint = a.end() < b.start || b.end() < a.start;
                assert!(disjoint, "ranges overlap: {a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn first_allocation_starts_a_fresh_instance_at_zero() {
        let store = BucketStore::new();
        let range = store.allocate(&ns("ns"), unit(), "exp-a", 5000, DEFAULT_BUCKET_TOTAL);

        assert_eq!(range.instance, 1);
        assert_eq!(range.start, 0);
        assert_eq!(range.count, 5000);
        assert_eq!(range.end(), 4999);
        assert_eq!(range.total, DEFAULT_BUCKET_TOTAL);
    }

    #[test]
    fn exceeding_the_remaining_room_opens_the_next_instance() {
        // 5000 already consumed, so a 6000 request cannot fit in instance 1.
        let store = BucketStore::new();
        store.allocate(&ns("ns"), unit(), "exp-a", 5000, DEFAULT_BUCKET_TOTAL);
        let second = store.allocate(&ns("ns"), unit(), "exp-b", 6000, DEFAULT_BUCKET_TOTAL);

        assert_eq!(second.instance, 2);
        assert_eq!(second.start, 0);
        assert_eq!(second.count, 6000);
        assert_no_overlap(&store, &ns("ns"));

        let groups = store.isolation_groups(&ns("ns"));
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0].instance, groups[1].instance), (1, 2));
    }

    #[test]
    fn allocations_in_the_same_instance_are_contiguous() {
        let store = BucketStore::new();
        let a = store.allocate(&ns("ns"), unit(), "exp-a", 2000, DEFAULT_BUCKET_TOTAL);
        let b = store.allocate(&ns("ns"), unit(), "exp-b", 3000, DEFAULT_BUCKET_TOTAL);

        assert_eq!((a.instance, a.start), (1, 0));
        assert_eq!((b.instance, b.start), (1, 2000));
        assert_no_overlap(&store, &ns("ns"));
    }

    #[test]
    fn lowest_instance_with_room_wins() {
        let store = BucketStore::new();
        store.allocate(&ns("ns"), unit(), "exp-a", 9000, DEFAULT_BUCKET_TOTAL);
        let overflow = store.allocate(&ns("ns"), unit(), "exp-b", 5000, DEFAULT_BUCKET_TOTAL);
        assert_eq!(overflow.instance, 2);

        // 1000 buckets are still free in instance 1; a small request goes
        // there, not to the newest instance.
        let small = store.allocate(&ns("ns"), unit(), "exp-c", 500, DEFAULT_BUCKET_TOTAL);
        assert_eq!((small.instance, small.start), (1, 9000));
        assert_no_overlap(&store, &ns("ns"));
    }

    #[test]
    fn reallocation_replaces_the_previous_range() {
        let store = BucketStore::new();
        store.allocate(&ns("ns"), unit(), "exp-a", 1000, DEFAULT_BUCKET_TOTAL);
        store.allocate(&ns("ns"), unit(), "exp-b", 2000, DEFAULT_BUCKET_TOTAL);

        // Population edit: exp-b goes from 2000 to 500 buckets.
        let replaced = store.allocate(&ns("ns"), unit(), "exp-b", 500, DEFAULT_BUCKET_TOTAL);
        assert_eq!(replaced.start, 1000);

        let ranges = store.bucket_ranges(&ns("ns"));
        assert_eq!(ranges.len(), 2, "stale range must not survive: {ranges:?}");
        assert_no_overlap(&store, &ns("ns"));
    }

    #[test]
    fn emptied_groups_are_deleted() {
        let store = BucketStore::new();
        store.allocate(&ns("ns"), unit(), "exp-a", 9000, DEFAULT_BUCKET_TOTAL);
        store.allocate(&ns("ns"), unit(), "exp-b", 5000, DEFAULT_BUCKET_TOTAL);
        assert_eq!(store.isolation_groups(&ns("ns")).len(), 2);

        // exp-b was alone in instance 2; shrinking it to fit instance 1
        // leaves that group empty, so it disappears.
        let moved = store.allocate(&ns("ns"), unit(), "exp-b", 1000, DEFAULT_BUCKET_TOTAL);
        assert_eq!((moved.instance, moved.start), (1, 9000));

        let groups = store.isolation_groups(&ns("ns"));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].instance, 1);
    }

    #[test]
    fn a_replace_never_overlaps_a_surviving_neighbour() {
        let store = BucketStore::new();
        store.allocate(&ns("ns"), unit(), "exp-a", 5000, DEFAULT_BUCKET_TOTAL);
        store.allocate(&ns("ns"), unit(), "exp-b", 3000, DEFAULT_BUCKET_TOTAL);

        // exp-a's hole (0..5000) is below exp-b; a grown request must not be
        // placed over exp-b, even though the freed space would nominally fit.
        store.allocate(&ns("ns"), unit(), "exp-a", 4000, DEFAULT_BUCKET_TOTAL);
        assert_no_overlap(&store, &ns("ns"));
    }

    #[test]
    fn release_deletes_range_group_and_empty_namespace() {
        let store = BucketStore::new();
        store.allocate(&ns("ns"), unit(), "exp-a", 1000, DEFAULT_BUCKET_TOTAL);
        store.allocate(&ns("ns"), unit(), "exp-b", 1000, DEFAULT_BUCKET_TOTAL);

        store.release(&ns("ns"), "exp-a");
        assert_eq!(store.bucket_ranges(&ns("ns")).len(), 1);

        store.release(&ns("ns"), "exp-b");
        assert!(store.bucket_ranges(&ns("ns")).is_empty());
        assert!(store.isolation_groups(&ns("ns")).is_empty());

        // Idempotent on an absent owner.
        store.release(&ns("ns"), "exp-b");
    }

    #[test]
    fn namespaces_do_not_share_pools() {
        let store = BucketStore::new();
        store.allocate(&ns("alpha"), unit(), "exp-a", 10_000, DEFAULT_BUCKET_TOTAL);
        let other = store.allocate(&ns("beta"), unit(), "exp-b", 10_000, DEFAULT_BUCKET_TOTAL);

        assert_eq!((other.instance, other.start), (1, 0));
    }

    #[test]
    fn a_full_pool_request_fits_exactly_once() {
        let store = BucketStore::new();
        let full = store.allocate(&ns("ns"), unit(), "exp-a", DEFAULT_BUCKET_TOTAL, DEFAULT_BUCKET_TOTAL);
        assert_eq!((full.instance, full.start, full.end()), (1, 0, 9999));

        let next = store.allocate(&ns("ns"), unit(), "exp-b", 1, DEFAULT_BUCKET_TOTAL);
        assert_eq!((next.instance, next.start), (2, 0));
    }

    #[test]
    #[should_panic(expected = "exceeds pool total")]
    fn count_beyond_the_pool_is_a_programmer_error() {
        let store = BucketStore::new();
        store.allocate(&ns("ns"), unit(), "exp-a", 10_001, DEFAULT_BUCKET_TOTAL);
    }

    #[test]
    fn bucket_count_applies_the_caller_side_rounding_rule() {
        assert_eq!(bucket_count(10_000, 50.0), 5000);
        assert_eq!(bucket_count(10_000, 100.0), 10_000);
        assert_eq!(bucket_count(10_000, 0.0), 0);
        assert_eq!(bucket_count(10_000, 33.333), 3333);
        assert_eq!(bucket_count(10_000, 1.27), 127);
    }

    #[test]
    fn bucket_range_round_trips_through_the_recipe_shape() {
        let store = BucketStore::new();
        let range =
            store.allocate(&ns("group_id-firefox-desktop-feature-release-group_id"), RandomizationUnit::GroupId, "exp-a", 2500, DEFAULT_BUCKET_TOTAL);

        let value = serde_json::to_value(&range).unwrap();
        assert_eq!(value["namespace"], "group_id-firefox-desktop-feature-release-group_id");
        assert_eq!(value["randomizationUnit"], "group_id");
        assert_eq!(value["start"], 0);
        assert_eq!(value["count"], 2500);
        assert_eq!(value["total"], 10_000);

        let back: BucketRange = serde_json::from_value(value).unwrap();
        assert_eq!(back, range);
    }
}

//! Three-way diff between a source and a destination listing
//!
//! The plan is derived fresh on every pass from the two listings, never
//! cached, so a pass always reconciles against live state.

use std::collections::BTreeMap;

/// What one sync pass will do, split by verb
#[derive(Debug, Clone)]
pub struct SyncPlan<T> {
    /// In source but not destination, in source listing order
    pub create: Vec<T>,

    /// In both, as (source, destination) pairs, in source listing order
    pub update: Vec<(T, T)>,

    /// In destination but not source, in name order
    pub delete: Vec<T>,
}

impl<T> SyncPlan<T> {
    /// Total number of planned operations
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `source` and `destination` by name
///
/// Objects for which `name_of` returns `None` are dropped; they cannot be
/// addressed by any verb.
pub fn plan_by_name<T>(
    source: Vec<T>,
    destination: Vec<T>,
    name_of: impl Fn(&T) -> Option<String>,
) -> SyncPlan<T> {
    let mut remaining: BTreeMap<String, T> = destination
        .into_iter()
        .filter_map(|obj| name_of(&obj).map(|name| (name, obj)))
        .collect();

    let mut create = Vec::new();
    let mut update = Vec::new();

    for obj in source {
        let Some(name) = name_of(&obj) else {
            continue;
        };
        match remaining.remove(&name) {
            Some(existing) => update.push((obj, existing)),
            None => create.push(obj),
        }
    }

    SyncPlan {
        create,
        update,
        // BTreeMap iteration keeps deletes in name order
        delete: remaining.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Option<String> {
        Some(name.to_string())
    }

    fn name_of(item: &(Option<String>, u32)) -> Option<String> {
        item.0.clone()
    }

    #[test]
    fn test_plan_partitions_by_name() {
        let source = vec![(named("a"), 1), (named("b"), 1)];
        let destination = vec![(named("b"), 2), (named("c"), 2)];

        let plan = plan_by_name(source, destination, name_of);

        assert_eq!(plan.create, vec![(named("a"), 1)]);
        assert_eq!(plan.update, vec![((named("b"), 1), (named("b"), 2))]);
        assert_eq!(plan.delete, vec![(named("c"), 2)]);
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_plan_disjoint_sets() {
        let source = vec![(named("a"), 1)];
        let destination = vec![(named("b"), 2)];

        let plan = plan_by_name(source, destination, name_of);

        assert_eq!(plan.create.len(), 1);
        assert!(plan.update.is_empty());
        assert_eq!(plan.delete.len(), 1);
    }

    #[test]
    fn test_plan_identical_sets_all_updates() {
        let source = vec![(named("a"), 1), (named("b"), 1)];
        let destination = vec![(named("a"), 2), (named("b"), 2)];

        let plan = plan_by_name(source, destination, name_of);

        assert!(plan.create.is_empty());
        assert_eq!(plan.update.len(), 2);
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_plan_empty_source_deletes_everything() {
        let destination = vec![(named("b"), 2), (named("a"), 2)];

        let plan = plan_by_name(Vec::new(), destination, name_of);

        assert!(plan.create.is_empty());
        assert!(plan.update.is_empty());
        // name order, not listing order
        assert_eq!(plan.delete, vec![(named("a"), 2), (named("b"), 2)]);
    }

    #[test]
    fn test_plan_drops_nameless_items() {
        let source = vec![(None, 1), (named("a"), 1)];
        let destination = vec![(None, 2)];

        let plan = plan_by_name(source, destination, name_of);

        assert_eq!(plan.create, vec![(named("a"), 1)]);
        assert!(plan.update.is_empty());
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_plan_empty_both() {
        let plan: SyncPlan<(Option<String>, u32)> =
            plan_by_name(Vec::new(), Vec::new(), name_of);
        assert!(plan.is_empty());
    }
}

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::models::DevoteeId;

/// Supervisor link per devotee: `None` means the devotee reports to nobody
/// inside the devotee-indexed hierarchy (top of their tree).
pub type SupervisorMap = HashMap<DevoteeId, Option<DevoteeId>>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleCheck {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CycleCheck {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    fn invalid(message: String) -> Self {
        Self {
            is_valid: false,
            message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubordinateTransferCheck {
    pub needs_transfer: bool,
    pub subordinate_count: u64,
}

/// Would pointing `candidate` at `proposed_supervisor` create a reporting
/// loop? Walks the supervisor links upward from the proposed supervisor with
/// a visited set, so malformed stored cycles terminate instead of spinning.
pub fn would_create_cycle(
    candidate: DevoteeId,
    proposed_supervisor: DevoteeId,
    supervisors: &SupervisorMap,
) -> CycleCheck {
    if candidate == proposed_supervisor {
        return CycleCheck::invalid(format!(
            "Devotee {candidate} cannot report to themselves"
        ));
    }

    let mut visited = HashSet::new();
    let mut current = proposed_supervisor;
    loop {
        if current == candidate {
            return CycleCheck::invalid(format!(
                "Assigning {proposed_supervisor} as supervisor of {candidate} would create \
                 a circular reporting chain"
            ));
        }
        if !visited.insert(current) {
            // Pre-existing cycle in stored data. Not this assignment's fault;
            // stop the walk instead of looping forever.
            return CycleCheck::valid();
        }
        match supervisors.get(&current) {
            Some(Some(next)) => current = *next,
            _ => return CycleCheck::valid(),
        }
    }
}

/// Ancestors of `start`, nearest first, excluding `start` itself. Terminates
/// on a missing link or when an id repeats.
pub fn reporting_chain(start: DevoteeId, supervisors: &SupervisorMap) -> Vec<DevoteeId> {
    let mut chain = Vec::new();
    let mut visited = HashSet::from([start]);
    let mut current = start;
    while let Some(Some(next)) = supervisors.get(&current) {
        if !visited.insert(*next) {
            break;
        }
        chain.push(*next);
        current = *next;
    }
    chain
}

/// Devotees whose supervisor link points at `of`, ordered by id.
pub fn direct_subordinates(of: DevoteeId, supervisors: &SupervisorMap) -> Vec<DevoteeId> {
    let mut subordinates: Vec<DevoteeId> = supervisors
        .iter()
        .filter_map(|(id, supervisor)| {
            if *supervisor == Some(of) { Some(*id) } else { None }
        })
        .collect();
    subordinates.sort_by_key(|id| id.0);
    subordinates
}

/// Every devotee below `of`, breadth-first, excluding `of`. Safe against
/// malformed stored cycles.
pub fn subordinate_closure(of: DevoteeId, supervisors: &SupervisorMap) -> Vec<DevoteeId> {
    let mut children: HashMap<DevoteeId, Vec<DevoteeId>> = HashMap::new();
    for (id, supervisor) in supervisors {
        if let Some(supervisor) = supervisor {
            children.entry(*supervisor).or_default().push(*id);
        }
    }
    for child_ids in children.values_mut() {
        child_ids.sort_by_key(|id| id.0);
    }

    let mut closure = Vec::new();
    let mut visited = HashSet::from([of]);
    let mut queue = VecDeque::from([of]);
    while let Some(current) = queue.pop_front() {
        if let Some(child_ids) = children.get(&current) {
            for child in child_ids {
                if visited.insert(*child) {
                    closure.push(*child);
                    queue.push_back(*child);
                }
            }
        }
    }
    closure
}

pub fn subordinate_transfer_check(
    of: DevoteeId,
    supervisors: &SupervisorMap,
) -> SubordinateTransferCheck {
    let count = direct_subordinates(of, supervisors).len() as u64;
    SubordinateTransferCheck {
        needs_transfer: count > 0,
        subordinate_count: count,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn id(n: u128) -> DevoteeId {
        DevoteeId(Uuid::from_u128(n))
    }

    fn chain_map(links: &[(DevoteeId, Option<DevoteeId>)]) -> SupervisorMap {
        links.iter().copied().collect()
    }

    #[test]
    fn self_reporting_is_rejected() {
        let a = id(1);
        let check = would_create_cycle(a, a, &SupervisorMap::new());
        assert!(!check.is_valid);
        assert!(
            check
                .message
                .expect("self-report should carry a message")
                .contains("themselves")
        );
    }

    #[test]
    fn ancestor_candidate_is_rejected() {
        // c -> b -> a; proposing a to report under a descendant's subtree head.
        let (a, b, c) = (id(1), id(2), id(3));
        let map = chain_map(&[(a, None), (b, Some(a)), (c, Some(b))]);

        let check = would_create_cycle(a, c, &map);
        assert!(!check.is_valid);
        assert!(
            check
                .message
                .expect("cycle should carry a message")
                .contains("circular reporting")
        );
    }

    #[test]
    fn disjoint_trees_are_accepted() {
        let (a, b, c, d) = (id(1), id(2), id(3), id(4));
        let map = chain_map(&[(a, None), (b, Some(a)), (c, None), (d, Some(c))]);
        assert!(would_create_cycle(b, d, &map).is_valid);
    }

    #[test]
    fn candidate_appears_iff_in_upward_chain() {
        let (a, b, c, d) = (id(1), id(2), id(3), id(4));
        let map = chain_map(&[(a, None), (b, Some(a)), (c, Some(b)), (d, Some(b))]);

        // a and b are ancestors of c; d is not.
        assert!(!would_create_cycle(a, c, &map).is_valid);
        assert!(!would_create_cycle(b, c, &map).is_valid);
        assert!(would_create_cycle(d, c, &map).is_valid);
    }

    #[test]
    fn malformed_stored_cycle_terminates_as_valid() {
        // a <-> b already corrupt; an unrelated candidate must not hang.
        let (a, b, outsider) = (id(1), id(2), id(3));
        let map = chain_map(&[(a, Some(b)), (b, Some(a)), (outsider, None)]);

        let check = would_create_cycle(outsider, a, &map);
        assert!(check.is_valid);
    }

    #[test]
    fn reporting_chain_walks_nearest_first() {
        let (a, b, c) = (id(1), id(2), id(3));
        let map = chain_map(&[(a, None), (b, Some(a)), (c, Some(b))]);
        assert_eq!(reporting_chain(c, &map), vec![b, a]);
        assert!(reporting_chain(a, &map).is_empty());
    }

    #[test]
    fn reporting_chain_survives_stored_cycle() {
        let (a, b) = (id(1), id(2));
        let map = chain_map(&[(a, Some(b)), (b, Some(a))]);
        assert_eq!(reporting_chain(a, &map), vec![b]);
    }

    #[test]
    fn closure_collects_all_descendants() {
        let (a, b, c, d, e) = (id(1), id(2), id(3), id(4), id(5));
        let map = chain_map(&[
            (a, None),
            (b, Some(a)),
            (c, Some(a)),
            (d, Some(b)),
            (e, None),
        ]);

        assert_eq!(subordinate_closure(a, &map), vec![b, c, d]);
        assert_eq!(direct_subordinates(a, &map), vec![b, c]);
        assert!(subordinate_closure(e, &map).is_empty());
    }

    #[test]
    fn transfer_check_reflects_repointing() {
        let (x, y, s1, s2) = (id(1), id(2), id(3), id(4));
        let mut map = chain_map(&[(x, None), (y, None), (s1, Some(x)), (s2, Some(x))]);

        let before = subordinate_transfer_check(x, &map);
        assert!(before.needs_transfer);
        assert_eq!(before.subordinate_count, 2);
        assert!(!subordinate_transfer_check(y, &map).needs_transfer);

        map.insert(s1, Some(y));
        map.insert(s2, Some(y));

        let after_x = subordinate_transfer_check(x, &map);
        assert!(!after_x.needs_transfer);
        assert_eq!(after_x.subordinate_count, 0);
        let after_y = subordinate_transfer_check(y, &map);
        assert!(after_y.needs_transfer);
        assert_eq!(after_y.subordinate_count, 2);
    }
}

use std::collections::{HashSet, VecDeque};

use crate::types::{Employee, SubordinateRef};

/// Breadth-first walk over an employee's reporting hierarchy.
///
/// The walk owns the work queue and the set of already-counted identifiers;
/// it yields identifiers that still need resolving against the record store
/// and the caller feeds resolved records back via [`ReportWalk::admit`]. A
/// reference the store cannot resolve is simply dropped, which keeps the
/// count a best-effort view of partially inconsistent hierarchy data.
///
/// Each identifier is admitted at most once, so diamond-shaped or cyclic
/// reporting graphs terminate and contribute a single count per employee.
#[derive(Debug)]
pub struct ReportWalk {
    pending: VecDeque<SubordinateRef>,
    counted: HashSet<String>,
    count: u64,
}

impl ReportWalk {
    /// Seeds the walk with the employee's direct subordinate references.
    pub fn new(root: &Employee) -> Self {
        Self {
            pending: root.direct_reports.iter().cloned().collect(),
            counted: HashSet::new(),
            count: 0,
        }
    }

    /// Returns the next identifier that needs resolving.
    ///
    /// References without an identifier and identifiers that were already
    /// counted are skipped without affecting the count. `None` means the
    /// walk is complete.
    pub fn next_unresolved(&mut self) -> Option<String> {
        while let Some(reference) = self.pending.pop_front() {
            let id = reference.id();
            if id.is_empty() || self.counted.contains(id) {
                continue;
            }
            return Some(id.to_string());
        }
        None
    }

    /// Records a resolved subordinate and queues its own direct reports,
    /// which may themselves be stubs, for further expansion.
    pub fn admit(&mut self, employee: &Employee) {
        if !self.counted.insert(employee.id.clone()) {
            return;
        }
        self.count += 1;
        self.pending.extend(employee.direct_reports.iter().cloned());
    }

    /// Number of distinct subordinates admitted so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}

//! Exact in-process [`LpTasks`] for tests.
//!
//! Answers every task by exhaustive search (augmenting-path matching for
//! feasibility, branch and bound for rank sums), so it is only suitable for
//! small specs. Every call is logged, and calls can be scripted to time out.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use allot_core::{AllocationSpec, AllotError, AllotResult, FamilyId, TimeoutSource, UnitId};
use allot_glpk::{DistributionMode, LpTasks, TaskContext, TaskData, TaskKind, TaskResult};

/// One recorded task call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub task: TaskKind,
    pub floor: Option<u32>,
    pub families: usize,
    pub units: usize,
}

type TimeoutRule = Box<dyn Fn(&Call) -> bool>;

#[derive(Default)]
pub struct ExactTasks {
    calls: RefCell<Vec<Call>>,
    timeout_when: Option<TimeoutRule>,
}

impl ExactTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call matching `rule` fail with a solver timeout.
    pub fn timing_out_when(rule: impl Fn(&Call) -> bool + 'static) -> Self {
        Self {
            calls: RefCell::default(),
            timeout_when: Some(Box::new(rule)),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, task: TaskKind) -> usize {
        self.calls.borrow().iter().filter(|c| c.task == task).count()
    }

    fn enter(&self, task: TaskKind, floor: Option<u32>, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<()> {
        let call = Call {
            task,
            floor,
            families: spec.family_count(),
            units: spec.unit_count(),
        };
        let timed_out = self.timeout_when.as_ref().is_some_and(|rule| rule(&call));
        self.calls.borrow_mut().push(call);
        if timed_out {
            return Err(AllotError::Timeout {
                kind: TimeoutSource::Solver,
                elapsed_ms: ctx.timeout_secs * 1000,
                output: "TIME LIMIT EXCEEDED; SEARCH TERMINATED".to_string(),
            });
        }
        Ok(())
    }
}

impl LpTasks for ExactTasks {
    fn min_satisfaction(&self, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<TaskResult> {
        let kind = TaskKind::MinSatisfaction;
        self.enter(kind, None, spec, ctx)?;
        let s = smallest_cap(spec).ok_or_else(|| AllotError::infeasible(kind, "no complete assignment"))?;
        Ok(TaskResult::new(kind, TaskData::MinSatisfaction { min_satisfaction: s }))
    }

    fn unit_distribution(
        &self,
        spec: &AllocationSpec,
        floor: Option<u32>,
        mode: DistributionMode,
        ctx: TaskContext<'_>,
    ) -> AllotResult<TaskResult> {
        let kind = TaskKind::UnitDistribution;
        self.enter(kind, floor, spec, ctx)?;
        let cap = floor.unwrap_or(spec.max_rank());
        let distribution = match mode {
            DistributionMode::Feasibility => matching(spec, cap),
            DistributionMode::MinimizeRankSum => min_rank_sum(spec, cap),
        }
        .ok_or_else(|| AllotError::infeasible(kind, format!("no assignment within rank {cap}")))?;
        Ok(TaskResult::new(kind, TaskData::Distribution { distribution }))
    }

    fn worst_units_pruning(&self, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<TaskResult> {
        let kind = TaskKind::WorstUnitsPruning;
        self.enter(kind, None, spec, ctx)?;
        let cap = smallest_cap(spec).ok_or_else(|| AllotError::infeasible(kind, "no complete assignment"))?;
        let assignment =
            min_rank_sum(spec, cap).ok_or_else(|| AllotError::infeasible(kind, "no complete assignment"))?;
        let used: BTreeSet<UnitId> = assignment.values().copied().collect();
        let dropped = spec.units().difference(&used).copied().collect();
        Ok(TaskResult::new(kind, TaskData::Pruning { dropped }))
    }
}

/// Smallest rank cap under which every family can be served.
pub fn smallest_cap(spec: &AllocationSpec) -> Option<u32> {
    if spec.family_count() == 0 {
        return Some(0);
    }
    (1..=spec.max_rank()).find(|cap| matching(spec, *cap).is_some())
}

/// Any complete assignment using only units ranked at most `cap`.
pub fn matching(spec: &AllocationSpec, cap: u32) -> Option<BTreeMap<FamilyId, UnitId>> {
    let mut owner: BTreeMap<UnitId, FamilyId> = BTreeMap::new();
    for family in spec.families().keys() {
        let mut seen = BTreeSet::new();
        if !augment(spec, *family, cap, &mut seen, &mut owner) {
            return None;
        }
    }
    Some(owner.into_iter().map(|(u, f)| (f, u)).collect())
}

fn augment(
    spec: &AllocationSpec,
    family: FamilyId,
    cap: u32,
    seen: &mut BTreeSet<UnitId>,
    owner: &mut BTreeMap<UnitId, FamilyId>,
) -> bool {
    let prefs = spec.preferences(family).unwrap_or_default();
    for unit in prefs.iter().take(cap as usize) {
        if !seen.insert(*unit) {
            continue;
        }
        let free = match owner.get(unit).copied() {
            None => true,
            Some(other) => augment(spec, other, cap, seen, owner),
        };
        if free {
            owner.insert(*unit, family);
            return true;
        }
    }
    false
}

/// Complete assignment within `cap` minimizing the total rank.
pub fn min_rank_sum(spec: &AllocationSpec, cap: u32) -> Option<BTreeMap<FamilyId, UnitId>> {
    let families: Vec<FamilyId> = spec.families().keys().copied().collect();
    let mut search = Search {
        spec,
        cap,
        families: &families,
        used: BTreeSet::new(),
        current: Vec::new(),
        best: None,
    };
    search.descend(0, 0);
    search
        .best
        .map(|(_, pairs)| pairs.into_iter().collect())
}

struct Search<'a> {
    spec: &'a AllocationSpec,
    cap: u32,
    families: &'a [FamilyId],
    used: BTreeSet<UnitId>,
    current: Vec<(FamilyId, UnitId)>,
    best: Option<(u32, Vec<(FamilyId, UnitId)>)>,
}

impl Search<'_> {
    fn descend(&mut self, idx: usize, sum: u32) {
        if self.best.as_ref().is_some_and(|(best, _)| sum >= *best) {
            return;
        }
        let Some(family) = self.families.get(idx).copied() else {
            self.best = Some((sum, self.current.clone()));
            return;
        };
        let prefs = self.spec.preferences(family).unwrap_or_default();
        for (pos, unit) in prefs.iter().enumerate().take(self.cap as usize) {
            if !self.used.insert(*unit) {
                continue;
            }
            self.current.push((family, *unit));
            self.descend(idx + 1, sum + pos as u32 + 1);
            self.current.pop();
            self.used.remove(unit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smallest_cap() {
        let spec = AllocationSpec::new([10, 20], [(1, vec![10, 20]), (2, vec![10, 20])]).unwrap();
        assert_eq!(smallest_cap(&spec), Some(2));

        let spec = AllocationSpec::new([10, 20], [(1, vec![10]), (2, vec![10])]).unwrap();
        assert_eq!(smallest_cap(&spec), None);
    }

    #[test]
    fn test_min_rank_sum_prefers_lower_total() {
        // 1→10, 2→30, 3→20 sums to 4; every other complete assignment sums to 5.
        let spec = AllocationSpec::new(
            [10, 20, 30],
            [(1, vec![10, 20, 30]), (2, vec![10, 30]), (3, vec![20, 30, 10])],
        )
        .unwrap();
        let best = min_rank_sum(&spec, 3).unwrap();
        assert_eq!(best[&1], UnitId::Real(10));
        assert_eq!(best[&2], UnitId::Real(30));
        assert_eq!(best[&3], UnitId::Real(20));
    }

    #[test]
    fn test_scripted_timeout() {
        let spec = AllocationSpec::new([10], [(1, vec![10])]).unwrap();
        let tasks = ExactTasks::timing_out_when(|call| call.task == TaskKind::MinSatisfaction);
        let err = tasks.min_satisfaction(&spec, TaskContext::new("t", 3)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(tasks.count(TaskKind::MinSatisfaction), 1);
    }
}

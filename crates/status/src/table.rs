use std::collections::{HashMap, VecDeque};

use crate::lifecycle::Lifecycle;

/// Legal-successor table for one lifecycle.
///
/// Every state of the lifecycle has a row (possibly empty). Self-transitions
/// are never legal, even if a row lists them.
#[derive(Debug, Clone)]
pub struct TransitionTable<S: Lifecycle> {
    rows: HashMap<S, Vec<S>>,
    explicit: Vec<S>,
}

/// Structural problems found by [`TransitionTable::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDefect<S> {
    MissingRow(S),
    DuplicateRow(S),
    SelfLoop(S),
}

impl<S: Lifecycle> TransitionTable<S> {
    /// Build a table from `(state, successors)` rows.
    ///
    /// States without a row get an empty successor set; `validate()` reports
    /// them so the built-in tables can be checked in tests.
    pub fn new(rows: &[(S, &[S])]) -> Self {
        let mut map: HashMap<S, Vec<S>> = S::all().iter().map(|s| (*s, Vec::new())).collect();
        let mut explicit = Vec::with_capacity(rows.len());
        for (from, successors) in rows {
            explicit.push(*from);
            let row = map.entry(*from).or_default();
            for to in successors.iter() {
                if !row.contains(to) {
                    row.push(*to);
                }
            }
        }
        Self { rows: map, explicit }
    }

    /// Whether `from -> to` is legal.
    pub fn allows(&self, from: S, to: S) -> bool {
        from != to && self.rows.get(&from).is_some_and(|row| row.contains(&to))
    }

    /// Legal successors of `from`, in declaration order, never including `from`.
    pub fn successors(&self, from: S) -> impl Iterator<Item = S> + '_ {
        self.rows
            .get(&from)
            .into_iter()
            .flat_map(|row| row.iter().copied())
            .filter(move |to| *to != from)
    }

    pub fn is_terminal(&self, state: S) -> bool {
        self.successors(state).next().is_none()
    }

    /// Shortest legal path from `from` to `to` (excluding `from`, including `to`).
    ///
    /// Ties are broken by declaration order, so the result is deterministic.
    /// Returns `None` when `to` is unreachable or equal to `from`.
    pub fn path(&self, from: S, to: S) -> Option<Vec<S>> {
        if from == to {
            return None;
        }
        let mut previous: HashMap<S, S> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for next in self.successors(current) {
                if next == from || previous.contains_key(&next) {
                    continue;
                }
                previous.insert(next, current);
                if next == to {
                    let mut path = vec![to];
                    let mut cursor = to;
                    while let Some(prev) = previous.get(&cursor) {
                        if *prev == from {
                            break;
                        }
                        path.push(*prev);
                        cursor = *prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Check totality (one explicit row per state) and the absence of self-loops.
    pub fn validate(&self) -> Result<(), Vec<TableDefect<S>>> {
        let mut defects = Vec::new();
        for state in S::all() {
            match self.explicit.iter().filter(|s| *s == state).count() {
                0 => defects.push(TableDefect::MissingRow(*state)),
                1 => {}
                _ => defects.push(TableDefect::DuplicateRow(*state)),
            }
            if self.rows.get(state).is_some_and(|row| row.contains(state)) {
                defects.push(TableDefect::SelfLoop(*state));
            }
        }
        if defects.is_empty() { Ok(()) } else { Err(defects) }
    }
}

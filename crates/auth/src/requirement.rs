use std::collections::BTreeSet;
use std::collections::HashSet;

use crate::Feature;

/// ALL/ANY capability predicate attached to a use case.
///
/// Both halves are vacuously satisfied when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    all: BTreeSet<Feature>,
    any: BTreeSet<Feature>,
    message: Option<String>,
}

impl Requirement {
    /// A requirement every caller satisfies.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all(features: impl IntoIterator<Item = Feature>) -> Self {
        Self::default().and_all(features)
    }

    pub fn any(features: impl IntoIterator<Item = Feature>) -> Self {
        Self::default().or_any(features)
    }

    pub fn and_all(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.all.extend(features);
        self
    }

    pub fn or_any(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.any.extend(features);
        self
    }

    /// Denial message surfaced to the caller instead of the default.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn all_of(&self) -> &BTreeSet<Feature> {
        &self.all
    }

    pub fn any_of(&self) -> &BTreeSet<Feature> {
        &self.any
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    pub fn all_satisfied(&self, granted: &HashSet<Feature>) -> bool {
        self.all.iter().all(|f| granted.contains(f))
    }

    pub fn any_satisfied(&self, granted: &HashSet<Feature>) -> bool {
        self.any.is_empty() || self.any.iter().any(|f| granted.contains(f))
    }

    pub fn is_satisfied_by(&self, granted: &HashSet<Feature>) -> bool {
        self.all_satisfied(granted) && self.any_satisfied(granted)
    }

    /// Features of `all` missing from `granted`, sorted.
    pub fn missing(&self, granted: &HashSet<Feature>) -> Vec<Feature> {
        self.all.iter().filter(|f| !granted.contains(*f)).cloned().collect()
    }
}

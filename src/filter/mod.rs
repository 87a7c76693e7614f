//! Include/exclude process name filters
//!
//! `FilterSet` decides whether a process name is monitored. `SharedFilters`
//! holds the live set and swaps it atomically when configuration changes,
//! skipping updates whose content matches the previous snapshot.

pub mod pattern_matcher;

pub use pattern_matcher::FilterPattern;

use crate::models::MonitorError;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

/// Compiled include and exclude filters
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    include: Vec<FilterPattern>,
    exclude: Vec<FilterPattern>,
}

impl FilterSet {
    /// Compile both filter lists. Duplicates (case-insensitive) are dropped.
    pub fn new<I, E>(includes: &[I], excludes: &[E]) -> Result<Self, MonitorError>
    where
        I: AsRef<str>,
        E: AsRef<str>,
    {
        Ok(Self {
            include: compile_unique(includes)?,
            exclude: compile_unique(excludes)?,
        })
    }

    /// Decide whether a process with this name should be monitored.
    ///
    /// Excludes win over includes; an empty include set monitors everything
    /// that is not excluded.
    pub fn should_monitor(&self, name: &str) -> bool {
        if pattern_matcher::matches_any(name, &self.exclude) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        pattern_matcher::matches_any(name, &self.include)
    }

    pub fn include(&self) -> &[FilterPattern] {
        &self.include
    }

    pub fn exclude(&self) -> &[FilterPattern] {
        &self.exclude
    }

    pub fn include_count(&self) -> usize {
        self.include.len()
    }

    pub fn exclude_count(&self) -> usize {
        self.exclude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Canonical representation of this set's content
    pub fn snapshot(&self) -> FilterSnapshot {
        let include: Vec<&str> = self.include.iter().map(FilterPattern::as_str).collect();
        let exclude: Vec<&str> = self.exclude.iter().map(FilterPattern::as_str).collect();
        FilterSnapshot::from_patterns(&include, &exclude)
    }
}

fn compile_unique<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<FilterPattern>, MonitorError> {
    let mut seen = HashSet::new();
    let mut compiled = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let filter = FilterPattern::parse(pattern.as_ref())?;
        if seen.insert(filter.as_str().to_lowercase()) {
            compiled.push(filter);
        }
    }
    Ok(compiled)
}

/// Canonical form of a filter configuration.
///
/// Patterns are trimmed, lowercased, deduplicated and sorted per set, so two
/// configurations that monitor the same names compare equal regardless of
/// ordering or casing. The sets are kept as lists; any character that can
/// appear in a process name stays part of its pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSnapshot {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl FilterSnapshot {
    pub fn from_patterns<I, E>(includes: &[I], excludes: &[E]) -> Self
    where
        I: AsRef<str>,
        E: AsRef<str>,
    {
        Self {
            include: canonical(includes),
            exclude: canonical(excludes),
        }
    }
}

impl fmt::Display for FilterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "include {:?}, exclude {:?}", self.include, self.exclude)
    }
}

fn canonical<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    let mut canonical: Vec<String> = patterns
        .iter()
        .map(|p| p.as_ref().trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    canonical.sort();
    canonical.dedup();
    canonical
}

/// The live filter set shared between the correlator and the subscription manager
#[derive(Debug)]
pub struct SharedFilters {
    current: RwLock<Arc<FilterSet>>,
    last_snapshot: Mutex<FilterSnapshot>,
}

impl SharedFilters {
    pub fn new(filters: FilterSet) -> Self {
        let snapshot = filters.snapshot();
        Self {
            current: RwLock::new(Arc::new(filters)),
            last_snapshot: Mutex::new(snapshot),
        }
    }

    /// The filter set in effect right now
    pub fn current(&self) -> Arc<FilterSet> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    pub fn should_monitor(&self, name: &str) -> bool {
        self.current().should_monitor(name)
    }

    #[cfg(test)]
    fn snapshot(&self) -> FilterSnapshot {
        self.last_snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace both filter lists atomically.
    ///
    /// Returns `Ok(false)` without touching the live set when the new content
    /// matches the previous snapshot. On a compile error the live set is kept.
    pub fn update_filters<I, E>(&self, includes: &[I], excludes: &[E]) -> Result<bool, MonitorError>
    where
        I: AsRef<str>,
        E: AsRef<str>,
    {
        let snapshot = FilterSnapshot::from_patterns(includes, excludes);
        let mut last = self.last_snapshot.lock().unwrap_or_else(|e| e.into_inner());

        if *last == snapshot {
            log::debug!("Filter snapshot unchanged, skipping update: {}", snapshot);
            return Ok(false);
        }

        let filters = FilterSet::new(includes, excludes)?;
        log::info!(
            "Process filters updated: {} include filters, {} exclude filters loaded",
            filters.include_count(),
            filters.exclude_count()
        );

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(filters);
        *last = snapshot;
        Ok(true)
    }
}

impl Default for SharedFilters {
    fn default() -> Self {
        Self::new(FilterSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    fn filters(includes: &[&str], excludes: &[&str]) -> FilterSet {
        FilterSet::new(includes, excludes).unwrap()
    }

    #[test]
    fn test_empty_set_monitors_everything() {
        let set = FilterSet::default();
        assert!(set.should_monitor("calc.exe"));
        assert!(set.should_monitor("anything"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let set = filters(&["calc.exe", "*"], &["calc.exe"]);
        assert!(!set.should_monitor("calc.exe"));
        assert!(!set.should_monitor("CALC.EXE"));
        assert!(set.should_monitor("notepad.exe"));
    }

    #[test]
    fn test_wildcard_exclude_wins_over_exact_include() {
        let set = filters(&["svchost.exe"], &["svc*"]);
        assert!(!set.should_monitor("svchost.exe"));
    }

    #[test]
    fn test_empty_include_monitors_everything_not_excluded() {
        let set = filters(&NONE, &["svchost.exe", "conhost*"]);
        assert!(set.should_monitor("calc.exe"));
        assert!(!set.should_monitor("svchost.exe"));
        assert!(!set.should_monitor("conhost.exe"));
    }

    #[test]
    fn test_include_restricts_monitoring() {
        let set = filters(&["calc.exe", "note*"], &NONE);
        assert!(set.should_monitor("calc.exe"));
        assert!(set.should_monitor("notepad.exe"));
        assert!(!set.should_monitor("svchost.exe"));
    }

    #[test]
    fn test_duplicates_removed_case_insensitively() {
        let set = filters(&["calc.exe", "CALC.EXE", "note*", "Note*"], &["a", "A"]);
        assert_eq!(set.include_count(), 2);
        assert_eq!(set.exclude_count(), 1);
        assert_eq!(set.include()[0].as_str(), "calc.exe");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(FilterSet::new(&["calc.exe", ""], &NONE).is_err());
    }

    #[test]
    fn test_snapshot_ignores_order_case_and_duplicates() {
        let a = FilterSnapshot::from_patterns(&["b.exe", "A.exe"], &["x"]);
        let b = FilterSnapshot::from_patterns(&["a.exe", "B.EXE", "b.exe"], &[" X "]);
        assert_eq!(a, b);
        assert_eq!(a.include, ["a.exe", "b.exe"]);
        assert_eq!(a.exclude, ["x"]);
    }

    #[test]
    fn test_snapshot_keeps_separator_characters_in_patterns() {
        let split = FilterSnapshot::from_patterns(&["a.exe", "b.exe"], &NONE);
        let joined = FilterSnapshot::from_patterns(&["a.exe,b.exe"], &NONE);
        assert_ne!(split, joined);

        let piped = FilterSnapshot::from_patterns(&["a|b"], &NONE);
        let across_sets = FilterSnapshot::from_patterns(&["a"], &["b"]);
        assert_ne!(piped, across_sets);
    }

    #[test]
    fn test_snapshot_distinguishes_include_from_exclude() {
        let a = FilterSnapshot::from_patterns(&["a.exe"], &NONE);
        let b = FilterSnapshot::from_patterns(&NONE, &["a.exe"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_set_snapshot_matches_pattern_snapshot() {
        let set = filters(&["Calc.exe", "note*"], &["svc*"]);
        assert_eq!(
            set.snapshot(),
            FilterSnapshot::from_patterns(&["note*", "calc.exe"], &["SVC*"])
        );
    }

    #[test]
    fn test_update_filters_identical_content_is_noop() {
        let shared = SharedFilters::new(filters(&["calc.exe"], &NONE));
        assert!(!shared.update_filters(&["CALC.EXE"], &NONE).unwrap());
        assert!(shared.update_filters(&["notepad.exe"], &NONE).unwrap());
        assert!(!shared.update_filters(&["notepad.exe"], &NONE).unwrap());
        assert!(shared.should_monitor("notepad.exe"));
        assert!(!shared.should_monitor("calc.exe"));
    }

    #[test]
    fn test_update_filters_applies_pattern_containing_comma() {
        let shared = SharedFilters::new(filters(&["a.exe", "b.exe"], &NONE));
        assert!(shared.update_filters(&["a.exe,b.exe"], &NONE).unwrap());
        assert!(!shared.should_monitor("a.exe"));
        assert!(shared.should_monitor("a.exe,b.exe"));
    }

    #[test]
    fn test_update_filters_keeps_previous_set_on_error() {
        let shared = SharedFilters::new(filters(&["calc.exe"], &NONE));
        assert!(shared.update_filters(&["ok.exe", "  "], &NONE).is_err());
        assert!(shared.should_monitor("calc.exe"));
        assert_eq!(shared.snapshot(), FilterSnapshot::from_patterns(&["calc.exe"], &NONE));
    }

    #[test]
    fn test_readers_keep_their_set_across_updates() {
        let shared = SharedFilters::new(filters(&["calc.exe"], &NONE));
        let before = shared.current();
        shared.update_filters(&["notepad.exe"], &NONE).unwrap();
        assert!(before.should_monitor("calc.exe"));
        assert!(!shared.current().should_monitor("calc.exe"));
    }
}

//! Event subscription queries
//!
//! A `ProcessQuery` is the filter-derived selection an event source applies
//! before delivering events. It can be evaluated in-process (`matches`) or
//! rendered as a WQL event query for hosts that filter at the OS level.

use crate::filter::{pattern_matcher, FilterPattern, FilterSet};
use crate::models::RawEventKind;
use std::fmt;

/// Selection of processes an event subscription delivers
#[derive(Debug, Clone, Default)]
pub struct ProcessQuery {
    include: Vec<FilterPattern>,
    exclude: Vec<FilterPattern>,
}

impl ProcessQuery {
    /// Query matching every process
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_filters(filters: &FilterSet) -> Self {
        Self {
            include: filters.include().to_vec(),
            exclude: filters.exclude().to_vec(),
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Same decision as `FilterSet::should_monitor` for the filters this query was built from
    pub fn matches(&self, name: &str) -> bool {
        if pattern_matcher::matches_any(name, &self.exclude) {
            return false;
        }
        self.include.is_empty() || pattern_matcher::matches_any(name, &self.include)
    }

    /// WQL condition over `TargetInstance.Name`, `None` when every process matches
    pub fn condition(&self) -> Option<String> {
        let mut clauses = Vec::new();

        if !self.include.is_empty() {
            let alternatives: Vec<String> = self.include.iter().map(name_condition).collect();
            clauses.push(format!("({})", alternatives.join(" OR ")));
        }
        for pattern in &self.exclude {
            clauses.push(format!("NOT {}", name_condition(pattern)));
        }

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    /// Full WQL event query for one kind of lifecycle event
    pub fn event_query(&self, kind: RawEventKind) -> String {
        let class = match kind {
            RawEventKind::Create => "__InstanceCreationEvent",
            RawEventKind::Delete => "__InstanceDeletionEvent",
        };
        let mut query = format!(
            "SELECT * FROM {} WITHIN 1 WHERE TargetInstance ISA 'Win32_Process'",
            class
        );
        if let Some(condition) = self.condition() {
            query.push_str(" AND (");
            query.push_str(&condition);
            query.push(')');
        }
        query
    }
}

impl fmt::Display for ProcessQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.condition() {
            Some(condition) => f.write_str(&condition),
            None => f.write_str("all processes"),
        }
    }
}

fn name_condition(pattern: &FilterPattern) -> String {
    if pattern.is_wildcard() {
        format!("TargetInstance.Name LIKE '{}'", escape_string(&like_pattern(pattern.as_str())))
    } else {
        format!("TargetInstance.Name = '{}'", escape_string(pattern.as_str()))
    }
}

/// Translate `*`/`?` into LIKE wildcards. LIKE's own metacharacters are
/// bracket-escaped so they stay literal.
fn like_pattern(pattern: &str) -> String {
    let mut like = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => like.push('%'),
            '?' => like.push('_'),
            '%' => like.push_str("[%]"),
            '_' => like.push_str("[_]"),
            '[' => like.push_str("[[]"),
            _ => like.push(c),
        }
    }
    like
}

/// Escape a value for a single-quoted WQL string literal
fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

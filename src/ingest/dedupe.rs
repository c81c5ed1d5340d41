// src/ingest/dedupe.rs

use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Outcome of the uniqueness pass, with counts for the run report.
#[derive(Debug)]
pub struct DedupeOutcome {
    pub names: Vec<String>,
    pub renamed: usize,
    pub dropped: usize,
}

/// Suffix repeated names with `_1`, `_2`, … in order of appearance; the
/// first occurrence keeps its original name. A suffixed candidate that is
/// itself already taken (a literal `x_1` column next to two `x` columns)
/// keeps incrementing until free, so the result is pairwise distinct.
///
/// Blank names are left untouched here; suffixing would resurrect columns
/// that `drop_empty_columns` is about to remove.
pub fn dedupe_names(names: Vec<String>) -> (Vec<String>, usize) {
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    let mut renamed = 0;

    for name in names {
        if name.trim().is_empty() {
            out.push(name);
            continue;
        }
        if taken.insert(name.clone()) {
            out.push(name);
            continue;
        }

        let count = counters.entry(name.clone()).or_insert(0);
        let renamed_to = loop {
            *count += 1;
            let candidate = format!("{}_{}", name, count);
            if taken.insert(candidate.clone()) {
                break candidate;
            }
        };
        debug!(from = %name, to = %renamed_to, "renamed duplicate column");
        out.push(renamed_to);
        renamed += 1;
    }
    (out, renamed)
}

/// Remove columns whose final name is blank, deleting the matching index
/// from every data row as well. Rows are rebuilt rather than patched in
/// place so indices stay consistent.
pub fn drop_empty_columns(names: Vec<String>, rows: &mut Vec<Vec<String>>) -> (Vec<String>, usize) {
    let keep: Vec<bool> = names.iter().map(|n| !n.trim().is_empty()).collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped == 0 {
        return (names, 0);
    }

    let kept_names: Vec<String> = names
        .into_iter()
        .zip(&keep)
        .filter_map(|(n, k)| k.then_some(n))
        .collect();

    for row in rows.iter_mut() {
        let old = std::mem::take(row);
        *row = old
            .into_iter()
            .zip(&keep)
            .filter_map(|(v, k)| k.then_some(v))
            .collect();
    }

    (kept_names, dropped)
}

/// Full uniqueness pass: dedupe, then drop empties.
pub fn finalize_schema(names: Vec<String>, rows: &mut Vec<Vec<String>>) -> DedupeOutcome {
    let (deduped, renamed) = dedupe_names(names);
    let (names, dropped) = drop_empty_columns(deduped, rows);
    DedupeOutcome {
        names,
        renamed,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicates_get_incrementing_suffixes() {
        let (out, renamed) = dedupe_names(names(&["rev", "rev", "cost", "rev", "cost"]));
        assert_eq!(out, vec!["rev", "rev_1", "cost", "rev_2", "cost_1"]);
        assert_eq!(renamed, 3);
    }

    #[test]
    fn unique_names_pass_through() {
        let (out, renamed) = dedupe_names(names(&["a", "b", "c"]));
        assert_eq!(out, vec!["a", "b", "c"]);
        assert_eq!(renamed, 0);
    }

    #[test]
    fn deduped_names_are_pairwise_distinct() {
        let (out, _) = dedupe_names(names(&["x", "x", "x", "x_1"]));
        assert_eq!(out, vec!["x", "x_1", "x_2", "x_1_1"]);
        let mut sorted = out.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), out.len());
    }

    #[test]
    fn blank_names_are_not_suffixed() {
        let (out, renamed) = dedupe_names(names(&["", "a", "", "a"]));
        assert_eq!(out, vec!["", "a", "", "a_1"]);
        assert_eq!(renamed, 1);
    }

    #[test]
    fn empty_columns_disappear_with_their_data() {
        let mut rows = vec![
            names(&["1", "drop-me", "a"]),
            names(&["2", "drop-me-too", "b"]),
        ];
        let (out, dropped) = drop_empty_columns(names(&["id", "", "desc"]), &mut rows);
        assert_eq!(out, vec!["id", "desc"]);
        assert_eq!(dropped, 1);
        assert_eq!(rows[0], vec!["1", "a"]);
        assert_eq!(rows[1], vec!["2", "b"]);
    }

    #[test]
    fn short_rows_survive_column_drop() {
        let mut rows = vec![names(&["only"])];
        let (out, dropped) = drop_empty_columns(names(&["id", "", "desc"]), &mut rows);
        assert_eq!(out, vec!["id", "desc"]);
        assert_eq!(dropped, 1);
        assert_eq!(rows[0], vec!["only"]);
    }
}

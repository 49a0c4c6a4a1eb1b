//! Column normalization and the category merge engine.
//!
//! Stat-category tables arrive with multi-row headers and overlapping column
//! names. This module flattens headers, strips the `For <team>` / `Against
//! <team>` prefixes the stats site adds, prefixes category-specific columns,
//! and left-joins every category onto the schedule table over the shared
//! fixture keys.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::table::Table;

/// Fixture columns shared across stat categories. These are never prefixed
/// and form the candidate join keys between category tables.
pub const COMMON_KEYS: &[&str] = &[
    "Date", "Comp", "Round", "Venue", "Result", "Opponent", "Day", "Time", "GF", "GA",
];

static SIDE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(For|Against) .+?_").expect("side prefix regex"));

/// Collapse a multi-row header grid into one name per column.
///
/// Level segments are joined with `_`, skipping empty cells, and stray
/// leading/trailing underscores are trimmed.
pub fn flatten_header_rows(levels: &[Vec<String>]) -> Vec<String> {
    let width = levels.iter().map(|row| row.len()).max().unwrap_or(0);
    (0..width)
        .map(|i| {
            let segments: Vec<&str> = levels
                .iter()
                .filter_map(|row| row.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            segments.join("_").trim_matches('_').to_string()
        })
        .collect()
}

/// Drop the `For <team>_` / `Against <team>_` prefix a flattened header
/// carries when the site spans team labels over the fixture columns.
pub fn strip_side_prefix(column: &str) -> String {
    SIDE_PREFIX_RE.replace(column, "").into_owned()
}

/// Prefix category-specific columns with `<category>_`.
///
/// Common fixture keys stay as they are, and names already carrying the
/// prefix are left alone so re-running the normalization is a no-op.
pub fn prefix_category_columns(table: &mut Table, category: &str) {
    let prefix = format!("{category}_");
    table.map_columns(|col| {
        if COMMON_KEYS.contains(&col) || col.starts_with(&prefix) {
            col.to_string()
        } else {
            format!("{prefix}{col}")
        }
    });
}

/// Full column normalization for one category table.
pub fn normalize_columns(table: &mut Table, category: &str) {
    table.map_columns(|col| strip_side_prefix(col));
    prefix_category_columns(table, category);
}

/// Merge per-category tables into one row-per-fixture table.
///
/// The base is the `preferred_base` category when present, otherwise the
/// first table supplied. Every other category is left-joined onto it over
/// the common keys present in both the base and that category; a category
/// sharing no keys with the base is skipped and the merge result is as if
/// it had never been supplied. The merged table always has exactly as many
/// rows as the base.
pub fn merge_categories(tables: Vec<(String, Table)>, preferred_base: &str) -> Table {
    if tables.is_empty() {
        return Table::empty();
    }

    let base_idx = tables
        .iter()
        .position(|(cat, _)| cat == preferred_base)
        .unwrap_or(0);

    let mut tables = tables;
    let (_, base) = tables.remove(base_idx);
    let base_columns: Vec<String> = base.columns().to_vec();

    let mut merged = base;
    for (category, table) in tables {
        merged = fold_in(merged, &base_columns, category, table);
    }
    merged
}

fn fold_in(acc: Table, base_columns: &[String], category: String, table: Table) -> Table {
    let keys: Vec<String> = COMMON_KEYS
        .iter()
        .filter(|k| {
            base_columns.iter().any(|c| c == *k) && table.column_index(k).is_some()
        })
        .map(|k| k.to_string())
        .collect();

    if keys.is_empty() {
        warn!(category = %category, "no shared join keys with base table; skipping category");
        return acc;
    }

    debug!(category = %category, keys = ?keys, rows = table.len(), "merging category");
    acc.left_join(&table, &keys, &format!("_{category}_dup"))
}

/// Human-readable team name: separator characters become spaces.
pub fn display_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            t.push_row(row.iter().map(|v| json!(v)).collect());
        }
        t
    }

    #[test]
    fn flatten_joins_non_empty_segments() {
        let levels = vec![
            vec![
                "For Arsenal".to_string(),
                "For Arsenal".to_string(),
                "Standard".to_string(),
                "".to_string(),
            ],
            vec![
                "Date".to_string(),
                "Opponent".to_string(),
                "Sh".to_string(),
                "Notes".to_string(),
            ],
        ];
        assert_eq!(
            flatten_header_rows(&levels),
            vec!["For Arsenal_Date", "For Arsenal_Opponent", "Standard_Sh", "Notes"]
        );
    }

    #[test]
    fn side_prefixes_are_stripped() {
        assert_eq!(strip_side_prefix("For Nottingham Forest_Date"), "Date");
        assert_eq!(strip_side_prefix("Against Arsenal_GA"), "GA");
        assert_eq!(strip_side_prefix("Standard_Sh"), "Standard_Sh");
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut t = table(&["For Arsenal_Date", "Opponent", "Standard_Sh"], &[]);
        normalize_columns(&mut t, "shooting");
        let once = t.columns().to_vec();
        assert_eq!(once, vec!["Date", "Opponent", "shooting_Standard_Sh"]);

        normalize_columns(&mut t, "shooting");
        assert_eq!(t.columns(), once.as_slice());
    }

    #[test]
    fn category_columns_are_prefixed_once() {
        let mut t = table(&["Date", "shots", "shooting_xG"], &[]);
        prefix_category_columns(&mut t, "shooting");
        assert_eq!(t.columns(), &["Date", "shooting_shots", "shooting_xG"]);
    }

    #[test]
    fn merge_attaches_category_stats_to_base_rows() {
        let base = table(
            &["Date", "Opponent"],
            &[&["2025-08-16", "Brentford"], &["2025-08-23", "Arsenal"]],
        );
        let mut shooting = table(
            &["Date", "Opponent", "shots"],
            &[&["2025-08-16", "Brentford", "12"]],
        );
        normalize_columns(&mut shooting, "shooting");

        let merged = merge_categories(
            vec![
                ("scores_fixtures".to_string(), base),
                ("shooting".to_string(), shooting),
            ],
            "scores_fixtures",
        );

        assert_eq!(merged.len(), 2);
        let col = merged.column_index("shooting_shots").unwrap();
        assert_eq!(merged.cell(0, col), Some(&json!("12")));
        assert_eq!(merged.cell(1, col), Some(&json!(null)));
    }

    #[test]
    fn preferred_base_wins_regardless_of_position() {
        let schedule = table(&["Date", "Opponent"], &[&["2025-08-16", "Brentford"]]);
        let shooting = table(
            &["Date", "Opponent", "shooting_Sh"],
            &[
                &["2025-08-16", "Brentford", "12"],
                &["2025-08-23", "Arsenal", "9"],
            ],
        );

        let merged = merge_categories(
            vec![
                ("shooting".to_string(), shooting),
                ("scores_fixtures".to_string(), schedule),
            ],
            "scores_fixtures",
        );

        // One row: the schedule is the base even when supplied second.
        assert_eq!(merged.len(), 1);
        assert!(merged.column_index("shooting_Sh").is_some());
    }

    #[test]
    fn category_without_shared_keys_is_skipped() {
        let base = table(&["Date", "Opponent"], &[&["2025-08-16", "Brentford"]]);
        let orphan = table(&["possession_Touches"], &[&["812"]]);

        let with_orphan = merge_categories(
            vec![
                ("scores_fixtures".to_string(), base.clone()),
                ("possession".to_string(), orphan),
            ],
            "scores_fixtures",
        );
        let without = merge_categories(
            vec![("scores_fixtures".to_string(), base)],
            "scores_fixtures",
        );

        assert_eq!(with_orphan, without);
    }

    #[test]
    fn colliding_payload_columns_get_dup_suffix() {
        // GF is a common key but absent from the base, so both categories
        // carry it as payload and the second lands with a suffix.
        let base = table(&["Date", "Opponent"], &[&["2025-08-16", "Brentford"]]);
        let shooting = table(
            &["Date", "Opponent", "GF"],
            &[&["2025-08-16", "Brentford", "2"]],
        );
        let passing = table(
            &["Date", "Opponent", "GF"],
            &[&["2025-08-16", "Brentford", "2"]],
        );

        let merged = merge_categories(
            vec![
                ("scores_fixtures".to_string(), base),
                ("shooting".to_string(), shooting),
                ("passing".to_string(), passing),
            ],
            "scores_fixtures",
        );

        assert!(merged.column_index("GF").is_some());
        assert!(merged.column_index("GF_passing_dup").is_some());
    }

    #[test]
    fn display_name_normalizes_separators() {
        assert_eq!(display_name("Nottingham-Forest"), "Nottingham Forest");
        assert_eq!(display_name("West_Ham"), "West Ham");
        assert_eq!(display_name("Arsenal"), "Arsenal");
    }
}

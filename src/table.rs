//! Column-ordered table of JSON cells.
//!
//! Every stage of the pipeline trades in [`Table`]: parsers produce one per
//! page, the merge engine joins them, the orchestrator concatenates them, and
//! the store writes them out. Cells are `serde_json::Value` so string cells
//! from HTML tables and typed cells from embedded JSON share one shape.

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Separator used when composing multi-column join keys.
const KEY_SEP: char = '\u{1f}';

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from JSON objects, one row per record.
    ///
    /// Columns are the union of object keys in first-seen order; keys missing
    /// from a record are null-filled. Non-object records are ignored.
    pub fn from_records(records: &[Value]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let objects: Vec<&Map<String, Value>> =
            records.iter().filter_map(|r| r.as_object()).collect();

        for obj in &objects {
            for key in obj.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = Table::new(columns);
        for obj in objects {
            let row = table
                .columns
                .iter()
                .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            table.rows.push(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Append a row, padding or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Rewrite column names in place.
    pub fn map_columns(&mut self, f: impl Fn(&str) -> String) {
        for col in &mut self.columns {
            *col = f(col);
        }
    }

    /// Keep only the rows for which `pred` returns true.
    pub fn retain_rows(&mut self, pred: impl Fn(&[Value]) -> bool) {
        self.rows.retain(|r| pred(r));
    }

    /// Rewrite every cell of the named column; a no-op if the column is absent.
    pub fn map_column(&mut self, name: &str, f: impl Fn(Value) -> Value) {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                let cell = std::mem::take(&mut row[idx]);
                row[idx] = f(cell);
            }
        }
    }

    /// Append a column holding the same value in every row.
    pub fn with_constant_column(mut self, name: &str, value: Value) -> Self {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.clone());
        }
        self
    }

    /// Left join that preserves the left-hand rows exactly.
    ///
    /// `keys` must name columns present in both tables. For each left row the
    /// first right row with the same key is taken, so the result always has
    /// exactly `self.len()` rows. Right columns outside the key set are
    /// appended; a name that collides with an existing column is renamed with
    /// `dup_suffix`. Unmatched left rows get nulls.
    pub fn left_join(&self, right: &Table, keys: &[String], dup_suffix: &str) -> Table {
        let left_key_idx: Vec<usize> = keys
            .iter()
            .filter_map(|k| self.column_index(k))
            .collect();
        let right_key_idx: Vec<usize> = keys
            .iter()
            .filter_map(|k| right.column_index(k))
            .collect();

        let payload_idx: Vec<usize> = (0..right.columns.len())
            .filter(|i| !right_key_idx.contains(i))
            .collect();

        let mut out_columns = self.columns.clone();
        for &i in &payload_idx {
            let name = &right.columns[i];
            if out_columns.iter().any(|c| c == name) {
                out_columns.push(format!("{name}{dup_suffix}"));
            } else {
                out_columns.push(name.clone());
            }
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            let key = compose_key(row, &right_key_idx);
            if key.split(KEY_SEP).all(|part| part.is_empty()) {
                continue;
            }
            index.entry(key).or_insert(i);
        }

        let mut out = Table::new(out_columns);
        for row in &self.rows {
            let mut joined = row.clone();
            match index.get(&compose_key(row, &left_key_idx)) {
                Some(&ri) => {
                    let matched = &right.rows[ri];
                    for &i in &payload_idx {
                        joined.push(matched.get(i).cloned().unwrap_or(Value::Null));
                    }
                }
                None => joined.extend(payload_idx.iter().map(|_| Value::Null)),
            }
            out.push_row(joined);
        }
        out
    }

    /// Row-wise concatenation with uniform columns.
    ///
    /// The output column set is the union of all inputs in first-seen order;
    /// cells for columns a table lacks are null.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Table {
        let tables: Vec<Table> = tables.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        for t in &tables {
            for c in &t.columns {
                if !columns.iter().any(|existing| existing == c) {
                    columns.push(c.clone());
                }
            }
        }

        let mut out = Table::new(columns);
        for t in tables {
            let mapping: Vec<Option<usize>> = out
                .columns
                .iter()
                .map(|c| t.column_index(c))
                .collect();
            for row in t.rows {
                let remapped = mapping
                    .iter()
                    .map(|m| m.and_then(|i| row.get(i).cloned()).unwrap_or(Value::Null))
                    .collect();
                out.rows.push(remapped);
            }
        }
        out
    }

    /// Rows as JSON objects in column order.
    pub fn to_json_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (c, v) in self.columns.iter().zip(row.iter()) {
                    obj.insert(c.clone(), v.clone());
                }
                Value::Object(obj)
            })
            .collect()
    }
}

/// Canonical string rendering of one cell for join-key comparison.
pub(crate) fn render_key_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compose_key(row: &[Value], idx: &[usize]) -> String {
    let parts: Vec<String> = idx
        .iter()
        .map(|&i| row.get(i).map(render_key_cell).unwrap_or_default())
        .collect();
    parts.join(&KEY_SEP.to_string())
}

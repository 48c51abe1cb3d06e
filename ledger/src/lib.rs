//! Economy ledger for caravan-core.
//!
//! A `tracing` subscriber that files the engine's structured events into
//! column tables, one table per event target (`gold`, `sale`, `travel`,
//! `quest`, `negotiation`, ...). Columns are created as fields show up, so the
//! schema follows whatever the engine records.
//!
//! # Usage
//!
//! ```ignore
//! // In engine code:
//! tracing::info!(target: "gold", delta = -50i64, balance = 1200u64, reason = "travel");
//!
//! // In a test:
//! let (_, ledger) = ledger::capture(|| economy.travel(city));
//! assert_eq!(ledger.gold_net(), -50);
//! let gold = ledger.tables["gold"].to_dataframe()?;
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

/// Target the engine uses for every balance change.
pub const GOLD_TARGET: &str = "gold";

/// A column of typed values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::U64(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pad_to(&mut self, rows: usize) {
        let missing = rows.saturating_sub(self.len());
        if missing == 0 {
            return;
        }
        match self {
            Column::U64(v) => v.extend(std::iter::repeat_n(0, missing)),
            Column::I64(v) => v.extend(std::iter::repeat_n(0, missing)),
            Column::F64(v) => v.extend(std::iter::repeat_n(0.0, missing)),
            Column::Bool(v) => v.extend(std::iter::repeat_n(false, missing)),
            Column::Str(v) => v.extend(std::iter::repeat_n(String::new(), missing)),
        }
    }
}

/// Rows recorded under one tracing target.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: HashMap<String, Column>,
    pub rows: usize,
}

impl Table {
    fn align(&mut self) {
        for column in self.columns.values_mut() {
            column.pad_to(self.rows);
        }
    }

    /// Signed integer view of a column; unsigned values are widened.
    pub fn ints(&self, name: &str) -> Vec<i64> {
        match self.columns.get(name) {
            Some(Column::I64(v)) => v.clone(),
            Some(Column::U64(v)) => v.iter().map(|&x| x as i64).collect(),
            _ => Vec::new(),
        }
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.columns.get(name) {
            Some(Column::Str(v)) => v.clone(),
            _ => Vec::new(),
        }
    }
}

/// Every table recorded on this thread, keyed by target.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub tables: HashMap<String, Table>,
}

impl Ledger {
    /// Number of events recorded under `target`.
    pub fn count(&self, target: &str) -> usize {
        self.tables.get(target).map(|t| t.rows).unwrap_or(0)
    }

    /// Sum of all recorded gold deltas. Over any action sequence this must
    /// equal the final balance minus the starting balance.
    pub fn gold_net(&self) -> i64 {
        self.tables
            .get(GOLD_TARGET)
            .map(|t| t.ints("delta").iter().sum())
            .unwrap_or(0)
    }

    /// Gold deltas grouped by their `reason` field.
    pub fn gold_by_reason(&self) -> HashMap<String, i64> {
        let mut totals = HashMap::new();
        if let Some(table) = self.tables.get(GOLD_TARGET) {
            for (reason, delta) in table.strings("reason").into_iter().zip(table.ints("delta")) {
                *totals.entry(reason).or_insert(0) += delta;
            }
        }
        totals
    }
}

thread_local! {
    static LEDGER: RefCell<Ledger> = RefCell::default();
}

struct RowVisitor<'a> {
    table: &'a mut Table,
}

impl RowVisitor<'_> {
    fn column(&mut self, field: &Field, empty: fn(usize) -> Column) -> &mut Column {
        let rows = self.table.rows;
        self.table
            .columns
            .entry(field.name().to_string())
            .or_insert_with(|| empty(rows))
    }
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        match self.column(field, |n| Column::U64(vec![0; n])) {
            Column::U64(v) => v.push(value),
            Column::I64(v) => v.push(value as i64),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match self.column(field, |n| Column::I64(vec![0; n])) {
            Column::I64(v) => v.push(value),
            Column::U64(v) if value >= 0 => v.push(value as u64),
            _ => {}
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Column::F64(v) = self.column(field, |n| Column::F64(vec![0.0; n])) {
            v.push(value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if let Column::Bool(v) = self.column(field, |n| Column::Bool(vec![false; n])) {
            v.push(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if let Column::Str(v) = self.column(field, |n| Column::Str(vec![String::new(); n])) {
            v.push(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

/// Subscriber that appends one row per event to the thread-local ledger.
pub struct LedgerSubscriber;

impl Subscriber for LedgerSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let target = event.metadata().target().to_string();
        LEDGER.with(|ledger| {
            let mut ledger = ledger.borrow_mut();
            let table = ledger.tables.entry(target).or_default();
            table.align();
            event.record(&mut RowVisitor { table: &mut *table });
            table.rows += 1;
            table.align();
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Take everything recorded on this thread so far.
pub fn drain() -> Ledger {
    LEDGER.with(|l| std::mem::take(&mut *l.borrow_mut()))
}

pub fn clear() {
    LEDGER.with(|l| *l.borrow_mut() = Ledger::default());
}

/// Run `f` with the ledger subscriber scoped to this thread and return what it
/// recorded alongside `f`'s result.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Ledger) {
    clear();
    let out = tracing::subscriber::with_default(LedgerSubscriber, f);
    (out, drain())
}

// === Polars Integration ===

use polars::prelude::*;

impl Table {
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut names: Vec<&String> = self.columns.keys().collect();
        names.sort();
        let columns = names
            .into_iter()
            .map(|name| match &self.columns[name] {
                Column::U64(v) => polars::prelude::Column::new(name.into(), v),
                Column::I64(v) => polars::prelude::Column::new(name.into(), v),
                Column::F64(v) => polars::prelude::Column::new(name.into(), v),
                Column::Bool(v) => polars::prelude::Column::new(name.into(), v),
                Column::Str(v) => polars::prelude::Column::new(name.into(), v),
            })
            .collect();
        DataFrame::new(columns)
    }
}

impl Ledger {
    pub fn to_dataframes(&self) -> HashMap<String, DataFrame> {
        self.tables
            .iter()
            .filter_map(|(name, table)| table.to_dataframe().ok().map(|df| (name.clone(), df)))
            .collect()
    }

    /// Write each table as `{dir}/{target}.parquet`.
    pub fn write_parquet(&self, dir: &Path) -> PolarsResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| PolarsError::IO {
            error: e.into(),
            msg: None,
        })?;
        for (name, mut df) in self.to_dataframes() {
            let file = std::fs::File::create(dir.join(format!("{name}.parquet"))).map_err(|e| {
                PolarsError::IO {
                    error: e.into(),
                    msg: None,
                }
            })?;
            ParquetWriter::new(file).finish(&mut df)?;
        }
        Ok(())
    }
}

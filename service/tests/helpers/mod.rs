//! Shared fixtures for the composite model integration tests

#![allow(dead_code)]

pub mod stub_base;
pub mod stub_predictors;

use composer_core::{ComposerConfig, Table, Value};
use composer_service::Composer;
use std::sync::Arc;
use stub_base::StubBaseModel;

/// Schema with one foreign categorical column driven by a local one
pub const DISCRETE_SCHEMA: &str =
    "default(x categorical, d categorical), lookup(y categorical given x)";

/// Rows 0..100 pair `x` with `y`:
///
/// | x | y = yes | y = no |
/// |---|---------|--------|
/// | a | 45      | 5      |
/// | b | 5       | 45     |
///
/// `d` alternates `p`/`q` and `c` copies `y`. Rows 100..103 have holes for
/// imputation: 100 lacks `y`, 101 lacks `x` and `y`, 102 lacks `x` only
/// (with `y = yes`).
pub fn discrete_table() -> Table {
    let mut table = Table::new("survey", &["x", "y", "d", "c"]);
    for rowid in 0..100u64 {
        let x = if rowid < 50 { "a" } else { "b" };
        let offset = rowid % 50;
        let yes = if rowid < 50 { offset < 45 } else { offset < 5 };
        let y = if yes { "yes" } else { "no" };
        table
            .insert_row(rowid, row(Some(x), Some(y), rowid))
            .expect("row width matches");
    }
    table.insert_row(100, row(Some("a"), None, 100)).expect("row width matches");
    table.insert_row(101, row(None, None, 101)).expect("row width matches");
    table.insert_row(102, row(None, Some("yes"), 102)).expect("row width matches");
    table
}

fn row(x: Option<&str>, y: Option<&str>, rowid: u64) -> Vec<Option<Value>> {
    let d = if rowid % 2 == 0 { "p" } else { "q" };
    vec![
        x.map(Value::from),
        y.map(Value::from),
        Some(Value::from(d)),
        y.map(Value::from),
    ]
}

/// `z = 2w + 1` with ±0.1 alternating noise for `w` in 0..50, plus row 50
/// with `w = 3` and `z` missing and row 51 with `w` missing and `z = 21`
pub fn linear_table() -> Table {
    let mut table = Table::new("line", &["w", "z"]);
    for rowid in 0..50u64 {
        let w = rowid as f64;
        let noise = if rowid % 2 == 0 { 0.1 } else { -0.1 };
        table
            .insert_row(
                rowid,
                vec![Some(Value::Number(w)), Some(Value::Number(2.0 * w + 1.0 + noise))],
            )
            .expect("row width matches");
    }
    table
        .insert_row(50, vec![Some(Value::Number(3.0)), None])
        .expect("row width matches");
    table
        .insert_row(51, vec![None, Some(Value::Number(21.0))])
        .expect("row width matches");
    table
}

/// Composer over `base` with the reproducible testing configuration and
/// both fixture tables registered
pub fn composer(base: &Arc<StubBaseModel>) -> Composer {
    composer_with(base, ComposerConfig::testing())
}

pub fn composer_with(base: &Arc<StubBaseModel>, config: ComposerConfig) -> Composer {
    let composer = Composer::new(base.clone(), config).expect("valid configuration");
    composer.register_table(discrete_table());
    composer.register_table(linear_table());
    composer
}

pub fn text(value: &str) -> Value {
    Value::from(value)
}

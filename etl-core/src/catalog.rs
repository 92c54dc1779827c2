//! Catalog pipeline: two independently-sourced game exports → merged
//! star schema.
//!
//! The catalog export and the telemetry export are inner-joined on the
//! app id before any derivation, so the schema only describes games
//! both sources know about. All output tables are appended onto the
//! pre-seeded schema owned by the service.

use crate::bridge::{build_bridge, distinct_tokens, DEFAULT_DELIMITER};
use crate::dimension::DimensionTable;
use crate::error::EtlError;
use crate::fact::safe_ratio;
use crate::merge::merge_inner;
use crate::output::{ColType, Column, TableWrite, WriteMode};
use crate::report::RunReport;
use crate::resolve::{resolve_column, RoleSpec};
use crate::table::{RawTable, Value};

/// Source tags used to disambiguate colliding column names.
pub const CATALOG_TAG: &str = "kg";
pub const TELEMETRY_TAG: &str = "spy";

pub const APP_ID: RoleSpec = RoleSpec {
    role: "app_id",
    keywords: &["appid", "app_id"],
};
// Post-merge roles: the suffixed candidates come first so the catalog
// side wins when both sources carry the column.
pub const GAME_NAME: RoleSpec = RoleSpec {
    role: "game_name",
    keywords: &["name_kg", "name"],
};
pub const RELEASE_DATE: RoleSpec = RoleSpec {
    role: "release_date",
    keywords: &["release_date", "release"],
};
pub const PRICE: RoleSpec = RoleSpec {
    role: "price",
    keywords: &["price_kg", "price"],
};
pub const GENRES: RoleSpec = RoleSpec {
    role: "genres",
    keywords: &["genres", "genre"],
};
pub const AVG_PLAYTIME: RoleSpec = RoleSpec {
    role: "avg_playtime",
    keywords: &["average_forever", "average"],
};
pub const MEDIAN_PLAYTIME: RoleSpec = RoleSpec {
    role: "median_playtime",
    keywords: &["median_forever", "median"],
};
pub const OWNERS: RoleSpec = RoleSpec {
    role: "owners",
    keywords: &["owners"],
};
pub const POSITIVE: RoleSpec = RoleSpec {
    role: "positive",
    keywords: &["positive"],
};
pub const NEGATIVE: RoleSpec = RoleSpec {
    role: "negative",
    keywords: &["negative"],
};

/// Role bindings resolved once against the merged table.
#[derive(Debug, Clone)]
pub struct CatalogBindings {
    pub app_id: String,
    pub name: String,
    pub release_date: String,
    pub price: String,
    pub genres: String,
    pub avg_playtime: String,
    pub median_playtime: String,
    pub owners: String,
    pub positive: String,
    pub negative: String,
}

impl CatalogBindings {
    pub fn resolve(merged: &RawTable) -> Result<Self, EtlError> {
        let columns = merged.columns();
        Ok(CatalogBindings {
            app_id: resolve_column(columns, &APP_ID)?,
            name: resolve_column(columns, &GAME_NAME)?,
            release_date: resolve_column(columns, &RELEASE_DATE)?,
            price: resolve_column(columns, &PRICE)?,
            genres: resolve_column(columns, &GENRES)?,
            avg_playtime: resolve_column(columns, &AVG_PLAYTIME)?,
            median_playtime: resolve_column(columns, &MEDIAN_PLAYTIME)?,
            owners: resolve_column(columns, &OWNERS)?,
            positive: resolve_column(columns, &POSITIVE)?,
            negative: resolve_column(columns, &NEGATIVE)?,
        })
    }
}

#[derive(Debug)]
pub struct CatalogOutput {
    pub tables: Vec<TableWrite>,
    pub report: RunReport,
}

/// Run the whole pipeline over the two raw exports.
pub fn run(catalog: &RawTable, telemetry: &RawTable) -> Result<CatalogOutput, EtlError> {
    let left_key = resolve_column(catalog.columns(), &APP_ID)?;
    let right_key = resolve_column(telemetry.columns(), &APP_ID)?;
    let merged = merge_inner(
        catalog,
        &left_key,
        telemetry,
        &right_key,
        CATALOG_TAG,
        TELEMETRY_TAG,
    )?;
    let bindings = CatalogBindings::resolve(&merged)?;
    let mut report = RunReport::default();

    let dim_game = build_game_rows(&merged, &bindings);

    let dim_genre = DimensionTable::from_distinct(
        "dim_genre",
        distinct_tokens(&merged, &bindings.genres, DEFAULT_DELIMITER),
    );
    let bridge = build_genre_bridge(&merged, &bindings, &dim_genre)?;

    let fact_playtime = build_playtime_facts(&merged, &bindings);
    let fact_review = build_review_facts(&merged, &bindings);

    report.rows_processed = merged.row_count();

    let tables = vec![
        dim_game,
        dim_genre.to_write("genre_id", "genre_name", WriteMode::Append),
        bridge,
        fact_playtime,
        fact_review,
    ];
    for write in &tables {
        report.record_table(write);
    }

    Ok(CatalogOutput { tables, report })
}

fn build_game_rows(merged: &RawTable, bindings: &CatalogBindings) -> TableWrite {
    let mut write = TableWrite::new(
        "dim_game",
        WriteMode::Append,
        vec![
            Column::new("appid", ColType::Integer),
            Column::new("name", ColType::Text),
            Column::new("release_date", ColType::Text),
            Column::new("price", ColType::Real),
        ],
    );
    for row in merged.rows() {
        write.rows.push(vec![
            merged.cell(row, &bindings.app_id).clone(),
            merged.cell(row, &bindings.name).clone(),
            merged.cell(row, &bindings.release_date).clone(),
            merged.cell(row, &bindings.price).clone(),
        ]);
    }
    write
}

fn build_genre_bridge(
    merged: &RawTable,
    bindings: &CatalogBindings,
    dim_genre: &DimensionTable,
) -> Result<TableWrite, EtlError> {
    let mut write = TableWrite::new(
        "bridge_game_genre",
        WriteMode::Append,
        vec![
            Column::new("appid", ColType::Integer),
            Column::new("genre_id", ColType::Integer),
        ],
    );
    let edges = build_bridge(
        merged,
        &bindings.app_id,
        &bindings.genres,
        DEFAULT_DELIMITER,
        dim_genre,
    )?;
    for (appid, genre_id) in edges {
        write.rows.push(vec![Value::Int(appid), Value::Int(genre_id)]);
    }
    Ok(write)
}

fn build_playtime_facts(merged: &RawTable, bindings: &CatalogBindings) -> TableWrite {
    let mut write = TableWrite::new(
        "fact_playtime",
        WriteMode::Append,
        vec![
            Column::new("appid", ColType::Integer),
            Column::new("avg_playtime", ColType::Integer),
            Column::new("median_playtime", ColType::Integer),
            Column::new("owners_text", ColType::Text),
        ],
    );
    for row in merged.rows() {
        write.rows.push(vec![
            merged.cell(row, &bindings.app_id).clone(),
            int_or_null(merged.cell(row, &bindings.avg_playtime)),
            int_or_null(merged.cell(row, &bindings.median_playtime)),
            merged.cell(row, &bindings.owners).clone(),
        ]);
    }
    write
}

fn build_review_facts(merged: &RawTable, bindings: &CatalogBindings) -> TableWrite {
    let mut write = TableWrite::new(
        "fact_review",
        WriteMode::Append,
        vec![
            Column::new("appid", ColType::Integer),
            Column::new("positive_cnt", ColType::Integer),
            Column::new("negative_cnt", ColType::Integer),
            Column::new("positive_rate", ColType::Real),
        ],
    );
    for row in merged.rows() {
        let positive = merged.cell(row, &bindings.positive).as_f64().unwrap_or(0.0);
        let negative = merged.cell(row, &bindings.negative).as_f64().unwrap_or(0.0);
        let rate = safe_ratio(positive, positive + negative);
        write.rows.push(vec![
            merged.cell(row, &bindings.app_id).clone(),
            int_or_null(merged.cell(row, &bindings.positive)),
            int_or_null(merged.cell(row, &bindings.negative)),
            Value::Float(rate),
        ]);
    }
    write
}

fn int_or_null(value: &Value) -> Value {
    value.as_i64().map(Value::Int).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn catalog_table() -> RawTable {
        let mut t = RawTable::new(
            ["appid", "name", "release_date", "price", "genres"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        t.push_row(vec![
            Value::Int(10),
            "Counter-Strike".into(),
            "2000-11-01".into(),
            Value::Float(9.99),
            "Action".into(),
        ]);
        t.push_row(vec![
            Value::Int(220),
            "Half-Life 2".into(),
            "2004-11-16".into(),
            Value::Float(9.99),
            "Action; Indie;Action".into(),
        ]);
        t.push_row(vec![
            Value::Int(999),
            "Unmatched Game".into(),
            "2020-01-01".into(),
            Value::Float(0.0),
            "Casual".into(),
        ]);
        t
    }

    fn telemetry_table() -> RawTable {
        let mut t = RawTable::new(
            [
                "appid",
                "name",
                "positive",
                "negative",
                "owners",
                "average_forever",
                "median_forever",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );
        t.push_row(vec![
            Value::Int(10),
            "counter strike".into(),
            Value::Int(120),
            Value::Int(30),
            "10,000,000 .. 20,000,000".into(),
            Value::Int(300),
            Value::Int(120),
        ]);
        t.push_row(vec![
            Value::Int(220),
            "half-life 2".into(),
            Value::Int(0),
            Value::Int(0),
            "5,000,000 .. 10,000,000".into(),
            Value::Int(500),
            Value::Int(200),
        ]);
        t
    }

    fn find<'a>(output: &'a CatalogOutput, table: &str) -> &'a TableWrite {
        output.tables.iter().find(|w| w.table == table).unwrap()
    }

    #[test]
    fn unmatched_games_are_dropped_by_the_merge() {
        let output = run(&catalog_table(), &telemetry_table()).unwrap();
        assert_eq!(output.report.rows_processed, 2);
        let games = find(&output, "dim_game");
        let ids: Vec<i64> = games.rows.iter().map(|r| r[0].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![10, 220]);
    }

    #[test]
    fn colliding_name_column_resolves_to_the_catalog_side() {
        let merged = merge_inner(
            &catalog_table(),
            "appid",
            &telemetry_table(),
            "appid",
            CATALOG_TAG,
            TELEMETRY_TAG,
        )
        .unwrap();
        let bindings = CatalogBindings::resolve(&merged).unwrap();
        assert_eq!(bindings.name, "name_kg");
        let games = run(&catalog_table(), &telemetry_table()).unwrap();
        let dim_game = find(&games, "dim_game");
        assert_eq!(dim_game.rows[0][1], Value::Text("Counter-Strike".into()));
    }

    #[test]
    fn genre_dimension_covers_exactly_the_surviving_token_set() {
        let output = run(&catalog_table(), &telemetry_table()).unwrap();
        let genres = find(&output, "dim_genre");
        let names: Vec<String> = genres
            .rows
            .iter()
            .map(|r| r[1].text_form().unwrap())
            .collect();
        // "Casual" belongs to the unmatched game and must not appear.
        assert_eq!(names, vec!["Action", "Indie"]);
        let keys: Vec<i64> = genres.rows.iter().map(|r| r[0].as_i64().unwrap()).collect();
        assert_eq!(keys, vec![1, 2]);
    }

    #[test]
    fn bridge_rows_are_deduplicated_and_resolve_into_the_dimension() {
        let output = run(&catalog_table(), &telemetry_table()).unwrap();
        let genres = find(&output, "dim_genre");
        let genre_keys: HashSet<i64> = genres.rows.iter().map(|r| r[0].as_i64().unwrap()).collect();
        let bridge = find(&output, "bridge_game_genre");
        let pairs: Vec<(i64, i64)> = bridge
            .rows
            .iter()
            .map(|r| (r[0].as_i64().unwrap(), r[1].as_i64().unwrap()))
            .collect();
        let distinct: HashSet<_> = pairs.iter().collect();
        assert_eq!(distinct.len(), pairs.len());
        // "Action; Indie;Action" expands to exactly two edges.
        assert_eq!(pairs.iter().filter(|(appid, _)| *appid == 220).count(), 2);
        for (_, genre_id) in &pairs {
            assert!(genre_keys.contains(genre_id));
        }
    }

    #[test]
    fn review_ratio_survives_a_zero_total() {
        let output = run(&catalog_table(), &telemetry_table()).unwrap();
        let reviews = find(&output, "fact_review");
        // Half-Life 2 row has 0 positive / 0 negative.
        let row = reviews
            .rows
            .iter()
            .find(|r| r[0].as_i64() == Some(220))
            .unwrap();
        assert_eq!(row[3], Value::Float(0.0));
        let cs = reviews
            .rows
            .iter()
            .find(|r| r[0].as_i64() == Some(10))
            .unwrap();
        assert_eq!(cs[3], Value::Float(0.8));
    }

    #[test]
    fn playtime_facts_carry_telemetry_measures() {
        let output = run(&catalog_table(), &telemetry_table()).unwrap();
        let playtime = find(&output, "fact_playtime");
        assert_eq!(
            playtime.rows[0],
            vec![
                Value::Int(10),
                Value::Int(300),
                Value::Int(120),
                Value::Text("10,000,000 .. 20,000,000".into())
            ]
        );
    }

    #[test]
    fn all_outputs_use_append_semantics() {
        let output = run(&catalog_table(), &telemetry_table()).unwrap();
        assert!(output.tables.iter().all(|w| w.mode == WriteMode::Append));
        let names: Vec<&str> = output.tables.iter().map(|w| w.table).collect();
        assert_eq!(
            names,
            vec![
                "dim_game",
                "dim_genre",
                "bridge_game_genre",
                "fact_playtime",
                "fact_review"
            ]
        );
    }

    #[test]
    fn disjoint_sources_abort_before_any_derivation() {
        let mut lonely = RawTable::new(vec!["appid".into(), "genres".into()]);
        lonely.push_row(vec![Value::Int(1), "Action".into()]);
        let err = run(&catalog_table(), &lonely).unwrap_err();
        assert!(matches!(err, EtlError::EmptyJoinResult { .. }));
    }

    #[test]
    fn reruns_are_deterministic() {
        let a = run(&catalog_table(), &telemetry_table()).unwrap();
        let b = run(&catalog_table(), &telemetry_table()).unwrap();
        for (wa, wb) in a.tables.iter().zip(b.tables.iter()) {
            assert_eq!(wa.table, wb.table);
            assert_eq!(wa.rows, wb.rows);
        }
    }
}

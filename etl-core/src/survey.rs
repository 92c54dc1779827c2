//! Survey pipeline: one user-trend export → feedback star schema.
//!
//! Stage order is fixed: resolve bindings, build dimensions, extract
//! the detail table, then derive facts. Every output table is written
//! with full-replace semantics; a rerun recomputes everything from
//! scratch.

use crate::dimension::DimensionTable;
use crate::error::EtlError;
use crate::fact::{foreign_key, sentiment_key, CorrelationKey};
use crate::output::{ColType, Column, TableWrite, WriteMode};
use crate::report::RunReport;
use crate::resolve::{resolve_column, RoleSpec};
use crate::table::{RawTable, Value};

// Role → ordered candidate keyword table for the survey export. The
// headers are the Korean ones the trend spreadsheets actually carry.
pub const PERIOD: RoleSpec = RoleSpec {
    role: "period",
    keywords: &["기간", "동향"],
};
pub const REGION: RoleSpec = RoleSpec {
    role: "region",
    keywords: &["지역"],
};
pub const SOURCE: RoleSpec = RoleSpec {
    role: "source",
    keywords: &["출처"],
};
pub const TYPE: RoleSpec = RoleSpec {
    role: "type",
    keywords: &["유형", "카테고리", "분류"],
};
pub const SENTIMENT: RoleSpec = RoleSpec {
    role: "sentiment",
    keywords: &["부정"],
};
pub const TITLE: RoleSpec = RoleSpec {
    role: "title",
    keywords: &["제목", "title"],
};
pub const LINK: RoleSpec = RoleSpec {
    role: "link",
    keywords: &["링크", "url"],
};

/// Role bindings resolved once per input table.
#[derive(Debug, Clone)]
pub struct SurveyBindings {
    pub period: String,
    pub region: String,
    pub source: String,
    pub category: String,
    pub sentiment: String,
    pub title: String,
    pub link: String,
}

impl SurveyBindings {
    /// Resolution order matches the dimension build order; the resolver
    /// does not deduplicate across roles.
    pub fn resolve(table: &RawTable) -> Result<Self, EtlError> {
        let columns = table.columns();
        Ok(SurveyBindings {
            period: resolve_column(columns, &PERIOD)?,
            region: resolve_column(columns, &REGION)?,
            source: resolve_column(columns, &SOURCE)?,
            category: resolve_column(columns, &TYPE)?,
            sentiment: resolve_column(columns, &SENTIMENT)?,
            title: resolve_column(columns, &TITLE)?,
            link: resolve_column(columns, &LINK)?,
        })
    }
}

#[derive(Debug)]
pub struct SurveyOutput {
    pub tables: Vec<TableWrite>,
    pub report: RunReport,
}

/// Run the whole pipeline over one raw survey table.
pub fn run(table: &RawTable) -> Result<SurveyOutput, EtlError> {
    let bindings = SurveyBindings::resolve(table)?;
    let mut report = RunReport::default();

    // A survey row without a period, region or source is a corrupt
    // export; only the category column tolerates blanks.
    let d_period = DimensionTable::build(table, &bindings.period, "d_period", false)?;
    let d_region = DimensionTable::build(table, &bindings.region, "d_region", false)?;
    let d_source = DimensionTable::build(table, &bindings.source, "d_source", false)?;
    let d_type = DimensionTable::build(table, &bindings.category, "d_type", true)?;
    let d_sentiment = DimensionTable::sentiment();

    let raw_post = build_raw_posts(table, &bindings);
    let facts = build_feedback_facts(
        table,
        &bindings,
        &d_period,
        &d_region,
        &d_source,
        &d_type,
        &mut report,
    );

    report.rows_processed = table.row_count();

    let tables = vec![
        d_period.to_write("period_id", "period_name", WriteMode::Replace),
        d_region.to_write("region_id", "region_name", WriteMode::Replace),
        d_source.to_write("source_id", "source_name", WriteMode::Replace),
        d_type.to_write("type_id", "type_name", WriteMode::Replace),
        d_sentiment.to_write("sentiment_id", "sentiment_name", WriteMode::Replace),
        raw_post,
        facts,
    ];
    for write in &tables {
        report.record_table(write);
    }

    Ok(SurveyOutput { tables, report })
}

/// Title/link detail rows, keyed by the correlation key. Missing cells
/// become empty strings so the detail table has no holes.
fn build_raw_posts(table: &RawTable, bindings: &SurveyBindings) -> TableWrite {
    let mut write = TableWrite::new(
        "raw_post",
        WriteMode::Replace,
        vec![
            Column::new("post_id", ColType::Integer),
            Column::new("title", ColType::Text),
            Column::new("url", ColType::Text),
        ],
    );
    for (index, row) in table.rows().iter().enumerate() {
        let key = CorrelationKey::from_row_index(index);
        let title = table.cell(row, &bindings.title).text_form().unwrap_or_default();
        let url = table.cell(row, &bindings.link).text_form().unwrap_or_default();
        write.rows.push(vec![
            Value::Int(key.detail_id()),
            Value::Text(title),
            Value::Text(url),
        ]);
    }
    write
}

fn build_feedback_facts(
    table: &RawTable,
    bindings: &SurveyBindings,
    d_period: &DimensionTable,
    d_region: &DimensionTable,
    d_source: &DimensionTable,
    d_type: &DimensionTable,
    report: &mut RunReport,
) -> TableWrite {
    let mut write = TableWrite::new(
        "fact_user_feedback",
        WriteMode::Replace,
        vec![
            Column::new("feedback_id", ColType::Integer),
            Column::new("post_id", ColType::Integer),
            Column::new("period_id", ColType::Integer),
            Column::new("region_id", ColType::Integer),
            Column::new("source_id", ColType::Integer),
            Column::new("sentiment_id", ColType::Integer),
            Column::new("type_id", ColType::Integer),
        ],
    );
    for (index, row) in table.rows().iter().enumerate() {
        let key = CorrelationKey::from_row_index(index);
        let period_id = foreign_key(d_period, table.cell(row, &bindings.period), "period", report);
        let region_id = foreign_key(d_region, table.cell(row, &bindings.region), "region", report);
        let source_id = foreign_key(d_source, table.cell(row, &bindings.source), "source", report);
        let type_id = foreign_key(d_type, table.cell(row, &bindings.category), "type", report);
        let sentiment_id = match sentiment_key(table.cell(row, &bindings.sentiment)) {
            Some(k) => Value::Int(k),
            None => {
                report.record_unmapped("sentiment");
                Value::Null
            }
        };
        write.rows.push(vec![
            Value::Int(key.fact_id()),
            Value::Int(key.detail_id()),
            period_id,
            region_id,
            source_id,
            sentiment_id,
            type_id,
        ]);
    }
    write
}

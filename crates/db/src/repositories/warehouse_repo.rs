//! Read-only queries against the warehouse fact table.
//!
//! Table and column names come from configuration and are interpolated into
//! SQL, so they are validated as plain identifiers first.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use pipewatch_core::dataset::{CellValue, Column, ColumnKind, Dataset};
use pipewatch_core::types::Timestamp;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Column as _, PgPool, Row, TypeInfo};

use crate::error::DbError;
use crate::models::warehouse::VolumeStats;

/// Allowed identifier characters: alphanumeric and underscore.
fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a column name for interpolation.
pub fn validate_column(name: &str) -> Result<&str, DbError> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Validate a table name, optionally schema-qualified (`schema.table`).
pub fn validate_table(name: &str) -> Result<&str, DbError> {
    let mut parts = name.split('.');
    let valid = parts.clone().count() <= 2 && parts.all(is_safe_identifier);
    if valid {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Default snapshot query for `table`.
pub fn default_snapshot_query(table: &str) -> Result<String, DbError> {
    Ok(format!("SELECT * FROM {}", validate_table(table)?))
}

/// Postgres column types the snapshot decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PgKind {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Bool,
    Date,
    Timestamp,
    Timestamptz,
}

impl PgKind {
    fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "INT2" => PgKind::Int2,
            "INT4" => PgKind::Int4,
            "INT8" => PgKind::Int8,
            "FLOAT4" => PgKind::Float4,
            "FLOAT8" => PgKind::Float8,
            "NUMERIC" => PgKind::Numeric,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => PgKind::Text,
            "BOOL" => PgKind::Bool,
            "DATE" => PgKind::Date,
            "TIMESTAMP" => PgKind::Timestamp,
            "TIMESTAMPTZ" => PgKind::Timestamptz,
            _ => return None,
        })
    }

    fn column_kind(self) -> ColumnKind {
        match self {
            PgKind::Int2 | PgKind::Int4 | PgKind::Int8 => ColumnKind::Integer,
            PgKind::Float4 | PgKind::Float8 | PgKind::Numeric => ColumnKind::Float,
            PgKind::Text => ColumnKind::Text,
            PgKind::Bool => ColumnKind::Boolean,
            PgKind::Date | PgKind::Timestamp | PgKind::Timestamptz => ColumnKind::Timestamp,
        }
    }
}

fn decode_cell(row: &PgRow, idx: usize, kind: PgKind) -> Result<CellValue, sqlx::Error> {
    let cell = match kind {
        PgKind::Int2 => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| CellValue::Integer(i64::from(v))),
        PgKind::Int4 => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| CellValue::Integer(i64::from(v))),
        PgKind::Int8 => row.try_get::<Option<i64>, _>(idx)?.map(CellValue::Integer),
        PgKind::Float4 => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| CellValue::Float(f64::from(v))),
        PgKind::Float8 => row.try_get::<Option<f64>, _>(idx)?.map(CellValue::Float),
        PgKind::Numeric => match row.try_get::<Option<Decimal>, _>(idx)? {
            Some(value) => Some(CellValue::Float(numeric_to_float(value)?)),
            None => None,
        },
        PgKind::Text => row.try_get::<Option<String>, _>(idx)?.map(CellValue::Text),
        PgKind::Bool => row.try_get::<Option<bool>, _>(idx)?.map(CellValue::Boolean),
        PgKind::Date => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|d| CellValue::Timestamp(d.and_time(NaiveTime::MIN).and_utc())),
        PgKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|ts| CellValue::Timestamp(ts.and_utc())),
        PgKind::Timestamptz => row
            .try_get::<Option<Timestamp>, _>(idx)?
            .map(CellValue::Timestamp),
    };
    Ok(cell.unwrap_or(CellValue::Null))
}

/// `NUMERIC` measures are scored as floats.
fn numeric_to_float(value: Decimal) -> Result<f64, sqlx::Error> {
    value
        .to_f64()
        .ok_or_else(|| sqlx::Error::Decode(format!("NUMERIC {value} does not fit in f64").into()))
}

/// Provides read-only queries for the warehouse table.
pub struct WarehouseRepo;

impl WarehouseRepo {
    /// Run `query` and load the full result into a column-oriented [`Dataset`].
    ///
    /// A query returning no rows yields an empty dataset.
    pub async fn load_snapshot(pool: &PgPool, query: &str) -> Result<Dataset, DbError> {
        let rows = sqlx::query(query).fetch_all(pool).await?;
        let Some(first) = rows.first() else {
            return Ok(Dataset::default());
        };

        let layout = first
            .columns()
            .iter()
            .map(|c| {
                let type_name = c.type_info().name();
                PgKind::from_type_name(type_name)
                    .map(|kind| (c.name().to_string(), kind))
                    .ok_or_else(|| DbError::UnsupportedColumn {
                        column: c.name().to_string(),
                        type_name: type_name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut cells: Vec<Vec<CellValue>> = layout
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for row in &rows {
            for (idx, (_, kind)) in layout.iter().enumerate() {
                cells[idx].push(decode_cell(row, idx, *kind)?);
            }
        }

        let columns = layout
            .into_iter()
            .zip(cells)
            .map(|((name, kind), values)| Column::new(name, kind.column_kind(), values))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(rows = rows.len(), columns = columns.len(), "Loaded warehouse snapshot");
        Ok(Dataset::new(columns)?)
    }

    /// Newest value of `column`, or `None` for an empty table.
    pub async fn latest_timestamp(
        pool: &PgPool,
        table: &str,
        column: &str,
    ) -> Result<Option<Timestamp>, DbError> {
        let query = format!(
            "SELECT MAX({})::timestamptz FROM {}",
            validate_column(column)?,
            validate_table(table)?
        );
        let latest = sqlx::query_scalar::<_, Option<Timestamp>>(&query)
            .fetch_one(pool)
            .await?;
        Ok(latest)
    }

    /// Row count and time span of `table`, measured on `column`.
    pub async fn volume_stats(
        pool: &PgPool,
        table: &str,
        column: &str,
    ) -> Result<VolumeStats, DbError> {
        let column = validate_column(column)?;
        let query = format!(
            "SELECT COUNT(*) AS total_records, \
                    MIN({column})::timestamptz AS earliest, \
                    MAX({column})::timestamptz AS latest \
             FROM {}",
            validate_table(table)?
        );
        let stats = sqlx::query_as::<_, VolumeStats>(&query)
            .fetch_one(pool)
            .await?;
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

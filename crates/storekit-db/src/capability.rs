//! # Capability Interfaces
//!
//! The narrow contracts a connection or transaction handle offers to the
//! closures run by the executor.
//!
//! ## Who Implements What
//! ```text
//! ┌──────────────┬───────────────────────────────────────────────────────┐
//! │ Trait        │ Implementations                                       │
//! ├──────────────┼───────────────────────────────────────────────────────┤
//! │ Scanner      │ AnyRow (driver rows), Params (in-memory records)      │
//! │ Binder       │ Dialect (placeholder style of the connection)         │
//! │ Queryer      │ AnyPool, Transaction<'static, Any>                    │
//! │ Execer       │ AnyPool, Transaction<'static, Any>                    │
//! └──────────────┴───────────────────────────────────────────────────────┘
//! ```
//!
//! Arguments travel as [`Value`]s and are bound positionally in order.

use async_trait::async_trait;
use sqlx::any::{Any, AnyArguments, AnyQueryResult, AnyRow, AnyTypeInfoKind};
use sqlx::query::Query;
use sqlx::{AnyPool, Column, ColumnIndex, Database, Row, Transaction, ValueRef};
use storekit_core::{compile_named, Dialect, FromValue, Params, Value};
use tracing::debug;

use crate::error::{DbError, DbResult};

// =============================================================================
// Scanner
// =============================================================================

/// A row whose columns can be read by name or position.
pub trait Scanner {
    /// Column names in result order.
    fn column_names(&self) -> Vec<String>;

    fn value(&self, column: &str) -> DbResult<Value>;

    fn value_at(&self, index: usize) -> DbResult<Value>;
}

/// Typed reads on top of [`Scanner`].
///
/// ## Example
/// ```rust,ignore
/// let title: String = row.get("title")?;
/// let archived: Option<i64> = row.get("archived_at")?;
/// let total: i64 = row.get_at(0)?;
/// ```
pub trait ScanExt: Scanner {
    fn get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        T::from_value(self.value(column)?)
            .map_err(|e| DbError::Conversion(format!("column '{column}': {e}")))
    }

    fn get_at<T: FromValue>(&self, index: usize) -> DbResult<T> {
        T::from_value(self.value_at(index)?)
            .map_err(|e| DbError::Conversion(format!("column {index}: {e}")))
    }
}

impl<S: Scanner + ?Sized> ScanExt for S {}

fn decode_any<I>(row: &AnyRow, index: I) -> DbResult<Value>
where
    I: ColumnIndex<AnyRow> + Copy,
{
    let kind = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().kind()
    };

    let value = match kind {
        AnyTypeInfoKind::Null => Value::Null,
        AnyTypeInfoKind::Bool => Value::Bool(row.try_get(index)?),
        AnyTypeInfoKind::SmallInt => Value::Int(row.try_get::<i16, _>(index)?.into()),
        AnyTypeInfoKind::Integer => Value::Int(row.try_get::<i32, _>(index)?.into()),
        AnyTypeInfoKind::BigInt => Value::Int(row.try_get(index)?),
        AnyTypeInfoKind::Real => Value::Float(row.try_get::<f32, _>(index)?.into()),
        AnyTypeInfoKind::Double => Value::Float(row.try_get(index)?),
        AnyTypeInfoKind::Text => Value::Text(row.try_get(index)?),
        AnyTypeInfoKind::Blob => Value::Bytes(row.try_get(index)?),
    };

    Ok(value)
}

impl Scanner for AnyRow {
    fn column_names(&self) -> Vec<String> {
        Row::columns(self)
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    fn value(&self, column: &str) -> DbResult<Value> {
        decode_any(self, column)
    }

    fn value_at(&self, index: usize) -> DbResult<Value> {
        decode_any(self, index)
    }
}

/// Lets converters run against hand-built records, no database needed.
impl Scanner for Params {
    fn column_names(&self) -> Vec<String> {
        self.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn value(&self, column: &str) -> DbResult<Value> {
        self.get(column)
            .cloned()
            .ok_or_else(|| DbError::Conversion(format!("no column named '{column}'")))
    }

    fn value_at(&self, index: usize) -> DbResult<Value> {
        self.iter()
            .nth(index)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| DbError::Conversion(format!("column index {index} out of range")))
    }
}

// =============================================================================
// Binder
// =============================================================================

/// Expands named-parameter templates into the connection's positional form.
pub trait Binder: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn bind_named(&self, query: &str, params: &Params) -> DbResult<(String, Vec<Value>)> {
        Ok(compile_named(self.dialect(), query, params)?)
    }
}

impl Binder for Dialect {
    fn dialect(&self) -> Dialect {
        *self
    }
}

// =============================================================================
// Queryer / Execer
// =============================================================================

/// Outcome of a non-query statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Identity of the last inserted row, when the engine reports one.
    pub last_insert_id: Option<i64>,
}

impl From<AnyQueryResult> for ExecResult {
    fn from(result: AnyQueryResult) -> Self {
        ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        }
    }
}

/// Read access: row and rows queries.
#[async_trait]
pub trait Queryer: Send {
    /// Runs a query and collects every row in result order.
    async fn query(&mut self, sql: &str, args: Vec<Value>) -> DbResult<Vec<AnyRow>>;

    /// Runs a query expected to produce a row.
    ///
    /// ## Returns
    /// * `Ok(row)` - the first row
    /// * `Err(DbError::NoRows)` - the result set was empty
    async fn query_row(&mut self, sql: &str, args: Vec<Value>) -> DbResult<AnyRow>;
}

/// Read and write access.
#[async_trait]
pub trait Execer: Queryer {
    async fn exec(&mut self, sql: &str, args: Vec<Value>) -> DbResult<ExecResult>;

    /// Runs an INSERT and resolves the generated identity on the same
    /// connection.
    ///
    /// ## Returns
    /// * `last_insert_id: Some(id)` - reported by the driver, or looked up
    ///   with the dialect's identity query (SQLite `last_insert_rowid()`)
    /// * `last_insert_id: None` - the engine has no such notion (PostgreSQL)
    async fn insert(&mut self, dialect: Dialect, sql: &str, args: Vec<Value>)
        -> DbResult<ExecResult>;
}

type AnyConnection = <Any as Database>::Connection;

/// Binds positional arguments onto a sqlx query in order.
fn build_query(sql: &str, args: Vec<Value>) -> Query<'_, Any, AnyArguments<'_>> {
    args.into_iter()
        .fold(sqlx::query::<Any>(sql), |query, arg| match arg {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(b),
            Value::Int(i) => query.bind(i),
            Value::Float(f) => query.bind(f),
            Value::Text(s) => query.bind(s),
            Value::Bytes(b) => query.bind(b),
        })
}

#[async_trait]
impl Queryer for AnyPool {
    async fn query(&mut self, sql: &str, args: Vec<Value>) -> DbResult<Vec<AnyRow>> {
        debug!(sql = %sql, args = args.len(), "query");
        Ok(build_query(sql, args).fetch_all(&*self).await?)
    }

    async fn query_row(&mut self, sql: &str, args: Vec<Value>) -> DbResult<AnyRow> {
        debug!(sql = %sql, args = args.len(), "query row");
        Ok(build_query(sql, args).fetch_one(&*self).await?)
    }
}

/// Executes an INSERT on one connection, so the identity lookup sees the
/// row this statement created.
async fn insert_on(
    conn: &mut AnyConnection,
    dialect: Dialect,
    sql: &str,
    args: Vec<Value>,
) -> DbResult<ExecResult> {
    let mut result: ExecResult = build_query(sql, args).execute(&mut *conn).await?.into();

    if result.last_insert_id.is_none() {
        if let Some(lookup) = dialect.last_insert_id_query() {
            let id: i64 = sqlx::query_scalar::<Any, i64>(lookup)
                .fetch_one(&mut *conn)
                .await?;
            result.last_insert_id = Some(id);
        }
    }

    Ok(result)
}

#[async_trait]
impl Execer for AnyPool {
    async fn exec(&mut self, sql: &str, args: Vec<Value>) -> DbResult<ExecResult> {
        debug!(sql = %sql, args = args.len(), "exec");
        let result = build_query(sql, args).execute(&*self).await?;
        Ok(result.into())
    }

    async fn insert(
        &mut self,
        dialect: Dialect,
        sql: &str,
        args: Vec<Value>,
    ) -> DbResult<ExecResult> {
        debug!(sql = %sql, args = args.len(), "insert");
        let mut conn = self.acquire().await?;
        insert_on(&mut conn, dialect, sql, args).await
    }
}

#[async_trait]
impl Queryer for Transaction<'static, Any> {
    async fn query(&mut self, sql: &str, args: Vec<Value>) -> DbResult<Vec<AnyRow>> {
        debug!(sql = %sql, args = args.len(), "query (tx)");
        Ok(build_query(sql, args).fetch_all(&mut **self).await?)
    }

    async fn query_row(&mut self, sql: &str, args: Vec<Value>) -> DbResult<AnyRow> {
        debug!(sql = %sql, args = args.len(), "query row (tx)");
        Ok(build_query(sql, args).fetch_one(&mut **self).await?)
    }
}

#[async_trait]
impl Execer for Transaction<'static, Any> {
    async fn exec(&mut self, sql: &str, args: Vec<Value>) -> DbResult<ExecResult> {
        debug!(sql = %sql, args = args.len(), "exec (tx)");
        let result = build_query(sql, args).execute(&mut **self).await?;
        Ok(result.into())
    }

    async fn insert(
        &mut self,
        dialect: Dialect,
        sql: &str,
        args: Vec<Value>,
    ) -> DbResult<ExecResult> {
        debug!(sql = %sql, args = args.len(), "insert (tx)");
        insert_on(&mut **self, dialect, sql, args).await
    }
}

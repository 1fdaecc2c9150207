use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{self, postgres::PgArguments, FromRow, PgConnection};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::pagination::PageRequest;

/// A typed bind parameter. Nulls keep their column type so Postgres can
/// assign them without casts.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(Option<i32>),
    BigInt(Option<i64>),
    Text(Option<String>),
    Bool(Option<bool>),
    Uuid(Option<Uuid>),
    Decimal(Option<Decimal>),
    Date(Option<NaiveDate>),
    Json(Option<Value>),
}

macro_rules! sql_param_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for SqlParam {
            fn from(v: $ty) -> Self {
                SqlParam::$variant(Some(v))
            }
        }

        impl From<Option<$ty>> for SqlParam {
            fn from(v: Option<$ty>) -> Self {
                SqlParam::$variant(v)
            }
        }
    };
}

sql_param_from!(i32, Int);
sql_param_from!(i64, BigInt);
sql_param_from!(String, Text);
sql_param_from!(bool, Bool);
sql_param_from!(Uuid, Uuid);
sql_param_from!(Decimal, Decimal);
sql_param_from!(NaiveDate, Date);
sql_param_from!(Value, Json);

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(Some(v.to_string()))
    }
}

/// Final SQL text plus its positional parameters
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Accumulates a WHERE clause that always starts with the tenant predicate.
///
/// Conditions are AND-ed in the order they are added; placeholders are
/// numbered as parameters are bound, so the clause can be reused for both the
/// row query and its COUNT(*) twin.
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    conditions: Vec<String>,
    params: Vec<SqlParam>,
}

impl ScopedQuery {
    pub fn new(tenant_column: &str, tenant_id: i32) -> Self {
        Self {
            conditions: vec![format!("{} = $1", tenant_column)],
            params: vec![SqlParam::Int(Some(tenant_id))],
        }
    }

    /// Bind a parameter and return its placeholder
    pub fn bind(&mut self, param: impl Into<SqlParam>) -> String {
        self.params.push(param.into());
        format!("${}", self.params.len())
    }

    /// Add a literal condition (no parameters)
    pub fn and(&mut self, condition: impl Into<String>) -> &mut Self {
        self.conditions.push(condition.into());
        self
    }

    /// Add `column = $n`
    pub fn and_eq(&mut self, column: &str, param: impl Into<SqlParam>) -> &mut Self {
        let ph = self.bind(param);
        self.conditions.push(format!("{} = {}", column, ph));
        self
    }

    /// Add `column <op> $n` for comparisons such as `>=`
    pub fn and_cmp(&mut self, column: &str, op: &str, param: impl Into<SqlParam>) -> &mut Self {
        let ph = self.bind(param);
        self.conditions.push(format!("{} {} {}", column, op, ph));
        self
    }

    /// Substring match of one term across several text columns
    pub fn and_search(&mut self, columns: &[&str], term: &str) -> &mut Self {
        if columns.is_empty() {
            return self;
        }
        let ph = self.bind(format!("%{}%", term.trim()));
        let ors: Vec<String> = columns.iter().map(|c| format!("{} ILIKE {}", c, ph)).collect();
        self.conditions.push(format!("({})", ors.join(" OR ")));
        self
    }

    pub fn where_sql(&self) -> String {
        format!("WHERE {}", self.conditions.join(" AND "))
    }

    /// `LIMIT/OFFSET` for a page, or nothing when every row was requested
    pub fn page_sql(&mut self, page: &PageRequest) -> String {
        match page.limit() {
            Some(limit) => self.window_sql(limit as i64, page.offset()),
            None => String::new(),
        }
    }

    pub fn window_sql(&mut self, limit: i64, offset: i64) -> String {
        let limit_ph = self.bind(limit);
        let offset_ph = self.bind(offset);
        format!(" LIMIT {} OFFSET {}", limit_ph, offset_ph)
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn finish(&self, sql: String) -> SqlResult {
        SqlResult {
            query: sql,
            params: self.params.clone(),
        }
    }
}

/// SET list of an UPDATE built from a typed patch
#[derive(Debug, Clone, Default)]
pub struct Assignments {
    columns: Vec<(&'static str, SqlParam)>,
    raw: Vec<&'static str>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<SqlParam>) -> &mut Self {
        self.columns.push((column, value.into()));
        self
    }

    /// Set the column only when the patch carried a value
    pub fn set_some<T>(&mut self, column: &'static str, value: &Option<T>) -> &mut Self
    where
        T: Clone + Into<SqlParam>,
    {
        if let Some(v) = value {
            self.columns.push((column, v.clone().into()));
        }
        self
    }

    /// Set (or clear) a nullable column when the key was present
    pub fn set_nullable<T>(&mut self, column: &'static str, value: &Option<Option<T>>) -> &mut Self
    where
        T: Clone,
        Option<T>: Into<SqlParam>,
    {
        if let Some(v) = value {
            self.columns.push((column, v.clone().into()));
        }
        self
    }

    /// A parameterless assignment such as `updated_at = NOW()`
    pub fn touch(&mut self, raw: &'static str) -> &mut Self {
        self.raw.push(raw);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(c, _)| *c)
    }

    fn split(self) -> (Vec<String>, Vec<SqlParam>) {
        let mut params = Vec::with_capacity(self.columns.len() + 2);
        let mut sets = Vec::with_capacity(self.columns.len() + self.raw.len());

        for (column, value) in self.columns {
            params.push(value);
            sets.push(format!("{} = ${}", column, params.len()));
        }
        sets.extend(self.raw.iter().map(|r| r.to_string()));
        (sets, params)
    }

    /// `UPDATE <table> SET ... WHERE id = $n AND tenant_id = $m RETURNING *`
    pub fn into_update(self, table: &str, id: Uuid, tenant_id: i32) -> SqlResult {
        let (sets, mut params) = self.split();

        params.push(SqlParam::Uuid(Some(id)));
        let id_ph = params.len();
        params.push(SqlParam::Int(Some(tenant_id)));
        let tenant_ph = params.len();

        SqlResult {
            query: format!(
                "UPDATE {} SET {} WHERE id = ${} AND tenant_id = ${} RETURNING *",
                table,
                sets.join(", "),
                id_ph,
                tenant_ph
            ),
            params,
        }
    }

    /// `UPDATE <table> SET ... WHERE <key_column> = $n RETURNING *` for tables
    /// keyed by something other than a tenant-scoped uuid
    pub fn into_update_by(self, table: &str, key_column: &str, key: impl Into<SqlParam>) -> SqlResult {
        let (sets, mut params) = self.split();
        params.push(key.into());

        SqlResult {
            query: format!(
                "UPDATE {} SET {} WHERE {} = ${} RETURNING *",
                table,
                sets.join(", "),
                key_column,
                params.len()
            ),
            params,
        }
    }
}

/// Per-table keys for `pg_advisory_xact_lock(tenant_id, key)`.
///
/// Uniqueness checks take the lock first so check-then-write is atomic with
/// respect to other writers of the same tenant and table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TableLock {
    Accounts = 1,
    Contacts = 2,
    Stages = 3,
    CustomFields = 4,
    AccountContacts = 5,
    OpportunityContacts = 6,
    AccountRelationships = 7,
}

pub async fn lock_table(conn: &mut PgConnection, tenant_id: i32, lock: TableLock) -> Result<(), DatabaseError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(tenant_id)
        .bind(lock as i32)
        .execute(conn)
        .await?;
    Ok(())
}

pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v.clone() {
        SqlParam::Int(x) => q.bind(x),
        SqlParam::BigInt(x) => q.bind(x),
        SqlParam::Text(x) => q.bind(x),
        SqlParam::Bool(x) => q.bind(x),
        SqlParam::Uuid(x) => q.bind(x),
        SqlParam::Decimal(x) => q.bind(x),
        SqlParam::Date(x) => q.bind(x),
        SqlParam::Json(x) => q.bind(x),
    }
}

pub fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &SqlParam,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v.clone() {
        SqlParam::Int(x) => q.bind(x),
        SqlParam::BigInt(x) => q.bind(x),
        SqlParam::Text(x) => q.bind(x),
        SqlParam::Bool(x) => q.bind(x),
        SqlParam::Uuid(x) => q.bind(x),
        SqlParam::Decimal(x) => q.bind(x),
        SqlParam::Date(x) => q.bind(x),
        SqlParam::Json(x) => q.bind(x),
    }
}

/// Build a `query_as` with every parameter of `sql` bound
pub fn query_as_with<'q, O>(sql: &'q SqlResult) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    sql.params
        .iter()
        .fold(sqlx::query_as::<_, O>(&sql.query), |q, p| bind_param_query_as(q, p))
}

/// Build a plain `query` with every parameter of `sql` bound
pub fn query_with(sql: &SqlResult) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
    sql.params
        .iter()
        .fold(sqlx::query(&sql.query), |q, p| bind_param_query(q, p))
}

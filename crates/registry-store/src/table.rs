//! Table-agnostic operations on a [`Database`].
//!
//! These helpers know nothing about the registry schema: they create
//! tables from column definitions, insert rows from ordered
//! `(column, value)` lists, run arbitrary parameterized queries, and
//! describe or export whole tables.
//!
//! Table and column names are spliced into SQL text, so every identifier
//! is checked against `[A-Za-z_][A-Za-z0-9_]*` and emitted double-quoted.
//! Values are always bound as parameters.

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::frame::TableFrame;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// One row of values in column order.
pub type Row = Vec<Value>;

/// A column definition for [`Database::create_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// SQL type and constraint tokens, e.g. `["INTEGER", "PRIMARY KEY"]`.
    pub tokens: Vec<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, tokens: &[&str]) -> Self {
        Self {
            name: name.into(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Column metadata as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Ordinal position, starting at 0.
    pub cid: i64,
    pub name: String,
    /// Declared type, empty if none was declared.
    pub decl_type: String,
    pub not_null: bool,
    /// Default value as SQL text.
    pub default_value: Option<String>,
    /// Position within the primary key (1-based), or 0 if not part of it.
    pub pk: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  Generic operations
// ═══════════════════════════════════════════════════════════════════════

impl Database {
    /// Names of all tables in the database, in `sqlite_master` order.
    #[instrument(skip(self))]
    pub async fn get_all_tables(&self) -> StoreResult<Vec<String>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .await
    }

    /// Create table `name` with the given columns, in order.
    ///
    /// Fails if the table already exists.
    #[instrument(skip(self, columns), fields(columns = columns.len()))]
    pub async fn create_table(&self, name: &str, columns: &[ColumnDef]) -> StoreResult<()> {
        let sql = create_table_sql(name, columns)?;
        let table = name.to_string();
        self.execute(move |conn| {
            conn.execute(&sql, [])?;
            debug!(table = %table, "table created");
            Ok(())
        })
        .await
    }

    /// Every row of `table`, in physical column order.
    #[instrument(skip(self))]
    pub async fn get_all(&self, table: &str) -> StoreResult<Vec<Row>> {
        let sql = format!("SELECT * FROM {}", quote_ident(table)?);
        self.execute(move |conn| query_rows(conn, &sql, &[])).await
    }

    /// Insert one row and return its rowid.
    ///
    /// Columns are written in the order given.
    #[instrument(skip(self, data), fields(columns = data.len()))]
    pub async fn insert_row(&self, table: &str, data: &[(String, Value)]) -> StoreResult<i64> {
        let columns: Vec<String> = data.iter().map(|(col, _)| col.clone()).collect();
        let sql = insert_sql(table, &columns)?;
        let values: Row = data.iter().map(|(_, v)| v.clone()).collect();
        let table = table.to_string();

        self.execute(move |conn| {
            conn.execute(&sql, params_from_iter(values.iter()))?;
            let id = conn.last_insert_rowid();
            debug!(table = %table, rowid = id, "row inserted");
            Ok(id)
        })
        .await
    }

    /// Insert several rows in one transaction and return how many were written.
    ///
    /// Every row must carry the same set of columns as the first row; values
    /// are bound in the first row's column order whatever order a later row
    /// lists them in. A mismatch fails before anything is written, and a
    /// database error rolls back the whole batch.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn insert_many_rows(
        &self,
        table: &str,
        rows: &[Vec<(String, Value)>],
    ) -> StoreResult<usize> {
        let first = rows.first().ok_or_else(|| {
            StoreError::InvalidArgument("insert_many_rows requires at least one row".into())
        })?;
        let columns: Vec<String> = first.iter().map(|(col, _)| col.clone()).collect();
        let sql = insert_sql(table, &columns)?;

        let ordered = rows
            .iter()
            .enumerate()
            .map(|(i, row)| align_row(i, row, &columns))
            .collect::<StoreResult<Vec<Row>>>()?;
        let table = table.to_string();

        self.execute_mut(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for values in &ordered {
                    stmt.execute(params_from_iter(values.iter()))?;
                }
            }
            tx.commit()?;
            debug!(table = %table, rows = ordered.len(), "rows inserted");
            Ok(ordered.len())
        })
        .await
    }

    /// Run an arbitrary parameterized statement and return all result rows.
    #[instrument(skip(self, params), fields(params = params.len()))]
    pub async fn get(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.execute(move |conn| query_rows(conn, &sql, &params)).await
    }

    /// Column metadata for `table`; empty if the table does not exist.
    #[instrument(skip(self))]
    pub async fn describe_table(&self, table: &str) -> StoreResult<Vec<ColumnInfo>> {
        let quoted = quote_ident(table)?;
        self.execute(move |conn| table_info(conn, &quoted)).await
    }

    /// Column names of `table`, in ordinal order.
    pub async fn get_table_head(&self, table: &str) -> StoreResult<Vec<String>> {
        let info = self.describe_table(table).await?;
        Ok(info.into_iter().map(|c| c.name).collect())
    }

    /// The whole table as a [`TableFrame`].
    #[instrument(skip(self))]
    pub async fn convert_table_to_df(&self, table: &str) -> StoreResult<TableFrame> {
        let quoted = quote_ident(table)?;
        self.execute(move |conn| {
            let columns = table_info(conn, &quoted)?
                .into_iter()
                .map(|c| c.name)
                .collect();
            let rows = query_rows(conn, &format!("SELECT * FROM {quoted}"), &[])?;
            Ok(TableFrame { columns, rows })
        })
        .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  SQL building
// ═══════════════════════════════════════════════════════════════════════

/// Validate an identifier and return it double-quoted.
pub(crate) fn quote_ident(name: &str) -> StoreResult<String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(StoreError::InvalidArgument(format!(
            "invalid identifier: {name:?}"
        )));
    }
    Ok(format!("\"{name}\""))
}

fn create_table_sql(name: &str, columns: &[ColumnDef]) -> StoreResult<String> {
    if columns.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "table {name} needs at least one column"
        )));
    }
    let defs = columns
        .iter()
        .map(|col| {
            let mut def = quote_ident(&col.name)?;
            for token in &col.tokens {
                def.push(' ');
                def.push_str(token);
            }
            Ok(def)
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(format!("CREATE TABLE {} ({})", quote_ident(name)?, defs.join(", ")))
}

fn insert_sql(table: &str, columns: &[String]) -> StoreResult<String> {
    if columns.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "insert into {table} needs at least one column"
        )));
    }
    let mut seen = HashSet::new();
    for col in columns {
        if !seen.insert(col.as_str()) {
            return Err(StoreError::InvalidArgument(format!(
                "duplicate column in insert: {col}"
            )));
        }
    }

    let quoted = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<StoreResult<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table)?,
        quoted.join(", "),
        placeholders.join(", ")
    ))
}

/// Reorder `row`'s values to follow `columns`, failing if the column sets differ.
fn align_row(index: usize, row: &[(String, Value)], columns: &[String]) -> StoreResult<Row> {
    let mismatch = || {
        let got: Vec<&str> = row.iter().map(|(c, _)| c.as_str()).collect();
        StoreError::InvalidArgument(format!(
            "row {index} has columns [{}], expected [{}]",
            got.join(", "),
            columns.join(", ")
        ))
    };

    if row.len() != columns.len() {
        return Err(mismatch());
    }
    columns
        .iter()
        .map(|col| {
            row.iter()
                .find(|(c, _)| c == col)
                .map(|(_, v)| v.clone())
                .ok_or_else(mismatch)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
//  Connection-level helpers
// ═══════════════════════════════════════════════════════════════════════

/// Run `sql` with positional `params` and collect every row.
pub(crate) fn query_rows(conn: &Connection, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|i| row.get::<_, Value>(i))
            .collect::<Result<Row, _>>()?;
        out.push(values);
    }
    Ok(out)
}

/// `PRAGMA table_info` for an already-quoted table name.
pub(crate) fn table_info(conn: &Connection, quoted: &str) -> StoreResult<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({quoted})"))?;
    let info = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                decl_type: row.get(2)?,
                not_null: row.get(3)?,
                default_value: row.get(4)?,
                pk: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(info)
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn pets_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("id", &["INTEGER", "PRIMARY KEY", "AUTOINCREMENT"]),
            ColumnDef::new("name", &["TEXT", "NOT NULL"]),
            ColumnDef::new("legs", &["INTEGER", "DEFAULT 4"]),
        ]
    }

    fn pet(name: &str, legs: i64) -> Vec<(String, Value)> {
        vec![
            ("name".to_string(), Value::Text(name.into())),
            ("legs".to_string(), Value::Integer(legs)),
        ]
    }

    async fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_table("pets", &pets_columns()).await.unwrap();
        db
    }

    #[test]
    fn create_table_sql_keeps_column_order() {
        let sql = create_table_sql("pets", &pets_columns()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"pets\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT NOT NULL, \"legs\" INTEGER DEFAULT 4)"
        );
    }

    #[test]
    fn identifiers_are_validated() {
        assert_eq!(quote_ident("users").unwrap(), "\"users\"");
        assert_eq!(quote_ident("_tmp2").unwrap(), "\"_tmp2\"");
        assert!(quote_ident("").is_err());
        assert!(quote_ident("2fast").is_err());
        assert!(quote_ident("users; DROP TABLE types").is_err());
        assert!(quote_ident("na\"me").is_err());
    }

    #[test]
    fn insert_sql_rejects_duplicates_and_empty() {
        let sql = insert_sql("pets", &["name".into(), "legs".into()]).unwrap();
        assert_eq!(sql, "INSERT INTO \"pets\" (\"name\", \"legs\") VALUES (?1, ?2)");

        assert!(insert_sql("pets", &[]).is_err());
        assert!(insert_sql("pets", &["name".into(), "name".into()]).is_err());
    }

    #[tokio::test]
    async fn create_and_list_tables() {
        let db = setup_db().await;
        let tables = db.get_all_tables().await.unwrap();
        assert!(tables.contains(&"pets".to_string()));
    }

    #[tokio::test]
    async fn create_existing_table_fails() {
        let db = setup_db().await;
        let result = db.create_table("pets", &pets_columns()).await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[tokio::test]
    async fn create_table_without_columns_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = db.create_table("empty", &[]).await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn insert_row_returns_rowid() {
        let db = setup_db().await;
        let first = db.insert_row("pets", &pet("cat", 4)).await.unwrap();
        let second = db.insert_row("pets", &pet("bird", 2)).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let rows = db.get_all("pets").await.unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(1), Value::Text("cat".into()), Value::Integer(4)],
                vec![Value::Integer(2), Value::Text("bird".into()), Value::Integer(2)],
            ]
        );
    }

    #[tokio::test]
    async fn insert_row_unknown_column_fails() {
        let db = setup_db().await;
        let data = vec![("wings".to_string(), Value::Integer(2))];
        let result = db.insert_row("pets", &data).await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[tokio::test]
    async fn insert_row_missing_not_null_fails() {
        let db = setup_db().await;
        let data = vec![("legs".to_string(), Value::Integer(8))];
        let result = db.insert_row("pets", &data).await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[tokio::test]
    async fn insert_many_rows_aligns_column_order() {
        let db = setup_db().await;
        let reordered = vec![
            ("legs".to_string(), Value::Integer(0)),
            ("name".to_string(), Value::Text("snake".into())),
        ];
        let inserted = db
            .insert_many_rows("pets", &[pet("dog", 4), reordered])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let rows = db
            .get("SELECT name, legs FROM pets ORDER BY id", &[])
            .await
            .unwrap();
        assert_eq!(rows[1], vec![Value::Text("snake".into()), Value::Integer(0)]);
    }

    #[tokio::test]
    async fn insert_many_rows_rejects_mismatched_columns() {
        let db = setup_db().await;
        let short = vec![("name".to_string(), Value::Text("fish".into()))];
        let result = db.insert_many_rows("pets", &[pet("dog", 4), short]).await;
        match result {
            Err(StoreError::InvalidArgument(msg)) => assert!(msg.contains("row 1"), "got: {msg}"),
            other => panic!("expected InvalidArgument, got: {other:?}"),
        }
        assert!(db.get_all("pets").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_many_rows_rolls_back_on_failure() {
        let db = setup_db().await;
        let nameless = vec![
            ("name".to_string(), Value::Null),
            ("legs".to_string(), Value::Integer(6)),
        ];
        let result = db.insert_many_rows("pets", &[pet("dog", 4), nameless]).await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
        assert!(db.get_all("pets").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_many_rows_requires_rows() {
        let db = setup_db().await;
        let result = db.insert_many_rows("pets", &[]).await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn get_binds_parameters() {
        let db = setup_db().await;
        db.insert_many_rows("pets", &[pet("cat", 4), pet("bird", 2)])
            .await
            .unwrap();

        let rows = db
            .get("SELECT name FROM pets WHERE legs = ?1", &[Value::Integer(2)])
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Text("bird".into())]]);
    }

    #[tokio::test]
    async fn describe_and_head() {
        let db = setup_db().await;
        let info = db.describe_table("pets").await.unwrap();
        assert_eq!(info.len(), 3);

        assert_eq!(info[0].name, "id");
        assert_eq!(info[0].decl_type, "INTEGER");
        assert_eq!(info[0].pk, 1);
        assert!(info[1].not_null);
        assert_eq!(info[2].cid, 2);
        assert_eq!(info[2].default_value.as_deref(), Some("4"));

        let head = db.get_table_head("pets").await.unwrap();
        assert_eq!(head, vec!["id", "name", "legs"]);

        assert!(db.describe_table("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn convert_table_to_frame() {
        let db = setup_db().await;
        db.insert_row("pets", &pet("cat", 4)).await.unwrap();

        let frame = db.convert_table_to_df("pets").await.unwrap();
        assert_eq!(frame.columns, vec!["id", "name", "legs"]);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.column("name").unwrap(), vec![&Value::Text("cat".into())]);
    }

    #[tokio::test]
    async fn bad_table_name_is_rejected_before_sql() {
        let db = setup_db().await;
        let result = db.get_all("pets; DROP TABLE pets").await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        assert!(db.get_all_tables().await.unwrap().contains(&"pets".to_string()));
    }
}

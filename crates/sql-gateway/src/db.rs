use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Execution metadata reported alongside the rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryMeta {
    /// Wall-clock execution time in milliseconds
    pub duration: f64,
    pub rows_read: u64,
    pub rows_written: u64,
    pub changes: u64,
    pub last_row_id: i64,
    pub changed_db: bool,
}

/// Fully materialized result of one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub success: bool,
    pub results: Vec<Map<String, Value>>,
    pub meta: QueryMeta,
}

impl QueryResult {
    pub fn rows(results: Vec<Map<String, Value>>, meta: QueryMeta) -> Self {
        Self {
            success: true,
            results,
            meta,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The database rejected or failed the statement.
    #[error("{message}")]
    Failed { message: String, transient: bool },

    #[error("query exceeded the {}s execution deadline", .0.as_secs_f64())]
    Timeout(Duration),

    /// The binding could not be used at all (poisoned lock, worker crash).
    #[error("{0}")]
    Unavailable(String),
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        ExecutionError::Failed {
            message: message.into(),
            transient: false,
        }
    }

    /// Busy/locked databases and deadline expiry may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ExecutionError::Failed { transient, .. } => *transient,
            ExecutionError::Timeout(_) => true,
            ExecutionError::Unavailable(_) => false,
        }
    }
}

impl From<rusqlite::Error> for ExecutionError {
    fn from(e: rusqlite::Error) -> Self {
        let transient = matches!(
            e.sqlite_error_code(),
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
        );
        ExecutionError::Failed {
            message: e.to_string(),
            transient,
        }
    }
}

/// A database binding: prepares `statement`, binds `parameters` positionally,
/// runs it to completion and returns every row.
///
/// Implementations block; callers are expected to run them off the async
/// executor.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, statement: &str, parameters: &[Value]) -> Result<QueryResult, ExecutionError>;
}

/// SQLite binding backed by a single guarded connection.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExecutor {
    pub fn open(path: &str) -> Result<Self, ExecutionError> {
        let conn = Connection::open(path)?;

        // WAL lets readers proceed while a write is in flight
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, ExecutionError> {
        Self::open(":memory:")
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, statement: &str, parameters: &[Value]) -> Result<QueryResult, ExecutionError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ExecutionError::Unavailable("database lock poisoned".to_string()))?;

        let start = Instant::now();
        let bound = parameters
            .iter()
            .enumerate()
            .map(|(idx, value)| bind_value(idx + 1, value))
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(statement)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let readonly = stmt.readonly();

        let mut results = Vec::new();
        let mut rows = stmt.query(params_from_iter(bound.iter()))?;
        while let Some(row) = rows.next()? {
            let mut record = Map::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), column_value(row.get_ref(idx)?));
            }
            results.push(record);
        }
        drop(rows);

        // changes() still reports the previous write after a read-only statement
        let changes = if readonly { 0 } else { conn.changes() as u64 };
        let meta = QueryMeta {
            duration: start.elapsed().as_secs_f64() * 1000.0,
            rows_read: results.len() as u64,
            rows_written: changes,
            changes,
            last_row_id: conn.last_insert_rowid(),
            changed_db: changes > 0,
        };

        Ok(QueryResult::rows(results, meta))
    }
}

fn bind_value(position: usize, value: &Value) -> Result<SqlValue, ExecutionError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real).ok_or_else(|| {
                ExecutionError::failed(format!("parameter {} is not a representable number", position))
            }),
        },
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(ExecutionError::failed(format!(
            "Type '{}' not supported for parameter {}",
            if value.is_array() { "array" } else { "object" },
            position
        ))),
    }
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> SqliteExecutor {
        let db = SqliteExecutor::in_memory().unwrap();
        db.execute(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT UNIQUE, price REAL, data BLOB)",
            &[],
        )
        .unwrap();
        db
    }

    #[test]
    fn test_insert_reports_changes() {
        let db = seeded();
        let res = db
            .execute(
                "INSERT INTO items (name, price) VALUES (?, ?)",
                &[json!("widget"), json!(2.5)],
            )
            .unwrap();

        assert!(res.success);
        assert!(res.results.is_empty());
        assert_eq!(res.meta.changes, 1);
        assert_eq!(res.meta.last_row_id, 1);
        assert!(res.meta.changed_db);
    }

    #[test]
    fn test_select_returns_rows_as_objects() {
        let db = seeded();
        db.execute(
            "INSERT INTO items (name, price, data) VALUES (?, ?, x'0102')",
            &[json!("widget"), json!(3)],
        )
        .unwrap();

        let res = db.execute("SELECT id, name, price, data FROM items", &[]).unwrap();
        assert_eq!(res.results.len(), 1);
        assert_eq!(res.meta.changes, 0);
        assert!(!res.meta.changed_db);

        let row = Value::Object(res.results[0].clone());
        assert_eq!(row, json!({"id": 1, "name": "widget", "price": 3.0, "data": [1, 2]}));
    }

    #[test]
    fn test_parameter_types() {
        let db = SqliteExecutor::in_memory().unwrap();
        let res = db
            .execute(
                "SELECT ? AS n, ? AS b, ? AS s, ? AS f",
                &[Value::Null, json!(true), json!("x"), json!(1.5)],
            )
            .unwrap();
        assert_eq!(
            Value::Object(res.results[0].clone()),
            json!({"n": null, "b": 1, "s": "x", "f": 1.5})
        );
    }

    #[test]
    fn test_nested_parameter_rejected() {
        let db = SqliteExecutor::in_memory().unwrap();
        let err = db.execute("SELECT ?", &[json!({"a": 1})]).unwrap_err();
        assert_eq!(err.to_string(), "Type 'object' not supported for parameter 1");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unique_violation_message() {
        let db = seeded();
        db.execute("INSERT INTO items (name) VALUES (?)", &[json!("dup")])
            .unwrap();
        let err = db
            .execute("INSERT INTO items (name) VALUES (?)", &[json!("dup")])
            .unwrap_err();
        assert!(err.to_string().starts_with("UNIQUE constraint failed"));
    }

    #[test]
    fn test_syntax_error_is_failure() {
        let db = SqliteExecutor::in_memory().unwrap();
        let err = db.execute("SELEC 1", &[]).unwrap_err();
        assert!(matches!(err, ExecutionError::Failed { .. }));
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let db = SqliteExecutor::in_memory().unwrap();
        assert!(db.execute("SELECT ?, ?", &[json!(1)]).is_err());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(ExecutionError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!ExecutionError::Unavailable("gone".into()).is_transient());
    }
}

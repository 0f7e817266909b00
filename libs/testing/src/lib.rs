//! # mdm-testing
//!
//! In-process fakes for exercising the MDM API without network services.
//!
//! [`FakeWarehouse`] keeps rows in memory keyed by one column. It understands
//! just enough of the statements the API issues:
//!
//! - a `SELECT` binding the key parameter returns the matching row
//! - any other `SELECT` returns every row, unless a responder registered via
//!   [`FakeWarehouse::respond_to`] claims it
//! - an `UPDATE` binding the key parameter assigns every other bound
//!   parameter to the column of the same name
//! - `insert_rows` appends rows
//!
//! Every call is recorded so tests can assert on what was sent.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mdm_warehouse::{
    InsertError, ParameterValue, Row, Statement, TableRef, Warehouse, WarehouseError,
};
use serde_json::Value;

type Matcher = Box<dyn Fn(&Statement) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&Statement, &[Row]) -> Vec<Row> + Send + Sync>;

/// A call made against the fake.
#[derive(Debug, Clone)]
pub enum Recorded {
    Query(Statement),
    Statement(Statement),
    Insert { table: TableRef, rows: Vec<Row> },
}

/// In-memory [`Warehouse`].
#[derive(Clone)]
pub struct FakeWarehouse {
    inner: Arc<Mutex<FakeState>>,
}

struct FakeState {
    key_column: String,
    key_param: String,
    rows: Vec<Row>,
    calls: Vec<Recorded>,
    responders: Vec<(Matcher, Responder)>,
    reject_inserts: bool,
    unavailable: bool,
}

impl FakeWarehouse {
    /// Create a fake whose rows are identified by `key_column`, looked up
    /// through the parameter named `key_param`.
    pub fn new(key_column: impl Into<String>, key_param: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                key_column: key_column.into(),
                key_param: key_param.into(),
                rows: Vec::new(),
                calls: Vec::new(),
                responders: Vec::new(),
                reject_inserts: false,
                unavailable: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        // A panic inside a test thread poisons the lock; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a row.
    pub fn seed(&self, row: Row) {
        self.state().rows.push(row);
    }

    /// Answer queries matching `matcher` with `responder` instead of the
    /// default behaviour. Later registrations take precedence.
    pub fn respond_to<M, R>(&self, matcher: M, responder: R)
    where
        M: Fn(&Statement) -> bool + Send + Sync + 'static,
        R: Fn(&Statement, &[Row]) -> Vec<Row> + Send + Sync + 'static,
    {
        self.state()
            .responders
            .insert(0, (Box::new(matcher), Box::new(responder)));
    }

    /// Make `insert_rows` report every row as rejected.
    pub fn reject_inserts(&self, reject: bool) {
        self.state().reject_inserts = reject;
    }

    /// Make every call fail as if the engine were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// The stored row whose key column equals `key`.
    pub fn find(&self, key: &str) -> Option<Row> {
        let state = self.state();
        state
            .rows
            .iter()
            .find(|row| row.get(&state.key_column).and_then(Value::as_str) == Some(key))
            .cloned()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Recorded> {
        self.state().calls.clone()
    }

    /// Statements passed to `execute_statement`.
    pub fn statements(&self) -> Vec<Statement> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Recorded::Statement(stmt) => Some(stmt),
                _ => None,
            })
            .collect()
    }

    /// Number of `insert_rows` calls.
    pub fn insert_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Recorded::Insert { .. }))
            .count()
    }

    /// Number of calls that wrote anything (inserts plus statements).
    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| !matches!(call, Recorded::Query(_)))
            .count()
    }
}

fn unavailable() -> WarehouseError {
    WarehouseError::Api {
        status: 503,
        message: "fake warehouse unavailable".to_string(),
    }
}

fn param_to_json(value: &ParameterValue) -> Value {
    match value {
        ParameterValue::Int64(n) => Value::from(*n),
        other => other.wire_value().map(Value::String).unwrap_or(Value::Null),
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn execute_query(&self, statement: &Statement) -> Result<Vec<Row>, WarehouseError> {
        let mut state = self.state();
        state.calls.push(Recorded::Query(statement.clone()));
        if state.unavailable {
            return Err(unavailable());
        }

        if let Some((_, responder)) = state.responders.iter().find(|(m, _)| m(statement)) {
            return Ok(responder(statement, &state.rows));
        }

        let key = statement
            .param(&state.key_param)
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let rows = match key {
            Some(key) => state
                .rows
                .iter()
                .filter(|row| row.get(&state.key_column).and_then(Value::as_str) == Some(key.as_str()))
                .cloned()
                .collect(),
            None => state.rows.clone(),
        };
        Ok(rows)
    }

    async fn execute_statement(&self, statement: &Statement) -> Result<u64, WarehouseError> {
        let mut state = self.state();
        state.calls.push(Recorded::Statement(statement.clone()));
        if state.unavailable {
            return Err(unavailable());
        }

        if !statement.sql.trim_start().to_ascii_uppercase().starts_with("UPDATE") {
            return Ok(0);
        }

        let Some(key) = statement
            .param(&state.key_param)
            .and_then(|v| v.as_str())
            .map(str::to_string)
        else {
            return Ok(0);
        };

        let FakeState {
            key_column,
            key_param,
            rows,
            ..
        } = &mut *state;

        let mut affected = 0;
        for row in rows
            .iter_mut()
            .filter(|row| row.get(key_column.as_str()).and_then(Value::as_str) == Some(key.as_str()))
        {
            for param in statement.params.iter().filter(|p| p.name != *key_param) {
                row.insert(param.name.clone(), param_to_json(&param.value));
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: Vec<Row>,
    ) -> Result<Vec<InsertError>, WarehouseError> {
        let mut state = self.state();
        state.calls.push(Recorded::Insert {
            table: table.clone(),
            rows: rows.clone(),
        });
        if state.unavailable {
            return Err(unavailable());
        }

        if state.reject_inserts {
            return Ok((0..rows.len())
                .map(|index| InsertError {
                    index,
                    reason: "invalid".to_string(),
                    message: "row rejected by fake warehouse".to_string(),
                })
                .collect());
        }

        state.rows.extend(rows);
        Ok(Vec::new())
    }
}

//! Read-only access to the task store
//!
//! The estimator never writes tasks. `SqliteTaskStore` reads the
//! project-management database; `InMemoryTaskStore` backs tests and
//! embedders that already hold their tasks.

use crate::error::{EstimationError, Result};
use crate::models::{Priority, TaskRecord, TaskType};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row};
use std::path::Path;
use tracing::debug;

/// Filter for `TaskStore::query_tasks`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub project_id: Option<String>,
    pub status: Option<String>,
    /// Only tasks with a positive estimate
    pub with_estimate_only: bool,
    pub limit: Option<usize>,
}

impl TaskQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_estimate(mut self) -> Self {
        self.with_estimate_only = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, task: &TaskRecord) -> bool {
        self.project_id
            .as_ref()
            .map_or(true, |p| task.project_id.as_ref() == Some(p))
            && self
                .status
                .as_ref()
                .map_or(true, |s| task.status.as_ref() == Some(s))
            && (!self.with_estimate_only || task.valid_estimate().is_some())
    }
}

/// Source of task records
pub trait TaskStore {
    /// Fetch one task, failing with `NotFound` when absent
    fn get_task(&self, id: &str) -> Result<TaskRecord>;

    /// Fetch every task matching `query`
    fn query_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>>;
}

/// Task store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Vec<TaskRecord>,
}

impl InMemoryTaskStore {
    pub fn new(tasks: Vec<TaskRecord>) -> Self {
        Self { tasks }
    }

    pub fn insert(&mut self, task: TaskRecord) {
        self.tasks.retain(|t| t.id != task.id);
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn get_task(&self, id: &str) -> Result<TaskRecord> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| EstimationError::NotFound(id.to_string()))
    }

    fn query_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>> {
        Ok(self
            .tasks
            .iter()
            .filter(|t| query.matches(t))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

const TASK_COLUMNS: &str =
    "id, project_id, parent_id, type, priority, status, title, description, estimate_points";

/// Task store backed by the project-management SQLite database
pub struct SqliteTaskStore {
    conn: Connection,
}

impl SqliteTaskStore {
    /// Open the database read-only
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| EstimationError::Store(format!("Failed to open {:?}: {}", path, e)))?;
        debug!(path = %path.display(), "Opened task database");
        Ok(Self { conn })
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn row_to_task(row: &Row) -> rusqlite::Result<TaskRecord> {
        Ok(TaskRecord {
            id: row.get(0)?,
            project_id: row.get(1)?,
            parent_id: row.get(2)?,
            task_type: TaskType::from(row.get::<_, Option<String>>(3)?),
            priority: Priority::from(row.get::<_, Option<String>>(4)?),
            status: row.get(5)?,
            title: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            description: row.get(7)?,
            estimate_points: row.get(8)?,
        })
    }
}

impl TaskStore for SqliteTaskStore {
    fn get_task(&self, id: &str) -> Result<TaskRecord> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map([id], Self::row_to_task)?;
        let first = rows.next();
        match first {
            Some(row) => Ok(row?),
            None => Err(EstimationError::NotFound(id.to_string())),
        }
    }

    fn query_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>> {
        let mut sql = format!("SELECT {} FROM tasks WHERE 1 = 1", TASK_COLUMNS);
        let mut params: Vec<Value> = Vec::new();

        if let Some(project_id) = &query.project_id {
            params.push(Value::Text(project_id.clone()));
            sql.push_str(&format!(" AND project_id = ?{}", params.len()));
        }
        if let Some(status) = &query.status {
            params.push(Value::Text(status.clone()));
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }
        if query.with_estimate_only {
            sql.push_str(" AND estimate_points > 0");
        }
        if let Some(limit) = query.limit {
            params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" LIMIT ?{}", params.len()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), Self::row_to_task)?;
        let tasks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = tasks.len(), "Queried tasks");
        Ok(tasks)
    }
}

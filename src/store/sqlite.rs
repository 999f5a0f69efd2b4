/*!
SQLite-backed `Store`.

Each table is a thin envelope (`id`, a few filterable columns, `data_json`)
around the aggregate's own serde encoding — the same row-shaped storage
decision the in-memory store makes, just durable. Embedded migrations
(`sqlx::migrate!("./migrations")`) run once on connect.
*/

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;

use super::{FlowRunPage, Store, StoreError};
use crate::domain::{FlowRun, FlowStepRun, Lesson, LlmRequest, Unit};
use crate::ids::{FlowRunId, FlowStepRunId, LessonId, LlmRequestId, UnitId};

pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

impl SqliteStore {
    /// Connect (or create) the SQLite database at `database_url` and run
    /// embedded migrations. Example: `sqlite://lessonforge.db`.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("connect error: {e}")))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failure: {e}")))?;
        Ok(Self { pool: Arc::new(pool) })
    }

    fn backend(e: sqlx::Error) -> StoreError {
        StoreError::Backend(e.to_string())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Backend(format!("encode: {e}")))
}

fn decode<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, StoreError> {
    serde_json::from_str(json).map_err(|e| StoreError::Backend(format!("decode: {e}")))
}

fn row_to<T: serde::de::DeserializeOwned>(row: SqliteRow) -> Result<T, StoreError> {
    let data_json: String = row.try_get("data_json").map_err(SqliteStore::backend)?;
    decode(&data_json)
}

#[async_trait]
impl Store for SqliteStore {
    #[instrument(skip(self, run), err)]
    async fn insert_flow_run(&self, run: &FlowRun) -> Result<(), StoreError> {
        let data = encode(run)?;
        sqlx::query(
            "INSERT INTO flow_runs (id, flow_name, status, last_heartbeat, created_order, data_json)
             VALUES (?, ?, ?, ?, (SELECT COALESCE(MAX(created_order), -1) + 1 FROM flow_runs), ?)",
        )
        .bind(run.id.to_string())
        .bind(&run.flow_name)
        .bind(format!("{:?}", run.status).to_lowercase())
        .bind(run.last_heartbeat.map(|ts| ts.to_rfc3339()))
        .bind(data)
        .execute(&*self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(())
    }

    #[instrument(skip(self, run), err)]
    async fn update_flow_run(&self, run: &FlowRun) -> Result<(), StoreError> {
        let data = encode(run)?;
        let result = sqlx::query(
            "UPDATE flow_runs SET status = ?, last_heartbeat = ?, data_json = ? WHERE id = ?",
        )
        .bind(format!("{:?}", run.status).to_lowercase())
        .bind(run.last_heartbeat.map(|ts| ts.to_rfc3339()))
        .bind(data)
        .bind(run.id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(Self::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind: "flow_run", id: run.id.to_string() });
        }
        Ok(())
    }

    async fn get_flow_run(&self, id: FlowRunId) -> Result<FlowRun, StoreError> {
        let row = sqlx::query("SELECT data_json FROM flow_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(Self::backend)?
            .ok_or_else(|| StoreError::NotFound { kind: "flow_run", id: id.to_string() })?;
        row_to(row)
    }

    async fn list_flow_runs(&self, page: u32, page_size: u32) -> Result<FlowRunPage, StoreError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS c FROM flow_runs")
            .fetch_one(&*self.pool)
            .await
            .map_err(Self::backend)?
            .try_get("c")
            .map_err(Self::backend)?;
        let rows = sqlx::query(
            "SELECT data_json FROM flow_runs ORDER BY created_order DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page_size))
        .bind(i64::from(page) * i64::from(page_size))
        .fetch_all(&*self.pool)
        .await
        .map_err(Self::backend)?;
        let runs = rows.into_iter().map(row_to).collect::<Result<Vec<_>, _>>()?;
        Ok(FlowRunPage { runs, total: total.max(0) as u64 })
    }

    async fn list_stale_flow_runs(&self, older_than_seconds: i64) -> Result<Vec<FlowRun>, StoreError> {
        let cutoff: DateTime<Utc> = Utc::now() - chrono::Duration::seconds(older_than_seconds);
        let rows = sqlx::query(
            "SELECT data_json FROM flow_runs
             WHERE status NOT IN ('completed', 'failed', 'cancelled')
               AND last_heartbeat IS NOT NULL AND last_heartbeat < ?",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&*self.pool)
        .await
        .map_err(Self::backend)?;
        rows.into_iter().map(row_to).collect()
    }

    #[instrument(skip(self, step), err)]
    async fn insert_flow_step_run(&self, step: &FlowStepRun) -> Result<(), StoreError> {
        let data = encode(step)?;
        sqlx::query(
            "INSERT INTO flow_step_runs (id, flow_run_id, step_order, status, data_json)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(step.id.to_string())
        .bind(step.flow_run_id.to_string())
        .bind(i64::from(step.step_order))
        .bind(format!("{:?}", step.status).to_lowercase())
        .bind(data)
        .execute(&*self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(())
    }

    #[instrument(skip(self, step), err)]
    async fn update_flow_step_run(&self, step: &FlowStepRun) -> Result<(), StoreError> {
        let data = encode(step)?;
        let result = sqlx::query("UPDATE flow_step_runs SET status = ?, data_json = ? WHERE id = ?")
            .bind(format!("{:?}", step.status).to_lowercase())
            .bind(data)
            .bind(step.id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(Self::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind: "flow_step_run", id: step.id.to_string() });
        }
        Ok(())
    }

    async fn get_flow_step_run(&self, id: FlowStepRunId) -> Result<FlowStepRun, StoreError> {
        let row = sqlx::query("SELECT data_json FROM flow_step_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(Self::backend)?
            .ok_or_else(|| StoreError::NotFound { kind: "flow_step_run", id: id.to_string() })?;
        row_to(row)
    }

    async fn list_flow_step_runs(&self, flow_run_id: FlowRunId) -> Result<Vec<FlowStepRun>, StoreError> {
        let rows = sqlx::query(
            "SELECT data_json FROM flow_step_runs WHERE flow_run_id = ? ORDER BY step_order ASC",
        )
        .bind(flow_run_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(Self::backend)?;
        rows.into_iter().map(row_to).collect()
    }

    #[instrument(skip(self, request), err)]
    async fn insert_llm_request(&self, request: &LlmRequest) -> Result<(), StoreError> {
        let data = encode(request)?;
        sqlx::query("INSERT INTO llm_requests (id, status, created_at, data_json) VALUES (?, ?, ?, ?)")
            .bind(request.id.to_string())
            .bind(format!("{:?}", request.status).to_lowercase())
            .bind(request.created_at.to_rfc3339())
            .bind(data)
            .execute(&*self.pool)
            .await
            .map_err(Self::backend)?;
        Ok(())
    }

    #[instrument(skip(self, request), err)]
    async fn update_llm_request(&self, request: &LlmRequest) -> Result<(), StoreError> {
        let data = encode(request)?;
        let result = sqlx::query("UPDATE llm_requests SET status = ?, data_json = ? WHERE id = ?")
            .bind(format!("{:?}", request.status).to_lowercase())
            .bind(data)
            .bind(request.id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(Self::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind: "llm_request", id: request.id.to_string() });
        }
        Ok(())
    }

    async fn get_llm_request(&self, id: LlmRequestId) -> Result<LlmRequest, StoreError> {
        let row = sqlx::query("SELECT data_json FROM llm_requests WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(Self::backend)?
            .ok_or_else(|| StoreError::NotFound { kind: "llm_request", id: id.to_string() })?;
        row_to(row)
    }

    #[instrument(skip(self, unit), err)]
    async fn upsert_unit(&self, unit: &Unit) -> Result<(), StoreError> {
        let data = encode(unit)?;
        sqlx::query(
            "INSERT INTO units (id, status, data_json) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, data_json = excluded.data_json",
        )
        .bind(unit.id.to_string())
        .bind(format!("{:?}", unit.status).to_lowercase())
        .bind(data)
        .execute(&*self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(())
    }

    async fn get_unit(&self, id: UnitId) -> Result<Unit, StoreError> {
        let row = sqlx::query("SELECT data_json FROM units WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(Self::backend)?
            .ok_or_else(|| StoreError::NotFound { kind: "unit", id: id.to_string() })?;
        row_to(row)
    }

    #[instrument(skip(self, lesson), err)]
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        let data = encode(lesson)?;
        sqlx::query(
            "INSERT INTO lessons (id, unit_id, data_json) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET data_json = excluded.data_json",
        )
        .bind(lesson.id.to_string())
        .bind(lesson.unit_id.to_string())
        .bind(data)
        .execute(&*self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StoreError> {
        let row = sqlx::query("SELECT data_json FROM lessons WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(Self::backend)?
            .ok_or_else(|| StoreError::NotFound { kind: "lesson", id: id.to_string() })?;
        row_to(row)
    }

    async fn list_lessons_for_unit(&self, unit_id: UnitId) -> Result<Vec<Lesson>, StoreError> {
        let rows = sqlx::query("SELECT data_json FROM lessons WHERE unit_id = ?")
            .bind(unit_id.to_string())
            .fetch_all(&*self.pool)
            .await
            .map_err(Self::backend)?;
        rows.into_iter().map(row_to).collect()
    }
}

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{HistoryError, HistoryFilter, HistoryStore, RunHistoryRecord, StageSummary};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS run_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id TEXT NOT NULL,
        item_name TEXT NOT NULL,
        stages TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        overall_success INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_run_history_item_id ON run_history(item_id);
    CREATE INDEX IF NOT EXISTS idx_run_history_start_time ON run_history(start_time);
"#;

/// SQLite-backed run history store
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open (or create) the history table in the database at `path`
    pub fn new(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(|e| HistoryError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing)
    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| HistoryError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, HistoryError> {
        self.conn
            .lock()
            .map_err(|_| HistoryError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &HistoryFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref item_id) = filter.item_id {
            conditions.push("item_id = ?");
            params.push(Box::new(item_id.clone()));
        }

        if let Some(success) = filter.overall_success {
            conditions.push("overall_success = ?");
            params.push(Box::new(success));
        }

        if let Some(ref from) = filter.from {
            conditions.push("start_time >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        if let Some(ref to) = filter.to {
            conditions.push("start_time <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, HistoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(Into::into)
        .map_err(|e| HistoryError::Database(format!("Invalid timestamp: {}", e)))
}

impl HistoryStore for SqliteHistoryStore {
    fn insert(&self, record: &RunHistoryRecord) -> Result<i64, HistoryError> {
        let stages_json = serde_json::to_string(&record.stages)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO run_history (item_id, item_name, stages, start_time, end_time, overall_success) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.item_id,
                record.item_name,
                stages_json,
                record.start_time.to_rfc3339(),
                record.end_time.to_rfc3339(),
                record.overall_success,
            ],
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &HistoryFilter) -> Result<Vec<RunHistoryRecord>, HistoryError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT id, item_id, item_name, stages, start_time, end_time, overall_success FROM run_history {} ORDER BY start_time DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, bool>(6)?,
                ))
            })
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            let (id, item_id, item_name, stages_json, start, end, overall_success) =
                row_result.map_err(|e| HistoryError::Database(e.to_string()))?;

            let stages: Vec<StageSummary> = serde_json::from_str(&stages_json)
                .map_err(|e| HistoryError::Serialization(e.to_string()))?;

            records.push(RunHistoryRecord {
                id,
                item_id,
                item_name,
                stages,
                start_time: parse_time(&start)?,
                end_time: parse_time(&end)?,
                overall_success,
            });
        }

        Ok(records)
    }

    fn count(&self, filter: &HistoryFilter) -> Result<i64, HistoryError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM run_history {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| HistoryError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageStatus;
    use chrono::Duration;

    fn create_test_store() -> SqliteHistoryStore {
        SqliteHistoryStore::in_memory().unwrap()
    }

    fn record(item_id: &str, success: bool) -> RunHistoryRecord {
        let now = Utc::now();
        RunHistoryRecord {
            id: 0,
            item_id: item_id.to_string(),
            item_name: format!("Tool {}", item_id),
            stages: vec![
                StageSummary {
                    stage: 1,
                    name: "Reachability Validation".to_string(),
                    status: StageStatus::Success,
                    message: "HTTP 200".to_string(),
                },
                StageSummary {
                    stage: 2,
                    name: "Visual & Social Discovery".to_string(),
                    status: StageStatus::Warning,
                    message: "No screenshot or social links found".to_string(),
                },
            ],
            start_time: now,
            end_time: now + Duration::seconds(3),
            overall_success: success,
        }
    }

    #[test]
    fn test_insert_and_query() {
        let store = create_test_store();

        let id = store.insert(&record("t-1", true)).unwrap();
        assert!(id > 0);

        let results = store.query(&HistoryFilter::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].item_name, "Tool t-1");
        assert_eq!(results[0].stages.len(), 2);
        assert_eq!(results[0].stages[1].status, StageStatus::Warning);
        assert!(results[0].overall_success);
    }

    #[test]
    fn test_query_by_item_and_outcome() {
        let store = create_test_store();
        store.insert(&record("t-1", true)).unwrap();
        store.insert(&record("t-1", false)).unwrap();
        store.insert(&record("t-2", false)).unwrap();

        let results = store.query(&HistoryFilter::new().with_item_id("t-1")).unwrap();
        assert_eq!(results.len(), 2);

        let failed = HistoryFilter::new().with_overall_success(false);
        assert_eq!(store.count(&failed).unwrap(), 2);
        assert_eq!(store.count(&HistoryFilter::new()).unwrap(), 3);
    }

    #[test]
    fn test_newest_first_and_time_range() {
        let store = create_test_store();
        let now = Utc::now();

        let mut old = record("old", true);
        old.start_time = now - Duration::hours(2);
        store.insert(&old).unwrap();
        let mut new = record("new", true);
        new.start_time = now;
        store.insert(&new).unwrap();

        let results = store.query(&HistoryFilter::new()).unwrap();
        assert_eq!(results[0].item_id, "new");

        let recent = HistoryFilter::new().with_time_range(Some(now - Duration::hours(1)), None);
        assert_eq!(store.query(&recent).unwrap().len(), 1);
    }

    #[test]
    fn test_pagination() {
        let store = create_test_store();
        for i in 0..5 {
            store.insert(&record(&format!("t-{}", i), true)).unwrap();
        }

        let page = |offset| {
            store
                .query(&HistoryFilter::new().with_limit(2).with_offset(offset))
                .unwrap()
                .len()
        };
        assert_eq!(page(0), 2);
        assert_eq!(page(2), 2);
        assert_eq!(page(4), 1);
    }

    #[test]
    fn test_shares_database_file_with_item_store() {
        use crate::item::{ItemStore, SqliteItemStore, ToolEntry};

        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("curator.db");

        let items = SqliteItemStore::new(&db_path).unwrap();
        let history = SqliteHistoryStore::new(&db_path).unwrap();

        items
            .upsert(&ToolEntry {
                id: "t-1".into(),
                slug: "acme".into(),
                name: "Acme".into(),
                url: "https://acme.dev".into(),
            })
            .unwrap();
        history.insert(&record("t-1", true)).unwrap();

        assert!(db_path.exists());
        assert_eq!(items.list_items().unwrap().len(), 1);
        assert_eq!(history.count(&HistoryFilter::new()).unwrap(), 1);
    }
}

//! SQLite-backed item store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::enrichment::{ItemPersister, NameResolver, PersistError, PricingType, ResolveError};

use super::store::{ItemStore, StoreError, ToolEntry, ToolRecord};
use super::types::ItemUpdate;

const SELECT_COLUMNS: &str = "id, slug, name, url, http_code, http_chain, asset_url, \
     social_links, has_affiliate_program, affiliate_url, description, pricing_type, \
     pricing_details, detailed_description, updated_at";

/// SQLite-backed tool store.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

impl SqliteItemStore {
    /// Open (or create) the store at `path`.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tools (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                http_code INTEGER,
                http_chain TEXT,
                asset_url TEXT,
                social_links TEXT NOT NULL DEFAULT '{}',
                has_affiliate_program INTEGER,
                affiliate_url TEXT,
                description TEXT,
                pricing_type TEXT,
                pricing_details TEXT,
                detailed_description TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tools_slug ON tools(slug);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ToolRecord> {
        let social_links_json: String = row.get(7)?;
        let pricing_type: Option<String> = row.get(11)?;
        let updated_at_str: String = row.get(14)?;

        let social_links: BTreeMap<String, String> =
            serde_json::from_str(&social_links_json).unwrap_or_default();
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(ToolRecord {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            url: row.get(3)?,
            http_code: row.get(4)?,
            http_chain: row.get(5)?,
            asset_url: row.get(6)?,
            social_links,
            has_affiliate_program: row.get(8)?,
            affiliate_url: row.get(9)?,
            description: row.get(10)?,
            pricing_type: pricing_type.as_deref().and_then(PricingType::parse),
            pricing_details: row.get(12)?,
            detailed_description: row.get(13)?,
            updated_at,
        })
    }
}

impl ItemStore for SqliteItemStore {
    fn upsert(&self, entry: &ToolEntry) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tools (id, slug, name, url, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET slug = ?2, name = ?3, url = ?4, updated_at = ?5",
            params![
                entry.id,
                entry.slug,
                entry.name,
                entry.url,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ToolRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM tools WHERE id = ?", SELECT_COLUMNS);
        conn.query_row(&sql, params![id], Self::row_to_record)
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_items(&self) -> Result<Vec<ToolRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM tools ORDER BY seq ASC", SELECT_COLUMNS);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_record)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn apply_update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if update.touches_reachability() {
            assignments.push("http_code = ?");
            values.push(Box::new(update.http_code));
            assignments.push("http_chain = ?");
            values.push(Box::new(update.http_chain.clone()));
        }
        if let Some(ref asset_url) = update.asset_url {
            assignments.push("asset_url = ?");
            values.push(Box::new(asset_url.clone()));
        }
        if let Some(ref links) = update.social_links {
            let json = serde_json::to_string(links)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            assignments.push("social_links = ?");
            values.push(Box::new(json));
        }
        if let Some(has_affiliate) = update.has_affiliate_program {
            assignments.push("has_affiliate_program = ?");
            values.push(Box::new(has_affiliate));
        }
        if let Some(ref affiliate_url) = update.affiliate_url {
            assignments.push("affiliate_url = ?");
            values.push(Box::new(affiliate_url.clone()));
        }
        if let Some(ref description) = update.description {
            assignments.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(pricing_type) = update.pricing_type {
            assignments.push("pricing_type = ?");
            values.push(Box::new(pricing_type.as_str()));
        }
        if let Some(ref details) = update.pricing_details {
            assignments.push("pricing_details = ?");
            values.push(Box::new(details.clone()));
        }
        if let Some(ref detailed) = update.detailed_description {
            assignments.push("detailed_description = ?");
            values.push(Box::new(detailed.clone()));
        }

        assignments.push("updated_at = ?");
        values.push(Box::new(Utc::now().to_rfc3339()));
        values.push(Box::new(id.to_string()));

        let sql = format!("UPDATE tools SET {} WHERE id = ?", assignments.join(", "));
        let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|p| p.as_ref()).collect();

        let conn = self.lock()?;
        let changed = conn
            .execute(&sql, param_refs.as_slice())
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemPersister for SqliteItemStore {
    async fn persist(&self, item_id: &str, update: &ItemUpdate) -> Result<(), PersistError> {
        self.apply_update(item_id, update).map_err(|e| match e {
            StoreError::NotFound(id) => PersistError::NotFound(id),
            other => PersistError::Storage(other.to_string()),
        })
    }
}

#[async_trait]
impl NameResolver for SqliteItemStore {
    async fn resolve_name(&self, item_id: &str) -> Result<String, ResolveError> {
        match self.get(item_id) {
            Ok(Some(record)) => Ok(record.name),
            Ok(None) => Err(ResolveError::NotFound(item_id.to_string())),
            Err(e) => Err(ResolveError::Lookup(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, name: &str) -> ToolEntry {
        ToolEntry {
            id: id.to_string(),
            slug: name.to_lowercase(),
            name: name.to_string(),
            url: format!("https://{}.dev", name.to_lowercase()),
        }
    }

    #[test]
    fn test_upsert_and_list_in_insertion_order() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.upsert(&entry("t2", "Zeta")).unwrap();
        store.upsert(&entry("t1", "Alpha")).unwrap();
        store.upsert(&entry("t2", "Zeta Renamed")).unwrap();

        let records = store.list_items().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "t2");
        assert_eq!(records[0].name, "Zeta Renamed");
        assert_eq!(records[1].id, "t1");
    }

    #[test]
    fn test_apply_update_roundtrip() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.upsert(&entry("t1", "Acme")).unwrap();

        let mut links = BTreeMap::new();
        links.insert("twitter".to_string(), "https://x.com/acme".to_string());

        store
            .apply_update(
                "t1",
                &ItemUpdate {
                    http_code: Some(200),
                    http_chain: Some("301 -> 200".to_string()),
                    social_links: Some(links.clone()),
                    pricing_type: Some(PricingType::Freemium),
                    ..Default::default()
                },
            )
            .unwrap();

        let record = store.get("t1").unwrap().unwrap();
        assert_eq!(record.http_code, Some(200));
        assert_eq!(record.http_chain.as_deref(), Some("301 -> 200"));
        assert_eq!(record.social_links, links);
        assert_eq!(record.pricing_type, Some(PricingType::Freemium));
        assert!(record.description.is_none());

        let item = record.to_work_item();
        assert_eq!(item.http_code, Some(200));
        assert_eq!(item.status, crate::item::ItemStatus::Idle);
    }

    #[test]
    fn test_apply_update_clears_reachability_after_failed_check() {
        let store = SqliteItemStore::in_memory().unwrap();
        store.upsert(&entry("t1", "Acme")).unwrap();
        store
            .apply_update(
                "t1",
                &ItemUpdate {
                    http_code: Some(200),
                    http_chain: Some("200".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        store
            .apply_update(
                "t1",
                &ItemUpdate {
                    reachability_checked: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let record = store.get("t1").unwrap().unwrap();
        assert_eq!(record.http_code, None);
        assert_eq!(record.http_chain, None);
    }

    #[test]
    fn test_apply_update_unknown_id() {
        let store = SqliteItemStore::in_memory().unwrap();
        let result = store.apply_update(
            "missing",
            &ItemUpdate {
                description: Some("x".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_persister_and_resolver() {
        let dir = TempDir::new().unwrap();
        let store = SqliteItemStore::new(&dir.path().join("tools.db")).unwrap();
        store.upsert(&entry("t1", "Acme")).unwrap();

        assert_eq!(store.resolve_name("t1").await.unwrap(), "Acme");
        assert!(matches!(
            store.resolve_name("nope").await,
            Err(ResolveError::NotFound(_))
        ));

        let update = ItemUpdate {
            detailed_description: Some("Long text".to_string()),
            ..Default::default()
        };
        store.persist("t1", &update).await.unwrap();
        assert!(matches!(
            store.persist("nope", &update).await,
            Err(PersistError::NotFound(_))
        ));
    }
}

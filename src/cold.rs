//! The cold tier: a durable id → payload store for evicted nodes.
//!
//! Records live in the `singularity` table. Vectors are stored as
//! little-endian `f32` blobs, metadata as JSON text. All access goes through a
//! single `Mutex<Connection>`; the cold tier is independent of the hot tier's
//! lock and can be used while hot-tier passes run.

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::db;
use crate::error::{Result, StoreError};
use crate::graph::types::{ColdRecord, NodeMetadata};

/// Ids per `IN (...)` query. Keeps well under SQLite's bound-parameter limit.
const RADIATE_CHUNK: usize = 500;

/// Encode a vector as raw little-endian `f32` bytes.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode little-endian `f32` bytes. `None` if the length isn't a multiple of 4.
pub fn bytes_to_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[derive(Debug)]
pub struct ColdStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl ColdStore {
    /// Open (or create) the cold tier at `path`. Records the vector dimension
    /// on first use and warns if a later open uses a different one.
    pub fn open(path: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let path = path.as_ref();
        let conn = db::open_database(path)?;
        Self::check_dim(&conn, dim)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory(dim: usize) -> Result<Self> {
        let conn = db::open_memory_database()?;
        Self::check_dim(&conn, dim)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn check_dim(conn: &Connection, dim: usize) -> Result<()> {
        match db::migrations::get_vector_dim(conn)? {
            None => db::migrations::set_vector_dim(conn, dim)?,
            Some(stored) if stored != dim => {
                warn!(
                    stored,
                    configured = dim,
                    "cold tier was written with a different vector dimension; recalled vectors will be coerced"
                );
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Upsert records by id in one transaction. Returns the number written.
    pub fn absorb(&self, records: &[ColdRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = now_seconds();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO singularity (id, vector, metadata, mass, last_accessed) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                let metadata = serde_json::to_string(&record.metadata)?;
                stmt.execute(params![
                    record.id,
                    vector_to_bytes(&record.vector),
                    metadata,
                    record.mass.max(0.0) as f64,
                    now,
                ])?;
            }
        }
        tx.commit()?;

        info!(count = records.len(), "absorbed records into cold tier");
        Ok(records.len())
    }

    /// Fetch records by id, in request order. Unknown ids are skipped.
    /// Touches `last_accessed` on every record returned.
    pub fn radiate(&self, ids: &[String]) -> Result<Vec<ColdRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = now_seconds();

        let mut found: HashMap<String, ColdRecord> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(RADIATE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");

            let rows: Vec<(String, Vec<u8>, Option<String>, f64)> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT id, vector, metadata, mass FROM singularity WHERE id IN ({placeholders})"
                ))?;
                let collected = stmt
                    .query_map(params_from_iter(chunk.iter()), |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                collected
            };

            tx.execute(
                &format!("UPDATE singularity SET last_accessed = ? WHERE id IN ({placeholders})"),
                params_from_iter(
                    std::iter::once(rusqlite::types::Value::Real(now)).chain(
                        chunk
                            .iter()
                            .map(|id| rusqlite::types::Value::Text(id.clone())),
                    ),
                ),
            )?;

            for (id, blob, metadata, mass) in rows {
                let vector = bytes_to_vector(&blob).ok_or_else(|| StoreError::CorruptRecord {
                    id: id.clone(),
                    reason: format!("vector blob of {} bytes", blob.len()),
                })?;
                let metadata: NodeMetadata = match metadata {
                    Some(json) => serde_json::from_str(&json).map_err(|e| {
                        StoreError::CorruptRecord {
                            id: id.clone(),
                            reason: e.to_string(),
                        }
                    })?,
                    None => NodeMetadata::default(),
                };
                found.insert(
                    id.clone(),
                    ColdRecord {
                        id,
                        vector,
                        metadata,
                        mass: mass as f32,
                    },
                );
            }
        }
        tx.commit()?;

        let records: Vec<ColdRecord> = ids.iter().filter_map(|id| found.remove(id)).collect();
        debug!(requested = ids.len(), returned = records.len(), "radiated cold records");
        Ok(records)
    }

    /// Number of records in the cold tier.
    pub fn len(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM singularity", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM singularity WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Health report for the underlying database.
    pub fn health(&self) -> Result<db::HealthReport> {
        let conn = self.lock()?;
        db::check_database_health(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, mass: f32) -> ColdRecord {
        ColdRecord {
            id: id.to_string(),
            vector: vec![1.5, -2.0, 0.25],
            metadata: NodeMetadata::with_provenance("test", None),
            mass,
        }
    }

    #[test]
    fn vector_bytes_round_trip() {
        let v = vec![0.1f32, -3.5, f32::MAX];
        assert_eq!(bytes_to_vector(&vector_to_bytes(&v)).unwrap(), v);
        assert!(bytes_to_vector(&[0u8; 5]).is_none());
    }

    #[test]
    fn absorb_then_radiate() {
        let cold = ColdStore::open_in_memory(3).unwrap();
        cold.absorb(&[record("a", 0.2), record("b", 0.4)]).unwrap();
        assert_eq!(cold.len().unwrap(), 2);

        let got = cold
            .radiate(&["b".to_string(), "missing".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, "b");
        assert_eq!(got[1], record("a", 0.2));
    }

    #[test]
    fn absorb_is_an_upsert() {
        let cold = ColdStore::open_in_memory(3).unwrap();
        cold.absorb(&[record("a", 0.2)]).unwrap();
        cold.absorb(&[record("a", 0.7)]).unwrap();
        assert_eq!(cold.len().unwrap(), 1);
        let got = cold.radiate(&["a".to_string()]).unwrap();
        assert!((got[0].mass - 0.7).abs() < 1e-6);
    }

    #[test]
    fn radiate_spans_multiple_chunks() {
        let cold = ColdStore::open_in_memory(3).unwrap();
        let records: Vec<ColdRecord> = (0..1200).map(|i| record(&format!("n{i}"), 0.1)).collect();
        cold.absorb(&records).unwrap();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        assert_eq!(cold.radiate(&ids).unwrap().len(), 1200);
    }

    #[test]
    fn radiate_touches_last_accessed() {
        let cold = ColdStore::open_in_memory(3).unwrap();
        cold.absorb(&[record("a", 0.2)]).unwrap();
        cold.lock()
            .unwrap()
            .execute("UPDATE singularity SET last_accessed = 0", [])
            .unwrap();
        cold.radiate(&["a".to_string()]).unwrap();
        let touched: f64 = cold
            .lock()
            .unwrap()
            .query_row("SELECT last_accessed FROM singularity WHERE id = 'a'", [], |r| r.get(0))
            .unwrap();
        assert!(touched > 0.0);
    }

    #[test]
    fn records_vector_dim_once() {
        let cold = ColdStore::open_in_memory(3).unwrap();
        assert_eq!(cold.health().unwrap().vector_dim, Some(3));
    }
}

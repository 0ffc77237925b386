//! Persistent ANN vector index via sqlite-vec, behind the `embeddings`
//! feature. A missing or stale index degrades to full-scan cosine
//! similarity in the planet searcher, not to a hard failure (spec §4.6).

#[cfg(feature = "embeddings")]
mod inner {
    use crate::error::{StarError, StarResult};
    use crate::model::MoleculeId;
    use crate::storage::traits::VectorIndex;
    use rusqlite::Connection;
    use sqlite_vec::sqlite3_vec_init;
    use std::path::Path;
    use std::sync::{Mutex, Once};

    /// Persistent ANN store backed by a sqlite-vec `vec0` virtual table.
    /// Vectors are L2-normalized on insert so L2 distance can be converted
    /// to cosine similarity: `sim = 1 - dist² / 2`.
    pub struct SqliteVecIndex {
        conn: Mutex<Connection>,
        dimensions: usize,
    }

    fn register_vec_extension() {
        static INIT: Once = Once::new();
        INIT.call_once(|| unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite3_vec_init as *const (),
            )));
        });
    }

    impl SqliteVecIndex {
        pub fn open(path: &Path, dimensions: usize) -> StarResult<Self> {
            register_vec_extension();
            let conn = Connection::open(path)?;
            Self::init_connection(conn, dimensions)
        }

        pub fn open_in_memory(dimensions: usize) -> StarResult<Self> {
            register_vec_extension();
            let conn = Connection::open_in_memory()?;
            Self::init_connection(conn, dimensions)
        }

        fn init_connection(conn: Connection, dimensions: usize) -> StarResult<Self> {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            let create_sql = format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS vec_molecules USING vec0(\
                     molecule_id TEXT PRIMARY KEY,\
                     embedding float[{dimensions}]\
                 )"
            );
            conn.execute_batch(&create_sql)?;
            Ok(Self {
                conn: Mutex::new(conn),
                dimensions,
            })
        }

        pub fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    fn f32_slice_as_bytes(slice: &[f32]) -> &[u8] {
        unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
    }

    fn l2_normalize(v: &mut [f32]) {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
    }

    impl VectorIndex for SqliteVecIndex {
        fn upsert_vector(&self, molecule_id: &MoleculeId, embedding: &[f32]) -> StarResult<()> {
            let mut normalized = embedding.to_vec();
            l2_normalize(&mut normalized);
            let conn = self.conn.lock().unwrap();
            let bytes = f32_slice_as_bytes(&normalized);
            conn.execute(
                "INSERT OR REPLACE INTO vec_molecules(molecule_id, embedding) VALUES (?1, ?2)",
                rusqlite::params![molecule_id.as_str(), bytes],
            )?;
            Ok(())
        }

        fn delete_vector(&self, molecule_id: &MoleculeId) -> StarResult<()> {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "DELETE FROM vec_molecules WHERE molecule_id = ?1",
                rusqlite::params![molecule_id.as_str()],
            )?;
            Ok(())
        }

        fn ann_search(&self, query: &[f32], limit: usize) -> StarResult<Vec<(MoleculeId, f32)>> {
            let mut normalized = query.to_vec();
            l2_normalize(&mut normalized);
            let conn = self.conn.lock().unwrap();
            let bytes = f32_slice_as_bytes(&normalized);

            let mut stmt = conn.prepare(
                "SELECT molecule_id, distance FROM vec_molecules
                 WHERE embedding MATCH ?1 AND k = ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![bytes, limit as i64], |row| {
                let id: String = row.get(0)?;
                let distance: f32 = row.get(1)?;
                Ok((id, distance))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (id, distance) = row.map_err(StarError::from)?;
                let similarity = 1.0 - (distance * distance) / 2.0;
                out.push((MoleculeId::from_string(id), similarity));
            }
            Ok(out)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn upsert_and_search_round_trip() {
            let index = SqliteVecIndex::open_in_memory(3).unwrap();
            let travel = MoleculeId::from_string("travel");
            let journey = MoleculeId::from_string("journey");
            let democracy = MoleculeId::from_string("democracy");
            index.upsert_vector(&travel, &[0.9, 0.3, 0.1]).unwrap();
            index.upsert_vector(&journey, &[0.85, 0.35, 0.15]).unwrap();
            index.upsert_vector(&democracy, &[0.1, 0.2, 0.95]).unwrap();

            let results = index.ann_search(&[0.9, 0.3, 0.1], 2).unwrap();
            let ids: Vec<String> = results.iter().map(|(id, _)| id.as_str().to_string()).collect();
            assert!(ids.contains(&"travel".to_string()));
            assert!(ids.contains(&"journey".to_string()));
        }

        #[test]
        fn delete_removes_vector_from_results() {
            let index = SqliteVecIndex::open_in_memory(2).unwrap();
            let id = MoleculeId::from_string("a");
            index.upsert_vector(&id, &[1.0, 0.0]).unwrap();
            index.delete_vector(&id).unwrap();
            let results = index.ann_search(&[1.0, 0.0], 5).unwrap();
            assert!(results.iter().all(|(found, _)| found.as_str() != "a"));
        }
    }
}

#[cfg(feature = "embeddings")]
pub use inner::SqliteVecIndex;

//! SQLite-backed index store: compounds, molecules, atoms, edges, and an
//! FTS5 virtual table for lexical search.

use super::traits::{IndexStore, MoleculeFilter};
use crate::error::{StarError, StarResult};
use crate::model::{
    Atom, AtomId, Compound, CompoundId, ContentHash, Edge, Molecule, MoleculeId, MoleculeType,
    Provenance,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StarResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StarResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StarResult<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS compounds (
                id TEXT PRIMARY KEY,
                source_path TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                last_ingest_ts TEXT NOT NULL,
                total_molecules INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS molecules (
                id TEXT PRIMARY KEY,
                compound_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                start_byte INTEGER NOT NULL,
                end_byte INTEGER NOT NULL,
                molecule_type TEXT NOT NULL,
                simhash INTEGER NOT NULL,
                embedding_json TEXT NOT NULL,
                embedding_pending INTEGER NOT NULL,
                ts TEXT NOT NULL,
                buckets_json TEXT NOT NULL,
                epochs_json TEXT NOT NULL,
                tags_json TEXT NOT NULL,
                provenance TEXT NOT NULL,
                FOREIGN KEY (compound_id) REFERENCES compounds(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_molecules_compound ON molecules(compound_id);

            CREATE VIRTUAL TABLE IF NOT EXISTS molecules_fts USING fts5(
                molecule_id UNINDEXED,
                content,
                tokenize = 'unicode61'
            );

            CREATE TABLE IF NOT EXISTS atoms (
                id TEXT PRIMARY KEY,
                occurrence_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS edges (
                atom_a TEXT NOT NULL,
                atom_b TEXT NOT NULL,
                weight INTEGER NOT NULL,
                PRIMARY KEY (atom_a, atom_b)
            );
            CREATE INDEX IF NOT EXISTS idx_edges_a ON edges(atom_a);
            CREATE INDEX IF NOT EXISTS idx_edges_b ON edges(atom_b);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_compound(row: &rusqlite::Row) -> rusqlite::Result<Compound> {
        let hash_hex: String = row.get(2)?;
        let ts: String = row.get(3)?;
        Ok(Compound {
            id: CompoundId::from_string(row.get::<_, String>(0)?),
            source_path: row.get(1)?,
            content_hash: decode_hash(&hash_hex),
            last_ingest_ts: ts.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
            total_molecules: row.get::<_, i64>(4)? as usize,
        })
    }

    fn row_to_molecule(row: &rusqlite::Row) -> rusqlite::Result<Molecule> {
        let molecule_type: String = row.get(5)?;
        let embedding_json: String = row.get(7)?;
        let ts: String = row.get(9)?;
        let buckets_json: String = row.get(10)?;
        let epochs_json: String = row.get(11)?;
        let tags_json: String = row.get(12)?;
        let provenance: String = row.get(13)?;
        Ok(Molecule {
            id: MoleculeId::from_string(row.get::<_, String>(0)?),
            compound_id: CompoundId::from_string(row.get::<_, String>(1)?),
            sequence: row.get::<_, i64>(2)? as u32,
            start_byte: row.get::<_, i64>(3)? as usize,
            end_byte: row.get::<_, i64>(4)? as usize,
            molecule_type: parse_molecule_type(&molecule_type),
            simhash: crate::fingerprint::Fingerprint(row.get::<_, i64>(6)? as u64),
            embedding: serde_json::from_str(&embedding_json).unwrap_or_default(),
            embedding_pending: row.get::<_, i64>(8)? != 0,
            timestamp: ts.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
            buckets: serde_json::from_str(&buckets_json).unwrap_or_default(),
            epochs: serde_json::from_str(&epochs_json).unwrap_or_default(),
            tags: parse_tags(&tags_json),
            provenance: parse_provenance(&provenance),
        })
    }
}

fn decode_hash(hex: &str) -> ContentHash {
    let mut bytes = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate().take(32) {
        if let Ok(s) = std::str::from_utf8(chunk) {
            if let Ok(b) = u8::from_str_radix(s, 16) {
                bytes[i] = b;
            }
        }
    }
    ContentHash::from_bytes(bytes)
}

fn molecule_type_str(t: MoleculeType) -> &'static str {
    match t {
        MoleculeType::Prose => "prose",
        MoleculeType::Code => "code",
        MoleculeType::Data => "data",
        MoleculeType::Fragment => "fragment",
    }
}

fn parse_molecule_type(s: &str) -> MoleculeType {
    match s {
        "code" => MoleculeType::Code,
        "data" => MoleculeType::Data,
        "fragment" => MoleculeType::Fragment,
        _ => MoleculeType::Prose,
    }
}

fn provenance_str(p: Provenance) -> &'static str {
    match p {
        Provenance::Internal => "internal",
        Provenance::External => "external",
        Provenance::Quarantine => "quarantine",
    }
}

fn parse_provenance(s: &str) -> Provenance {
    match s {
        "external" => Provenance::External,
        "quarantine" => Provenance::Quarantine,
        _ => Provenance::Internal,
    }
}

fn parse_tags(json: &str) -> BTreeSet<AtomId> {
    serde_json::from_str::<BTreeSet<String>>(json)
        .unwrap_or_default()
        .into_iter()
        .map(AtomId::from)
        .collect()
}

impl IndexStore for SqliteStore {
    fn upsert_compound(&self, compound: &Compound) -> StarResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO compounds (id, source_path, content_hash, last_ingest_ts, total_molecules)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                source_path = excluded.source_path,
                content_hash = excluded.content_hash,
                last_ingest_ts = excluded.last_ingest_ts,
                total_molecules = excluded.total_molecules",
            params![
                compound.id.as_str(),
                compound.source_path,
                compound.content_hash.to_string(),
                compound.last_ingest_ts.to_rfc3339(),
                compound.total_molecules as i64,
            ],
        )?;
        Ok(())
    }

    fn get_compound(&self, id: &CompoundId) -> StarResult<Option<Compound>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, source_path, content_hash, last_ingest_ts, total_molecules
             FROM compounds WHERE id = ?1",
            params![id.as_str()],
            Self::row_to_compound,
        )
        .optional()
        .map_err(StarError::from)
    }

    fn delete_compound(&self, id: &CompoundId) -> StarResult<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM compounds WHERE id = ?1", params![id.as_str()])?;
        Ok(n > 0)
    }

    fn all_compounds(&self) -> StarResult<Vec<Compound>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, source_path, content_hash, last_ingest_ts, total_molecules FROM compounds",
        )?;
        let rows = stmt.query_map([], Self::row_to_compound)?;
        Ok(rows.filter_map(Result::ok).collect())
    }

    fn upsert_molecule(&self, molecule: &Molecule, text: &str) -> StarResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO molecules (
                id, compound_id, sequence, start_byte, end_byte, molecule_type, simhash,
                embedding_json, embedding_pending, ts, buckets_json, epochs_json, tags_json, provenance
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
             ON CONFLICT(id) DO UPDATE SET
                compound_id = excluded.compound_id,
                sequence = excluded.sequence,
                start_byte = excluded.start_byte,
                end_byte = excluded.end_byte,
                molecule_type = excluded.molecule_type,
                simhash = excluded.simhash,
                embedding_json = excluded.embedding_json,
                embedding_pending = excluded.embedding_pending,
                ts = excluded.ts,
                buckets_json = excluded.buckets_json,
                epochs_json = excluded.epochs_json,
                tags_json = excluded.tags_json,
                provenance = excluded.provenance",
            params![
                molecule.id.as_str(),
                molecule.compound_id.as_str(),
                molecule.sequence as i64,
                molecule.start_byte as i64,
                molecule.end_byte as i64,
                molecule_type_str(molecule.molecule_type),
                molecule.simhash.0 as i64,
                serde_json::to_string(&molecule.embedding)?,
                molecule.embedding_pending as i64,
                molecule.timestamp.to_rfc3339(),
                serde_json::to_string(&molecule.buckets)?,
                serde_json::to_string(&molecule.epochs)?,
                serde_json::to_string(&molecule.tags.iter().map(|t| t.as_str()).collect::<Vec<_>>())?,
                provenance_str(molecule.provenance),
            ],
        )?;
        tx.execute(
            "DELETE FROM molecules_fts WHERE molecule_id = ?1",
            params![molecule.id.as_str()],
        )?;
        tx.execute(
            "INSERT INTO molecules_fts (molecule_id, content) VALUES (?1, ?2)",
            params![molecule.id.as_str(), text],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_molecule(&self, id: &MoleculeId) -> StarResult<Option<Molecule>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, compound_id, sequence, start_byte, end_byte, molecule_type, simhash,
                    embedding_json, embedding_pending, ts, buckets_json, epochs_json, tags_json, provenance
             FROM molecules WHERE id = ?1",
            params![id.as_str()],
            Self::row_to_molecule,
        )
        .optional()
        .map_err(StarError::from)
    }

    fn delete_molecule(&self, id: &MoleculeId) -> StarResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM molecules_fts WHERE molecule_id = ?1",
            params![id.as_str()],
        )?;
        let n = tx.execute("DELETE FROM molecules WHERE id = ?1", params![id.as_str()])?;
        tx.commit()?;
        Ok(n > 0)
    }

    fn molecules_for_compound(&self, id: &CompoundId) -> StarResult<Vec<Molecule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, compound_id, sequence, start_byte, end_byte, molecule_type, simhash,
                    embedding_json, embedding_pending, ts, buckets_json, epochs_json, tags_json, provenance
             FROM molecules WHERE compound_id = ?1 ORDER BY sequence ASC",
        )?;
        let rows = stmt.query_map(params![id.as_str()], Self::row_to_molecule)?;
        Ok(rows.filter_map(Result::ok).collect())
    }

    fn fts_search(
        &self,
        keywords: &[String],
        filter: &MoleculeFilter,
        limit: usize,
    ) -> StarResult<Vec<(MoleculeId, f32)>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let match_query = keywords
            .iter()
            .map(|k| format!("\"{}\"", k.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.compound_id, m.sequence, m.start_byte, m.end_byte, m.molecule_type,
                    m.simhash, m.embedding_json, m.embedding_pending, m.ts, m.buckets_json,
                    m.epochs_json, m.tags_json, m.provenance, bm25(molecules_fts) AS score
             FROM molecules_fts
             JOIN molecules m ON m.id = molecules_fts.molecule_id
             WHERE molecules_fts.content MATCH ?1
             ORDER BY score ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![match_query, limit as i64 * 4], |row| {
            let molecule = Self::row_to_molecule(row)?;
            let score: f64 = row.get(14)?;
            Ok((molecule, score))
        })?;

        let mut out = Vec::new();
        for row in rows.filter_map(Result::ok) {
            let (molecule, bm25_score) = row;
            if filter.matches(&molecule) {
                // bm25() returns lower-is-better; normalize to a positive,
                // higher-is-better score in roughly [0, 1].
                let normalized = 1.0 / (1.0 + bm25_score.max(0.0) as f32);
                out.push((molecule.id, normalized));
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn molecules_by_tags(&self, tags: &[AtomId], limit: usize) -> StarResult<Vec<Molecule>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: BTreeSet<&AtomId> = tags.iter().collect();
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, compound_id, sequence, start_byte, end_byte, molecule_type, simhash,
                    embedding_json, embedding_pending, ts, buckets_json, epochs_json, tags_json, provenance
             FROM molecules",
        )?;
        let rows = stmt.query_map([], Self::row_to_molecule)?;
        let mut out = Vec::new();
        for molecule in rows.filter_map(Result::ok) {
            if molecule.tags.iter().any(|t| wanted.contains(t)) {
                out.push(molecule);
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn upsert_edge(&self, edge: &Edge) -> StarResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO edges (atom_a, atom_b, weight) VALUES (?1, ?2, ?3)
             ON CONFLICT(atom_a, atom_b) DO UPDATE SET weight = excluded.weight",
            params![edge.atom_a.as_str(), edge.atom_b.as_str(), edge.weight as i64],
        )?;
        Ok(())
    }

    fn edges_for_atom(&self, atom: &AtomId) -> StarResult<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT atom_a, atom_b, weight FROM edges WHERE atom_a = ?1 OR atom_b = ?1",
        )?;
        let rows = stmt.query_map(params![atom.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        Ok(rows
            .filter_map(Result::ok)
            .map(|(a, b, w)| Edge {
                atom_a: AtomId::from(a),
                atom_b: AtomId::from(b),
                weight: w as u32,
            })
            .collect())
    }

    fn all_edges(&self) -> StarResult<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT atom_a, atom_b, weight FROM edges")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        Ok(rows
            .filter_map(Result::ok)
            .map(|(a, b, w)| Edge {
                atom_a: AtomId::from(a),
                atom_b: AtomId::from(b),
                weight: w as u32,
            })
            .collect())
    }

    fn upsert_atom(&self, atom: &Atom) -> StarResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO atoms (id, occurrence_count) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET occurrence_count = excluded.occurrence_count",
            params![atom.id.as_str(), atom.occurrence_count as i64],
        )?;
        Ok(())
    }

    fn get_atom(&self, id: &AtomId) -> StarResult<Option<Atom>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, occurrence_count FROM atoms WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(Atom {
                    id: AtomId::from(row.get::<_, String>(0)?),
                    occurrence_count: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .optional()
        .map_err(StarError::from)
    }

    fn tag_frequency(&self, atom: &AtomId) -> StarResult<u64> {
        Ok(self.get_atom(atom)?.map(|a| a.occurrence_count).unwrap_or(0))
    }

    fn list_buckets(&self) -> StarResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT buckets_json FROM molecules")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut buckets: BTreeSet<String> = BTreeSet::new();
        for json in rows.filter_map(Result::ok) {
            if let Ok(set) = serde_json::from_str::<BTreeSet<String>>(&json) {
                buckets.extend(set);
            }
        }
        Ok(buckets.into_iter().collect())
    }

    fn list_tags(&self, buckets: Option<&[String]>) -> StarResult<Vec<AtomId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT buckets_json, tags_json FROM molecules")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut tags: BTreeSet<AtomId> = BTreeSet::new();
        for (buckets_json, tags_json) in rows.filter_map(Result::ok) {
            if let Some(wanted) = buckets {
                let molecule_buckets: BTreeSet<String> =
                    serde_json::from_str(&buckets_json).unwrap_or_default();
                if !wanted.iter().any(|b| molecule_buckets.is_empty() || molecule_buckets.contains(b)) {
                    continue;
                }
            }
            tags.extend(parse_tags(&tags_json));
        }
        Ok(tags.into_iter().collect())
    }

    fn total_molecules(&self) -> StarResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM molecules", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Molecule;

    fn sample_molecule(compound: &CompoundId, seq: u32) -> Molecule {
        Molecule::new(
            compound.clone(),
            seq,
            0,
            10,
            MoleculeType::Prose,
            crate::fingerprint::Fingerprint(0),
            4,
        )
    }

    #[test]
    fn compound_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = CompoundId::from_string("c1");
        let compound = Compound::new(id.clone(), "c1.md", ContentHash::of("hello"));
        store.upsert_compound(&compound).unwrap();
        let loaded = store.get_compound(&id).unwrap().unwrap();
        assert_eq!(loaded.source_path, "c1.md");
    }

    #[test]
    fn molecule_round_trips_and_is_fts_searchable() {
        let store = SqliteStore::open_in_memory().unwrap();
        let compound_id = CompoundId::from_string("c1");
        store
            .upsert_compound(&Compound::new(compound_id.clone(), "c1.md", ContentHash::of("x")))
            .unwrap();
        let molecule = sample_molecule(&compound_id, 0);
        store.upsert_molecule(&molecule, "Project Chronos explores infinite context").unwrap();

        let loaded = store.get_molecule(&molecule.id).unwrap().unwrap();
        assert_eq!(loaded.compound_id, compound_id);

        let results = store
            .fts_search(&["Chronos".to_string()], &MoleculeFilter::new(), 10)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, molecule.id);
    }

    #[test]
    fn fts_search_respects_bucket_filter() {
        let store = SqliteStore::open_in_memory().unwrap();
        let compound_id = CompoundId::from_string("c1");
        store
            .upsert_compound(&Compound::new(compound_id.clone(), "c1.md", ContentHash::of("x")))
            .unwrap();
        let molecule = sample_molecule(&compound_id, 0).with_buckets(["work".to_string()]);
        store.upsert_molecule(&molecule, "budget planning notes").unwrap();

        let filter = MoleculeFilter::new().with_buckets(vec!["personal".to_string()]);
        let results = store.fts_search(&["budget".to_string()], &filter, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn edges_round_trip_and_query_by_either_endpoint() {
        let store = SqliteStore::open_in_memory().unwrap();
        let edge = Edge::new(AtomId::new("adhd"), AtomId::new("diagnosis"), 3).unwrap();
        store.upsert_edge(&edge).unwrap();
        let via_a = store.edges_for_atom(&AtomId::new("adhd")).unwrap();
        let via_b = store.edges_for_atom(&AtomId::new("diagnosis")).unwrap();
        assert_eq!(via_a.len(), 1);
        assert_eq!(via_b.len(), 1);
    }

    #[test]
    fn delete_molecule_removes_from_fts_too() {
        let store = SqliteStore::open_in_memory().unwrap();
        let compound_id = CompoundId::from_string("c1");
        store
            .upsert_compound(&Compound::new(compound_id.clone(), "c1.md", ContentHash::of("x")))
            .unwrap();
        let molecule = sample_molecule(&compound_id, 0);
        store.upsert_molecule(&molecule, "unique_marker_text").unwrap();
        store.delete_molecule(&molecule.id).unwrap();
        let results = store
            .fts_search(&["unique_marker_text".to_string()], &MoleculeFilter::new(), 10)
            .unwrap();
        assert!(results.is_empty());
    }
}

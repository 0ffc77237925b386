//! Ingestion orchestrator: the sequential per-compound pipeline (spec §4.13).
//!
//! `Discovered → Sanitized → Atomized → Tagged+Fingerprinted → Embedded → Indexed`,
//! with a degraded `IndexedWithZeroEmbedding` branch when the embedder fails.
//! Idempotent by `content_hash`: re-ingesting identical bytes is a no-op.

use crate::atomizer::atomize;
use crate::embedding::{EmbedOutcome, Embedder};
use crate::error::StarResult;
use crate::fingerprint::SimHasher;
use crate::mirror::MirrorStore;
use crate::model::{Atom, AtomId, Compound, CompoundId, ContentHash, Edge, Molecule, MoleculeType, Provenance};
use crate::sanitizer::sanitize;
use crate::storage::{IndexStore, VectorIndex};
use crate::tagger::{derive_tags, SeedDictionary};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;

/// A tag's corpus-wide frequency above this is treated as a stopword tag
/// and dropped by the tagger's frequency cap (spec §4.4).
const TAG_FREQUENCY_CAP: u64 = 5_000;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// `content_hash` matched the stored compound; nothing was re-indexed.
    NoOp(CompoundId),
    Indexed {
        compound_id: CompoundId,
        molecule_count: usize,
    },
    /// Indexed, but one or more molecules carry a zero-vector placeholder
    /// embedding pending re-embed on the next maintenance cycle.
    IndexedWithZeroEmbedding {
        compound_id: CompoundId,
        molecule_count: usize,
        pending_molecule_ids: Vec<crate::model::MoleculeId>,
    },
}

pub struct Ingestor<'a> {
    index: &'a dyn IndexStore,
    vector_index: Option<&'a dyn VectorIndex>,
    mirror: &'a MirrorStore,
    embedder: &'a dyn Embedder,
    embedding_dim: usize,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        index: &'a dyn IndexStore,
        vector_index: Option<&'a dyn VectorIndex>,
        mirror: &'a MirrorStore,
        embedder: &'a dyn Embedder,
        embedding_dim: usize,
    ) -> Self {
        Self {
            index,
            vector_index,
            mirror,
            embedder,
            embedding_dim,
        }
    }

    /// Direct ingest entry point: a caller hands over content it already has
    /// in memory (e.g. a paste, an MCP tool call).
    pub fn ingest(
        &self,
        content: &str,
        source_path: &str,
        molecule_type_hint: MoleculeType,
        buckets: impl IntoIterator<Item = String>,
        seed_tags: impl IntoIterator<Item = AtomId>,
        provenance: Provenance,
        timestamp: Option<DateTime<Utc>>,
    ) -> StarResult<IngestOutcome> {
        let sanitized = sanitize(content);
        let hash = ContentHash::of(&sanitized);
        let compound_id = CompoundId::from_string(source_path);

        if let Some(existing) = self.index.get_compound(&compound_id)? {
            if existing.is_unchanged(&hash) {
                return Ok(IngestOutcome::NoOp(compound_id));
            }
        }

        self.mirror.write(source_path, &sanitized)?;

        let buckets: BTreeSet<String> = buckets.into_iter().collect();
        let seed_tags: BTreeSet<AtomId> = seed_tags.into_iter().collect();
        let timestamp = timestamp.unwrap_or_else(Utc::now);

        let outcome = self.index_molecules(
            &compound_id,
            &sanitized,
            molecule_type_hint,
            &buckets,
            &seed_tags,
            provenance,
            timestamp,
        )?;

        let mut compound = Compound::new(compound_id.clone(), source_path, hash);
        compound.last_ingest_ts = timestamp;
        compound.total_molecules = match &outcome {
            IngestOutcome::Indexed { molecule_count, .. } => *molecule_count,
            IngestOutcome::IndexedWithZeroEmbedding { molecule_count, .. } => *molecule_count,
            IngestOutcome::NoOp(_) => 0,
        };
        self.index.upsert_compound(&compound)?;

        Ok(outcome)
    }

    /// Watcher-driven entry point: read a file off disk, preferring its
    /// mtime as the ingest timestamp (spec §4.13 timestamp policy).
    pub fn ingest_file(&self, path: &Path) -> StarResult<IngestOutcome> {
        let content = std::fs::read_to_string(path)?;
        let timestamp = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let source_path = path.to_string_lossy().to_string();
        self.ingest(
            &content,
            &source_path,
            MoleculeType::Prose,
            std::iter::empty(),
            std::iter::empty(),
            Provenance::Internal,
            timestamp,
        )
    }

    /// Bulk re-sync: walk the mirror tree and re-ingest every compound whose
    /// on-disk hash differs from the stored one (spec §4.13).
    ///
    /// `compound_id` returned by `MirrorStore::walk` is already the mirror-
    /// relative id used everywhere else — it must be fed straight back into
    /// `ingest` rather than re-derived from the walked absolute path, or
    /// every resync would nest the compound one mirror-root deeper.
    pub fn resync(&self) -> StarResult<Vec<IngestOutcome>> {
        let mut outcomes = Vec::new();
        for (compound_id, path) in self.mirror.walk()? {
            let content = std::fs::read_to_string(&path)?;
            let hash = ContentHash::of(&sanitize(&content));
            let unchanged = self
                .index
                .get_compound(&CompoundId::from_string(compound_id.clone()))?
                .map(|c| c.is_unchanged(&hash))
                .unwrap_or(false);
            if unchanged {
                outcomes.push(IngestOutcome::NoOp(CompoundId::from_string(compound_id)));
                continue;
            }
            let timestamp = std::fs::metadata(&path).and_then(|m| m.modified()).ok().map(DateTime::<Utc>::from);
            outcomes.push(self.ingest(
                &content,
                &compound_id,
                MoleculeType::Prose,
                std::iter::empty(),
                std::iter::empty(),
                Provenance::Internal,
                timestamp,
            )?);
        }
        Ok(outcomes)
    }

    #[allow(clippy::too_many_arguments)]
    fn index_molecules(
        &self,
        compound_id: &CompoundId,
        sanitized: &str,
        molecule_type_hint: MoleculeType,
        buckets: &BTreeSet<String>,
        seed_tags: &BTreeSet<AtomId>,
        provenance: Provenance,
        timestamp: DateTime<Utc>,
    ) -> StarResult<IngestOutcome> {
        let raw_molecules = atomize(sanitized, molecule_type_hint);
        if raw_molecules.is_empty() {
            return Ok(IngestOutcome::Indexed {
                compound_id: compound_id.clone(),
                molecule_count: 0,
            });
        }

        let seed_dict: SeedDictionary = seed_tags
            .iter()
            .map(|t| (t.as_str().to_string(), t.clone()))
            .collect();
        let hasher = SimHasher::default();

        let texts: Vec<&str> = raw_molecules
            .iter()
            .map(|m| &sanitized[m.start_byte..m.end_byte])
            .collect();

        let mut per_molecule_tags: Vec<BTreeSet<AtomId>> = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let prev_tags = per_molecule_tags.get(i.wrapping_sub(1)).cloned().unwrap_or_default();
            per_molecule_tags.push(derive_tags(text, &seed_dict, &prev_tags, &BTreeSet::new(), |_| false));
        }
        // Second pass: local infection needs both neighbors, so re-derive
        // now that every molecule's first-pass tags exist.
        let first_pass = per_molecule_tags.clone();
        for i in 0..texts.len() {
            let prev = if i == 0 { BTreeSet::new() } else { first_pass[i - 1].clone() };
            let next = first_pass.get(i + 1).cloned().unwrap_or_default();
            per_molecule_tags[i] = derive_tags(texts[i], &seed_dict, &prev, &next, |tag| {
                self.index.tag_frequency(tag).unwrap_or(0) > TAG_FREQUENCY_CAP
            });
        }

        let outcomes = self.embedder.embed_batch(&texts).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "batch embedding failed, indexing with zero vectors");
            texts.iter().map(|_| EmbedOutcome::Failed).collect()
        });

        let mut pending_ids = Vec::new();
        let mut molecule_count = 0usize;

        for (i, raw) in raw_molecules.iter().enumerate() {
            let text = texts[i];
            let simhash = hasher.fingerprint(text);
            let tags = per_molecule_tags[i].clone();
            let outcome = outcomes.get(i).cloned().unwrap_or(EmbedOutcome::Failed);

            let mut molecule = Molecule::new(
                compound_id.clone(),
                i as u32,
                raw.start_byte,
                raw.end_byte,
                raw.molecule_type,
                simhash,
                self.embedding_dim,
            );
            molecule.timestamp = timestamp;
            molecule.buckets = buckets.clone();
            molecule.tags = tags.clone();
            molecule.provenance = provenance;

            if let EmbedOutcome::Embedded(vector) = &outcome {
                molecule = molecule.with_embedding(vector.clone());
            } else {
                pending_ids.push(molecule.id.clone());
            }

            self.index.upsert_molecule(&molecule, text)?;

            if let (Some(vector_index), EmbedOutcome::Embedded(vector)) = (self.vector_index, &outcome) {
                vector_index.upsert_vector(&molecule.id, vector)?;
            }

            for tag in &tags {
                let mut atom = self.index.get_atom(tag)?.unwrap_or_else(|| Atom::new(tag.clone()));
                atom.record_occurrence();
                self.index.upsert_atom(&atom)?;
            }
            let tag_list: Vec<&AtomId> = tags.iter().collect();
            for a in 0..tag_list.len() {
                for b in (a + 1)..tag_list.len() {
                    if let Some(mut edge) = Edge::new(tag_list[a].clone(), tag_list[b].clone(), 1) {
                        if let Some(existing) = self
                            .index
                            .edges_for_atom(&edge.atom_a)?
                            .into_iter()
                            .find(|e| e.touches(&edge.atom_b))
                        {
                            edge = existing;
                            edge.reinforce();
                        }
                        self.index.upsert_edge(&edge)?;
                    }
                }
            }

            molecule_count += 1;
        }

        if pending_ids.is_empty() {
            Ok(IngestOutcome::Indexed {
                compound_id: compound_id.clone(),
                molecule_count,
            })
        } else {
            Ok(IngestOutcome::IndexedWithZeroEmbedding {
                compound_id: compound_id.clone(),
                molecule_count,
                pending_molecule_ids: pending_ids,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;
    use crate::storage::SqliteStore;
    use tempfile::tempdir;

    fn ingestor<'a>(index: &'a SqliteStore, mirror: &'a MirrorStore, embedder: &'a MockEmbedder) -> Ingestor<'a> {
        Ingestor::new(index, None, mirror, embedder, 8)
    }

    #[test]
    fn ingest_is_idempotent_on_unchanged_content() {
        let dir = tempdir().unwrap();
        let index = SqliteStore::open_in_memory().unwrap();
        let mirror = MirrorStore::new(dir.path()).unwrap();
        let embedder = MockEmbedder::new(8);
        let ing = ingestor(&index, &mirror, &embedder);

        let content = "Project Chronos explores infinite context and keeps notes organized well.";
        let first = ing
            .ingest(content, "chronos.md", MoleculeType::Prose, [], [], Provenance::Internal, None)
            .unwrap();
        assert!(matches!(first, IngestOutcome::Indexed { .. }));

        let second = ing
            .ingest(content, "chronos.md", MoleculeType::Prose, [], [], Provenance::Internal, None)
            .unwrap();
        assert!(matches!(second, IngestOutcome::NoOp(_)));
    }

    #[test]
    fn ingest_writes_to_mirror_and_index() {
        let dir = tempdir().unwrap();
        let index = SqliteStore::open_in_memory().unwrap();
        let mirror = MirrorStore::new(dir.path()).unwrap();
        let embedder = MockEmbedder::new(8);
        let ing = ingestor(&index, &mirror, &embedder);

        let content = "Project Chronos explores infinite context and keeps notes organized well.";
        ing.ingest(content, "chronos.md", MoleculeType::Prose, [], [], Provenance::Internal, None)
            .unwrap();

        assert!(mirror.exists("chronos.md"));
        let compound = index.get_compound(&CompoundId::from_string("chronos.md")).unwrap();
        assert!(compound.is_some());
    }

    #[test]
    fn changed_content_reingests() {
        let dir = tempdir().unwrap();
        let index = SqliteStore::open_in_memory().unwrap();
        let mirror = MirrorStore::new(dir.path()).unwrap();
        let embedder = MockEmbedder::new(8);
        let ing = ingestor(&index, &mirror, &embedder);

        ing.ingest("first version of the note", "a.md", MoleculeType::Prose, [], [], Provenance::Internal, None)
            .unwrap();
        let second = ing
            .ingest(
                "second, quite different version of the note entirely",
                "a.md",
                MoleculeType::Prose,
                [],
                [],
                Provenance::Internal,
                None,
            )
            .unwrap();
        assert!(matches!(second, IngestOutcome::Indexed { .. }));
    }
}

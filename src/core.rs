//! Top-level facade: owns the index store, optional vector index, mirror,
//! embedder, and synonym ring, and exposes the query API surface (spec §6).

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{StarError, StarResult};
use crate::ingest::{IngestOutcome, Ingestor};
use crate::mirror::MirrorStore;
use crate::model::{AtomId, MoleculeId, MoleculeType, Provenance};
use crate::query::QueryOptions;
use crate::sanitizer::sanitize;
use crate::search::{search, SearchResponse};
use crate::storage::{IndexStore, VectorIndex};
use crate::synonym::{SynonymRing, SynonymRingHandle};
use chrono::Utc;

/// A running retrieval core: the object an MCP server or CLI holds onto for
/// the lifetime of a process.
pub struct StarCore {
    index: Box<dyn IndexStore>,
    vector_index: Option<Box<dyn VectorIndex>>,
    mirror: MirrorStore,
    embedder: Box<dyn Embedder>,
    synonyms: SynonymRingHandle,
    config: Config,
}

impl StarCore {
    /// Open a core over `config`, rebuilding the synonym ring from whatever
    /// is already in the index and re-syncing the mirror against it — the
    /// same idempotent path `rebuild_index` takes, so there is no separate
    /// "index is stale" check to get wrong (spec §6 "Persisted state layout").
    pub fn open(
        index: Box<dyn IndexStore>,
        vector_index: Option<Box<dyn VectorIndex>>,
        embedder: Box<dyn Embedder>,
        config: Config,
    ) -> StarResult<Self> {
        let mirror = MirrorStore::new(&config.mirror_root)?;
        let mut core = Self {
            index,
            vector_index,
            mirror,
            embedder,
            synonyms: SynonymRingHandle::new(SynonymRing::default()),
            config,
        };
        core.rebuild_synonym_ring()?;
        core.resync_mirror()?;
        Ok(core)
    }

    fn rebuild_synonym_ring(&self) -> StarResult<()> {
        let edges = self.index.all_edges()?;
        let known_terms = self.index.list_tags(None)?;
        self.synonyms.publish(SynonymRing::build(&edges, &known_terms, 10));
        Ok(())
    }

    fn resync_mirror(&self) -> StarResult<Vec<IngestOutcome>> {
        let ingestor = Ingestor::new(
            self.index.as_ref(),
            self.vector_index.as_deref(),
            &self.mirror,
            self.embedder.as_ref(),
            self.config.embedding_dim,
        );
        ingestor.resync()
    }

    /// Primary operation (spec §6): parse, expand, search planet + walker
    /// concurrently, fuse, and assemble a context string.
    pub async fn search(&self, raw_query: &str, options: QueryOptions) -> StarResult<SearchResponse> {
        let synonyms = self.synonyms.snapshot();
        search(
            raw_query,
            options,
            self.index.as_ref(),
            self.vector_index.as_deref(),
            &self.mirror,
            self.embedder.as_ref(),
            synonyms.as_ref(),
            &self.config,
        )
        .await
    }

    /// Ingest content a caller already has in memory (a paste, an MCP tool
    /// call). Re-derives the synonym ring afterward so new tag co-occurrence
    /// is visible to the next search immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn ingest(
        &self,
        content: &str,
        source_path: &str,
        molecule_type_hint: MoleculeType,
        buckets: impl IntoIterator<Item = String>,
        seed_tags: impl IntoIterator<Item = AtomId>,
        provenance: Provenance,
    ) -> StarResult<IngestOutcome> {
        let ingestor = Ingestor::new(
            self.index.as_ref(),
            self.vector_index.as_deref(),
            &self.mirror,
            self.embedder.as_ref(),
            self.config.embedding_dim,
        );
        let outcome = ingestor.ingest(content, source_path, molecule_type_hint, buckets, seed_tags, provenance, None)?;
        self.rebuild_synonym_ring()?;
        Ok(outcome)
    }

    /// As [`StarCore::ingest`], but with an explicit timestamp — for
    /// backdating historical notes rather than stamping them with the
    /// ingest time.
    #[allow(clippy::too_many_arguments)]
    pub fn ingest_with_timestamp(
        &self,
        content: &str,
        source_path: &str,
        molecule_type_hint: MoleculeType,
        buckets: impl IntoIterator<Item = String>,
        seed_tags: impl IntoIterator<Item = AtomId>,
        provenance: Provenance,
        timestamp: chrono::DateTime<Utc>,
    ) -> StarResult<IngestOutcome> {
        let ingestor = Ingestor::new(
            self.index.as_ref(),
            self.vector_index.as_deref(),
            &self.mirror,
            self.embedder.as_ref(),
            self.config.embedding_dim,
        );
        let outcome =
            ingestor.ingest(content, source_path, molecule_type_hint, buckets, seed_tags, provenance, Some(timestamp))?;
        self.rebuild_synonym_ring()?;
        Ok(outcome)
    }

    /// Mark a molecule quarantined: it stops appearing in default search
    /// results (`MoleculeFilter::matches`) until `restore` is called, but
    /// is never deleted.
    pub fn quarantine(&self, molecule_id: &MoleculeId) -> StarResult<()> {
        self.set_molecule_provenance(molecule_id, Provenance::Quarantine)
    }

    /// Reverse of `quarantine`. The prior provenance (internal vs. external)
    /// isn't tracked separately, so restoring always lands back on
    /// `Internal` — the overwhelmingly common case for anything a user
    /// would bother quarantining and un-quarantining by hand.
    pub fn restore(&self, molecule_id: &MoleculeId) -> StarResult<()> {
        self.set_molecule_provenance(molecule_id, Provenance::Internal)
    }

    fn set_molecule_provenance(&self, molecule_id: &MoleculeId, provenance: Provenance) -> StarResult<()> {
        let mut molecule = self
            .index
            .get_molecule(molecule_id)?
            .ok_or_else(|| StarError::QueryMalformed(format!("unknown molecule {molecule_id}")))?;
        molecule.provenance = provenance;
        let text = self
            .mirror
            .read_range(molecule.compound_id.as_str(), molecule.start_byte, molecule.end_byte)?;
        let text = String::from_utf8_lossy(&text).into_owned();
        self.index.upsert_molecule(&molecule, &text)
    }

    /// Replace a single molecule's text in place: splices `content` into the
    /// compound's mirrored bytes at the molecule's byte range, shifts every
    /// later molecule in the same compound by the resulting length delta,
    /// and re-derives the edited molecule's fingerprint and embedding.
    pub fn update_content(&self, molecule_id: &MoleculeId, content: &str) -> StarResult<()> {
        let molecule = self
            .index
            .get_molecule(molecule_id)?
            .ok_or_else(|| StarError::QueryMalformed(format!("unknown molecule {molecule_id}")))?;
        let compound = self
            .index
            .get_compound(&molecule.compound_id)?
            .ok_or_else(|| StarError::invariant(format!("compound {} missing for known molecule", molecule.compound_id)))?;

        let whole = self.mirror.read_all(compound.id.as_str())?;
        let sanitized = sanitize(content);
        let mut rewritten = String::with_capacity(whole.len());
        rewritten.push_str(&whole[..molecule.start_byte]);
        rewritten.push_str(&sanitized);
        rewritten.push_str(&whole[molecule.end_byte..]);
        self.mirror.write(compound.id.as_str(), &rewritten)?;

        let delta = sanitized.len() as i64 - molecule.byte_len() as i64;
        let hasher = crate::fingerprint::SimHasher::default();
        let outcome = self
            .embedder
            .embed_batch(&[sanitized.as_str()])
            .unwrap_or_else(|_| vec![crate::embedding::EmbedOutcome::Failed]);

        for mut sibling in self.index.molecules_for_compound(&molecule.compound_id)? {
            if sibling.id == molecule.id {
                sibling.end_byte = (sibling.start_byte as i64 + sanitized.len() as i64) as usize;
                sibling.simhash = hasher.fingerprint(&sanitized);
                if let Some(crate::embedding::EmbedOutcome::Embedded(vector)) = outcome.first() {
                    sibling = sibling.with_embedding(vector.clone());
                    if let Some(vector_index) = self.vector_index.as_deref() {
                        vector_index.upsert_vector(&sibling.id, vector)?;
                    }
                } else {
                    sibling.embedding_pending = true;
                }
                self.index.upsert_molecule(&sibling, &sanitized)?;
            } else if sibling.sequence > molecule.sequence {
                sibling.start_byte = (sibling.start_byte as i64 + delta) as usize;
                sibling.end_byte = (sibling.end_byte as i64 + delta) as usize;
                let shifted_text = rewritten
                    .get(sibling.start_byte..sibling.end_byte)
                    .ok_or_else(|| StarError::invariant("sibling byte range fell outside rewritten compound"))?;
                self.index.upsert_molecule(&sibling, shifted_text)?;
            }
        }

        let mut updated_compound = compound;
        updated_compound.content_hash = crate::model::ContentHash::of(&rewritten);
        updated_compound.last_ingest_ts = Utc::now();
        self.index.upsert_compound(&updated_compound)
    }

    pub fn list_buckets(&self) -> StarResult<Vec<String>> {
        self.index.list_buckets()
    }

    pub fn list_tags(&self, buckets: Option<&[String]>) -> StarResult<Vec<AtomId>> {
        self.index.list_tags(buckets)
    }

    /// Walk the mirror and re-ingest every compound whose on-disk hash
    /// differs from the stored one, then rebuild the synonym ring.
    pub fn rebuild_index(&self) -> StarResult<Vec<IngestOutcome>> {
        let outcomes = self.resync_mirror()?;
        self.rebuild_synonym_ring()?;
        Ok(outcomes)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

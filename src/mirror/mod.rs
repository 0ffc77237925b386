//! Mirror store: the filesystem tree that owns original compound bytes.
//!
//! Everything else in the crate — index rows, embeddings, fingerprints — is
//! derived and rebuildable; the mirror is the one thing that is not.

use crate::error::{StarError, StarResult};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct MirrorStore {
    root: PathBuf,
}

impl MirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> StarResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, compound_id: &str) -> PathBuf {
        self.root.join(compound_id)
    }

    /// Write `content` for `compound_id`, atomically: write to a temp file
    /// in the same directory, then rename over the destination. Readers
    /// never observe a torn write because `rename` is atomic on the same
    /// filesystem.
    pub fn write(&self, compound_id: &str, content: &str) -> StarResult<()> {
        let dest = self.path_for(compound_id);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = tempfile::NamedTempFile::new_in(
            dest.parent().unwrap_or_else(|| Path::new(".")),
        )?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&dest)
            .map_err(|e| StarError::Io(e.error))?;
        Ok(())
    }

    pub fn exists(&self, compound_id: &str) -> bool {
        self.path_for(compound_id).is_file()
    }

    pub fn read_all(&self, compound_id: &str) -> StarResult<String> {
        fs::read_to_string(self.path_for(compound_id))
            .map_err(|_| StarError::MirrorMiss(compound_id.to_string()))
    }

    /// Read the byte range `[start, end)` of a compound's mirrored file,
    /// used by the context assembler to inflate molecule ids to text.
    pub fn read_range(&self, compound_id: &str, start: usize, end: usize) -> StarResult<Vec<u8>> {
        let mut file =
            File::open(self.path_for(compound_id)).map_err(|_| StarError::MirrorMiss(compound_id.to_string()))?;
        file.seek(SeekFrom::Start(start as u64))?;
        let mut buf = vec![0u8; end.saturating_sub(start)];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn delete(&self, compound_id: &str) -> StarResult<()> {
        let path = self.path_for(compound_id);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Walk the mirror tree, yielding `(compound_id, path)` for every file
    /// under the root — used by the ingestion orchestrator's bulk re-sync.
    pub fn walk(&self) -> StarResult<Vec<(String, PathBuf)>> {
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                out.push((rel, entry.path().to_path_buf()));
            }
        }
        Ok(out)
    }
}

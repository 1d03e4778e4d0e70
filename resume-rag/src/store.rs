//! On-disk persistence for a [`Corpus`].
//!
//! A corpus is stored as two JSON files in one directory:
//!
//! - [`INDEX_FILE`] — the normalized vectors plus the [`CorpusManifest`]
//! - [`CHUNKS_FILE`] — the chunk texts plus the fingerprint they hash to
//!
//! Both are written to a temporary sibling and renamed into place. Loading
//! cross-checks the pair and refuses anything that does not describe one
//! build.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::{Corpus, CorpusManifest};
use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::index::{EmbeddingIndex, METRIC};

/// File name of the persisted index.
pub const INDEX_FILE: &str = "resume.index.json";
/// File name of the persisted chunk list.
pub const CHUNKS_FILE: &str = "chunks.json";
/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    metric: &'a str,
    manifest: &'a CorpusManifest,
    count: usize,
    vectors: &'a [Vec<f32>],
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    metric: String,
    manifest: CorpusManifest,
    count: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChunksFileRef<'a> {
    format_version: u32,
    fingerprint: &'a str,
    count: usize,
    chunks: &'a [Chunk],
}

#[derive(Deserialize)]
struct ChunksFile {
    format_version: u32,
    fingerprint: String,
    count: usize,
    chunks: Vec<Chunk>,
}

/// Write `corpus` to `dir`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`RagError::PersistenceError`] if a file cannot be written.
pub fn save(corpus: &Corpus, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| persistence_error(dir, e))?;

    let manifest = corpus.manifest();
    let index = IndexFileRef {
        format_version: FORMAT_VERSION,
        metric: METRIC,
        manifest,
        count: corpus.index().len(),
        vectors: corpus.index().vectors(),
    };
    let chunks = ChunksFileRef {
        format_version: FORMAT_VERSION,
        fingerprint: &manifest.fingerprint,
        count: corpus.len(),
        chunks: corpus.chunks(),
    };

    write_atomic(&dir.join(INDEX_FILE), &serde_json::to_vec(&index)?)?;
    write_atomic(&dir.join(CHUNKS_FILE), &serde_json::to_vec_pretty(&chunks)?)?;

    info!(dir = %dir.display(), chunks = corpus.len(), "saved corpus artifacts");
    Ok(())
}

/// Load the corpus stored in `dir`.
///
/// # Errors
///
/// Returns [`RagError::PersistenceError`] if a file is missing, unreadable,
/// or not valid JSON, and [`RagError::BuildInconsistency`] if the two files
/// do not describe the same build.
pub fn load(dir: impl AsRef<Path>) -> Result<Corpus> {
    let dir = dir.as_ref();
    let index: IndexFile = read_json(&dir.join(INDEX_FILE))?;
    let chunks: ChunksFile = read_json(&dir.join(CHUNKS_FILE))?;

    for (name, version) in
        [(INDEX_FILE, index.format_version), (CHUNKS_FILE, chunks.format_version)]
    {
        if version != FORMAT_VERSION {
            return Err(RagError::BuildInconsistency(format!(
                "{name} has format version {version}, expected {FORMAT_VERSION}"
            )));
        }
    }
    if index.metric != METRIC {
        return Err(RagError::BuildInconsistency(format!(
            "{INDEX_FILE} uses metric '{}', expected '{METRIC}'",
            index.metric
        )));
    }
    if index.count != index.vectors.len() {
        return Err(RagError::BuildInconsistency(format!(
            "{INDEX_FILE} declares {} vectors but holds {}",
            index.count,
            index.vectors.len()
        )));
    }
    if chunks.count != chunks.chunks.len() {
        return Err(RagError::BuildInconsistency(format!(
            "{CHUNKS_FILE} declares {} chunks but holds {}",
            chunks.count,
            chunks.chunks.len()
        )));
    }
    if chunks.fingerprint != index.manifest.fingerprint {
        return Err(RagError::BuildInconsistency(format!(
            "{CHUNKS_FILE} fingerprint {} does not match {INDEX_FILE} fingerprint {}",
            chunks.fingerprint, index.manifest.fingerprint
        )));
    }

    let dimension = index.manifest.dimension;
    if let Some(bad) = index.vectors.iter().position(|v| v.len() != dimension) {
        return Err(RagError::BuildInconsistency(format!(
            "vector {bad} has length {}, expected {dimension}",
            index.vectors[bad].len()
        )));
    }

    let vectors = EmbeddingIndex::from_vectors(dimension, index.vectors)
        .map_err(|e| RagError::BuildInconsistency(e.to_string()))?;
    let corpus = Corpus::from_parts(chunks.chunks, vectors, index.manifest)?;

    info!(
        dir = %dir.display(),
        chunks = corpus.len(),
        model = %corpus.manifest().embedding_model,
        "loaded corpus artifacts"
    );
    Ok(corpus)
}

/// Whether `dir` contains both artifacts.
pub fn exists(dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref();
    dir.join(INDEX_FILE).is_file() && dir.join(CHUNKS_FILE).is_file()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| persistence_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| persistence_error(path, e))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(|e| persistence_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        persistence_error(path, e)
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn persistence_error(path: &Path, err: impl std::fmt::Display) -> RagError {
    RagError::PersistenceError { path: path.display().to_string(), message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_is_a_sibling() {
        let tmp = tmp_path(Path::new("models/chunks.json"));
        assert_eq!(tmp, Path::new("models/chunks.json.tmp"));
    }

    #[test]
    fn missing_directory_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, RagError::PersistenceError { .. }));
        assert!(!err.is_fatal());
        assert!(!exists(dir.path()));
    }
}

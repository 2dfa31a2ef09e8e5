/// In-memory duplicate detection for one crawl
///
/// The index is built from persisted history when a crawl starts and shared by
/// `Arc` between the controller and every article task. Writes go through a
/// short write-lock section; nothing holds a lock across I/O.
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// The record that owns a piece of media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalVisual {
    pub record_id: String,
    pub visual_id: String,
    pub extension: String,
    pub content_hash: String,
}

/// Plain data loaded from storage to seed a `DedupIndex`
#[derive(Debug, Clone, Default)]
pub struct DedupSnapshot {
    pub record_ids: HashSet<String>,

    /// Content hash -> earliest record that produced it
    pub hashes: HashMap<String, CanonicalVisual>,
}

/// Outcome of claiming a content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashClaim {
    /// The caller is now the canonical owner and must keep its file
    Canonical,

    /// Someone else already owns the hash
    Duplicate(CanonicalVisual),
}

/// Known record ids and media hashes for one owner
#[derive(Debug, Default)]
pub struct DedupIndex {
    record_ids: RwLock<HashSet<String>>,
    hashes: RwLock<HashMap<String, CanonicalVisual>>,
}

impl DedupIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index seeded from persisted history
    pub fn from_snapshot(snapshot: DedupSnapshot) -> Self {
        Self {
            record_ids: RwLock::new(snapshot.record_ids),
            hashes: RwLock::new(snapshot.hashes),
        }
    }

    /// Returns true if the record id was archived before or already seen in this crawl
    pub fn record_exists(&self, record_id: &str) -> bool {
        self.record_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(record_id)
    }

    /// Marks a record id as seen
    ///
    /// Returns false if the id was already known.
    pub fn insert_record(&self, record_id: &str) -> bool {
        self.record_ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record_id.to_string())
    }

    /// Looks up the canonical owner of a content hash
    pub fn duplicate_of(&self, content_hash: &str) -> Option<CanonicalVisual> {
        self.hashes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(content_hash)
            .cloned()
    }

    /// Atomically checks a hash and claims it when unowned
    ///
    /// Two concurrent claims for the same hash never both come back `Canonical`.
    /// Callers claim only once the candidate's file is on disk, so every indexed
    /// hash names a file that exists.
    pub fn claim_hash(&self, candidate: CanonicalVisual) -> HashClaim {
        let mut hashes = self.hashes.write().unwrap_or_else(PoisonError::into_inner);
        match hashes.get(&candidate.content_hash) {
            Some(existing) => HashClaim::Duplicate(existing.clone()),
            None => {
                hashes.insert(candidate.content_hash.clone(), candidate);
                HashClaim::Canonical
            }
        }
    }

    /// Number of known record ids
    pub fn record_count(&self) -> usize {
        self.record_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of indexed content hashes
    pub fn hash_count(&self) -> usize {
        self.hashes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

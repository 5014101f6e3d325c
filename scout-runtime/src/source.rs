//! Profile sources
//!
//! Where raw creator records come from. Scraping lives outside this crate;
//! sources here read what an importer already produced.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use scout_core::{CreatorProfile, RawCreatorRecord, RawNumber};

/// Errors from reading a profile source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Supplier of raw creator records
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Fetch every available record
    async fn fetch(&self) -> Result<Vec<RawCreatorRecord>, SourceError>;
}

/// Accepted file layouts: a bare array or `{ "creators": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    List(Vec<RawCreatorRecord>),
    Wrapped { creators: Vec<RawCreatorRecord> },
}

/// Records from a JSON export on disk
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("json:{}", path.display());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProfileSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawCreatorRecord>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;

        let records = match serde_json::from_str(&content).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })? {
            RecordFile::List(records) => records,
            RecordFile::Wrapped { creators } => creators,
        };

        debug!("Read {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// Records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<RawCreatorRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<RawCreatorRecord>) -> Self {
        Self { records }
    }

    pub fn with_record(mut self, record: RawCreatorRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Add an already-clean profile
    pub fn with_profile(self, profile: &CreatorProfile) -> Self {
        self.with_record(raw_from_profile(profile))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ProfileSource for InMemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self) -> Result<Vec<RawCreatorRecord>, SourceError> {
        Ok(self.records.clone())
    }
}

fn raw_from_profile(profile: &CreatorProfile) -> RawCreatorRecord {
    let count = |n: Option<u64>| n.map(|v| RawNumber::Number(v as f64));
    RawCreatorRecord {
        handle: Some(profile.handle.clone()),
        follower_count: count(profile.follower_count),
        following_count: count(profile.following_count),
        post_count: count(profile.post_count),
        avg_engagement_rate: profile.avg_engagement_rate.map(RawNumber::Number),
        bio_text: Some(profile.bio_text.clone()),
        recent_post_summaries: Some(profile.recent_post_summaries.clone()),
        external_url: profile.external_url.clone(),
    }
}

//! # Time-Bounded Record Store
//!
//! ## Purpose
//! Persistent storage backing the cache orchestrators. Each cached domain
//! (news, competitors) gets a metadata tree keyed by cache key and a
//! content tree keyed by the record's natural identity (url or name).
//!
//! ## Input/Output Specification
//! - **Input**: cache metadata, content records, TTLs
//! - **Output**: fresh-record reads, upserts, cleanup and invalidation
//! - **Storage**: sled embedded database, bincode-encoded values
//!
//! ## Key Features
//! - Atomic multi-tree transactions for metadata + content writes
//! - Upsert-by-natural-key with field-level merge
//! - Expiry-aware reads: a row past its TTL is never returned

use crate::errors::{IntelError, Result};
use crate::{CacheMetadata, CompetitorProfile, NewsArticle};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A record that can live in a cache domain: it has a natural identity key,
/// a topic partition, and an independent per-row TTL.
pub trait CacheRecord: Serialize + DeserializeOwned + Clone {
    /// Natural dedup key, globally unique regardless of originating query
    fn identity(&self) -> &str;
    fn topic(&self) -> &str;
    fn expires_at(&self) -> DateTime<Utc>;
    fn set_expires_at(&mut self, at: DateTime<Utc>);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
    /// Merge a previously stored row into this incoming one: incoming
    /// non-empty fields win, gaps are filled from the existing row, and
    /// the original creation timestamp is preserved.
    fn merge_existing(&mut self, existing: &Self);
}

impl CacheRecord for NewsArticle {
    fn identity(&self) -> &str {
        &self.url
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn set_expires_at(&mut self, at: DateTime<Utc>) {
        self.expires_at = at;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn merge_existing(&mut self, existing: &Self) {
        self.id = existing.id.clone();
        self.created_at = existing.created_at;
        if self.snippet.is_none() {
            self.snippet = existing.snippet.clone();
        }
    }
}

impl CacheRecord for CompetitorProfile {
    fn identity(&self) -> &str {
        &self.name
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn set_expires_at(&mut self, at: DateTime<Utc>) {
        self.expires_at = at;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn merge_existing(&mut self, existing: &Self) {
        self.id = existing.id.clone();
        self.created_at = existing.created_at;
        // Incoming risk level always wins; other fields only when present
        if self.description.is_none() {
            self.description = existing.description.clone();
        }
        if self.website.is_none() {
            self.website = existing.website.clone();
        }
        if self.founded_year.is_none() {
            self.founded_year = existing.founded_year;
        }
        if self.employee_count.is_none() {
            self.employee_count = existing.employee_count.clone();
        }
        if self.last_funding.is_none() {
            self.last_funding = existing.last_funding.clone();
        }
        if self.funding_amount.is_none() {
            self.funding_amount = existing.funding_amount.clone();
        }
        if self.valuation.is_none() {
            self.valuation = existing.valuation.clone();
        }
        if self.recent_news.is_none() {
            self.recent_news = existing.recent_news.clone();
        }
    }
}

/// Handle to the shared sled database. Explicitly constructed and injected
/// into the cache orchestrators; there is no ambient singleton.
pub struct CacheStore {
    db: sled::Db,
}

impl CacheStore {
    /// Open (or create) the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = sled::open(path)?;
        tracing::info!("Cache store opened at {:?}", path);
        Ok(Self { db })
    }

    /// Open one cached domain, creating its trees if needed
    pub fn domain(&self, family: &'static str) -> Result<CacheDomain> {
        let meta = self.db.open_tree(format!("{}_meta", family))?;
        let content = self.db.open_tree(format!("{}_content", family))?;
        Ok(CacheDomain {
            db: self.db.clone(),
            meta,
            content,
            family,
        })
    }

    /// Round-trip a sentinel value through the default tree
    pub fn health_check(&self) -> Result<()> {
        let key = b"health_check";
        self.db.insert(key, b"ok")?;
        if self.db.get(key)?.is_none() {
            return Err(IntelError::Internal {
                message: "Health check value not found".to_string(),
            });
        }
        self.db.remove(key)?;
        Ok(())
    }
}

/// One cached domain: cache metadata plus content rows
#[derive(Clone)]
pub struct CacheDomain {
    db: sled::Db,
    meta: sled::Tree,
    content: sled::Tree,
    family: &'static str,
}

impl CacheDomain {
    /// Look up cache metadata by key
    pub fn metadata(&self, cache_key: &str) -> Result<Option<CacheMetadata>> {
        match self.meta.get(cache_key.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load all non-expired records for a topic
    pub fn fresh_records<R: CacheRecord>(
        &self,
        topic: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<R>> {
        let mut records = Vec::new();
        for entry in self.content.iter() {
            let (_, bytes) = entry?;
            let record: R = bincode::deserialize(&bytes)?;
            if record.topic() == topic && record.expires_at() > now {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Load every record in the domain, expired or not
    pub fn all_records<R: CacheRecord>(&self) -> Result<Vec<R>> {
        let mut records = Vec::new();
        for entry in self.content.iter() {
            let (_, bytes) = entry?;
            records.push(bincode::deserialize(&bytes)?);
        }
        Ok(records)
    }

    /// Write cache metadata and upsert all records in one atomic
    /// transaction. A failure leaves the prior cache entry intact.
    pub fn store<R: CacheRecord>(
        &self,
        metadata: &CacheMetadata,
        records: &[R],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let result: std::result::Result<(), TransactionError<IntelError>> =
            (&self.meta, &self.content).transaction(|(meta_tx, content_tx)| {
                let meta_bytes = bincode::serialize(metadata)
                    .map_err(|e| ConflictableTransactionError::Abort(IntelError::from(e)))?;
                meta_tx.insert(metadata.cache_key.as_bytes(), meta_bytes)?;

                for record in records {
                    let mut incoming = record.clone();
                    if let Some(existing_bytes) = content_tx.get(incoming.identity().as_bytes())? {
                        let existing: R = bincode::deserialize(&existing_bytes)
                            .map_err(|e| ConflictableTransactionError::Abort(IntelError::from(e)))?;
                        incoming.merge_existing(&existing);
                    }
                    incoming.set_expires_at(metadata.expires_at);
                    incoming.set_updated_at(now);

                    let bytes = bincode::serialize(&incoming)
                        .map_err(|e| ConflictableTransactionError::Abort(IntelError::from(e)))?;
                    content_tx.insert(incoming.identity().as_bytes(), bytes)?;
                }

                Ok(())
            });

        result.map_err(|e| match e {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => IntelError::Database(err),
        })?;

        self.db.flush()?;
        tracing::debug!(
            family = self.family,
            topic = %metadata.topic,
            records = records.len(),
            "stored cache entry"
        );
        Ok(())
    }

    /// Delete all metadata and records for a topic. Returns
    /// (records removed, cache entries removed).
    pub fn invalidate<R: CacheRecord>(&self, topic: &str) -> Result<(usize, usize)> {
        let mut meta_keys = Vec::new();
        for entry in self.meta.iter() {
            let (key, bytes) = entry?;
            let metadata: CacheMetadata = bincode::deserialize(&bytes)?;
            if metadata.topic == topic {
                meta_keys.push(key);
            }
        }

        let mut record_keys = Vec::new();
        for entry in self.content.iter() {
            let (key, bytes) = entry?;
            let record: R = bincode::deserialize(&bytes)?;
            if record.topic() == topic {
                record_keys.push(key);
            }
        }

        for key in &meta_keys {
            self.meta.remove(key)?;
        }
        for key in &record_keys {
            self.content.remove(key)?;
        }
        self.db.flush()?;

        tracing::info!(
            family = self.family,
            topic,
            entries = meta_keys.len(),
            records = record_keys.len(),
            "invalidated cache"
        );
        Ok((record_keys.len(), meta_keys.len()))
    }

    /// Delete all metadata and records whose expiry has passed, regardless
    /// of topic. Returns (records removed, cache entries removed).
    pub fn cleanup_expired<R: CacheRecord>(&self, now: DateTime<Utc>) -> Result<(usize, usize)> {
        let mut meta_keys = Vec::new();
        for entry in self.meta.iter() {
            let (key, bytes) = entry?;
            let metadata: CacheMetadata = bincode::deserialize(&bytes)?;
            if metadata.expires_at <= now {
                meta_keys.push(key);
            }
        }

        let mut record_keys = Vec::new();
        for entry in self.content.iter() {
            let (key, bytes) = entry?;
            let record: R = bincode::deserialize(&bytes)?;
            if record.expires_at() <= now {
                record_keys.push(key);
            }
        }

        for key in &meta_keys {
            self.meta.remove(key)?;
        }
        for key in &record_keys {
            self.content.remove(key)?;
        }
        self.db.flush()?;

        tracing::info!(
            family = self.family,
            entries = meta_keys.len(),
            records = record_keys.len(),
            "cleaned up expired cache"
        );
        Ok((record_keys.len(), meta_keys.len()))
    }

    /// Total number of cache metadata entries
    pub fn entry_count(&self) -> usize {
        self.meta.len()
    }

    /// Total number of content records
    pub fn record_count(&self) -> usize {
        self.content.len()
    }

    /// Record counts grouped by topic
    pub fn counts_by_topic<R: CacheRecord>(&self) -> Result<HashMap<String, usize>> {
        let mut counts = HashMap::new();
        for record in self.all_records::<R>()? {
            *counts.entry(record.topic().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

/// Convenience constructor shared by the orchestrators and tests
pub fn open_store<P: AsRef<Path>>(path: P) -> Result<Arc<CacheStore>> {
    Ok(Arc::new(CacheStore::open(path)?))
}

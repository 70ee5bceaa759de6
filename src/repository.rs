//! Shard repositories

use crate::errors::StorageError;
use crate::shard::Shard;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

const SHARD_EXTENSION: &str = "shard";

/// Append-only store of log shards.
///
/// Append must be atomic per shard and safe to call from many tasks at once.
/// Deleting an unknown id succeeds.
#[async_trait]
pub trait ShardRepository: Send + Sync {
    async fn append(&self, shard: Shard) -> Result<(), StorageError>;

    async fn list(&self) -> Result<Vec<Shard>, StorageError>;

    async fn delete(&self, shard_id: &str) -> Result<(), StorageError>;
}

/// Volatile repository, mostly for tests and for platforms without storage
#[derive(Debug, Default)]
pub struct InMemoryShardRepository {
    shards: RwLock<Vec<Shard>>,
}

impl InMemoryShardRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShardRepository for InMemoryShardRepository {
    async fn append(&self, shard: Shard) -> Result<(), StorageError> {
        let mut shards = self.shards.write().await;

        if shards.iter().any(|existing| existing.id() == shard.id()) {
            return Err(StorageError::Unavailable(format!("duplicate shard id {}", shard.id())));
        }

        shards.push(shard);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Shard>, StorageError> {
        Ok(self.shards.read().await.clone())
    }

    async fn delete(&self, shard_id: &str) -> Result<(), StorageError> {
        self.shards.write().await.retain(|shard| shard.id() != shard_id);
        Ok(())
    }
}

#[derive(Debug)]
struct FileIndex {
    paths: HashMap<String, (u64, PathBuf)>,
    next_sequence: u64,
}

/// One JSON file per shard, named `<sequence>-<id>.shard`.
///
/// The sequence number records append order so shards sharing a timestamp
/// list in the order they were written.
#[derive(Debug)]
pub struct FileShardRepository {
    dir: PathBuf,
    index: Mutex<FileIndex>,
}

impl FileShardRepository {
    /// Open (or create) a shard directory and index the shards already in it
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut paths = HashMap::new();
        let mut next_sequence = 0;
        let mut entries = fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some((sequence, id)) = parse_file_name(&path) else {
                continue;
            };
            next_sequence = next_sequence.max(sequence + 1);
            paths.insert(id, (sequence, path));
        }

        debug!("Opened shard directory {} with {} shards", dir.display(), paths.len());

        Ok(Self {
            dir,
            index: Mutex::new(FileIndex { paths, next_sequence }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

async fn write_then_rename(temp_path: &Path, final_path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp_path, final_path).await
}

fn parse_file_name(path: &Path) -> Option<(u64, String)> {
    if path.extension()?.to_str()? != SHARD_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (sequence, id) = stem.split_once('-')?;
    Some((sequence.parse().ok()?, id.to_string()))
}

#[async_trait]
impl ShardRepository for FileShardRepository {
    async fn append(&self, shard: Shard) -> Result<(), StorageError> {
        let bytes = shard.to_json()?;
        let mut index = self.index.lock().await;

        if index.paths.contains_key(shard.id()) {
            return Err(StorageError::Unavailable(format!("duplicate shard id {}", shard.id())));
        }

        let sequence = index.next_sequence;
        let file_name = format!("{:020}-{}", sequence, shard.id());
        let final_path = self.dir.join(format!("{}.{}", file_name, SHARD_EXTENSION));
        let temp_path = self.dir.join(format!("{}.tmp", file_name));

        if let Err(e) = write_then_rename(&temp_path, &final_path, &bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        index.next_sequence += 1;
        index.paths.insert(shard.id().to_string(), (sequence, final_path));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Shard>, StorageError> {
        let mut located: Vec<(u64, PathBuf)> = {
            let index = self.index.lock().await;
            index.paths.values().cloned().collect()
        };
        located.sort_by_key(|(sequence, _)| *sequence);

        let mut shards = Vec::with_capacity(located.len());
        for (_, path) in located {
            match fs::read(&path).await {
                Ok(bytes) => shards.push(Shard::from_json(&bytes)?),
                // deleted concurrently
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        shards.sort_by_key(Shard::timestamp);
        Ok(shards)
    }

    async fn delete(&self, shard_id: &str) -> Result<(), StorageError> {
        let removed = self.index.lock().await.paths.remove(shard_id);
        let Some((_, path)) = removed else {
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Shard file {} already gone", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

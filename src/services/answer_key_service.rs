use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::participant_answer::SectionType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEntry {
    pub question: i32,
    pub answer: String,
}

impl<'de> Deserialize<'de> for KeyEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            question: serde_json::Value,
            answer: serde_json::Value,
        }

        let raw = Raw::deserialize(deserializer)?;
        let question = match &raw.question {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .and_then(|q| i32::try_from(q).ok())
        .ok_or_else(|| serde::de::Error::custom("question must be an integer"))?;

        let answer = match raw.answer {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => return Err(serde::de::Error::custom("answer must be a string")),
        };

        Ok(KeyEntry { question, answer })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerKey {
    #[serde(default)]
    pub listening: Vec<KeyEntry>,
    #[serde(default)]
    pub reading: Vec<KeyEntry>,
}

impl AnswerKey {
    pub fn section(&self, section: SectionType) -> &[KeyEntry] {
        match section {
            SectionType::Listening => &self.listening,
            SectionType::Reading => &self.reading,
        }
    }
}

#[derive(Deserialize)]
struct AnswerKeyFile {
    answers: AnswerKey,
}

/// Bounded in-memory map of parsed answer keys. At capacity the entry that
/// was inserted first is dropped.
#[derive(Clone, Debug)]
pub struct AnswerKeyCache {
    capacity: usize,
    inner: Arc<Mutex<CacheInner>>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<Uuid, Arc<AnswerKey>>,
    order: VecDeque<Uuid>,
}

impl AnswerKeyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Arc::new(Mutex::new(CacheInner::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<AnswerKey>> {
        self.lock().entries.get(&id).cloned()
    }

    pub fn insert(&self, id: Uuid, key: Arc<AnswerKey>) {
        let mut guard = self.lock();
        if guard.entries.insert(id, key).is_some() {
            return;
        }
        guard.order.push_back(id);
        while guard.order.len() > self.capacity {
            if let Some(oldest) = guard.order.pop_front() {
                guard.entries.remove(&oldest);
            }
        }
    }

    pub fn invalidate(&self, id: Uuid) -> bool {
        let mut guard = self.lock();
        guard.order.retain(|k| *k != id);
        guard.entries.remove(&id).is_some()
    }

    /// Returns the number of entries dropped.
    pub fn clear(&self) -> usize {
        let mut guard = self.lock();
        let dropped = guard.entries.len();
        guard.entries.clear();
        guard.order.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads `<dir>/<materials_id>.json` answer keys through the shared cache.
#[derive(Clone, Debug)]
pub struct AnswerKeyService {
    dir: PathBuf,
    cache: AnswerKeyCache,
}

impl AnswerKeyService {
    pub fn new(dir: impl Into<PathBuf>, cache: AnswerKeyCache) -> Self {
        Self {
            dir: dir.into(),
            cache,
        }
    }

    pub fn cache(&self) -> &AnswerKeyCache {
        &self.cache
    }

    pub fn path_for(&self, test_materials_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", test_materials_id))
    }

    pub async fn load(&self, test_materials_id: Uuid) -> Result<Arc<AnswerKey>> {
        if let Some(key) = self.cache.get(test_materials_id) {
            return Ok(key);
        }

        let path = self.path_for(test_materials_id);
        let key = Arc::new(read_key_file(&path).await?);
        tracing::info!(
            test_materials_id = %test_materials_id,
            listening = key.listening.len(),
            reading = key.reading.len(),
            "answer key loaded"
        );
        self.cache.insert(test_materials_id, key.clone());
        Ok(key)
    }
}

async fn read_key_file(path: &Path) -> Result<AnswerKey> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "answer key file unreadable");
        Error::Internal(format!("answer key unavailable: {}", e))
    })?;
    let file: AnswerKeyFile = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "answer key file malformed");
        Error::Internal(format!("answer key malformed: {}", e))
    })?;
    Ok(file.answers)
}

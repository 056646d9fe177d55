//! In-memory [`Store`] implementation for testing.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Aggregations are computed by scanning the annotation list on every call.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{timestamp_now, Annotation, AnnotationView, Content, CorpusStats, User};

use super::{ActivityMark, EmbeddingRow, PinnedRow, Store};

/// In-memory store for tests and embedding-free tooling.
pub struct InMemoryStore {
    contents: RwLock<HashMap<String, Content>>,
    annotations: RwLock<Vec<Annotation>>,
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            contents: RwLock::new(HashMap::new()),
            annotations: RwLock::new(Vec::new()),
            users: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

impl InMemoryStore {
    fn view(&self, a: &Annotation) -> Result<AnnotationView> {
        let users = read(&self.users)?;
        Ok(AnnotationView {
            id: a.id.clone(),
            content_hash: a.content_hash.clone(),
            owner_id: a.owner_id.clone(),
            username: users.get(&a.owner_id).and_then(|u| u.username.clone()),
            notes: a.notes.clone(),
            created_at: a.created_at,
            pinned_at: a.pinned_at,
        })
    }

    fn annotated_hashes(&self) -> Result<BTreeSet<String>> {
        let annotations = read(&self.annotations)?;
        Ok(annotations
            .iter()
            .filter(|a| a.is_active())
            .map(|a| a.content_hash.clone())
            .collect())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_content_if_absent(&self, content: &Content) -> Result<bool> {
        let mut contents = write(&self.contents)?;
        if contents.contains_key(&content.hash) {
            return Ok(false);
        }
        contents.insert(content.hash.clone(), content.clone());
        Ok(true)
    }

    async fn get_content(&self, hash: &str) -> Result<Option<Content>> {
        Ok(read(&self.contents)?.get(hash).cloned())
    }

    async fn get_embedding(&self, hash: &str) -> Result<Option<Vec<f32>>> {
        Ok(read(&self.contents)?.get(hash).map(|c| c.embedding.clone()))
    }

    async fn get_texts(&self, hashes: &[String]) -> Result<HashMap<String, String>> {
        let contents = read(&self.contents)?;
        Ok(hashes
            .iter()
            .filter_map(|h| contents.get(h).map(|c| (h.clone(), c.text.clone())))
            .collect())
    }

    async fn scan_embeddings(&self) -> Result<Vec<EmbeddingRow>> {
        Ok(read(&self.contents)?
            .values()
            .map(|c| EmbeddingRow {
                hash: c.hash.clone(),
                embedding: c.embedding.clone(),
            })
            .collect())
    }

    async fn insert_annotation(&self, annotation: &Annotation) -> Result<()> {
        if !read(&self.contents)?.contains_key(&annotation.content_hash) {
            return Err(anyhow!(
                "annotation references unknown content {}",
                annotation.content_hash
            ));
        }
        write(&self.annotations)?.push(annotation.clone());
        Ok(())
    }

    async fn owner_annotations(&self, hash: &str, owner_id: &str) -> Result<Vec<Annotation>> {
        let annotations = read(&self.annotations)?;
        let mut rows: Vec<Annotation> = annotations
            .iter()
            .filter(|a| a.content_hash == hash && a.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn set_pinned_at(
        &self,
        annotation_id: &str,
        pinned_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut annotations = write(&self.annotations)?;
        if let Some(a) = annotations.iter_mut().find(|a| a.id == annotation_id) {
            a.pinned_at = pinned_at;
        }
        Ok(())
    }

    async fn set_deleted_at(&self, annotation_id: &str, deleted_at: DateTime<Utc>) -> Result<()> {
        let mut annotations = write(&self.annotations)?;
        if let Some(a) = annotations.iter_mut().find(|a| a.id == annotation_id) {
            a.deleted_at = Some(deleted_at);
        }
        Ok(())
    }

    async fn delete_active_for_owner(
        &self,
        hash: &str,
        owner_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut annotations = write(&self.annotations)?;
        let mut changed = 0;
        for a in annotations
            .iter_mut()
            .filter(|a| a.content_hash == hash && a.owner_id == owner_id && a.is_active())
        {
            a.deleted_at = Some(deleted_at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn active_annotations(&self, hashes: &[String]) -> Result<Vec<AnnotationView>> {
        let wanted: HashSet<&str> = hashes.iter().map(String::as_str).collect();
        let mut rows: Vec<Annotation> = read(&self.annotations)?
            .iter()
            .filter(|a| a.is_active() && wanted.contains(a.content_hash.as_str()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rows.iter().map(|a| self.view(a)).collect()
    }

    async fn annotation_history(&self, hash: &str) -> Result<Vec<Annotation>> {
        let mut rows: Vec<Annotation> = read(&self.annotations)?
            .iter()
            .filter(|a| a.content_hash == hash)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn latest_activity(
        &self,
        owner_id: Option<&str>,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ActivityMark>> {
        let mut latest: HashMap<String, DateTime<Utc>> = HashMap::new();
        for a in read(&self.annotations)?.iter() {
            if !a.is_active() || owner_id.is_some_and(|o| o != a.owner_id) {
                continue;
            }
            latest
                .entry(a.content_hash.clone())
                .and_modify(|ts| *ts = (*ts).max(a.created_at))
                .or_insert(a.created_at);
        }

        let contents = read(&self.contents)?;
        let mut marks: Vec<ActivityMark> = latest
            .into_iter()
            .filter(|(_, ts)| before.map_or(true, |b| *ts < b))
            .filter_map(|(hash, latest_at)| {
                contents.get(&hash).map(|c| ActivityMark {
                    text: c.text.clone(),
                    hash,
                    latest_at,
                })
            })
            .collect();
        marks.sort_by(|a, b| b.latest_at.cmp(&a.latest_at).then(a.hash.cmp(&b.hash)));
        marks.truncate(limit);
        Ok(marks)
    }

    async fn pinned_annotations(
        &self,
        owner_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<PinnedRow>> {
        let mut pinned: Vec<Annotation> = read(&self.annotations)?
            .iter()
            .filter(|a| a.is_active() && a.owner_id == owner_id)
            .filter(|a| match (a.pinned_at, before) {
                (Some(p), Some(b)) => p < b,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .cloned()
            .collect();
        pinned.sort_by(|a, b| b.pinned_at.cmp(&a.pinned_at).then(a.id.cmp(&b.id)));
        pinned.truncate(limit);

        let contents = read(&self.contents)?;
        pinned
            .iter()
            .filter_map(|a| {
                contents
                    .get(&a.content_hash)
                    .map(|c| (c.text.clone(), a))
            })
            .map(|(text, a)| {
                Ok(PinnedRow {
                    text,
                    annotation: self.view(a)?,
                })
            })
            .collect()
    }

    async fn annotated_count(&self) -> Result<usize> {
        Ok(self.annotated_hashes()?.len())
    }

    async fn annotated_hash_at(&self, index: usize) -> Result<Option<String>> {
        Ok(self.annotated_hashes()?.into_iter().nth(index))
    }

    async fn ensure_user(&self, id: &str) -> Result<User> {
        let mut users = write(&self.users)?;
        let user = users.entry(id.to_string()).or_insert_with(|| User {
            id: id.to_string(),
            username: None,
            created_at: timestamp_now(),
        });
        Ok(user.clone())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(read(&self.users)?
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn set_username(&self, id: &str, username: &str) -> Result<()> {
        let mut users = write(&self.users)?;
        if users
            .values()
            .any(|u| u.id != id && u.username.as_deref() == Some(username))
        {
            return Err(anyhow!("username '{}' is already taken", username));
        }
        let user = users.entry(id.to_string()).or_insert_with(|| User {
            id: id.to_string(),
            username: None,
            created_at: timestamp_now(),
        });
        user.username = Some(username.to_string());
        Ok(())
    }

    async fn stats(&self) -> Result<CorpusStats> {
        let contents = read(&self.contents)?;
        let annotations = read(&self.annotations)?;
        let active: Vec<&Annotation> = annotations.iter().filter(|a| a.is_active()).collect();
        let annotated: HashSet<&str> = active.iter().map(|a| a.content_hash.as_str()).collect();
        let owners: HashSet<&str> = active.iter().map(|a| a.owner_id.as_str()).collect();

        Ok(CorpusStats {
            contents: contents.len() as i64,
            active_annotations: active.len() as i64,
            deleted_annotations: (annotations.len() - active.len()) as i64,
            pinned_annotations: active.iter().filter(|a| a.pinned_at.is_some()).count() as i64,
            orphaned_contents: contents
                .keys()
                .filter(|h| !annotated.contains(h.as_str()))
                .count() as i64,
            owners: owners.len() as i64,
        })
    }
}

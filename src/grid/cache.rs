//! Renderer pool with byte-budget eviction.
//!
//! An explicit side table keyed by item id: renderer instances stay resident
//! after their cell scrolls out (merely disabled) until the pool's byte
//! ceiling is exceeded, at which point the least-recently-visible disabled
//! renderers are fully destroyed to reclaim their decoded buffers. Visible
//! renderers are never evicted.

use std::collections::{HashMap, HashSet};

use crate::render::SampleRenderer;

/// One pooled renderer and its recency stamp.
#[derive(Debug)]
pub struct PoolEntry {
    pub renderer: SampleRenderer,
    /// Engine tick at which the renderer's cell was last visible.
    pub last_visible: u64,
}

/// Explicit side table of live renderers, bounded by a byte budget.
#[derive(Debug)]
pub struct RendererPool {
    entries: HashMap<String, PoolEntry>,
    budget_bytes: usize,
}

impl RendererPool {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            budget_bytes,
        }
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, renderer: SampleRenderer, tick: u64) {
        self.entries.insert(
            id.into(),
            PoolEntry {
                renderer,
                last_visible: tick,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&SampleRenderer> {
        self.entries.get(id).map(|e| &e.renderer)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SampleRenderer> {
        self.entries.get_mut(id).map(|e| &mut e.renderer)
    }

    /// Refresh an entry's recency stamp.
    pub fn touch(&mut self, id: &str, tick: u64) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.last_visible = tick;
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<SampleRenderer> {
        self.entries.remove(id).map(|e| e.renderer)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut PoolEntry)> {
        self.entries.iter_mut()
    }

    /// Summed size estimate of every pooled renderer.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(|e| e.renderer.size_bytes()).sum()
    }

    /// Destroy and drop entries whose ids are not in `keep`.
    /// Used when their pages fall out of the resident window.
    pub fn retain_ids(&mut self, keep: &HashSet<String>) -> usize {
        let before = self.entries.len();
        for entry in self
            .entries
            .iter_mut()
            .filter(|(id, _)| !keep.contains(*id))
        {
            entry.1.renderer.destroy();
        }
        self.entries.retain(|id, _| keep.contains(id));
        let dropped = before - self.entries.len();
        if dropped > 0 {
            log::debug!("Dropped {} renderers outside the page window", dropped);
        }
        dropped
    }

    /// Enforce the byte budget: destroy least-recently-visible disabled
    /// renderers until total size fits. Returns the evicted ids.
    pub fn evict_over_budget(&mut self) -> Vec<String> {
        let mut total = self.total_bytes();
        if total <= self.budget_bytes {
            return Vec::new();
        }

        let mut candidates: Vec<(String, u64, usize)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.renderer.is_disabled())
            .map(|(id, e)| (id.clone(), e.last_visible, e.renderer.size_bytes()))
            .collect();
        candidates.sort_by_key(|(_, last_visible, _)| *last_visible);

        let mut evicted = Vec::new();
        let mut reclaimed = 0usize;
        for (id, _, bytes) in candidates {
            if total <= self.budget_bytes {
                break;
            }
            if let Some(mut entry) = self.entries.remove(&id) {
                entry.renderer.destroy();
                total = total.saturating_sub(bytes);
                reclaimed += bytes;
                evicted.push(id);
            }
        }

        if !evicted.is_empty() {
            log::debug!(
                "Evicted {} renderers over budget ({} bytes reclaimed, {} resident)",
                evicted.len(),
                reclaimed,
                self.entries.len()
            );
        }
        evicted
    }
}

use crate::engine::error::QueueError;
use crate::engine::model::{DownloadItem, DownloadSnapshot, ItemId};
use std::collections::HashMap;

/// Insertion-ordered, append-only item list with an id index.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    items: Vec<DownloadItem>,
    index: HashMap<ItemId, usize>,
}

impl Registry {
    pub fn push(&mut self, item: DownloadItem) {
        self.index.insert(item.id.clone(), self.items.len());
        self.items.push(item);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&DownloadItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DownloadItem> {
        let i = *self.index.get(id)?;
        self.items.get_mut(i)
    }

    pub fn find_mut(&mut self, id: &str) -> Result<&mut DownloadItem, QueueError> {
        self.get_mut(id).ok_or_else(|| QueueError::NotFound(id.to_string()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DownloadItem> {
        self.items.iter_mut()
    }

    pub fn snapshot(&self) -> Vec<DownloadSnapshot> {
        self.items.iter().map(DownloadItem::snapshot).collect()
    }
}

//! Layer deduplication.
//!
//! Bodies in the source scene reference layers by a key. The `LayerCache`
//! maps each key to one internal `Layer` so every body on the same layer
//! shares a `LayerId`. The cache is owned by a `Session` and must be reset
//! between independent imports.

use crate::source::LayerRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a layer inside its `LayerCache`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub u32);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub symmetric: bool,
}

#[derive(Clone, Debug, Default)]
pub struct LayerCache {
    by_key: HashMap<u64, LayerId>,
    layers: Vec<Layer>,
}

impl LayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the layer for `record.key`, creating it on first sight.
    pub fn find_or_add(&mut self, record: &LayerRecord) -> LayerId {
        if let Some(&id) = self.by_key.get(&record.key) {
            return id;
        }
        let id = LayerId(self.layers.len() as u32);
        self.layers.push(Layer {
            name: record.name.clone(),
            visible: record.visible,
            symmetric: record.symmetric,
        });
        self.by_key.insert(record.key, id);
        id
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0 as usize)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Forget every layer. Ids handed out before are invalid afterwards.
    pub fn reset(&mut self) {
        self.by_key.clear();
        self.layers.clear();
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Restore layers in id order, e.g. from an archive.
    pub(crate) fn restore(&mut self, layers: Vec<(u64, Layer)>) {
        self.reset();
        for (key, layer) in layers {
            self.by_key.insert(key, LayerId(self.layers.len() as u32));
            self.layers.push(layer);
        }
    }

    /// Source keys in id order.
    pub(crate) fn keys(&self) -> Vec<u64> {
        let mut keys = vec![0; self.layers.len()];
        for (&key, id) in &self.by_key {
            keys[id.0 as usize] = key;
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: u64, name: &str) -> LayerRecord {
        LayerRecord {
            key,
            name: name.to_string(),
            visible: true,
            symmetric: false,
        }
    }

    #[test]
    fn same_key_same_layer() {
        let mut cache = LayerCache::new();
        let a = cache.find_or_add(&record(10, "Body"));
        let b = cache.find_or_add(&record(10, "Body (renamed)"));
        let c = cache.find_or_add(&record(11, "Wheels"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(a).map(|l| l.name.as_str()), Some("Body"));
    }

    #[test]
    fn reset_forgets_layers() {
        let mut cache = LayerCache::new();
        cache.find_or_add(&record(1, "A"));
        cache.reset();
        assert!(cache.is_empty());
        let id = cache.find_or_add(&record(2, "B"));
        assert_eq!(id, LayerId(0));
    }

    #[test]
    fn keys_follow_ids() {
        let mut cache = LayerCache::new();
        cache.find_or_add(&record(42, "A"));
        cache.find_or_add(&record(7, "B"));
        assert_eq!(cache.keys(), vec![42, 7]);
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::stream::Publisher;
use crate::{Error, Result};

/// Process-wide `app/stream` → live publisher mapping. The only process-wide
/// mutable state in the system; mutated by publisher registration/teardown, read by
/// subscriber lookups.
pub struct PublisherRegistry {
    publishers: RwLock<HashMap<String, Arc<Publisher>>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        PublisherRegistry {
            publishers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly spawned publisher. A second publisher claiming an
    /// already-registered key is rejected; the existing publisher is untouched.
    pub async fn register(&self, publisher: Arc<Publisher>) -> Result<()> {
        let mut publishers = self.publishers.write().await;
        if publishers.contains_key(&publisher.key) {
            return Err(Error::duplicate_publisher(publisher.key.clone()));
        }
        publishers.insert(publisher.key.clone(), publisher);
        Ok(())
    }

    pub async fn unregister(&self, key: &str) {
        self.publishers.write().await.remove(key);
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Publisher>> {
        self.publishers.read().await.get(key).cloned()
    }

    pub async fn is_publishing(&self, key: &str) -> bool {
        self.publishers.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.publishers.read().await.keys().cloned().collect()
    }
}

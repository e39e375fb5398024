use silarpc_framework::BinaryTransferHandler;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory binary transfer store.
///
/// One instance is shared by reference across every feature registered on
/// a server. Payloads live until deleted or the server is dropped.
#[derive(Default)]
pub struct InMemoryBinaryStore {
    blobs: RwLock<HashMap<Uuid, Vec<u8>>>,
}

impl InMemoryBinaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BinaryTransferHandler for InMemoryBinaryStore {
    fn store(&self, data: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, data);
        id
    }

    fn retrieve(&self, id: &Uuid) -> Option<Vec<u8>> {
        self.blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn delete(&self, id: &Uuid) -> bool {
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_retrieve() {
        let store = InMemoryBinaryStore::new();
        let id = store.store(vec![1, 2, 3]);
        assert_eq!(store.retrieve(&id), Some(vec![1, 2, 3]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete() {
        let store = InMemoryBinaryStore::new();
        let id = store.store(vec![0xff]);
        assert!(store.delete(&id));
        assert!(!store.delete(&id));
        assert_eq!(store.retrieve(&id), None);
    }

    #[test]
    fn test_unknown_id() {
        let store = InMemoryBinaryStore::new();
        assert_eq!(store.retrieve(&Uuid::new_v4()), None);
    }
}

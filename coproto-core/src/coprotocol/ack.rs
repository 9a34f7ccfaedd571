use std::collections::BTreeSet;

/// `AckRegistry` keeps the message ids whose acknowledgement interest is registered
/// at the remote router
///
/// An id is added before the message is sent and removed once the turn waiting for its
/// acknowledgement completes. Whatever is left is flushed by the transport `stop`
#[derive(Debug, Clone, Default)]
pub struct AckRegistry {
    ids: BTreeSet<String>,
}

impl AckRegistry {
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Takes every registered id, leaving the registry empty
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ids).into_iter().collect()
    }
}

use async_trait::async_trait;
use campaign_core::SagaSnapshot;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// Where saga snapshots live between status queries.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Insert or replace the snapshot with the same id
    async fn save(&self, saga: &SagaSnapshot) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<SagaSnapshot>>;

    /// Oldest first
    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<SagaSnapshot>>;
}

/// Process-local store; contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySagaStore {
    sagas: RwLock<HashMap<Uuid, SagaSnapshot>>,
}

impl InMemorySagaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sagas.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sagas.read().await.is_empty()
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn save(&self, saga: &SagaSnapshot) -> Result<()> {
        self.sagas.write().await.insert(saga.id, saga.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SagaSnapshot>> {
        Ok(self.sagas.read().await.get(&id).cloned())
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<SagaSnapshot>> {
        let sagas = self.sagas.read().await;
        let mut found: Vec<SagaSnapshot> = sagas
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.created_at, s.id));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::SagaStatus;

    #[tokio::test]
    async fn test_save_replaces_by_id() {
        let store = InMemorySagaStore::new();
        let mut saga = SagaSnapshot::new("tenant-a", "s1");
        store.save(&saga).await.unwrap();

        saga.status = SagaStatus::Executing;
        store.save(&saga).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.get(saga.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SagaStatus::Executing);
    }

    #[tokio::test]
    async fn test_returned_snapshot_is_detached() {
        let store = InMemorySagaStore::new();
        let saga = SagaSnapshot::new("tenant-a", "s1");
        store.save(&saga).await.unwrap();

        let mut copy = store.get(saga.id).await.unwrap().unwrap();
        copy.status = SagaStatus::Failed;

        let again = store.get(saga.id).await.unwrap().unwrap();
        assert_eq!(again.status, SagaStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_by_tenant() {
        let store = InMemorySagaStore::new();
        let first = SagaSnapshot::new("tenant-a", "s1");
        let mut second = SagaSnapshot::new("tenant-a", "s2");
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        let other = SagaSnapshot::new("tenant-b", "s3");
        for saga in [&second, &other, &first] {
            store.save(saga).await.unwrap();
        }

        let listed = store.list_by_tenant("tenant-a").await.unwrap();

        assert_eq!(
            listed.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
        assert!(store.list_by_tenant("nobody").await.unwrap().is_empty());
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}

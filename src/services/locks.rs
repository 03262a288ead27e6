use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::ident::TenantId;

type LockMap = DashMap<TenantId, Arc<Mutex<()>>>;

/// Per-tenant mutual exclusion for create / drop / repair / migrate.
///
/// Scoped to this process; a second engine process against the same store
/// is not excluded. An entry lives only while someone holds or waits on it.
#[derive(Clone, Default)]
pub struct TenantLocks {
    inner: Arc<LockMap>,
}

/// Held for the duration of one schema operation.
pub struct TenantGuard {
    guard: Option<OwnedMutexGuard<()>>,
    tenant: TenantId,
    map: Arc<LockMap>,
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map still references the mutex: nobody holds or waits.
        self.map
            .remove_if(&self.tenant, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other schema operation holds `tenant`.
    pub async fn acquire(&self, tenant: &TenantId) -> TenantGuard {
        // Clone the Arc out so the map shard lock is released before awaiting.
        let mutex = self.inner.entry(tenant.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        TenantGuard {
            guard: Some(guard),
            tenant: tenant.clone(),
            map: self.inner.clone(),
        }
    }

    /// Tenants with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_tenant_is_serialized() {
        let locks = TenantLocks::new();
        let acme = TenantId::new("acme").unwrap();

        let held = locks.acquire(&acme).await;
        let waiting = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&acme)).await;
        assert!(waiting.is_err(), "second acquire must wait");

        drop(held);
        let reacquired = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&acme)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn different_tenants_do_not_block() {
        let locks = TenantLocks::new();
        let _acme = locks.acquire(&TenantId::new("acme").unwrap()).await;
        let beta = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&TenantId::new("beta").unwrap()),
        )
        .await;
        assert!(beta.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = TenantLocks::new();
        for raw in ["acme", "beta", "ghost"] {
            let _guard = locks.acquire(&TenantId::new(raw).unwrap()).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_survives_while_a_waiter_is_queued() {
        let locks = TenantLocks::new();
        let acme = TenantId::new("acme").unwrap();

        let held = locks.acquire(&acme).await;
        let waiter = {
            let locks = locks.clone();
            let acme = acme.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&acme).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(held);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}

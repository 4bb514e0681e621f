//! Per-backend worker pools, grounded on the bounded-concurrency job
//! queue in `ferrex-server::transcoding::queue` and on
//! `ferrex-server::stream::transcoding::worker`'s acquire-at-await-point
//! pattern.
//!
//! Office conversions shell out to a single soffice listener that can
//! only serve one (or a few) conversions at a time; every other backend
//! shares a larger default pool sized for CPU-bound image/PDF/video
//! work. A `Semaphore` permit is acquired right before the blocking call
//! and held across the `.await`, so a cancelled request (client
//! disconnect) drops the permit immediately rather than waiting out the
//! conversion.

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Clone)]
pub struct WorkerPools {
    default_pool: Arc<Semaphore>,
    office_pool: Arc<Semaphore>,
}

impl WorkerPools {
    /// `default_size` guards Image/PDF/Video conversions. `office_size`,
    /// if nonzero, gives Office conversions their own bound; zero means
    /// office conversions share the default pool (spec.md's
    /// `PVS_MAX_OFFICE_WORKERS=0` default).
    pub fn new(default_size: usize, office_size: usize) -> Self {
        let default_pool = Arc::new(Semaphore::new(default_size.max(1)));
        let office_pool = if office_size == 0 {
            default_pool.clone()
        } else {
            Arc::new(Semaphore::new(office_size))
        };
        WorkerPools { default_pool, office_pool }
    }

    pub async fn acquire_default(&self) -> SemaphorePermit<'_> {
        self.default_pool
            .acquire()
            .await
            .expect("default worker pool semaphore is never closed")
    }

    pub async fn acquire_office(&self) -> SemaphorePermit<'_> {
        self.office_pool
            .acquire()
            .await
            .expect("office worker pool semaphore is never closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn office_pool_shares_default_when_unsized() {
        let pools = WorkerPools::new(4, 0);
        assert_eq!(pools.default_pool.available_permits(), 4);
        let _permit = pools.acquire_office().await;
        assert_eq!(pools.default_pool.available_permits(), 3);
    }

    #[tokio::test]
    async fn office_pool_is_independent_when_sized() {
        let pools = WorkerPools::new(4, 1);
        let _office_permit = pools.acquire_office().await;
        assert_eq!(pools.default_pool.available_permits(), 4);
        assert_eq!(pools.office_pool.available_permits(), 0);
    }
}

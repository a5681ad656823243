//! Integration tests for the reconfigurable shim under concurrent use.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use robokit_core::reconfigure::{self, Reconfigurable, ReconfigurableResource};
use robokit_core::resource::{Api, Closer, ResourceHandle, ResourceType, Subtype};
use robokit_core::{ResourceError, Result};

/// Capability whose two reads must agree for a consistent actual.
#[async_trait]
trait Generation: Closer {
    async fn first(&self) -> Result<u64>;
    async fn second(&self) -> Result<u64>;
}

impl Api for dyn Generation {
    fn subtype() -> Subtype {
        Subtype::new("acme", ResourceType::Component, "generation")
    }
}

struct Fixed {
    generation: u64,
    closed: Arc<AtomicBool>,
}

impl Fixed {
    fn new(generation: u64) -> (Arc<dyn Generation>, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let actual: Arc<dyn Generation> = Arc::new(Self {
            generation,
            closed: closed.clone(),
        });
        (actual, closed)
    }
}

#[async_trait]
impl Closer for Fixed {
    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Generation for Fixed {
    async fn first(&self) -> Result<u64> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ResourceError::Closed("generation".into()));
        }
        Ok(self.generation)
    }

    async fn second(&self) -> Result<u64> {
        tokio::task::yield_now().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(ResourceError::Closed("generation".into()));
        }
        Ok(self.generation)
    }
}

/// Both reads happen under one read guard, as every delegated call does.
#[async_trait]
impl Generation for Reconfigurable<dyn Generation> {
    async fn first(&self) -> Result<u64> {
        self.actual().await?.first().await
    }

    async fn second(&self) -> Result<u64> {
        let actual = self.actual().await?;
        let a = actual.first().await?;
        let b = actual.second().await?;
        if a != b {
            return Err(ResourceError::Upstream(format!("torn read: {} then {}", a, b)));
        }
        Ok(b)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_never_see_torn_actual() {
    let (old, old_closed) = Fixed::new(1);
    let shim = Arc::new(Reconfigurable::new(old));
    let seen_new = Arc::new(AtomicUsize::new(0));

    let mut readers = Vec::new();
    for _ in 0..16 {
        let shim = shim.clone();
        let seen_new = seen_new.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                // A read either completes on the old actual before it is
                // closed or runs entirely on the new one.
                let generation = shim.second().await.unwrap();
                assert!(generation == 1 || generation == 2);
                if generation == 2 {
                    seen_new.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }

    tokio::time::sleep(Duration::from_millis(1)).await;
    let (new, new_closed) = Fixed::new(2);
    shim.replace_with(&Reconfigurable::new(new)).await.unwrap();

    for reader in readers {
        reader.await.unwrap();
    }
    assert!(old_closed.load(Ordering::SeqCst));
    assert!(!new_closed.load(Ordering::SeqCst));
    assert_eq!(shim.first().await.unwrap(), 2);
}

#[tokio::test]
async fn test_erased_reconfigure_swaps_actual() {
    let (old, old_closed) = Fixed::new(1);
    let (new, _) = Fixed::new(2);
    let shim = Arc::new(Reconfigurable::new(old));
    let erased: Arc<dyn ReconfigurableResource> = shim.clone();

    erased
        .reconfigure(Arc::new(Reconfigurable::new(new)))
        .await
        .unwrap();

    assert!(old_closed.load(Ordering::SeqCst));
    assert_eq!(shim.first().await.unwrap(), 2);
}

#[tokio::test]
async fn test_wrap_from_handle_then_close() {
    let (actual, closed) = Fixed::new(7);
    let handle = ResourceHandle::new::<dyn Generation>("fixed", actual);
    let shim = reconfigure::wrap::<dyn Generation>(&handle).unwrap();

    assert_eq!(shim.first().await.unwrap(), 7);
    Closer::close(&shim).await.unwrap();

    assert!(closed.load(Ordering::SeqCst));
    assert!(matches!(shim.first().await, Err(ResourceError::Closed(_))));
}

//! Hot-swap wrapper for live capability implementations.
//!
//! `Reconfigurable<C>` owns exactly one actual `Arc<C>` behind a tokio
//! reader/writer lock. Delegated calls hold the read guard for their full
//! duration, so a swap waits for in-flight calls and no call ever observes
//! a half-installed replacement.
//!
//! ```text
//!   Bound ──reconfigure──▶ Bound ──close──▶ Closed
//! ```

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::error::{ResourceError, Result};
use crate::resource::{Api, Closer, ResourceHandle, Subtype};

/// Type-erased view of a shim, used where the subtype is only known at runtime.
#[async_trait]
pub trait ReconfigurableResource: Send + Sync {
    fn subtype(&self) -> Subtype;

    fn as_any(&self) -> &dyn Any;

    /// Replace this shim's actual with `new`'s. `new` must be a shim of the same subtype.
    async fn reconfigure(&self, new: Arc<dyn ReconfigurableResource>) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Reader/writer-guarded holder of the live implementation of `C`.
pub struct Reconfigurable<C: ?Sized> {
    actual: RwLock<Arc<C>>,
    closed: AtomicBool,
}

impl<C: ?Sized + Api> Reconfigurable<C> {
    pub fn new(actual: Arc<C>) -> Self {
        Self {
            actual: RwLock::new(actual),
            closed: AtomicBool::new(false),
        }
    }

    /// Borrow the current actual for the duration of one delegated call.
    pub async fn actual(&self) -> Result<RwLockReadGuard<'_, Arc<C>>> {
        let guard = self.actual.read().await;
        if self.is_closed() {
            return Err(closed_error::<C>());
        }
        Ok(guard)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Install `new`'s actual in place of ours.
    ///
    /// The old actual is closed once no call holds it. A close failure is
    /// logged and does not abort the swap.
    pub async fn replace_with(&self, new: &Reconfigurable<C>) -> Result<()> {
        if std::ptr::eq(self, new) {
            return Ok(());
        }
        let replacement = new.actual.read().await.clone();

        let mut actual = self.actual.write().await;
        if self.is_closed() {
            return Err(closed_error::<C>());
        }
        if same_instance(&actual, &replacement) {
            return Ok(());
        }

        if let Err(e) = actual.close().await {
            tracing::error!(subtype = %C::subtype(), error = %e, "error closing old resource");
        }
        *actual = replacement;
        tracing::debug!(subtype = %C::subtype(), "resource reconfigured");
        Ok(())
    }
}

/// Wrap a type-erased resource, asserting it implements `C`.
pub fn wrap<C: ?Sized + Api>(resource: &ResourceHandle) -> Result<Reconfigurable<C>> {
    let actual = resource
        .downcast::<C>()
        .ok_or_else(|| ResourceError::UnimplementedInterface {
            expected: C::subtype().to_string(),
            actual: resource.kind().to_string(),
        })?;
    Ok(Reconfigurable::new(actual))
}

fn closed_error<C: ?Sized + Api>() -> ResourceError {
    ResourceError::Closed(C::subtype().to_string())
}

fn same_instance<C: ?Sized>(a: &Arc<C>, b: &Arc<C>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Closing is best-effort: it shares the lock with readers rather than
/// excluding them, and a failed close leaves the shim bound.
#[async_trait]
impl<C: ?Sized + Api> Closer for Reconfigurable<C> {
    async fn close(&self) -> Result<()> {
        let actual = self.actual.read().await;
        if self.is_closed() {
            return Err(closed_error::<C>());
        }
        actual.close().await?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<C: ?Sized + Api> ReconfigurableResource for Reconfigurable<C> {
    fn subtype(&self) -> Subtype {
        C::subtype()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn reconfigure(&self, new: Arc<dyn ReconfigurableResource>) -> Result<()> {
        let other = new
            .as_any()
            .downcast_ref::<Reconfigurable<C>>()
            .ok_or_else(|| {
                ResourceError::type_mismatch(C::subtype().to_string(), new.subtype().to_string())
            })?;
        self.replace_with(other).await
    }

    async fn close(&self) -> Result<()> {
        Closer::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::camera::{Camera, Frame, PointCloud};
    use crate::components::sensor::Sensor;
    use crate::components::testing::StaticSensor;
    use std::sync::atomic::AtomicUsize;

    struct CountingCamera {
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl CountingCamera {
        fn new(closes: Arc<AtomicUsize>, fail_close: bool) -> Arc<dyn Camera> {
            Arc::new(Self { closes, fail_close })
        }
    }

    #[async_trait]
    impl Closer for CountingCamera {
        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(ResourceError::Upstream("close failed".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Camera for CountingCamera {
        async fn read_frame(&self) -> Result<Frame> {
            Err(ResourceError::Upstream("no frames".into()))
        }

        async fn next_point_cloud(&self) -> Result<PointCloud> {
            Ok(PointCloud::default())
        }
    }

    #[tokio::test]
    async fn test_replace_closes_old_actual() {
        let old_closes = Arc::new(AtomicUsize::new(0));
        let new_closes = Arc::new(AtomicUsize::new(0));
        let shim = Reconfigurable::new(CountingCamera::new(old_closes.clone(), false));
        let next = Reconfigurable::new(CountingCamera::new(new_closes.clone(), false));

        shim.replace_with(&next).await.unwrap();

        assert_eq!(old_closes.load(Ordering::SeqCst), 1);
        assert_eq!(new_closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_replace_swallows_close_failure() {
        let closes = Arc::new(AtomicUsize::new(0));
        let shim = Reconfigurable::new(CountingCamera::new(closes.clone(), true));
        let next_actual = CountingCamera::new(Arc::new(AtomicUsize::new(0)), false);
        let next = Reconfigurable::new(next_actual.clone());

        assert!(shim.replace_with(&next).await.is_ok());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        let current = shim.actual().await.unwrap();
        assert!(same_instance(&*current, &next_actual));
    }

    #[tokio::test]
    async fn test_replace_with_self_is_noop() {
        let closes = Arc::new(AtomicUsize::new(0));
        let shim = Reconfigurable::new(CountingCamera::new(closes.clone(), false));
        shim.replace_with(&shim).await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_operations_after_close_fail_fast() {
        let closes = Arc::new(AtomicUsize::new(0));
        let shim = Reconfigurable::new(CountingCamera::new(closes.clone(), false));
        Closer::close(&shim).await.unwrap();

        assert!(shim.is_closed());
        assert!(matches!(shim.actual().await, Err(ResourceError::Closed(_))));
        assert!(matches!(Closer::close(&shim).await, Err(ResourceError::Closed(_))));

        let next = Reconfigurable::new(CountingCamera::new(Arc::new(AtomicUsize::new(0)), false));
        assert!(matches!(shim.replace_with(&next).await, Err(ResourceError::Closed(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_close_keeps_shim_bound() {
        let shim = Reconfigurable::new(CountingCamera::new(Arc::new(AtomicUsize::new(0)), true));
        assert!(Closer::close(&shim).await.is_err());
        assert!(!shim.is_closed());
        assert!(shim.actual().await.is_ok());
    }

    #[tokio::test]
    async fn test_erased_reconfigure_rejects_other_subtype() {
        let camera: Arc<dyn ReconfigurableResource> = Arc::new(Reconfigurable::<dyn Camera>::new(
            CountingCamera::new(Arc::new(AtomicUsize::new(0)), false),
        ));
        let sensor_actual: Arc<dyn Sensor> = Arc::new(StaticSensor::default());
        let sensor: Arc<dyn ReconfigurableResource> =
            Arc::new(Reconfigurable::<dyn Sensor>::new(sensor_actual));

        match camera.reconfigure(sensor).await {
            Err(ResourceError::TypeMismatch { expected, actual }) => {
                assert_eq!(expected, "rdk:component:camera");
                assert_eq!(actual, "rdk:component:sensor");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_wrap_checks_capability() {
        let sensor: Arc<dyn Sensor> = Arc::new(StaticSensor::default());
        let handle = ResourceHandle::new::<dyn Sensor>("static_sensor", sensor);

        assert!(wrap::<dyn Sensor>(&handle).is_ok());
        match wrap::<dyn Camera>(&handle) {
            Err(ResourceError::UnimplementedInterface { actual, .. }) => {
                assert_eq!(actual, "static_sensor")
            }
            _ => panic!("expected UnimplementedInterface"),
        }
    }
}

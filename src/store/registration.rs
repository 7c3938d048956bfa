//! Subscription handles returned by listening operations.

use std::fmt;

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Handle for an active change-notification stream.
///
/// Calling [`remove`](Self::remove) or dropping the handle stops delivery.
pub struct ListenerRegistration {
    release: Option<Release>,
}

impl ListenerRegistration {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A registration with nothing to release, used when listening could
    /// not be set up.
    pub fn inert() -> Self {
        Self { release: None }
    }

    pub fn remove(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("live", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_remove_releases_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let registration = ListenerRegistration::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        registration.remove();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        {
            let _registration = ListenerRegistration::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inert_registration() {
        ListenerRegistration::inert().remove();
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// A replaceable callback slot shared between an overlay and its handlers.
pub(crate) struct Observer<T> {
    slot: Arc<Mutex<Option<Callback<T>>>>,
}

impl<T> Observer<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn set<F>(&self, callback: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        *lock(&self.slot) = Some(Box::new(callback));
    }

    pub(crate) fn notify(&self, value: &T) {
        if let Some(callback) = lock(&self.slot).as_mut() {
            callback(value);
        }
    }
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("set", &lock(&self.slot).is_some())
            .finish()
    }
}

use crate::error::{OrmError, OrmResult};
use crate::query::BoxFuture;
use futures_util::FutureExt;
use futures_util::future::Shared;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

enum ExecState<T> {
    /// Captured but not yet started.
    Unexecuted(BoxFuture<T>),
    /// Placeholder while the lock holder swaps states.
    Starting,
    /// Running; every awaiter polls the same execution.
    Pending(Shared<BoxFuture<T>>),
    /// Finished; the outcome is replayed to late awaiters.
    Resolved(OrmResult<T>),
}

/// Observable phase of a [`SharedQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Unexecuted,
    Pending,
    Resolved,
}

/// A builder whose execution is shared by every clone.
///
/// The first await starts the statement; concurrent awaits join it and later
/// awaits receive the memoised outcome. The statement is sent exactly once.
///
/// ```ignore
/// let q = repo.find().where_json(json!({ "store": 1 })).shared();
/// let (a, b) = tokio::join!(q.clone(), q.clone());
/// ```
pub struct SharedQuery<T> {
    state: Arc<Mutex<ExecState<T>>>,
}

impl<T> Clone for SharedQuery<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for SharedQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedQuery")
            .field("status", &self.status())
            .finish()
    }
}

impl<T> SharedQuery<T> {
    pub(crate) fn new(future: BoxFuture<T>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ExecState::Unexecuted(future))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExecState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ExecStatus {
        match &*self.lock() {
            ExecState::Unexecuted(_) => ExecStatus::Unexecuted,
            ExecState::Starting | ExecState::Pending(_) => ExecStatus::Pending,
            ExecState::Resolved(_) => ExecStatus::Resolved,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SharedQuery<T> {
    async fn get(self) -> OrmResult<T> {
        let pending = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, ExecState::Starting) {
                ExecState::Unexecuted(future) => {
                    let shared = future.shared();
                    *state = ExecState::Pending(shared.clone());
                    shared
                }
                ExecState::Pending(shared) => {
                    *state = ExecState::Pending(shared.clone());
                    shared
                }
                ExecState::Resolved(result) => {
                    *state = ExecState::Resolved(result.clone());
                    return result;
                }
                ExecState::Starting => {
                    return Err(OrmError::Other(
                        "shared query observed an incomplete state transition".to_string(),
                    ));
                }
            }
        };

        let result = pending.await;
        let mut state = self.lock();
        if !matches!(*state, ExecState::Resolved(_)) {
            *state = ExecState::Resolved(result.clone());
        }
        result
    }
}

impl<T: Clone + Send + Sync + 'static> IntoFuture for SharedQuery<T> {
    type Output = OrmResult<T>;
    type IntoFuture = BoxFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.get())
    }
}

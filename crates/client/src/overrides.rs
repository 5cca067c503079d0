//! Execution-context-local override stacks.
//!
//! Responsibilities:
//! - Keep one stack of overrides per variable handle, per thread or task.
//! - Pair every push with a pop through `OverrideGuard`'s `Drop`.
//!
//! Does NOT handle:
//! - Resolution against providers (see `variable`).
//!
//! Invariants:
//! - Stacks are never shared between threads; inside `scope` they are private
//!   to that task, seeded with a copy of the spawning context's overrides.
//! - Dropping a guard removes exactly its own entry from the storage it was
//!   pushed to, wherever the drop happens.
//! - No stack lock is held while a computed override runs.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use variables_config::Attributes;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for handles and stack entries.
pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

type Computed<T> = dyn Fn(Option<&str>, &Attributes) -> T + Send + Sync;

/// A pushed override: a fixed value or a function of the calling context.
pub(crate) enum OverrideValue<T> {
    Fixed(T),
    Computed(Arc<Computed<T>>),
}

impl<T: Clone> OverrideValue<T> {
    pub(crate) fn evaluate(&self, targeting_key: Option<&str>, attributes: &Attributes) -> T {
        match self {
            OverrideValue::Fixed(value) => value.clone(),
            OverrideValue::Computed(compute) => compute(targeting_key, attributes),
        }
    }
}

#[derive(Clone)]
struct Entry {
    id: u64,
    value: Arc<dyn Any + Send + Sync>,
}

type Stacks = HashMap<u64, Vec<Entry>>;

/// One context's stacks: the thread's, or a task's inside `scope`.
type Storage = Arc<Mutex<Stacks>>;

thread_local! {
    static THREAD_STACKS: Storage = Arc::new(Mutex::new(HashMap::new()));
}

tokio::task_local! {
    static TASK_STACKS: Storage;
}

/// Storage of the current context: the enclosing `scope` if any, else the thread.
fn current_storage() -> Storage {
    TASK_STACKS
        .try_with(Arc::clone)
        .unwrap_or_else(|_| THREAD_STACKS.with(Arc::clone))
}

fn lock(storage: &Storage) -> std::sync::MutexGuard<'_, Stacks> {
    storage.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `future` with its own override stacks.
///
/// The future starts with a copy of the caller's current overrides; pushes and
/// pops inside it are invisible to every other task and thread.
pub fn scope<F: Future>(future: F) -> impl Future<Output = F::Output> {
    let inherited = lock(&current_storage()).clone();
    TASK_STACKS.scope(Arc::new(Mutex::new(inherited)), future)
}

pub(crate) fn push<T: Send + Sync + 'static>(handle_id: u64, value: OverrideValue<T>) -> OverrideGuard {
    let entry = Entry {
        id: next_id(),
        value: Arc::new(value),
    };
    let entry_id = entry.id;
    let storage = current_storage();
    lock(&storage).entry(handle_id).or_default().push(entry);
    OverrideGuard {
        handle_id,
        entry_id,
        storage,
        _not_send: PhantomData,
    }
}

/// Top of the handle's stack, if any, with no lock held afterwards.
pub(crate) fn top<T: Send + Sync + 'static>(handle_id: u64) -> Option<Arc<OverrideValue<T>>> {
    let storage = current_storage();
    let entry = lock(&storage)
        .get(&handle_id)
        .and_then(|stack| stack.last().cloned())?;
    entry.value.downcast::<OverrideValue<T>>().ok()
}

/// Pops its override when dropped.
///
/// Not `Send`: the override lives on the stack of the context that created it.
#[must_use = "the override is removed as soon as the guard is dropped"]
pub struct OverrideGuard {
    handle_id: u64,
    entry_id: u64,
    storage: Storage,
    _not_send: PhantomData<*const ()>,
}

impl std::fmt::Debug for OverrideGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideGuard")
            .field("handle_id", &self.handle_id)
            .field("entry_id", &self.entry_id)
            .finish()
    }
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        let (handle_id, entry_id) = (self.handle_id, self.entry_id);
        let mut stacks = lock(&self.storage);
        if let Some(stack) = stacks.get_mut(&handle_id) {
            stack.retain(|entry| entry.id != entry_id);
            if stack.is_empty() {
                stacks.remove(&handle_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(handle_id: u64) -> Option<i32> {
        top::<i32>(handle_id).map(|value| value.evaluate(None, &Attributes::new()))
    }

    #[test]
    fn test_nested_overrides_restore_enclosing() {
        let handle = next_id();
        assert_eq!(current(handle), None);
        {
            let _outer = push(handle, OverrideValue::Fixed(1));
            assert_eq!(current(handle), Some(1));
            {
                let _inner = push(handle, OverrideValue::Fixed(2));
                assert_eq!(current(handle), Some(2));
            }
            assert_eq!(current(handle), Some(1));
        }
        assert_eq!(current(handle), None);
    }

    #[test]
    fn test_out_of_order_drop_removes_own_entry() {
        let handle = next_id();
        let outer = push(handle, OverrideValue::Fixed(1));
        let inner = push(handle, OverrideValue::Fixed(2));
        drop(outer);
        assert_eq!(current(handle), Some(2));
        drop(inner);
        assert_eq!(current(handle), None);
    }

    #[test]
    fn test_handles_are_independent() {
        let (a, b) = (next_id(), next_id());
        let _guard = push(a, OverrideValue::Fixed(1));
        assert_eq!(current(b), None);
    }

    #[test]
    fn test_other_threads_unaffected() {
        let handle = next_id();
        let _guard = push(handle, OverrideValue::Fixed(7));
        let seen = std::thread::spawn(move || current(handle)).join().unwrap();
        assert_eq!(seen, None);
        assert_eq!(current(handle), Some(7));
    }

    #[test]
    fn test_computed_override_sees_context() {
        let handle = next_id();
        let _guard = push(
            handle,
            OverrideValue::Computed(Arc::new(|key: Option<&str>, _: &Attributes| {
                key.map_or(0, |k| k.len() as i32)
            })),
        );
        let value = top::<i32>(handle).unwrap().evaluate(Some("abcd"), &Attributes::new());
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn test_scoped_tasks_isolated() {
        let handle = next_id();
        let _guard = push(handle, OverrideValue::Fixed(1));

        let inside = scope(async move {
            let inherited = current(handle);
            let _inner = push(handle, OverrideValue::Fixed(2));
            (inherited, current(handle))
        })
        .await;

        assert_eq!(inside, (Some(1), Some(2)));
        assert_eq!(current(handle), Some(1));
    }

    #[tokio::test]
    async fn test_thread_guard_dropped_inside_scope_pops_thread_entry() {
        let handle = next_id();
        let guard = push(handle, OverrideValue::Fixed(1));

        let inside = scope(async move {
            drop(guard);
            current(handle)
        })
        .await;

        // The scope's inherited copy is untouched; the thread entry is gone.
        assert_eq!(inside, Some(1));
        assert_eq!(current(handle), None);
    }

    #[tokio::test]
    async fn test_scoped_guard_dropped_in_nested_scope_restores_outer_scope() {
        let handle = next_id();

        let (before, after) = scope(async move {
            let guard = push(handle, OverrideValue::Fixed(2));
            let before = current(handle);
            scope(async move { drop(guard) }).await;
            (before, current(handle))
        })
        .await;

        assert_eq!((before, after), (Some(2), None));
        assert_eq!(current(handle), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scoped_future_can_be_spawned() {
        let handle = next_id();
        let seen = tokio::spawn(scope(async move {
            let _guard = push(handle, OverrideValue::Fixed(3));
            current(handle)
        }))
        .await
        .unwrap();
        assert_eq!(seen, Some(3));
    }
}

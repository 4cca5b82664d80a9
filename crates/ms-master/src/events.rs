//! Named event handlers.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use ms_engine::EventSink;
use ms_ir::{EventName, PlayerEvent};
use parking_lot::Mutex;

type Handler = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;
type HandlerMap = BTreeMap<EventName, Vec<Handler>>;

/// Handlers registered by event name, dispatched in registration order.
///
/// Registration is copy-on-write. The new map is built outside the lock and
/// swapped in, so the lock only ever guards an `Arc` clone or swap; dispatch
/// never allocates and waits at most for that pointer operation. A handler
/// may register further handlers (they fire from the next event on).
#[derive(Default)]
pub struct EventRegistry {
    handlers: Mutex<Arc<HandlerMap>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for `name`. The same name may be registered any number of times.
    pub fn on<F>(&self, name: EventName, handler: F)
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        loop {
            let base = Arc::clone(&self.handlers.lock());
            let mut next = HandlerMap::clone(&base);
            next.entry(name).or_default().push(handler.clone());
            let next = Arc::new(next);

            let mut current = self.handlers.lock();
            // Retry if another registration landed while the copy was built.
            if Arc::ptr_eq(&current, &base) {
                *current = next;
                return;
            }
        }
    }

    pub fn handler_count(&self, name: EventName) -> usize {
        self.handlers.lock().get(&name).map_or(0, Vec::len)
    }

    /// Drop every handler.
    pub fn clear(&self) {
        let empty = Arc::default();
        let previous = std::mem::replace(&mut *self.handlers.lock(), empty);
        drop(previous);
    }

    /// Call every handler registered under the event's name.
    ///
    /// A panicking handler is logged and skipped; the rest still run.
    /// Returns how many handlers completed.
    pub fn fire(&self, event: &PlayerEvent) -> usize {
        let name = event.name();
        let snapshot = Arc::clone(&self.handlers.lock());
        let Some(handlers) = snapshot.get(&name) else {
            return 0;
        };

        let mut completed = 0;
        for (index, handler) in handlers.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(_) => tracing::warn!(event = %name, index, "event handler panicked"),
            }
        }
        completed
    }
}

impl EventSink for EventRegistry {
    fn emit(&self, event: PlayerEvent) {
        self.fire(&event);
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.lock();
        let mut map = f.debug_map();
        for (name, list) in handlers.iter() {
            map.entry(&name.as_str(), &list.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_ir::ErrorSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_run_in_registration_order() {
        let registry = EventRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let log = log.clone();
            registry.on(EventName::Ended, move |_| log.lock().push(id));
        }
        assert_eq!(registry.fire(&PlayerEvent::Ended), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn only_matching_name_fires() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        registry.on(EventName::PatternChange, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registry.fire(&PlayerEvent::RowChange { index: 3 });
        registry.fire(&PlayerEvent::Ended);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        registry.fire(&PlayerEvent::PatternChange);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn payload_reaches_handler() {
        let registry = EventRegistry::new();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        registry.on(EventName::Error, move |event| {
            if let PlayerEvent::Error { source } = event {
                *slot.lock() = Some(source.tag());
            }
        });
        registry.emit(PlayerEvent::Error {
            source: ErrorSource::DecodeEngine,
        });
        assert_eq!(*seen.lock(), Some("decode-engine"));
    }

    #[test]
    fn panicking_handler_does_not_stop_others() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let before = hits.clone();
        let after = hits.clone();
        registry.on(EventName::Ended, move |_| {
            before.fetch_add(1, Ordering::SeqCst);
        });
        registry.on(EventName::Ended, |_| panic!("handler failure"));
        registry.on(EventName::Ended, move |_| {
            after.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(registry.fire(&PlayerEvent::Ended), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handler_may_register_more_handlers() {
        let registry = Arc::new(EventRegistry::new());
        let inner = registry.clone();
        registry.on(EventName::Ended, move |_| inner.on(EventName::Ended, |_| {}));
        assert_eq!(registry.fire(&PlayerEvent::Ended), 1);
        assert_eq!(registry.handler_count(EventName::Ended), 2);
    }

    #[test]
    fn clear_removes_everything() {
        let registry = EventRegistry::new();
        registry.on(EventName::RowChange, |_| {});
        registry.clear();
        assert_eq!(registry.handler_count(EventName::RowChange), 0);
        assert_eq!(registry.fire(&PlayerEvent::RowChange { index: 0 }), 0);
    }

    #[test]
    fn concurrent_registrations_are_all_kept() {
        let registry = Arc::new(EventRegistry::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        registry.on(EventName::RowChange, |_| {});
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(registry.handler_count(EventName::RowChange), 100);
        assert_eq!(registry.fire(&PlayerEvent::RowChange { index: 1 }), 100);
    }

    #[test]
    fn registration_does_not_disturb_a_dispatch_in_progress() {
        let registry = Arc::new(EventRegistry::new());
        let inner = registry.clone();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        registry.on(EventName::Ended, move |_| {
            let counter = counter.clone();
            inner.on(EventName::Ended, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        // The handler added during the first dispatch only runs from the second on
        assert_eq!(registry.fire(&PlayerEvent::Ended), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(registry.fire(&PlayerEvent::Ended), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.handler_count(EventName::Ended), 3);
    }
}

//! Property-based invariants for notification routing and weak bindings.
//!
//! 1. An event reaches a handler iff the filter is empty, the event is an
//!    "everything changed" event, or the names are equal.
//! 2. After a raise, an event holds exactly its strong handlers plus the
//!    weak handlers whose owners are still alive.
//! 3. A manager's live binding count equals bindings made minus bindings
//!    unbound, and the source holds one handler per live binding.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use vmbind_core::{
    EventBinding, Handler, NotifyPropertyChanged, PropertyChangedArgs, PropertyChangedEvent,
    WeakEventManager,
};

#[derive(Default)]
struct Source {
    changed: PropertyChangedEvent,
}

impl NotifyPropertyChanged for Source {
    fn property_changed(&self) -> &PropertyChangedEvent {
        &self.changed
    }
}

// ── Strategies ────────────────────────────────────────────────────────────

fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[A-C][a-c]{0,2}"]
}

proptest! {
    #[test]
    fn routing_matches_filter(event in name_strategy(), filter in name_strategy()) {
        let args = PropertyChangedArgs::new(event.clone());
        let expected = filter.is_empty() || event.is_empty() || event == filter;
        prop_assert_eq!(args.matches(&filter), expected);

        let source = Source::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        source.changed.add_handler(filter, Arc::new(move |_: &PropertyChangedArgs| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        source.changed.raise(&args);
        prop_assert_eq!(hits.load(Ordering::SeqCst), usize::from(expected));
    }

    #[test]
    fn raise_prunes_only_dead_weak_handlers(
        strong in 0usize..4,
        keep in proptest::collection::vec(any::<bool>(), 0..8),
    ) {
        let event = PropertyChangedEvent::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..strong {
            let h = Arc::clone(&hits);
            event.add_handler("", Arc::new(move |_: &PropertyChangedArgs| {
                h.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let mut owners: Vec<Handler> = Vec::new();
        for &kept in &keep {
            let h = Arc::clone(&hits);
            let handler: Handler = Arc::new(move |_: &PropertyChangedArgs| {
                h.fetch_add(1, Ordering::SeqCst);
            });
            event.add_weak_handler("", &handler);
            if kept {
                owners.push(handler);
            }
        }

        event.raise(&PropertyChangedArgs::all());
        let live = strong + owners.len();
        prop_assert_eq!(hits.load(Ordering::SeqCst), live);
        prop_assert_eq!(event.handler_count(), live);
    }

    #[test]
    fn manager_count_tracks_unbinds(unbind in proptest::collection::vec(any::<bool>(), 0..8)) {
        let manager = WeakEventManager::new();
        let source: Arc<dyn NotifyPropertyChanged> = Arc::new(Source::default());
        let subscriptions: Vec<_> = unbind
            .iter()
            .map(|_| manager.add_handler(&source, "Value", |_: &PropertyChangedArgs| {}))
            .collect();

        for (subscription, &drop_it) in subscriptions.iter().zip(&unbind) {
            if drop_it {
                subscription.unbind();
            }
        }

        let remaining = unbind.iter().filter(|&&u| !u).count();
        prop_assert_eq!(manager.len(), remaining);
        prop_assert_eq!(source.property_changed().handler_count(), remaining);
        prop_assert_eq!(
            subscriptions.iter().filter(|s| s.is_bound()).count(),
            remaining
        );
    }
}

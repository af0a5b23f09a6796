//! Warnings and errors emitted while binding and invoking actions.
//!
//! Each test installs a counting layer for its own thread, so the counts are
//! not disturbed by tests running in parallel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use vmbind_core::{ImmediateExecutor, NotifyPropertyChanged, PropertyChangedEvent};
use vmbind_runtime::action::{
    ActionConfig, ActionTarget, ActionUnavailableBehaviour::*, CommandAction, Element, Parameter,
    Subject, TargetRef, TargetValue, TypeDescriptorBuilder,
};

#[derive(Default)]
struct Counts {
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

impl Counts {
    fn warnings(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }

    fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

struct CountingLayer(Arc<Counts>);

impl<S: Subscriber> Layer<S> for CountingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("vmbind") {
            return;
        }
        match *metadata.level() {
            Level::WARN => self.0.warnings.fetch_add(1, Ordering::SeqCst),
            Level::ERROR => self.0.errors.fetch_add(1, Ordering::SeqCst),
            _ => 0,
        };
    }
}

fn capture<R>(f: impl FnOnce() -> R) -> (R, Arc<Counts>) {
    let counts = Arc::new(Counts::default());
    let subscriber = tracing_subscriber::registry().with(CountingLayer(Arc::clone(&counts)));
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counts)
}

fn action(target: impl Into<TargetValue>, method: &str, config: ActionConfig) -> CommandAction {
    CommandAction::with_target(target, method, config, Arc::new(ImmediateExecutor)).unwrap()
}

#[derive(Default)]
struct Dialog {
    changed: PropertyChangedEvent,
}

impl NotifyPropertyChanged for Dialog {
    fn property_changed(&self) -> &PropertyChangedEvent {
        &self.changed
    }
}

impl ActionTarget for Dialog {
    fn describe(builder: TypeDescriptorBuilder<Self>) -> TypeDescriptorBuilder<Self> {
        builder
            .method0("Close", |_d: &Dialog| {})
            .property("CanClose", |_d: &Dialog| String::from("sometimes"))
            .method("Merge", &["a", "b"], |_d: &Dialog, _args: &[Parameter]| {})
    }

    fn as_notifier(self: Arc<Self>) -> Option<Arc<dyn NotifyPropertyChanged>> {
        Some(self)
    }
}

/// Has a `bool` guard but never raises property changes.
#[derive(Default)]
struct Quiet {
    ready: AtomicBool,
}

impl ActionTarget for Quiet {
    fn describe(builder: TypeDescriptorBuilder<Self>) -> TypeDescriptorBuilder<Self> {
        builder
            .method0("Run", |_q: &Quiet| {})
            .property("CanRun", |q: &Quiet| q.ready.load(Ordering::SeqCst))
    }
}

#[test]
fn non_bool_guard_warns_once_and_is_ignored() {
    let (action, counts) = capture(|| {
        let action = action(
            TargetRef::new(Arc::new(Dialog::default())),
            "Close",
            ActionConfig::default(),
        );
        assert!(action.can_execute());
        assert!(action.can_execute());
        action
    });
    assert_eq!(counts.warnings(), 1);
    assert_eq!(counts.errors(), 0);
    assert!(action.can_execute());
}

#[test]
fn non_bool_guard_warns_on_every_rebind() {
    let first = TargetRef::new(Arc::new(Dialog::default()));
    let second = TargetRef::new(Arc::new(Dialog::default()));
    let ((), counts) = capture(|| {
        let dialog = Arc::new(Element::with_target("close", first.clone()));
        let subject: Arc<dyn Subject> = dialog.clone();
        let action = CommandAction::new(
            subject,
            None,
            "Close",
            ActionConfig::default(),
            Arc::new(ImmediateExecutor),
        )
        .unwrap();
        assert!(action.can_execute());

        dialog.action_target().set(second.clone()).unwrap();
        assert!(action.can_execute());

        dialog.action_target().set(first.clone()).unwrap();
        assert!(action.can_execute());
    });
    assert_eq!(counts.warnings(), 3);
    assert_eq!(counts.errors(), 0);
}

#[test]
fn non_notifying_guard_warns_once_and_is_polled() {
    let quiet = Arc::new(Quiet::default());
    let ((), counts) = capture(|| {
        let action = action(
            TargetRef::new(Arc::clone(&quiet)),
            "Run",
            ActionConfig::default(),
        );
        assert!(!action.can_execute());
        quiet.ready.store(true, Ordering::SeqCst);
        assert!(action.can_execute());
    });
    assert_eq!(counts.warnings(), 1);
}

#[test]
fn disabled_unavailable_action_is_silent() {
    let ((), counts) = capture(|| {
        let absent = action(TargetValue::Absent, "Close", ActionConfig::new(Disable, Disable));
        assert!(!absent.can_execute());
        absent.execute(Parameter::none()).unwrap();

        let missing = action(
            TargetRef::new(Arc::new(Quiet::default())),
            "Close",
            ActionConfig::new(Disable, Disable),
        );
        assert!(!missing.can_execute());
        missing.execute(Parameter::none()).unwrap();
    });
    assert_eq!(counts.warnings(), 0);
    assert_eq!(counts.errors(), 0);
}

#[test]
fn throwing_invocation_logs_one_error() {
    let ((), counts) = capture(|| {
        let absent = action(TargetValue::Absent, "Close", ActionConfig::new(Throw, Throw));
        assert!(absent.execute(Parameter::none()).is_err());
    });
    assert_eq!(counts.errors(), 1);
}

#[test]
fn invalid_signature_logs_one_error() {
    let (result, counts) = capture(|| {
        CommandAction::with_target(
            TargetRef::new(Arc::new(Dialog::default())),
            "Merge",
            ActionConfig::default(),
            Arc::new(ImmediateExecutor),
        )
    });
    assert!(result.is_err());
    assert_eq!(counts.errors(), 1);
}

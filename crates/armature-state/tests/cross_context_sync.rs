//! End-to-end synchronization behavior: instances sharing a key converge,
//! feedback loops never form, and teardown is clean.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use armature_config::ConfigSource;
use armature_state::{JsonMap, SharedStores, StateKey, WidgetCore};
use serde_json::{Value, json};

fn persisted() -> ConfigSource {
    ConfigSource {
        persistence: Some(true),
        ..Default::default()
    }
}

fn initial(id: &str) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert("id".to_string(), json!(id));
    map
}

fn fields(pairs: &[(&str, Value)]) -> JsonMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Tracks hook invocations and the state each one observed.
struct HookProbe {
    count: Rc<Cell<usize>>,
    last: Rc<RefCell<Option<JsonMap>>>,
}

impl HookProbe {
    fn install(core: &mut WidgetCore) -> Self {
        let count = Rc::new(Cell::new(0));
        let last = Rc::new(RefCell::new(None));
        let count_in = Rc::clone(&count);
        let last_in = Rc::clone(&last);
        core.on_external_change(move |state| {
            count_in.set(count_in.get() + 1);
            *last_in.borrow_mut() = Some(state.clone());
        });
        Self { count, last }
    }

    fn count(&self) -> usize {
        self.count.get()
    }

    fn last_field(&self, field: &str) -> Option<Value> {
        self.last.borrow().as_ref().and_then(|s| s.get(field).cloned())
    }
}

#[test]
fn same_context_siblings_converge_without_feedback() {
    let stores = SharedStores::in_memory();
    let ctx = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx, "Kanban", initial("board"), None, Some(&user), None);
    let mut b = WidgetCore::new(&ctx, "Kanban", initial("board"), None, Some(&user), None);
    let a_probe = HookProbe::install(&mut a);
    let b_probe = HookProbe::install(&mut b);

    a.update_state(fields(&[("x", json!(1))]));

    // B reacted exactly once, to the new value, synchronously.
    assert_eq!(b_probe.count(), 1);
    assert_eq!(b_probe.last_field("x"), Some(json!(1)));
    assert_eq!(b.get("x"), Some(json!(1)));

    // No echo: B's reaction did not save, so A saw at most its own announce.
    assert!(a_probe.count() <= 1);

    // Nothing is waiting on the cross-context queue of this lone context.
    assert_eq!(ctx.pump(), 0);
    assert_eq!(b_probe.count(), 1);
}

#[test]
fn cross_context_sync_delivers_on_pump_only() {
    let stores = SharedStores::in_memory();
    let ctx_a = stores.attach();
    let ctx_b = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx_a, "Kanban", initial("board"), None, Some(&user), None);
    let mut b = WidgetCore::new(&ctx_b, "Kanban", initial("board"), None, Some(&user), None);
    let b_probe = HookProbe::install(&mut b);
    let a_probe = HookProbe::install(&mut a);

    a.update_state(fields(&[("x", json!(1))]));

    // Not yet: delivery rides the receiving context's event queue.
    assert_eq!(b_probe.count(), 0);
    assert!(ctx_b.has_pending_signals());

    assert_eq!(ctx_b.pump(), 1);
    assert_eq!(b_probe.count(), 1);
    assert_eq!(b.get("x"), Some(json!(1)));

    // B only loaded; it produced no signal, so A's context stays quiet.
    assert_eq!(ctx_a.pump(), 0);
    assert_eq!(a_probe.count(), 1, "A hears only its own local announce");
}

#[test]
fn updates_in_both_directions_are_last_write_wins() {
    let stores = SharedStores::in_memory();
    let ctx_a = stores.attach();
    let ctx_b = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx_a, "Sheet", initial("sheet"), None, Some(&user), None);
    let mut b = WidgetCore::new(&ctx_b, "Sheet", initial("sheet"), None, Some(&user), None);

    a.update_state(fields(&[("cell", json!("from-a"))]));
    b.update_state(fields(&[("cell", json!("from-b"))]));
    ctx_a.pump();
    ctx_b.pump();

    assert_eq!(a.get("cell"), Some(json!("from-b")));
    assert_eq!(b.get("cell"), Some(json!("from-b")));
}

#[test]
fn different_keys_are_isolated() {
    let stores = SharedStores::in_memory();
    let ctx = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx, "Panel", initial("left"), None, Some(&user), None);
    let mut b = WidgetCore::new(&ctx, "Panel", initial("right"), None, Some(&user), None);
    let b_probe = HookProbe::install(&mut b);

    a.update_state(fields(&[("x", json!(1))]));
    ctx.pump();

    assert_eq!(b_probe.count(), 0);
    assert_eq!(b.get("x"), None);
}

#[test]
fn uid_keyed_instances_never_collide() {
    let stores = SharedStores::in_memory();
    let ctx = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx, "Note", JsonMap::new(), None, Some(&user), None);
    let mut b = WidgetCore::new(&ctx, "Note", JsonMap::new(), None, Some(&user), None);
    assert_ne!(a.state_key(), b.state_key());

    let b_probe = HookProbe::install(&mut b);
    a.update_state(fields(&[("text", json!("mine"))]));
    assert_eq!(b_probe.count(), 0);
    assert_eq!(b.get("text"), None);
    b.update_state(fields(&[("text", json!("also mine"))]));
    assert_eq!(a.get("text"), Some(json!("mine")));
}

#[test]
fn hook_triggered_update_is_suppressed_while_loading() {
    let stores = SharedStores::in_memory();
    let ctx = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx, "Kanban", initial("board"), None, Some(&user), None);
    let b = Rc::new(RefCell::new(WidgetCore::new(
        &ctx,
        "Kanban",
        initial("board"),
        None,
        Some(&user),
        None,
    )));

    // B's reaction mutates its own state; the recursion guard must keep
    // that from persisting or signaling.
    let b_for_hook = Rc::downgrade(&b);
    b.borrow_mut().on_external_change(move |_state| {
        if let Some(b) = b_for_hook.upgrade() {
            b.borrow_mut()
                .update_state([("echo".to_string(), json!(true))]);
        }
    });
    let a_probe = HookProbe::install(&mut a);

    a.update_state(fields(&[("x", json!(1))]));

    // B applied its own change in memory only.
    assert_eq!(b.borrow().get("echo"), Some(json!(true)));
    let stored = ctx.store().load(&StateKey::from("board")).unwrap();
    assert_eq!(stored.get("echo"), None, "suppressed save must not persist");
    assert_eq!(stored.get("x"), Some(&json!(1)));

    // And no second wave of signals reached A.
    assert!(a_probe.count() <= 1);
    assert_eq!(ctx.pump(), 0);
}

#[test]
fn detached_instance_stops_reacting() {
    let stores = SharedStores::in_memory();
    let ctx = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx, "Panel", initial("shared"), None, Some(&user), None);
    let mut b = WidgetCore::new(&ctx, "Panel", initial("shared"), None, Some(&user), None);
    let b_probe = HookProbe::install(&mut b);

    a.update_state(fields(&[("n", json!(1))]));
    assert_eq!(b_probe.count(), 1);

    b.detach();
    a.update_state(fields(&[("n", json!(2))]));
    assert_eq!(b_probe.count(), 1, "no delivery after teardown");
    // The detached instance keeps its last-applied state.
    assert_eq!(b.get("n"), Some(json!(1)));
}

#[test]
fn signal_queued_before_drop_is_skipped_safely() {
    let stores = SharedStores::in_memory();
    let ctx_a = stores.attach();
    let ctx_b = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx_a, "Panel", initial("shared"), None, Some(&user), None);
    let b = WidgetCore::new(&ctx_b, "Panel", initial("shared"), None, Some(&user), None);

    a.update_state(fields(&[("n", json!(1))]));
    assert!(ctx_b.has_pending_signals());

    // The signal is already in flight when the instance dies.
    drop(b);
    assert_eq!(ctx_b.pump(), 0, "in-flight signal must not touch a dead instance");
}

#[test]
fn sibling_instance_created_later_picks_up_stored_state() {
    let stores = SharedStores::in_memory();
    let ctx = stores.attach();
    let user = persisted();

    let mut a = WidgetCore::new(&ctx, "Filter", initial("filters"), None, Some(&user), None);
    a.update_state(fields(&[("query", json!("open"))]));

    let late = WidgetCore::new(&ctx, "Filter", initial("filters"), None, Some(&user), None);
    assert_eq!(late.get("query"), Some(json!("open")));
}

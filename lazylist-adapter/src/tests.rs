use crate::*;

use lazylist::{DelegateAdapter, Error, Item, LazyRepeatOptions, LoadDone};

use futures::FutureExt;
use std::cell::{Cell, RefCell};
use std::ops::RangeInclusive;
use std::rc::Rc;

const VIEWPORT: u32 = 500;

type Parked = Rc<RefCell<Vec<(usize, LoadDone<Block>)>>>;

fn uniform(surface: &MemorySurface, count: i64) -> FnDelegate<Block> {
    let s = surface.clone();
    FnDelegate::with_factory(move || count, move |_, _| Some(s.create_block(50)))
}

fn mount(count: i64, options: LazyRepeatOptions) -> Controller<FnDelegate<Block>> {
    let surface = MemorySurface::new(VIEWPORT);
    let delegate = uniform(&surface, count);
    Controller::new(surface, delegate, options).unwrap()
}

fn parking(count: i64) -> (FnDelegate<Block>, Parked) {
    let parked: Parked = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&parked);
    let delegate = FnDelegate::with_loader(
        move || count,
        move |index, done| sink.borrow_mut().push((index, done)),
    );
    (delegate, parked)
}

/// Completes every parked load with a 50px block until the engine stops asking.
fn deliver_all(c: &mut Controller<FnDelegate<Block>>, parked: &Parked) {
    loop {
        let batch: Vec<_> = parked.borrow_mut().drain(..).collect();
        if batch.is_empty() {
            break;
        }
        for (_, done) in batch {
            done.complete_with(c.surface().create_block(50));
        }
        c.pump();
    }
}

fn indices(r: RangeInclusive<usize>) -> Vec<usize> {
    r.collect()
}

fn assert_document_order(c: &Controller<FnDelegate<Block>>) {
    let expected: Vec<Block> = c
        .list()
        .materialized()
        .into_iter()
        .filter_map(|i| c.list().element(i))
        .collect();
    assert_eq!(c.surface().children(), expected);
}

#[test]
fn setup_materializes_four_viewports() {
    let c = mount(100, LazyRepeatOptions::new());

    assert_eq!(c.list().ready().now_or_never(), Some(Ok(())));
    // Limit is 4 * 500px; item 40 is the first one whose bottom passes it.
    assert_eq!(c.list().materialized(), indices(0..=40));
    assert_eq!(c.list().padding(), 0);
    assert_eq!(c.list().item_top(41), Some(2050));
    assert_eq!(c.list().item_height(7), Some(50));
    assert_document_order(&c);
    assert!(c.list().is_idle());
    assert!(!c.list().is_refreshing());
    assert!(c.surface().has_placeholder());
    // Scroll and resize only.
    assert_eq!(c.surface().listener_count(), 2);
}

#[test]
fn padding_is_settable() {
    let c = mount(100, LazyRepeatOptions::new());
    c.list().set_padding(120);
    assert_eq!(c.list().padding(), 120);
    assert_eq!(c.surface().content_height(), 120 + 41 * 50);
}

#[test]
fn scroll_down_extends_window_and_trims() {
    let mut c = mount(100, LazyRepeatOptions::new().with_start_backoff(5));

    c.scroll_to(1000);

    // Rendered up to 1000 + 2000px; item 20 straddles the viewport top, minus a backoff of 5.
    assert_eq!(c.list().materialized(), indices(15..=60));
    assert_eq!(c.list().padding(), 750);
    assert_eq!(c.list().item_top(15), Some(c.list().padding()));
    assert_eq!(c.surface().content_height(), 3050);
    assert_document_order(&c);
}

#[test]
fn scroll_down_keeps_default_backoff() {
    let mut c = mount(100, LazyRepeatOptions::new());
    c.scroll_to(1000);
    assert_eq!(c.list().materialized(), indices(0..=60));
    assert_eq!(c.list().padding(), 0);
}

#[test]
fn scroll_up_renders_backward_window() {
    let mut c = mount(100, LazyRepeatOptions::new().with_start_backoff(5));
    c.scroll_to(1000);
    c.scroll_to(500);

    // Item 10 straddles the viewport top; the window ends at the first top past 2500px.
    assert_eq!(c.list().materialized(), indices(5..=49));
    assert_eq!(c.list().padding(), 250);
    assert_eq!(c.surface().children().len(), 45);
    assert_document_order(&c);
    assert!(c.list().is_idle());
}

#[test]
fn resize_renders_more() {
    let mut c = mount(100, LazyRepeatOptions::new());
    c.resize(1000);
    assert_eq!(c.list().materialized(), indices(0..=80));
}

#[test]
fn second_scroll_supersedes_running_task() {
    let surface = MemorySurface::new(VIEWPORT);
    let (delegate, parked) = parking(100);
    let destroyed = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&destroyed);
    let delegate = delegate.on_destroy_item(move |i, _| log.borrow_mut().push(i));
    let mut c = Controller::new(surface, delegate, LazyRepeatOptions::new()).unwrap();
    deliver_all(&mut c, &parked);
    assert_eq!(c.list().materialized(), indices(0..=40));

    c.surface().set_scroll_top(1000);
    c.list().render();
    c.pump();
    assert_eq!(parked.borrow().len(), 1);
    assert_eq!(parked.borrow()[0].0, 41);
    assert_eq!(c.snapshot().running_task, Some(1));

    // The second task queues behind the first and takes over its token.
    c.surface().set_scroll_top(1500);
    c.list().render();
    assert_eq!(c.snapshot().pending_tasks, 1);

    let (_, done) = parked.borrow_mut().pop().unwrap();
    let speculative = c.surface().create_block(50);
    done.complete_with(speculative);
    c.pump();

    assert!(!c.surface().contains(speculative));
    assert!(!c.list().is_materialized(41));
    assert_eq!(*destroyed.borrow(), vec![41]);
    // The second task started only now and asks for the same item again.
    assert_eq!(c.snapshot().running_task, Some(2));
    assert_eq!(c.snapshot().pending_tasks, 0);
    assert_eq!(parked.borrow().len(), 1);
    assert_eq!(parked.borrow()[0].0, 41);

    deliver_all(&mut c, &parked);
    assert_eq!(c.list().materialized(), indices(0..=70));
    assert_eq!(*destroyed.borrow(), vec![41]);
    assert_document_order(&c);
    assert!(c.list().is_idle());
}

#[test]
fn async_backward_loads_land_in_index_order() {
    let surface = MemorySurface::new(VIEWPORT);
    let (delegate, parked) = parking(100);
    let mut c =
        Controller::new(surface, delegate, LazyRepeatOptions::new().with_start_backoff(5))
            .unwrap();
    deliver_all(&mut c, &parked);
    c.scroll_to(1000);
    deliver_all(&mut c, &parked);
    assert_eq!(c.list().materialized(), indices(15..=60));

    c.scroll_to(500);
    assert_eq!(c.list().materialized(), indices(15..=49));
    assert_eq!(parked.borrow().len(), 10);
    assert!(!c.list().is_idle());

    // Requested from 14 down to 5; complete them the other way round.
    loop {
        let next = parked.borrow_mut().pop();
        let Some((_, done)) = next else {
            break;
        };
        done.complete_with(c.surface().create_block(50));
        c.pump();
        assert_document_order(&c);
        let first = c.list().materialized()[0];
        assert_eq!(c.list().item_top(first), Some(c.list().padding()));
    }

    assert_eq!(c.list().materialized(), indices(5..=49));
    assert_eq!(c.list().padding(), 250);
    assert!(c.list().is_idle());
}

#[test]
fn late_backward_loads_are_dropped_after_window_moves() {
    let surface = MemorySurface::new(VIEWPORT);
    let (delegate, parked) = parking(100);
    let destroyed = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&destroyed);
    let delegate = delegate.on_destroy_item(move |i, _| log.borrow_mut().push(i));
    let mut c =
        Controller::new(surface, delegate, LazyRepeatOptions::new().with_start_backoff(5))
            .unwrap();
    deliver_all(&mut c, &parked);
    c.scroll_to(1000);
    deliver_all(&mut c, &parked);

    c.scroll_to(500);
    let stale: Vec<_> = parked.borrow_mut().drain(..).collect();
    assert_eq!(stale.len(), 10);

    // The forward pass trims past every index still loading backward.
    c.scroll_to(3000);
    deliver_all(&mut c, &parked);
    assert_eq!(c.list().materialized(), indices(55..=99));
    destroyed.borrow_mut().clear();

    let mut late = Vec::new();
    for (index, done) in stale {
        let block = c.surface().create_block(50);
        late.push(block);
        done.complete_with(block);
        c.pump();
        assert_eq!(c.list().materialized(), indices(55..=99), "after index {index}");
    }

    assert_eq!(c.list().padding(), 2750);
    assert_eq!(c.list().item_top(55), Some(c.list().padding()));
    assert!(late.iter().all(|block| !c.surface().contains(*block)));
    assert_document_order(&c);
    let mut dropped = destroyed.borrow().clone();
    dropped.sort_unstable();
    assert_eq!(dropped, indices(5..=14));
    assert!(c.list().is_idle());

    // Scrolling back requests the dropped indices again.
    c.scroll_to(500);
    let requested: Vec<usize> = parked.borrow().iter().map(|(i, _)| *i).collect();
    assert!(requested.contains(&14));
    deliver_all(&mut c, &parked);
    assert_document_order(&c);
    let first = c.list().materialized()[0];
    assert_eq!(c.list().item_top(first), Some(c.list().padding()));
}

#[test]
fn refresh_item_rejects_unrendered_index() {
    let mut c = mount(100, LazyRepeatOptions::new());

    let pending = c.list().refresh_item(99);
    let err = c.resolve(pending).unwrap().unwrap_err();
    assert!(err.is_state());

    let pending = c.list().refresh(Some(99)).unwrap();
    assert!(c.resolve(pending).unwrap().unwrap_err().is_state());
}

#[test]
fn refresh_all_on_empty_list_is_a_no_op() {
    let mut c = mount(0, LazyRepeatOptions::new());
    let before = c.snapshot();

    let pending = c.list().refresh_all().unwrap();
    assert_eq!(c.resolve(pending), Some(Ok(())));
    assert_eq!(c.snapshot(), before);
    assert!(c.list().materialized().is_empty());
    assert_eq!(c.surface().fixed_height(), None);
}

#[test]
fn concurrent_refresh_all_rejects() {
    let mut c = mount(100, LazyRepeatOptions::new());

    let first = c.list().refresh_all().unwrap();
    assert!(c.list().is_refreshing());
    // Height is pinned to the rendered extent while everything is rebuilt.
    assert_eq!(c.surface().fixed_height(), Some(2050));
    assert!(c.surface().children().is_empty());

    let second = c.list().refresh_all().unwrap();
    assert!(c.resolve(second).unwrap().unwrap_err().is_state());

    assert_eq!(c.resolve(first), Some(Ok(())));
    assert!(!c.list().is_refreshing());
    assert_eq!(c.surface().fixed_height(), None);
    assert_eq!(c.list().materialized(), indices(0..=40));
    assert_eq!(c.surface().blocks_created(), 82);
    assert_document_order(&c);
}

#[test]
fn refresh_all_restarts_from_first_rendered() {
    let mut c = mount(100, LazyRepeatOptions::new().with_start_backoff(5));
    c.scroll_to(1000);

    let pending = c.list().refresh(None).unwrap();
    assert_eq!(c.resolve(pending), Some(Ok(None)));
    assert_eq!(c.list().materialized(), indices(15..=60));
    assert_eq!(c.list().padding(), 750);
    assert_document_order(&c);
}

#[test]
fn refresh_item_swaps_in_place_and_remeasures() {
    let surface = MemorySurface::new(VIEWPORT);
    let height = Rc::new(Cell::new(50));
    let s = surface.clone();
    let h = Rc::clone(&height);
    let delegate = FnDelegate::with_factory(|| 100, move |_, _| Some(s.create_block(h.get())));
    let mut c = Controller::new(surface, delegate, LazyRepeatOptions::new()).unwrap();
    let old = c.list().element(3).unwrap();

    height.set(80);
    let pending = c.list().refresh(Some(3)).unwrap();
    let fresh = c.resolve(pending).unwrap().unwrap().unwrap();

    assert_ne!(fresh, old);
    assert_eq!(c.list().element(3), Some(fresh));
    assert!(!c.surface().contains(old));
    assert_eq!(c.list().item_height(3), Some(80));
    // Every later offset moved by the 30px delta.
    assert_eq!(c.list().item_top(4), Some(230));
    assert_eq!(c.list().item_top(41), Some(2080));
    assert_document_order(&c);
}

#[test]
fn render_twice_is_idempotent() {
    let surface = MemorySurface::new(VIEWPORT);
    let updates = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&updates);
    let delegate = uniform(&surface, 100).on_update(move |i, _| log.borrow_mut().push(i));
    let mut c = Controller::new(surface, delegate, LazyRepeatOptions::new()).unwrap();
    let children = c.surface().children();
    let created = c.surface().blocks_created();

    c.list().render();
    c.pump();
    c.list().render();
    c.pump();

    assert_eq!(c.list().materialized(), indices(0..=40));
    assert_eq!(c.surface().children(), children);
    assert_eq!(c.surface().blocks_created(), created);
    assert_eq!(*updates.borrow(), vec![40, 40]);
}

#[test]
fn destroy_tears_everything_down() {
    let surface = MemorySurface::new(VIEWPORT);
    let teardowns = Rc::new(Cell::new(0));
    let removed = Rc::new(Cell::new(0));
    let (t, r) = (Rc::clone(&teardowns), Rc::clone(&removed));
    let delegate = uniform(&surface, 100)
        .on_destroy(move || t.set(t.get() + 1))
        .on_destroy_item(move |_, _| r.set(r.get() + 1));
    let mut c = Controller::new(surface, delegate, LazyRepeatOptions::new()).unwrap();

    c.destroy();
    assert!(c.list().is_destroyed());
    assert!(c.surface().children().is_empty());
    assert_eq!(c.surface().listener_count(), 0);
    assert_eq!(teardowns.get(), 1);
    assert_eq!(removed.get(), 41);

    c.scroll_to(3000);
    c.list().render();
    c.pump();
    assert!(c.list().materialized().is_empty());

    let pending = c.list().refresh_all().unwrap();
    assert!(c.resolve(pending).unwrap().unwrap_err().is_state());
    let pending = c.list().setup();
    assert!(c.resolve(pending).unwrap().unwrap_err().is_state());

    c.destroy();
    assert_eq!(teardowns.get(), 1);
}

#[test]
fn touch_events_are_debounced() {
    let mut c = mount(100, LazyRepeatOptions::new().with_touch_events(true));
    assert_eq!(c.surface().listener_count(), 4);

    c.scroll_to(1000);
    assert_eq!(c.list().materialized(), indices(0..=40));
    c.tick(20);
    assert_eq!(c.list().materialized(), indices(0..=40));
    c.tick(30);
    assert_eq!(c.list().materialized(), indices(0..=60));

    c.touch_move(1500);
    assert_eq!(c.list().materialized(), indices(0..=60));
    // Touch-end renders right away and once more later.
    c.touch_end();
    assert_eq!(c.list().materialized(), indices(0..=70));
    c.tick(60);
    c.tick(130);
    assert_eq!(c.list().materialized(), indices(0..=70));
    assert_document_order(&c);
}

#[test]
fn missing_scroll_container_fails_setup() {
    let surface = MemorySurface::detached();
    let delegate = uniform(&surface, 10);
    let err = Controller::new(surface, delegate, LazyRepeatOptions::new()).unwrap_err();
    assert!(matches!(err, Error::Setup(_)));
}

#[test]
fn negative_count_rejects_setup() {
    let c = mount(-1, LazyRepeatOptions::new());
    let err = c.list().ready().now_or_never().unwrap().unwrap_err();
    assert!(err.is_contract_violation());
    assert!(!c.list().is_refreshing());
}

#[test]
fn negative_count_fails_refresh_all_call() {
    let mut c = mount(-1, LazyRepeatOptions::new());
    let err = c.list().refresh_all().unwrap_err();
    assert!(err.is_contract_violation());
    assert!(!c.list().is_refreshing());

    let err = c.list().refresh(None).unwrap_err();
    assert!(err.is_contract_violation());
    c.pump();
    assert!(c.list().materialized().is_empty());
    assert!(c.list().is_idle());
}

#[test]
fn dropped_completion_rejects_setup() {
    let surface = MemorySurface::new(VIEWPORT);
    let delegate = FnDelegate::<Block>::with_loader(|| 10, |_, done| drop(done));
    let c = Controller::new(surface, delegate, LazyRepeatOptions::new()).unwrap();
    let err = c.list().ready().now_or_never().unwrap().unwrap_err();
    assert!(err.is_contract_violation());
    assert!(c.list().materialized().is_empty());
    assert!(c.surface().children().is_empty());
}

#[test]
fn factory_receives_template_hint() {
    let surface = MemorySurface::new(VIEWPORT);
    let template = surface.create_block(50);
    let seen = Rc::new(Cell::new(0));
    let s = surface.clone();
    let count = Rc::clone(&seen);
    let delegate = FnDelegate::with_factory(
        || 3,
        move |_, hint: Option<&Block>| {
            if hint == Some(&template) {
                count.set(count.get() + 1);
            }
            Some(s.create_block(50))
        },
    );
    let adapter = DelegateAdapter::new(delegate).with_template(Some(template));
    let c = Controller::with_adapter(surface, adapter, LazyRepeatOptions::new()).unwrap();
    assert_eq!(c.list().materialized(), indices(0..=2));
    assert_eq!(seen.get(), 3);
}

#[test]
fn render_hook_passthrough() {
    let surface = MemorySurface::new(VIEWPORT);
    let calls = Rc::new(Cell::new(0u64));
    let sink = Rc::clone(&calls);
    let delegate = uniform(&surface, 3)
        .with_render(move |items, height| sink.set(height + items.len() as u64));
    let mut adapter = DelegateAdapter::new(delegate);
    assert!(adapter.has_render_function());
    adapter
        .render(&[Item::new(surface.create_block(10))], 40)
        .unwrap();
    assert_eq!(calls.get(), 41);

    let c = Controller::new(
        surface.clone(),
        uniform(&surface, 3).with_render(|_, _| {}),
        LazyRepeatOptions::new(),
    )
    .unwrap();
    assert!(c.list().has_render_function());
}

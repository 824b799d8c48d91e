use lazylist::LazyRepeatOptions;
use lazylist_adapter::{Controller, FnDelegate, MemorySurface};

fn main() {
    // Example: 10k rows of varying height in a 600px viewport, scrolled down and back up.
    let surface = MemorySurface::new(600);
    let blocks = surface.clone();
    let delegate = FnDelegate::with_factory(
        || 10_000,
        move |i, _| Some(blocks.create_block(40 + (i % 7) as u32 * 10)),
    );

    let mut c = match Controller::new(surface, delegate, LazyRepeatOptions::new()) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("setup failed: {err}");
            return;
        }
    };
    report("setup", &c);

    for top in [2_000, 8_000, 20_000] {
        c.scroll_to(top);
        report(&format!("scroll_to({top})"), &c);
    }

    c.scroll_to(5_000);
    report("scroll_to(5000)", &c);

    let pending = match c.list().refresh_all() {
        Ok(pending) => pending,
        Err(err) => {
            eprintln!("refresh_all failed: {err}");
            return;
        }
    };
    match c.resolve(pending) {
        Some(Ok(())) => report("refresh_all", &c),
        Some(Err(err)) => eprintln!("refresh_all failed: {err}"),
        None => eprintln!("refresh_all still pending"),
    }
}

fn report(label: &str, c: &Controller<FnDelegate<lazylist_adapter::Block>>) {
    let snapshot = c.snapshot();
    println!(
        "{label}: items={:?}..={:?} count={} padding={} height={}",
        snapshot.first_materialized(),
        snapshot.last_materialized(),
        snapshot.materialized.len(),
        snapshot.padding,
        c.surface().content_height(),
    );
}

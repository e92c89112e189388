use super::{
    flush_timers, found_pages, new_viewer, open, wait_for_search, wait_until_settled,
};
use crate::event::ViewerEvent;
use crate::geometry::{PageRect, SizeF};
use crate::render::cell::CellGeneration;
use crate::search::SearchStatus;
use crate::testing::FakeDocument;

fn hit() -> PageRect {
    PageRect::new(5.0, 50.0, 10.0, 10.0)
}

#[test]
fn matches_wrap_around_and_scroll_into_view() {
    let doc = FakeDocument::uniform(5, SizeF::new(100.0, 100.0))
        .with_hits(1, vec![hit()])
        .with_hits(3, vec![hit()])
        .with_hits(4, vec![hit()]);
    let mut viewer = new_viewer(2);
    open(&mut viewer, doc);
    wait_until_settled(&mut viewer);
    viewer.drain_events();

    viewer.start_search("needle");
    wait_for_search(&mut viewer);

    let events = viewer.drain_events();
    assert_eq!(events[0], ViewerEvent::SearchReset);
    assert_eq!(found_pages(&events), vec![1]);
    assert_eq!(viewer.highlight_query(), "needle");
    // Page 1 is 360 px tall at 400; the hit sits halfway down, a quarter viewport from the top.
    assert_eq!(viewer.state().scroll_offset, 400 + 180 - 75);

    viewer.search_next();
    assert_eq!(found_pages(&viewer.drain_events()), vec![3]);
    assert_eq!(viewer.state().scroll_offset, 1160 + 180 - 75);

    viewer.search_next();
    assert_eq!(found_pages(&viewer.drain_events()), vec![4]);
    assert_eq!(
        viewer.state().scroll_offset,
        viewer.layout().max_scroll(viewer.state().viewport_height)
    );

    viewer.search_next();
    assert_eq!(found_pages(&viewer.drain_events()), vec![1]);
    viewer.search_prev();
    assert_eq!(found_pages(&viewer.drain_events()), vec![4]);
    assert_eq!(viewer.search().current_index(), Some(2));
}

#[test]
fn empty_result_leaves_renders_alone() {
    let mut viewer = new_viewer(2);
    open(&mut viewer, FakeDocument::uniform(3, SizeF::new(100.0, 100.0)));
    wait_until_settled(&mut viewer);
    viewer.drain_events();
    let epoch = viewer.epoch();

    viewer.start_search("absent");
    wait_for_search(&mut viewer);

    assert_eq!(
        viewer.drain_events(),
        vec![
            ViewerEvent::SearchReset,
            ViewerEvent::SearchEmpty {
                query: "absent".to_string()
            }
        ]
    );
    assert_eq!(viewer.epoch(), epoch);
    assert_eq!(viewer.highlight_query(), "");
    assert_eq!(viewer.search().status(), SearchStatus::Completed);
}

#[test]
fn highlight_change_refreshes_visible_pages_and_keeps_stale_bitmaps_elsewhere() {
    let doc = FakeDocument::uniform(30, SizeF::new(100.0, 100.0)).with_hits(13, vec![hit()]);
    let mut viewer = new_viewer(2);
    viewer.set_fit_width(false);
    open(&mut viewer, doc);
    wait_until_settled(&mut viewer);

    // Pages are 100 px tall every 120 px. At 1500 pages 3..=6 fall in the keep band.
    viewer.set_scroll_offset(1500);
    flush_timers(&mut viewer);
    wait_until_settled(&mut viewer);
    let before = viewer.epoch();
    assert_eq!(
        viewer.cell(0).expect("cell").generation(),
        CellGeneration::Evicted
    );
    assert_eq!(
        viewer.cell(4).expect("cell").generation(),
        CellGeneration::Rendered(before)
    );

    viewer.start_search("needle");
    wait_for_search(&mut viewer);
    wait_until_settled(&mut viewer);

    let epoch = viewer.epoch();
    assert!(epoch > before);
    assert_eq!(viewer.state().scroll_offset, 1580 + 50 - 75);
    for page in 3..=6 {
        let cell = viewer.cell(page).expect("cell");
        assert_eq!(cell.generation(), CellGeneration::HighlightStale, "page {page}");
        assert!(cell.bitmap().is_some(), "page {page}");
    }

    let cell = viewer.cell(13).expect("cell");
    assert_eq!(cell.generation(), CellGeneration::Rendered(epoch));
    let bitmap = cell.bitmap().expect("bitmap");
    let pixel = |x: usize, y: usize| {
        let offset = (y * bitmap.width as usize + x) * 4;
        &bitmap.pixels[offset..offset + 4]
    };
    // Inside the active match the page is tinted orange; elsewhere it stays white.
    assert_eq!(pixel(10, 55)[2], 0);
    assert!((135..=145).contains(&pixel(10, 55)[1]));
    assert!(pixel(90, 10).iter().all(|&channel| channel >= 250));
}

#[test]
fn reset_clears_the_highlight_and_invalidates() {
    let doc = FakeDocument::uniform(3, SizeF::new(100.0, 100.0)).with_hits(0, vec![hit()]);
    let mut viewer = new_viewer(2);
    open(&mut viewer, doc);
    viewer.start_search("needle");
    wait_for_search(&mut viewer);
    wait_until_settled(&mut viewer);
    let epoch = viewer.epoch();
    viewer.drain_events();

    viewer.reset_search();

    assert_eq!(viewer.drain_events(), vec![ViewerEvent::SearchReset]);
    assert_eq!(viewer.highlight_query(), "");
    assert!(viewer.epoch() > epoch);
    assert_eq!(viewer.search().status(), SearchStatus::Idle);
    wait_until_settled(&mut viewer);
    assert_eq!(
        viewer.cell(0).expect("cell").generation(),
        CellGeneration::Rendered(viewer.epoch())
    );
}

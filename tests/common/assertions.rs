//! Custom test assertions for integration tests

use timeline_dl::{Event, HarvestReport};
use tokio::sync::broadcast;

/// Assert items are ascending by `(created_at, id)` with unique ids
pub fn assert_sorted_and_unique(report: &HarvestReport) {
    for pair in report.items.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            (a.created_at, &a.id) < (b.created_at, &b.id),
            "items out of order or duplicated: {} then {}",
            a.id,
            b.id
        );
    }
}

/// Ids of the report's items, in order
pub fn item_ids(report: &HarvestReport) -> Vec<&str> {
    report.items.iter().map(|i| i.id.as_str()).collect()
}

/// Every event currently buffered in `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

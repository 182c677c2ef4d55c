//! Optimistic in-memory edits with one debounced persistence write per item.
//!
//! Every edit is applied to the in-memory item immediately. The fields it
//! touched are folded into that item's pending patch and the item's timer is
//! re-armed; when the timer fires the accumulated patch is written with a
//! single `update_item` call. Failed writes are reported through the
//! notification sink and never roll back the in-memory state; their fields
//! are carried into the item's next write.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::models::{FoodItem, FoodItemPatch, MacroTotals, NewFoodItem};
use crate::nutrition::{EditError, FoodItemEdit, apply_edit};
use crate::scheduler::TimerArena;

/// Persistence collaborator. A missing row is reported as `Ok(None)` /
/// `Ok(false)`; `Err` is reserved for failures of the store itself.
pub trait ItemStore {
    fn create_item(&self, meal_id: i64, item: &NewFoodItem) -> Result<Option<FoodItem>>;
    fn update_item(&self, id: i64, patch: &FoodItemPatch) -> Result<Option<FoodItem>>;
    fn delete_item(&self, id: i64) -> Result<bool>;
}

impl<T: ItemStore + ?Sized> ItemStore for &T {
    fn create_item(&self, meal_id: i64, item: &NewFoodItem) -> Result<Option<FoodItem>> {
        (**self).create_item(meal_id, item)
    }

    fn update_item(&self, id: i64, patch: &FoodItemPatch) -> Result<Option<FoodItem>> {
        (**self).update_item(id, patch)
    }

    fn delete_item(&self, id: i64) -> Result<bool> {
        (**self).delete_item(id)
    }
}

/// Receives user-facing messages for non-fatal failures.
pub trait NotificationSink {
    fn notify(&self, message: &str);

    /// Called after an edit changed an item in memory.
    fn item_changed(&self, _item: &FoodItem) {}
}

/// Writes messages to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, message: &str) {
        debug!(message, "user notification");
        eprintln!("{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerConfig {
    /// How long an item must go without edits before it is written.
    pub quiescence: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            quiescence: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub item_id: i64,
    pub edit: FoodItemEdit,
}

pub struct PendingWriteCoalescer<S, N> {
    store: S,
    notifier: N,
    config: CoalescerConfig,
    items: Vec<FoodItem>,
    timers: TimerArena,
    pending: HashMap<i64, FoodItemPatch>,
    /// Fields from failed writes, re-sent under the next write for the item.
    failed: HashMap<i64, FoodItemPatch>,
    confirmed: HashMap<i64, FoodItem>,
    unconfirmed: HashSet<i64>,
}

impl<S: ItemStore, N: NotificationSink> PendingWriteCoalescer<S, N> {
    pub fn new(store: S, notifier: N, config: CoalescerConfig) -> Self {
        Self {
            store,
            notifier,
            config,
            items: Vec::new(),
            timers: TimerArena::new(),
            pending: HashMap::new(),
            failed: HashMap::new(),
            confirmed: HashMap::new(),
            unconfirmed: HashSet::new(),
        }
    }

    /// Replace the in-memory items with freshly loaded, persisted ones.
    pub fn load(&mut self, items: Vec<FoodItem>) {
        let dropped = self.teardown();
        if dropped > 0 {
            debug!(dropped, "reload discarded pending writes");
        }
        self.confirmed = items.iter().map(|i| (i.id, i.clone())).collect();
        self.failed.clear();
        self.unconfirmed.clear();
        self.items = items;
    }

    #[must_use]
    pub fn items(&self) -> &[FoodItem] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, id: i64) -> Option<&FoodItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Totals for one meal, summed from the current in-memory items.
    #[must_use]
    pub fn meal_totals(&self, meal_id: i64) -> MacroTotals {
        MacroTotals::from_items(self.items.iter().filter(|i| i.meal_id == meal_id))
    }

    /// Ids whose last write failed and has not since succeeded.
    #[must_use]
    pub fn unconfirmed(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.unconfirmed.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn is_pending(&self, id: i64) -> bool {
        self.timers.is_pending(id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Apply `edit` to the in-memory item now and schedule its write.
    ///
    /// A rejected edit leaves the item untouched, arms no timer and is
    /// reported to the notification sink.
    pub fn edit(&mut self, id: i64, edit: &FoodItemEdit, now: Instant) -> Result<(), EditError> {
        let result = self.apply(id, edit);
        let patch = match result {
            Ok(patch) => patch,
            Err(e) => {
                debug!(item_id = id, error = %e, "edit rejected");
                self.notifier.notify(&e.to_string());
                return Err(e);
            }
        };
        if patch.is_empty() {
            return Ok(());
        }
        self.pending.entry(id).or_default().merge(patch);
        self.timers.arm(id, now + self.config.quiescence);
        if let Some(item) = self.item(id) {
            self.notifier.item_changed(item);
        }
        Ok(())
    }

    fn apply(&mut self, id: i64, edit: &FoodItemEdit) -> Result<FoodItemPatch, EditError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(EditError::UnknownItem(id))?;
        apply_edit(item, edit)
    }

    /// Write every item whose quiescence window has elapsed by `now`.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let due = self.timers.due(now);
        let n = due.len();
        for id in due {
            self.persist(id);
        }
        n
    }

    /// Write every pending item immediately, ignoring deadlines.
    pub fn flush_all(&mut self) -> usize {
        let ids = self.timers.drain_ordered();
        let n = ids.len();
        for id in ids {
            self.persist(id);
        }
        n
    }

    /// Cancel all timers without writing. Returns the number of dropped writes.
    pub fn teardown(&mut self) -> usize {
        let dropped = self.timers.clear();
        self.pending.clear();
        if dropped > 0 {
            warn!(dropped, "pending writes dropped on teardown");
        }
        dropped
    }

    fn persist(&mut self, id: i64) {
        let Some(latest) = self.pending.remove(&id) else {
            return;
        };
        let mut patch = self.failed.remove(&id).unwrap_or_default();
        patch.merge(latest);
        debug!(item_id = id, "writing coalesced patch");
        let name = self
            .item(id)
            .map_or_else(|| format!("item {id}"), |i| i.food_name.clone());
        match self.store.update_item(id, &patch) {
            Ok(Some(saved)) => {
                self.confirmed.insert(id, saved);
                self.unconfirmed.remove(&id);
            }
            Ok(None) => {
                warn!(item_id = id, "update returned no row");
                self.failed.insert(id, patch);
                self.unconfirmed.insert(id);
                self.notifier
                    .notify(&format!("Failed to save changes to '{name}'"));
            }
            Err(e) => {
                warn!(item_id = id, error = %e, "update failed");
                self.failed.insert(id, patch);
                self.unconfirmed.insert(id);
                self.notifier
                    .notify(&format!("Failed to save changes to '{name}': {e:#}"));
            }
        }
    }

    /// Create an item immediately, bypassing the debounce.
    pub fn create_item(&mut self, meal_id: i64, item: &NewFoodItem) -> Result<Option<FoodItem>> {
        let created = self.store.create_item(meal_id, item)?;
        match &created {
            Some(saved) => {
                self.confirmed.insert(saved.id, saved.clone());
                self.items.push(saved.clone());
            }
            None => self
                .notifier
                .notify(&format!("Failed to add '{}'", item.food_name)),
        }
        Ok(created)
    }

    /// Delete an item immediately. A pending write for it is cancelled only
    /// once the delete succeeds.
    pub fn delete_item(&mut self, id: i64) -> Result<bool> {
        let deleted = self.store.delete_item(id)?;
        if deleted {
            self.timers.cancel(id);
            self.pending.remove(&id);
            self.failed.remove(&id);
            self.items.retain(|i| i.id != id);
            self.confirmed.remove(&id);
            self.unconfirmed.remove(&id);
        } else {
            self.notifier.notify(&format!("Failed to delete item {id}"));
        }
        Ok(deleted)
    }

    /// Restore an item to its last successfully persisted state.
    pub fn revert_to_confirmed(&mut self, id: i64) -> bool {
        let Some(saved) = self.confirmed.get(&id).cloned() else {
            return false;
        };
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return false;
        };
        *item = saved;
        self.timers.cancel(id);
        self.pending.remove(&id);
        self.failed.remove(&id);
        self.unconfirmed.remove(&id);
        true
    }

    /// Apply incoming edits and fire timers until the channel closes.
    ///
    /// Pending writes are left in place on return; the caller decides
    /// between [`flush_all`](Self::flush_all) and [`teardown`](Self::teardown).
    pub async fn run(&mut self, rx: &mut mpsc::UnboundedReceiver<EditRequest>) {
        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                request = rx.recv() => match request {
                    Some(request) => {
                        if let Err(e) = self.edit(request.item_id, &request.edit, Instant::now()) {
                            debug!(error = %e, "dropped edit request");
                        }
                    }
                    None => break,
                },
                () = wait_until(deadline) => {
                    self.fire_due(Instant::now());
                }
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use anyhow::bail;

    use super::*;
    use crate::models::{Category, MacroValues, Per100g, Provenance};
    use crate::nutrition::{MacroOverride, recalculate};
    use crate::units::Unit;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Mode {
        Ok,
        Falsy,
        Fail,
    }

    struct RecordingStore {
        rows: RefCell<HashMap<i64, FoodItem>>,
        updates: RefCell<Vec<(i64, FoodItemPatch)>>,
        next_id: Cell<i64>,
        mode: Cell<Mode>,
    }

    impl RecordingStore {
        fn new(items: &[FoodItem]) -> Self {
            Self {
                rows: RefCell::new(items.iter().map(|i| (i.id, i.clone())).collect()),
                updates: RefCell::new(Vec::new()),
                next_id: Cell::new(100),
                mode: Cell::new(Mode::Ok),
            }
        }

        fn updates(&self) -> Vec<(i64, FoodItemPatch)> {
            self.updates.borrow().clone()
        }
    }

    impl ItemStore for RecordingStore {
        fn create_item(&self, meal_id: i64, item: &NewFoodItem) -> Result<Option<FoodItem>> {
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            let row = FoodItem {
                id,
                meal_id,
                food_name: item.food_name.clone(),
                quantity: item.quantity,
                unit: item.unit,
                macros: item.macros,
                provenance: item.provenance,
            };
            self.rows.borrow_mut().insert(id, row.clone());
            Ok(Some(row))
        }

        fn update_item(&self, id: i64, patch: &FoodItemPatch) -> Result<Option<FoodItem>> {
            self.updates.borrow_mut().push((id, patch.clone()));
            match self.mode.get() {
                Mode::Falsy => return Ok(None),
                Mode::Fail => bail!("connection reset"),
                Mode::Ok => {}
            }
            let mut rows = self.rows.borrow_mut();
            let Some(row) = rows.get_mut(&id) else {
                return Ok(None);
            };
            patch.apply_to(row);
            Ok(Some(row.clone()))
        }

        fn delete_item(&self, id: i64) -> Result<bool> {
            if self.mode.get() == Mode::Fail {
                bail!("database is locked");
            }
            Ok(self.rows.borrow_mut().remove(&id).is_some())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        messages: RefCell<Vec<String>>,
        changes: Cell<usize>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }

        fn item_changed(&self, _item: &FoodItem) {
            self.changes.set(self.changes.get() + 1);
        }
    }

    fn egg(id: i64, meal_id: i64) -> FoodItem {
        let per_100g = Per100g {
            category: Some(Category::Protein),
            calories: Some(155.0),
            protein: Some(13.0),
            carbs: Some(1.1),
            fat: Some(11.0),
        };
        FoodItem {
            id,
            meal_id,
            food_name: "Whole egg".to_string(),
            quantity: 100.0,
            unit: Unit::G,
            macros: recalculate(&per_100g, 100.0),
            provenance: Provenance::Derived(per_100g),
        }
    }

    fn coalescer(store: &RecordingStore, items: Vec<FoodItem>) -> PendingWriteCoalescer<&RecordingStore, RecordingSink> {
        let mut c = PendingWriteCoalescer::new(store, RecordingSink::default(), CoalescerConfig::default());
        c.load(items);
        c
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_edit_is_visible_before_write() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(200.0), t0).unwrap();
        assert_eq!(c.item(1).unwrap().macros.calories, Some(310.0));
        assert!(c.is_pending(1));
        assert_eq!(c.fire_due(t0 + ms(499)), 0);
        assert!(store.updates().is_empty());
        assert_eq!(c.notifier().changes.get(), 1);
    }

    #[test]
    fn test_rapid_edits_produce_one_write() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        for (i, qty) in [110.0, 120.0, 130.0, 140.0, 150.0].into_iter().enumerate() {
            let now = t0 + ms(100 * i as u64);
            c.edit(1, &FoodItemEdit::Quantity(qty), now).unwrap();
            assert_eq!(c.fire_due(now), 0);
        }
        assert_eq!(c.fire_due(t0 + ms(899)), 0);
        assert_eq!(c.fire_due(t0 + ms(900)), 1);

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        let (id, patch) = &updates[0];
        assert_eq!(*id, 1);
        assert_eq!(patch.quantity, Some(150.0));
        assert_eq!(patch.calories, Some(Some(233.0)));
        assert!(!c.is_pending(1));
    }

    #[test]
    fn test_spaced_edits_produce_one_write_each() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        for i in 0..5u32 {
            let now = t0 + ms(600) * i;
            c.fire_due(now);
            c.edit(1, &FoodItemEdit::Quantity(f64::from(100 + i)), now).unwrap();
        }
        c.fire_due(t0 + ms(3000));
        assert_eq!(store.updates().len(), 5);
    }

    #[test]
    fn test_accumulates_fields_across_edits() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(50.0), t0).unwrap();
        c.edit(
            1,
            &FoodItemEdit::Macros(MacroOverride {
                protein: Some(9.0),
                ..MacroOverride::default()
            }),
            t0 + ms(100),
        )
        .unwrap();
        c.fire_due(t0 + ms(600));

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        let patch = &updates[0].1;
        assert_eq!(patch.quantity, Some(50.0));
        assert_eq!(patch.calories, Some(Some(78.0)));
        assert_eq!(patch.protein, Some(Some(9.0)));
        assert_eq!(patch.provenance, Some(Provenance::Manual));
    }

    #[test]
    fn test_items_have_independent_timers() {
        let store = RecordingStore::new(&[egg(1, 1), egg(2, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1), egg(2, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(120.0), t0).unwrap();
        c.edit(2, &FoodItemEdit::Quantity(80.0), t0 + ms(300)).unwrap();
        assert_eq!(c.fire_due(t0 + ms(500)), 1);
        assert!(c.is_pending(2));
        assert_eq!(c.fire_due(t0 + ms(800)), 1);

        let ids: Vec<i64> = store.updates().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_rejected_edit_changes_nothing() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let before = c.item(1).unwrap().clone();

        let err = c
            .edit(1, &FoodItemEdit::Quantity(0.0), Instant::now())
            .unwrap_err();
        assert_eq!(err, EditError::InvalidQuantity(0.0));
        assert_eq!(c.item(1).unwrap(), &before);
        assert!(!c.is_pending(1));
        assert_eq!(c.notifier().messages.borrow().len(), 1);

        let err = c
            .edit(42, &FoodItemEdit::Quantity(10.0), Instant::now())
            .unwrap_err();
        assert_eq!(err, EditError::UnknownItem(42));
    }

    #[test]
    fn test_failed_write_keeps_optimistic_state() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        store.mode.set(Mode::Falsy);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(200.0), t0).unwrap();
        c.fire_due(t0 + ms(500));
        assert_eq!(c.item(1).unwrap().quantity, 200.0);
        assert_eq!(c.unconfirmed(), vec![1]);
        assert!(c.notifier().messages.borrow()[0].contains("Whole egg"));

        // A later successful write confirms the item again.
        store.mode.set(Mode::Ok);
        c.edit(1, &FoodItemEdit::Quantity(210.0), t0 + ms(600)).unwrap();
        c.fire_due(t0 + ms(1100));
        assert!(c.unconfirmed().is_empty());
    }

    #[test]
    fn test_failed_fields_are_resent_with_next_write() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        store.mode.set(Mode::Falsy);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Rename("Muesli".to_string()), t0).unwrap();
        c.fire_due(t0 + ms(500));
        assert_eq!(c.unconfirmed(), vec![1]);

        store.mode.set(Mode::Ok);
        c.edit(1, &FoodItemEdit::Quantity(120.0), t0 + ms(600)).unwrap();
        c.fire_due(t0 + ms(1100));

        let updates = store.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].1.food_name.as_deref(), Some("Muesli"));
        assert_eq!(updates[1].1.quantity, Some(120.0));

        let stored = store.rows.borrow()[&1].clone();
        assert_eq!(&stored, c.item(1).unwrap());
        assert!(c.unconfirmed().is_empty());
    }

    #[test]
    fn test_newer_edit_wins_over_failed_field() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        store.mode.set(Mode::Fail);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(200.0), t0).unwrap();
        c.fire_due(t0 + ms(500));

        store.mode.set(Mode::Ok);
        c.edit(1, &FoodItemEdit::Quantity(150.0), t0 + ms(600)).unwrap();
        c.fire_due(t0 + ms(1100));

        assert_eq!(store.rows.borrow()[&1].quantity, 150.0);
        assert_eq!(store.rows.borrow()[&1].macros.calories, Some(233.0));
    }

    #[test]
    fn test_store_error_is_reported() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        store.mode.set(Mode::Fail);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(200.0), t0).unwrap();
        c.fire_due(t0 + ms(500));
        assert_eq!(c.item(1).unwrap().quantity, 200.0);
        assert!(c.notifier().messages.borrow()[0].contains("connection reset"));
    }

    #[test]
    fn test_revert_to_confirmed() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        store.mode.set(Mode::Falsy);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(200.0), t0).unwrap();
        c.fire_due(t0 + ms(500));
        assert!(c.revert_to_confirmed(1));
        assert_eq!(c.item(1).unwrap().quantity, 100.0);
        assert_eq!(c.item(1).unwrap().macros.calories, Some(155.0));
        assert!(c.unconfirmed().is_empty());
        assert!(!c.revert_to_confirmed(99));
    }

    #[test]
    fn test_teardown_drops_pending_writes() {
        let store = RecordingStore::new(&[egg(1, 1), egg(2, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1), egg(2, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(120.0), t0).unwrap();
        c.edit(2, &FoodItemEdit::Quantity(130.0), t0).unwrap();
        assert_eq!(c.teardown(), 2);
        assert_eq!(c.fire_due(t0 + ms(1000)), 0);
        assert!(store.updates().is_empty());
        assert_eq!(c.item(1).unwrap().quantity, 120.0);
    }

    #[test]
    fn test_flush_all_writes_everything_now() {
        let store = RecordingStore::new(&[egg(1, 1), egg(2, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1), egg(2, 1)]);
        let t0 = Instant::now();

        c.edit(2, &FoodItemEdit::Quantity(120.0), t0).unwrap();
        c.edit(1, &FoodItemEdit::Quantity(130.0), t0 + ms(10)).unwrap();
        assert_eq!(c.flush_all(), 2);
        let ids: Vec<i64> = store.updates().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(c.pending_count(), 0);
    }

    #[test]
    fn test_delete_cancels_pending_write() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(120.0), t0).unwrap();
        assert!(c.delete_item(1).unwrap());
        assert!(c.item(1).is_none());
        assert_eq!(c.fire_due(t0 + ms(1000)), 0);
        assert!(store.updates().is_empty());

        assert!(!c.delete_item(1).unwrap());
        assert_eq!(c.notifier().messages.borrow().len(), 1);
    }

    #[test]
    fn test_failed_delete_keeps_pending_write() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let t0 = Instant::now();

        c.edit(1, &FoodItemEdit::Quantity(120.0), t0).unwrap();
        store.mode.set(Mode::Fail);
        assert!(c.delete_item(1).is_err());
        assert!(c.item(1).is_some());
        assert!(c.is_pending(1));

        store.mode.set(Mode::Ok);
        assert_eq!(c.fire_due(t0 + ms(500)), 1);
        assert_eq!(store.rows.borrow()[&1].quantity, 120.0);
    }

    #[test]
    fn test_create_item_and_meal_totals() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1), egg(2, 2)]);
        let toast = NewFoodItem::manual(
            "Toast",
            1.0,
            Unit::Count,
            MacroValues {
                calories: Some(80.0),
                protein: Some(3.0),
                carbs: Some(15.0),
                fat: None,
            },
        )
        .unwrap();

        let created = c.create_item(1, &toast).unwrap().unwrap();
        assert_eq!(created.id, 100);
        assert_eq!(c.items().len(), 3);

        let totals = c.meal_totals(1);
        assert_eq!(totals.calories, 235.0);
        assert_eq!(totals.protein, 16.0);
        assert_eq!(totals.fat, 11.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_coalesces_burst() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let producer = async move {
            for qty in [110.0, 120.0, 130.0, 140.0, 150.0] {
                tx.send(EditRequest {
                    item_id: 1,
                    edit: FoodItemEdit::Quantity(qty),
                })
                .unwrap();
                tokio::time::sleep(ms(100)).await;
            }
            tokio::time::sleep(ms(1000)).await;
        };
        tokio::join!(c.run(&mut rx), producer);

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.quantity, Some(150.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_spaced_edits() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let producer = async move {
            for qty in [110.0, 120.0, 130.0, 140.0, 150.0] {
                tx.send(EditRequest {
                    item_id: 1,
                    edit: FoodItemEdit::Quantity(qty),
                })
                .unwrap();
                tokio::time::sleep(ms(600)).await;
            }
        };
        tokio::join!(c.run(&mut rx), producer);

        assert_eq!(store.updates().len(), 5);
        assert_eq!(c.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_leaves_pending_on_close() {
        let store = RecordingStore::new(&[egg(1, 1)]);
        let mut c = coalescer(&store, vec![egg(1, 1)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        tx.send(EditRequest {
            item_id: 1,
            edit: FoodItemEdit::Quantity(300.0),
        })
        .unwrap();
        drop(tx);
        c.run(&mut rx).await;

        assert_eq!(c.pending_count(), 1);
        assert!(store.updates().is_empty());
        assert_eq!(c.flush_all(), 1);
        assert_eq!(store.updates()[0].1.quantity, Some(300.0));
    }
}

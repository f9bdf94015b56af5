//! Ordered-list moves with optimistic apply and rollback.
//!
//! The local list is reordered first, then `persist` is called with the new
//! order. If persisting fails the list is restored to the snapshot taken
//! before the move, so the caller never keeps an order the backend rejected.

use crate::error::{CoachError, Result};
use tracing::warn;

/// An item carrying a 1-based position within its list.
pub trait Ordered {
    fn set_order(&mut self, order: u32);
}

/// Rewrite positions so they run 1..=len in list order.
pub fn renumber<T: Ordered>(items: &mut [T]) {
    for (i, item) in items.iter_mut().enumerate() {
        item.set_order(i as u32 + 1);
    }
}

/// Move the item at `from` to `to` (both 0-based) and renumber.
pub fn move_item<T: Ordered>(items: &mut Vec<T>, from: usize, to: usize) -> Result<()> {
    if from >= items.len() || to >= items.len() {
        return Err(CoachError::validation(
            "order",
            format!(
                "cannot move position {} to {} in a list of {}",
                from + 1,
                to + 1,
                items.len()
            ),
        ));
    }
    let item = items.remove(from);
    items.insert(to, item);
    renumber(items);
    Ok(())
}

/// Move locally, persist, and roll back to the prior snapshot if persisting fails.
pub fn apply_optimistic<T, F>(items: &mut Vec<T>, from: usize, to: usize, persist: F) -> Result<()>
where
    T: Ordered + Clone,
    F: FnOnce(&[T]) -> Result<()>,
{
    let snapshot = items.clone();
    move_item(items, from, to)?;
    if let Err(e) = persist(items) {
        warn!("reorder rejected, restoring previous order: {e}");
        *items = snapshot;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        order: u32,
    }

    impl Ordered for Item {
        fn set_order(&mut self, order: u32) {
            self.order = order;
        }
    }

    fn items() -> Vec<Item> {
        let mut v = vec![
            Item { name: "a", order: 0 },
            Item { name: "b", order: 0 },
            Item { name: "c", order: 0 },
        ];
        renumber(&mut v);
        v
    }

    fn names(v: &[Item]) -> Vec<&'static str> {
        v.iter().map(|i| i.name).collect()
    }

    #[test]
    fn move_renumbers_contiguously() {
        let mut v = items();
        move_item(&mut v, 0, 2).unwrap();
        assert_eq!(names(&v), ["b", "c", "a"]);
        assert_eq!(v.iter().map(|i| i.order).collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn out_of_range_move_is_rejected_without_change() {
        let mut v = items();
        assert!(move_item(&mut v, 0, 3).is_err());
        assert_eq!(v, items());
    }

    #[test]
    fn optimistic_keeps_order_on_success() {
        let mut v = items();
        let mut seen = Vec::new();
        apply_optimistic(&mut v, 2, 0, |new| {
            seen = names(new);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, ["c", "a", "b"]);
        assert_eq!(names(&v), ["c", "a", "b"]);
    }

    #[test]
    fn optimistic_restores_snapshot_on_failure() {
        let mut v = items();
        let err = apply_optimistic(&mut v, 2, 0, |_| {
            Err(CoachError::Io(std::io::Error::other("offline")))
        })
        .unwrap_err();
        assert!(matches!(err, CoachError::Io(_)));
        assert_eq!(v, items());
    }
}

//! Client-side notification views.
//!
//! Two independent views over incoming notifications: an ordered,
//! most-recent-first persistent list, and a single ephemeral toast slot that
//! each new notification overwrites (toasts do not queue). "Read" is
//! removal from the list; there is no read-but-retained state.

use std::sync::Mutex;

use crate::normalize::Notification;

#[derive(Default)]
struct Inner {
    /// Most recent first.
    list: Vec<Notification>,
    toast: Option<Notification>,
}

#[derive(Default)]
pub struct NotificationStore {
    inner: Mutex<Inner>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies both effects of a new notification: prepend to the list and
    /// overwrite the toast slot.
    ///
    /// Returns `false` when a notification with the same id is already in
    /// the list; a true duplicate is dropped entirely (no toast either).
    pub fn push(&self, notification: Notification) -> bool {
        let mut inner = self.inner();
        if inner.list.iter().any(|n| n.id == notification.id) {
            return false;
        }
        inner.list.insert(0, notification.clone());
        inner.toast = Some(notification);
        true
    }

    pub fn list(&self) -> Vec<Notification> {
        self.inner().list.clone()
    }

    /// Everything in the list is unread by definition, since reading removes.
    pub fn unread_count(&self) -> usize {
        self.inner().list.len()
    }

    /// Marking as read is removal; acknowledge and dismiss are the same
    /// operation.
    pub fn mark_as_read(&self, id: &str) {
        self.remove(id);
    }

    pub fn remove(&self, id: &str) {
        self.inner().list.retain(|n| n.id != id);
    }

    pub fn clear(&self) {
        self.inner().list.clear();
    }

    pub fn current_toast(&self) -> Option<Notification> {
        self.inner().toast.clone()
    }

    pub fn dismiss_toast(&self) {
        self.inner().toast = None;
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn notification(id: &str) -> Notification {
        Notification {
            id: id.to_string(),
            event_type: "report:status".to_string(),
            message: format!("update {id}"),
            data: json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let store = NotificationStore::new();
        store.push(notification("a"));
        store.push(notification("b"));
        store.push(notification("c"));

        let ids: Vec<_> = store.list().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(store.unread_count(), 3);
    }

    #[test]
    fn test_duplicate_id_is_dropped_entirely() {
        let store = NotificationStore::new();
        assert!(store.push(notification("a")));
        store.push(notification("b"));

        assert!(!store.push(notification("a")));

        assert_eq!(store.unread_count(), 2);
        // The toast still shows "b"; the duplicate did not overwrite it.
        assert_eq!(store.current_toast().unwrap().id, "b");
    }

    #[test]
    fn test_toast_is_overwritten_not_queued() {
        let store = NotificationStore::new();
        store.push(notification("a"));
        store.push(notification("b"));

        assert_eq!(store.current_toast().unwrap().id, "b");

        store.dismiss_toast();
        assert!(store.current_toast().is_none());
        // Dismissing the toast does not touch the list.
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn test_mark_as_read_removes_from_list() {
        let store = NotificationStore::new();
        store.push(notification("a"));
        store.push(notification("b"));

        store.mark_as_read("a");

        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.list()[0].id, "b");

        // Unknown ids are a no-op.
        store.mark_as_read("missing");
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_clear_empties_the_list() {
        let store = NotificationStore::new();
        store.push(notification("a"));
        store.push(notification("b"));

        store.clear();

        assert_eq!(store.unread_count(), 0);
        assert!(store.list().is_empty());
    }
}

//! Subscription bookkeeping: the dual `request_id`/`track_alias` indices
//! the session maintains.

use std::collections::HashMap;

/// Lifecycle state of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Pending,
    Active,
    Closed,
}

/// One subscription record.
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    pub request_id: u64,
    pub track_name: String,
    pub track_alias: Option<u64>,
    pub state: SubscriptionState,
}

/// The two indices the session keeps over its subscriptions: by
/// `request_id` (pending subscribes awaiting `SUBSCRIBE_OK`) and by
/// `track_alias` (active subscriptions, used for data-stream demux).
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    by_request_id: HashMap<u64, SubscriptionRecord>,
    by_track_alias: HashMap<u64, u64>, // track_alias -> request_id
}

impl SubscriptionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly issued subscribe as pending.
    pub fn insert_pending(&mut self, request_id: u64, track_name: String) {
        self.by_request_id.insert(
            request_id,
            SubscriptionRecord {
                request_id,
                track_name,
                track_alias: None,
                state: SubscriptionState::Pending,
            },
        );
    }

    /// Applies a `SUBSCRIBE_OK`: the `request_id` is no longer pending and
    /// its `track_alias` becomes registered for data-stream demux (I1).
    ///
    /// Returns `false` if `request_id` was not a pending subscription (a
    /// protocol violation the caller should treat as terminal).
    pub fn apply_subscribe_ok(&mut self, request_id: u64, track_alias: u64) -> bool {
        match self.by_request_id.get_mut(&request_id) {
            Some(record) if record.state == SubscriptionState::Pending => {
                record.track_alias = Some(track_alias);
                record.state = SubscriptionState::Active;
                self.by_track_alias.insert(track_alias, request_id);
                true
            }
            _ => false,
        }
    }

    /// Removes a pending subscription on `SUBSCRIBE_ERROR`.
    pub fn apply_subscribe_error(&mut self, request_id: u64) -> Option<SubscriptionRecord> {
        self.by_request_id.remove(&request_id)
    }

    /// Removes both indices for `track_name`'s subscription, if present.
    pub fn remove_by_track_name(&mut self, track_name: &str) -> Option<SubscriptionRecord> {
        let request_id = self
            .by_request_id
            .values()
            .find(|r| r.track_name == track_name)
            .map(|r| r.request_id)?;
        let record = self.by_request_id.remove(&request_id);
        if let Some(alias) = record.as_ref().and_then(|r| r.track_alias) {
            self.by_track_alias.remove(&alias);
        }
        record
    }

    /// Looks up the active subscription record for a data-stream's
    /// `track_alias`.
    #[must_use]
    pub fn by_track_alias(&self, track_alias: u64) -> Option<&SubscriptionRecord> {
        let request_id = self.by_track_alias.get(&track_alias)?;
        self.by_request_id.get(request_id)
    }

    #[must_use]
    pub fn is_pending(&self, request_id: u64) -> bool {
        matches!(
            self.by_request_id.get(&request_id),
            Some(r) if r.state == SubscriptionState::Pending
        )
    }

    #[must_use]
    pub fn active_track_names(&self) -> Vec<String> {
        self.by_request_id
            .values()
            .filter(|r| r.state == SubscriptionState::Active)
            .map(|r| r.track_name.clone())
            .collect()
    }

    /// Fails every pending subscription, e.g. on session close.
    pub fn fail_all_pending(&mut self) -> Vec<SubscriptionRecord> {
        let failed: Vec<_> = self
            .by_request_id
            .values()
            .filter(|r| r.state == SubscriptionState::Pending)
            .cloned()
            .collect();
        for record in &failed {
            self.by_request_id.remove(&record.request_id);
        }
        failed
    }
}

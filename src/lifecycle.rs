use crate::model::{SessionId, SessionState};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration as StdDuration;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

/// Default idle lifetime of a session.
pub const DEFAULT_SESSION_TTL: StdDuration = StdDuration::from_secs(2 * 60 * 60);

/// Minimum spacing between two throttled reaping passes.
const CLEANUP_INTERVAL_SECS: i64 = 60;

/// How long a terminal entry outlives its deadline before a drain forgets it.
const TOMBSTONE_RETENTION_SECS: i64 = 24 * 60 * 60;

struct Entry {
    state: SessionState,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    /// Set once a drain has handed this expired entry out for snapshot removal.
    reaped: bool,
}

impl Entry {
    fn new(now: OffsetDateTime, ttl: StdDuration) -> Self {
        Self {
            state: SessionState::Active,
            created_at: now,
            expires_at: now + ttl,
            reaped: false,
        }
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Moves an overdue active entry to `Expired` and returns the resulting state.
    fn settle(&mut self, now: OffsetDateTime) -> SessionState {
        if self.state == SessionState::Active && self.is_expired(now) {
            self.state = SessionState::Expired;
        }
        self.state
    }
}

/// Issues session identifiers and tracks their expiry.
///
/// Expiry is evaluated lazily on access. Terminal identifiers (expired or
/// cleared) are kept as tombstones so they are never handed out again; drains
/// forget tombstones a day past their deadline.
pub struct SessionManager {
    entries: DashMap<SessionId, Entry>,
    ttl: StdDuration,
    cleanup_hint: Mutex<OffsetDateTime>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionManager {
    pub fn new(ttl: StdDuration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            cleanup_hint: Mutex::new(OffsetDateTime::now_utc()),
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    pub fn ttl(&self) -> StdDuration {
        self.ttl
    }

    /// Returns `existing` when it names an active session, otherwise mints a new one.
    ///
    /// `existing` is untrusted client input; anything that does not parse or is
    /// not active leads to a fresh identifier, never to reuse of the given one.
    pub fn issue_or_get(&self, existing: Option<&str>) -> SessionId {
        if let Some(id) = existing.and_then(SessionId::parse) {
            if self.is_valid(&id) {
                return id;
            }
            debug!(session = %id, "presented session is not active");
        }
        self.mint(Self::now())
    }

    fn mint(&self, now: OffsetDateTime) -> SessionId {
        loop {
            let id = SessionId::new();
            if let MapEntry::Vacant(slot) = self.entries.entry(id.clone()) {
                slot.insert(Entry::new(now, self.ttl));
                info!(session = %id, "session issued");
                return id;
            }
        }
    }

    /// Pushes the deadline of an active session to now + ttl.
    /// Returns false when the session is unknown or already terminal.
    pub fn touch(&self, id: &SessionId) -> bool {
        let now = Self::now();
        let Some(mut entry) = self.entries.get_mut(id) else {
            return false;
        };
        if entry.settle(now) != SessionState::Active {
            return false;
        }
        entry.expires_at = now + self.ttl;
        true
    }

    pub fn is_valid(&self, id: &SessionId) -> bool {
        self.state(id) == SessionState::Active
    }

    pub fn state(&self, id: &SessionId) -> SessionState {
        let now = Self::now();
        match self.entries.get_mut(id) {
            Some(mut entry) => entry.settle(now),
            None => SessionState::Unborn,
        }
    }

    /// Makes the session terminal ahead of its deadline.
    pub fn invalidate(&self, id: &SessionId) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            if entry.state == SessionState::Active {
                entry.state = SessionState::Cleared;
                info!(session = %id, "session cleared");
            }
        }
    }

    pub fn expires_at(&self, id: &SessionId) -> Option<OffsetDateTime> {
        self.entries.get(id).map(|entry| entry.expires_at)
    }

    pub fn created_at(&self, id: &SessionId) -> Option<OffsetDateTime> {
        self.entries.get(id).map(|entry| entry.created_at)
    }

    pub fn active_count(&self) -> usize {
        let now = Self::now();
        self.entries
            .iter()
            .filter(|entry| entry.state == SessionState::Active && !entry.is_expired(now))
            .count()
    }

    /// Expires every overdue session and returns each expired identifier not
    /// returned by an earlier drain, including those that expired on access.
    pub fn drain_expired(&self) -> Vec<SessionId> {
        let now = Self::now();
        *self.cleanup_hint.lock() = now;
        self.expire_overdue(now)
    }

    /// Same as [`drain_expired`](Self::drain_expired) but at most once per cleanup interval.
    pub fn drain_expired_if_due(&self) -> Vec<SessionId> {
        let now = Self::now();
        {
            let mut guard = self.cleanup_hint.lock();
            if now - *guard < Duration::seconds(CLEANUP_INTERVAL_SECS) {
                return Vec::new();
            }
            *guard = now;
        }
        self.expire_overdue(now)
    }

    fn expire_overdue(&self, now: OffsetDateTime) -> Vec<SessionId> {
        let mut expired = Vec::new();
        let mut forgotten = 0usize;
        let retention = Duration::seconds(TOMBSTONE_RETENTION_SECS);
        self.entries.retain(|id, entry| {
            if entry.settle(now) == SessionState::Expired && !entry.reaped {
                entry.reaped = true;
                expired.push(id.clone());
            }
            let keep = !entry.state.is_terminal() || now < entry.expires_at + retention;
            if !keep {
                forgotten += 1;
            }
            keep
        });
        if !expired.is_empty() || forgotten > 0 {
            debug!(expired = expired.len(), forgotten, "session registry swept");
        }
        expired
    }
}

//! In-memory identity and role store.
//!
//! Users authenticate by sending one of two configured secrets in a DM.
//! Owner-secret matches grant owner AND admin membership; admin-secret
//! matches grant admin only. Membership is process-local and survives
//! restarts only through the best-effort snapshot.

use std::{
    collections::{HashMap, HashSet},
    time::{SystemTime, UNIX_EPOCH},
};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::info,
};

use crate::types::UserId;

/// The two shared secrets users can authenticate with.
pub struct Secrets {
    pub admin: Secret<String>,
    pub owner: Secret<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("admin", &"[REDACTED]")
            .field("owner", &"[REDACTED]")
            .finish()
    }
}

/// Role assigned to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unauthorized,
    Admin,
    Owner,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "User",
            Self::Admin => "Admin",
            Self::Owner => "Owner",
        }
    }
}

/// Per-user counters, created on first authorized contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub messages_processed: u64,
    pub daily_count: u32,
    /// Epoch seconds of the last daily-counter rollover.
    pub last_reset: u64,
}

impl UserRecord {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages_processed: 0,
            daily_count: 0,
            last_reset: epoch_secs(),
        }
    }
}

/// Outcome of a `remove` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Target removed from at least one of: owners, admins, user records.
    Removed,
    /// Target was in none of them.
    NotFound,
    /// Requester is not an owner.
    NotOwner,
    /// Owners cannot strip their own ownership.
    SelfRemovalForbidden,
}

/// Role and counter state for every known user.
#[derive(Debug, Default)]
pub struct RoleStore {
    pub(crate) users: HashMap<UserId, UserRecord>,
    pub(crate) admins: HashSet<UserId>,
    pub(crate) owners: HashSet<UserId>,
    pub(crate) blocked: HashSet<UserId>,
}

impl RoleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `id` is an admin or owner.
    #[must_use]
    pub fn is_authorized(&self, id: UserId) -> bool {
        self.admins.contains(&id) || self.owners.contains(&id)
    }

    #[must_use]
    pub fn is_owner(&self, id: UserId) -> bool {
        self.owners.contains(&id)
    }

    #[must_use]
    pub fn is_blocked(&self, id: UserId) -> bool {
        self.blocked.contains(&id)
    }

    #[must_use]
    pub fn role(&self, id: UserId) -> Role {
        if self.owners.contains(&id) {
            Role::Owner
        } else if self.admins.contains(&id) {
            Role::Admin
        } else {
            Role::Unauthorized
        }
    }

    /// Compare `supplied` against the configured secrets and grant the
    /// matching role.
    ///
    /// An owner match adds the user to both the owner and admin sets (owner
    /// membership does not imply admin membership automatically, it is added
    /// explicitly here). Either match creates the user record when absent.
    ///
    /// There is no lockout or per-attempt limiting beyond the blanket flood
    /// gate: the secrets are long random strings, not guessable PINs.
    pub fn authenticate(&mut self, id: UserId, name: &str, supplied: &str, secrets: &Secrets) -> Role {
        if constant_time_eq(supplied, secrets.owner.expose_secret()) {
            self.owners.insert(id);
            self.admins.insert(id);
            self.ensure_record(id, name);
            info!(user_id = %id, "owner secret accepted");
            return Role::Owner;
        }
        if constant_time_eq(supplied, secrets.admin.expose_secret()) {
            self.admins.insert(id);
            self.ensure_record(id, name);
            info!(user_id = %id, "admin secret accepted");
            return Role::Admin;
        }
        Role::Unauthorized
    }

    /// Create the user record if it does not exist yet.
    pub fn ensure_record(&mut self, id: UserId, name: &str) -> &mut UserRecord {
        self.users.entry(id).or_insert_with(|| UserRecord::new(name))
    }

    #[must_use]
    pub fn record(&self, id: UserId) -> Option<&UserRecord> {
        self.users.get(&id)
    }

    pub fn record_mut(&mut self, id: UserId) -> Option<&mut UserRecord> {
        self.users.get_mut(&id)
    }

    /// Remove `target` from the owner set, admin set, and user records.
    ///
    /// Owner-only. Each removal is independent; any one of them counts as
    /// success. A requester can never remove themselves from the owner set.
    pub fn remove_user(&mut self, requester: UserId, target: UserId) -> RemoveOutcome {
        if !self.owners.contains(&requester) {
            return RemoveOutcome::NotOwner;
        }
        if target == requester && self.owners.contains(&target) {
            return RemoveOutcome::SelfRemovalForbidden;
        }

        let mut removed = false;
        if self.owners.remove(&target) {
            info!(requester = %requester, target = %target, "removed from owners");
            removed = true;
        }
        if self.admins.remove(&target) {
            info!(requester = %requester, target = %target, "removed from admins");
            removed = true;
        }
        if self.users.remove(&target).is_some() {
            removed = true;
        }

        if removed {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotFound
        }
    }

    /// (users, admins, owners) counts for the status report.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.users.len(), self.admins.len(), self.owners.len())
    }

    /// Admin roster as `(id, display name)`, unknown names rendered as such.
    #[must_use]
    pub fn admin_roster(&self) -> Vec<(UserId, String)> {
        self.roster(&self.admins)
    }

    /// Owner roster as `(id, display name)`.
    #[must_use]
    pub fn owner_roster(&self) -> Vec<(UserId, String)> {
        self.roster(&self.owners)
    }

    fn roster(&self, set: &HashSet<UserId>) -> Vec<(UserId, String)> {
        let mut list: Vec<(UserId, String)> = set
            .iter()
            .map(|id| {
                let name = self
                    .users
                    .get(id)
                    .map_or_else(|| "Unknown".to_string(), |r| r.name.clone());
                (*id, name)
            })
            .collect();
        list.sort_by_key(|(id, _)| *id);
        list
    }
}

/// Constant-time string comparison.
///
/// The length check can short-circuit (length is not secret here), but the
/// content comparison never does: every byte pair is XOR-folded so a correct
/// and an incorrect secret of equal length take the same time to reject.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

//! The tracked-user list and its per-server associations.

use std::collections::BTreeMap;

use anyhow::Result;
use api_types::{is_global_id, RatedUserProfileResponse, ServerData, UserProfile};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::storage::{Storage, TRACKED_USERS_KEY};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedUser {
    pub profile: UserProfile,
    /// Last score reported by the backend, if it has been fetched.
    #[serde(default)]
    pub current_score: Option<f64>,
}

impl TrackedUser {
    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub fn score(&self) -> f64 {
        self.current_score.unwrap_or(0.0)
    }

    fn associate(&mut self, server_id: Option<&str>) -> bool {
        match server_id {
            Some(id) if !is_global_id(id) => {
                if self.profile.associated_server_ids.iter().any(|s| s == id) {
                    false
                } else {
                    self.profile.associated_server_ids.push(id.to_owned());
                    true
                }
            }
            _ => false,
        }
    }
}

/// Tracked users in the order they were first tracked, unique by Discord id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TrackedUsers {
    users: Vec<TrackedUser>,
}

impl TrackedUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cached list. A missing or unreadable entry is an empty list.
    pub async fn load(storage: &Storage) -> Self {
        let mut users: Self = storage.get_as(TRACKED_USERS_KEY).await.unwrap_or_default();
        users.normalize();
        users
    }

    pub async fn save(&self, storage: &Storage) -> Result<()> {
        storage.put_as(TRACKED_USERS_KEY, self).await
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedUser> {
        self.users.iter()
    }

    pub fn get(&self, id: &str) -> Option<&TrackedUser> {
        self.users.iter().find(|u| u.id() == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut TrackedUser> {
        self.users.iter_mut().find(|u| u.id() == id)
    }

    /// Track `profile`, associating it with `server_context` unless that is
    /// the global view. An already tracked user keeps its position and gains
    /// the new association and any server ids the profile carries. Returns
    /// true when the user was not tracked before.
    pub fn track(&mut self, mut profile: UserProfile, server_context: Option<&str>) -> bool {
        let incoming_ids = std::mem::take(&mut profile.associated_server_ids);
        let (user, added) = match self.users.iter().position(|u| u.id() == profile.id) {
            Some(pos) => {
                let existing = &mut self.users[pos];
                profile.associated_server_ids =
                    std::mem::take(&mut existing.profile.associated_server_ids);
                existing.profile = profile;
                (existing, false)
            }
            None => {
                self.users.push(TrackedUser {
                    profile,
                    current_score: None,
                });
                let last = self.users.len() - 1;
                (&mut self.users[last], true)
            }
        };
        for id in &incoming_ids {
            user.associate(Some(id));
        }
        user.associate(server_context);
        added
    }

    /// Remove a user. Returns the removed entry.
    pub fn untrack(&mut self, id: &str) -> Option<TrackedUser> {
        let pos = self.users.iter().position(|u| u.id() == id)?;
        Some(self.users.remove(pos))
    }

    /// Record that a tracked user was rated under `server_id`. Returns true
    /// when the association is new.
    pub fn associate(&mut self, id: &str, server_id: Option<&str>) -> bool {
        self.get_mut(id)
            .map(|user| user.associate(server_id))
            .unwrap_or(false)
    }

    pub fn set_score(&mut self, id: &str, score: f64) -> bool {
        match self.get_mut(id) {
            Some(user) => {
                user.current_score = Some(score);
                true
            }
            None => false,
        }
    }

    /// Fold a backend rated-users listing in. Every listed user becomes
    /// tracked under `server_context` with its reported score.
    pub fn merge_rated(
        &mut self,
        rated: Vec<RatedUserProfileResponse>,
        server_context: Option<&str>,
    ) {
        for entry in rated {
            let id = entry.profile.id.clone();
            self.track(entry.profile, server_context);
            self.set_score(&id, entry.current_score);
        }
        debug!(tracked = self.len(), "merged rated users");
    }

    /// Users shown for a server. The global view, or no server, shows all.
    pub fn visible_in(&self, server_id: Option<&str>) -> Vec<&TrackedUser> {
        match server_id {
            Some(id) if !is_global_id(id) => self
                .users
                .iter()
                .filter(|u| u.profile.associated_server_ids.iter().any(|s| s == id))
                .collect(),
            _ => self.users.iter().collect(),
        }
    }

    /// Number of tracked users per associated server.
    pub fn server_counts(&self) -> BTreeMap<&str, u32> {
        let mut counts = BTreeMap::new();
        for user in &self.users {
            for id in &user.profile.associated_server_ids {
                *counts.entry(id.as_str()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Reconcile server tracked counts with the local list: the global
    /// pseudo-server counts every tracked user, real servers never report
    /// fewer users than are tracked locally under them.
    pub fn apply_counts(&self, servers: &mut [ServerData]) {
        let counts = self.server_counts();
        for server in servers {
            if server.is_global() {
                server.tracked_user_count = self.len() as u32;
            } else if let Some(&local) = counts.get(server.id.as_str()) {
                server.tracked_user_count = server.tracked_user_count.max(local);
            }
        }
    }

    /// Drop duplicate ids and global associations from a loaded list.
    fn normalize(&mut self) {
        let users = std::mem::take(&mut self.users);
        for user in users {
            let score = user.current_score;
            let id = user.profile.id.clone();
            self.track(user.profile, None);
            if let Some(score) = score {
                self.set_score(&id, score);
            }
        }
    }
}

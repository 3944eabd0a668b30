//! In-memory implementations of the store and notifier traits, shared by
//! the api service wiring and the test suites. They stand in for a real
//! document store; per-method mutex scope mimics that store's per-call
//! atomicity (one call is atomic, a sequence of calls is not).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::{
    Builder, BuilderDelta, GuildConfig, GuildId, Rejection, Reviewer, Submission, SubmissionId,
    UserId,
};
use super::repository::{
    BuilderStore, GuildDirectory, NotifyError, RejectionStore, ReviewEvent, ReviewNotifier,
    ReviewerStore, StoreError, SubmissionStore,
};

#[derive(Default, Clone)]
pub struct MemorySubmissions {
    records: Arc<Mutex<HashMap<SubmissionId, Submission>>>,
}

impl SubmissionStore for MemorySubmissions {
    fn upsert(&self, submission: Submission) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("submission mutex poisoned");
        guard.insert(submission.id.clone(), submission);
        Ok(())
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        let guard = self.records.lock().expect("submission mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn delete(&self, id: &SubmissionId) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("submission mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn by_builder(&self, guild: &GuildId, user: &UserId) -> Result<Vec<Submission>, StoreError> {
        let guard = self.records.lock().expect("submission mutex poisoned");
        Ok(guard
            .values()
            .filter(|s| s.guild_id == *guild && s.builder == *user)
            .cloned()
            .collect())
    }

    fn by_reviewer(&self, guild: &GuildId, user: &UserId) -> Result<Vec<Submission>, StoreError> {
        let guard = self.records.lock().expect("submission mutex poisoned");
        Ok(guard
            .values()
            .filter(|s| s.guild_id == *guild && s.reviewer == *user)
            .cloned()
            .collect())
    }

    fn in_guild(&self, guild: &GuildId) -> Result<Vec<Submission>, StoreError> {
        let guard = self.records.lock().expect("submission mutex poisoned");
        Ok(guard
            .values()
            .filter(|s| s.guild_id == *guild)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct MemoryRejections {
    records: Arc<Mutex<HashMap<SubmissionId, Rejection>>>,
}

impl RejectionStore for MemoryRejections {
    fn insert(&self, rejection: Rejection) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("rejection mutex poisoned");
        if guard.contains_key(&rejection.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(rejection.id.clone(), rejection);
        Ok(())
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<Rejection>, StoreError> {
        let guard = self.records.lock().expect("rejection mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn by_reviewer(&self, guild: &GuildId, user: &UserId) -> Result<Vec<Rejection>, StoreError> {
        let guard = self.records.lock().expect("rejection mutex poisoned");
        Ok(guard
            .values()
            .filter(|r| r.guild_id == *guild && r.reviewer == *user)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct MemoryBuilders {
    records: Arc<Mutex<HashMap<(GuildId, UserId), Builder>>>,
}

impl BuilderStore for MemoryBuilders {
    fn fetch(&self, guild: &GuildId, user: &UserId) -> Result<Option<Builder>, StoreError> {
        let guard = self.records.lock().expect("builder mutex poisoned");
        Ok(guard.get(&(guild.clone(), user.clone())).cloned())
    }

    fn apply(
        &self,
        guild: &GuildId,
        user: &UserId,
        delta: BuilderDelta,
    ) -> Result<Builder, StoreError> {
        let mut guard = self.records.lock().expect("builder mutex poisoned");
        let entry = guard
            .entry((guild.clone(), user.clone()))
            .or_insert_with(|| Builder::new(user.clone(), guild.clone()));

        entry.points_total += delta.points;
        entry.building_count =
            (i64::from(entry.building_count) + delta.buildings).max(0) as u32;
        entry.road_kms += delta.road_kms;
        entry.sqm += delta.sqm;

        Ok(entry.clone())
    }

    fn set_dm_enabled(
        &self,
        guild: &GuildId,
        user: &UserId,
        enabled: bool,
    ) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("builder mutex poisoned");
        let entry = guard
            .entry((guild.clone(), user.clone()))
            .or_insert_with(|| Builder::new(user.clone(), guild.clone()));
        entry.dm_enabled = enabled;
        Ok(())
    }

    fn in_guild(&self, guild: &GuildId) -> Result<Vec<Builder>, StoreError> {
        let guard = self.records.lock().expect("builder mutex poisoned");
        Ok(guard
            .values()
            .filter(|b| b.guild == *guild)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<Builder>, StoreError> {
        let guard = self.records.lock().expect("builder mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct MemoryReviewers {
    records: Arc<Mutex<HashMap<(GuildId, UserId), Reviewer>>>,
}

impl ReviewerStore for MemoryReviewers {
    fn fetch(&self, guild: &GuildId, user: &UserId) -> Result<Option<Reviewer>, StoreError> {
        let guard = self.records.lock().expect("reviewer mutex poisoned");
        Ok(guard.get(&(guild.clone(), user.clone())).cloned())
    }

    fn save(&self, reviewer: Reviewer) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("reviewer mutex poisoned");
        guard.insert((reviewer.guild.clone(), reviewer.user.clone()), reviewer);
        Ok(())
    }

    fn in_guild(&self, guild: &GuildId) -> Result<Vec<Reviewer>, StoreError> {
        let guard = self.records.lock().expect("reviewer mutex poisoned");
        Ok(guard
            .values()
            .filter(|r| r.guild == *guild)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<Reviewer>, StoreError> {
        let guard = self.records.lock().expect("reviewer mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

/// Records every emitted event so callers can assert on notifications.
#[derive(Default, Clone)]
pub struct MemoryNotifier {
    events: Arc<Mutex<Vec<ReviewEvent>>>,
}

impl MemoryNotifier {
    pub fn events(&self) -> Vec<ReviewEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl ReviewNotifier for MemoryNotifier {
    fn notify(&self, event: ReviewEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

/// Static guild lookup for wiring and tests; real deployments refresh
/// their directory from configuration events.
#[derive(Default, Clone)]
pub struct StaticGuildDirectory {
    guilds: Arc<Mutex<HashMap<GuildId, GuildConfig>>>,
}

impl StaticGuildDirectory {
    pub fn with_guilds(configs: impl IntoIterator<Item = GuildConfig>) -> Self {
        let directory = Self::default();
        {
            let mut guard = directory.guilds.lock().expect("guild mutex poisoned");
            for config in configs {
                guard.insert(config.guild_id.clone(), config);
            }
        }
        directory
    }
}

impl GuildDirectory for StaticGuildDirectory {
    fn guild(&self, id: &GuildId) -> Option<GuildConfig> {
        let guard = self.guilds.lock().expect("guild mutex poisoned");
        guard.get(id).cloned()
    }
}

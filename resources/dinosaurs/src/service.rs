//! Resource Service for `Dinosaurs` (spec §4.6): validate → (lock) → DAO
//! mutate → append event, all inside the caller's open transaction.

use std::sync::Arc;

use async_trait::async_trait;
use common_lib::context::RequestContext;
use common_lib::pagination::{ListArguments, Paging};
use common_lib::SvcError;
use controller::ControllerHandler;
use store::dao::ResourceDao;
use store::{AdvisoryLockService, EventStore, EventType};

use crate::{validate_species, Dinosaur, DinosaurPatch, KIND};

const LOCK_TYPE: &str = KIND;

/// Whether `Replace` acquires the advisory lock with the blocking or
/// non-blocking variant (spec §4.6 step 2: "configurable policy per
/// deployment").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    Blocking,
    NonBlocking,
    Disabled,
}

pub struct DinosaurService {
    dao: Arc<dyn ResourceDao<Dinosaur>>,
    events: Arc<dyn EventStore>,
    locks: Arc<dyn AdvisoryLockService>,
    lock_policy: LockPolicy,
}

impl DinosaurService {
    pub fn new(
        dao: Arc<dyn ResourceDao<Dinosaur>>,
        events: Arc<dyn EventStore>,
        locks: Arc<dyn AdvisoryLockService>,
    ) -> Self {
        Self {
            dao,
            events,
            locks,
            lock_policy: LockPolicy::Blocking,
        }
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Dinosaur, SvcError> {
        self.dao.get(ctx, id).await
    }

    pub async fn find_by_ids(&self, ctx: &RequestContext, ids: &[String]) -> Result<Vec<Dinosaur>, SvcError> {
        self.dao.find_by_ids(ctx, ids).await
    }

    pub async fn list(&self, ctx: &RequestContext, args: &ListArguments) -> Result<(Vec<Dinosaur>, Paging), SvcError> {
        self.dao.list(ctx, args).await
    }

    /// Create takes no advisory lock: creation has no predecessor (spec §4.6).
    pub async fn create(&self, ctx: &RequestContext, dinosaur: Dinosaur) -> Result<Dinosaur, SvcError> {
        validate_species(&dinosaur.species)?;
        let created = self.dao.create(ctx, dinosaur).await?;
        let event = self
            .events
            .append(ctx, KIND, &created.meta.id, EventType::Created)
            .await?;
        ctx.queue_publish(event.id);
        Ok(created)
    }

    /// Replace acquires the advisory lock around the mutation (spec §4.6 step 2).
    pub async fn replace(&self, ctx: &RequestContext, dinosaur: Dinosaur) -> Result<Dinosaur, SvcError> {
        validate_species(&dinosaur.species)?;
        let id = dinosaur.meta.id.clone();

        let owner = match self.lock_policy {
            LockPolicy::Disabled => None,
            LockPolicy::Blocking => Some(self.locks.acquire_blocking(ctx, LOCK_TYPE, &id).await?),
            LockPolicy::NonBlocking => {
                let (owner, acquired) = self.locks.try_acquire(ctx, LOCK_TYPE, &id).await?;
                if !acquired {
                    return Err(SvcError::conflict("row locked"));
                }
                Some(owner)
            }
        };

        let result = self.replace_locked(ctx, dinosaur).await;

        if let Some(owner) = owner {
            // Released on every exit path, success or error (spec invariant 4).
            let _ = self.locks.release(ctx, &owner).await;
        }

        result
    }

    async fn replace_locked(&self, ctx: &RequestContext, dinosaur: Dinosaur) -> Result<Dinosaur, SvcError> {
        let replaced = self.dao.replace(ctx, dinosaur).await?;
        let event = self
            .events
            .append(ctx, KIND, &replaced.meta.id, EventType::Updated)
            .await?;
        ctx.queue_publish(event.id);
        Ok(replaced)
    }

    /// Patch is sugar over Get + merge + Replace (spec SPEC_FULL §2.2).
    pub async fn patch(&self, ctx: &RequestContext, id: &str, patch: DinosaurPatch) -> Result<Dinosaur, SvcError> {
        let found = self.dao.get(ctx, id).await?;
        let merged = patch.apply(found);
        self.replace(ctx, merged).await
    }

    /// Delete does not take the advisory lock; delete races are resolved at
    /// the DAO layer by idempotent hard-delete (spec §4.6, §9 Open Question:
    /// delete of a nonexistent id is a no-op success).
    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), SvcError> {
        self.dao.delete(ctx, id).await?;
        let event = self.events.append(ctx, KIND, id, EventType::Deleted).await?;
        ctx.queue_publish(event.id);
        Ok(())
    }
}

/// Controller hook invoked on `Created`/`Updated` events. Idempotent: just
/// loads and logs, as the reimplementation's extension point (spec §9).
pub struct OnUpsertHandler {
    pub service: Arc<DinosaurService>,
}

#[async_trait]
impl ControllerHandler for OnUpsertHandler {
    async fn handle(&self, ctx: &RequestContext, source_id: &str) -> Result<(), SvcError> {
        let dinosaur = self.service.get(ctx, source_id).await?;
        tracing::info!(id = %dinosaur.meta.id, species = %dinosaur.species, "dinosaur upserted");
        Ok(())
    }
}

/// Controller hook invoked on `Deleted` events.
pub struct OnDeleteHandler;

#[async_trait]
impl ControllerHandler for OnDeleteHandler {
    async fn handle(&self, _ctx: &RequestContext, source_id: &str) -> Result<(), SvcError> {
        tracing::info!(id = %source_id, "dinosaur deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_lib::ErrorKind;

    #[test]
    fn rejects_empty_species() {
        let err = validate_species("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn rejects_oversized_species() {
        let long = "x".repeat(256);
        let err = validate_species(&long).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn accepts_reasonable_species() {
        assert!(validate_species("Tyrannosaurus").is_ok());
    }

    #[test]
    fn patch_only_overwrites_present_fields() {
        let original = Dinosaur {
            meta: common_lib::meta::Meta::new_created(""),
            species: "Raptor".to_string(),
        };
        let id = original.meta.id.clone();
        let patch = DinosaurPatch { species: None };
        let patched = patch.apply(original);
        assert_eq!(patched.species, "Raptor");
        assert_eq!(patched.meta.id, id);
    }
}

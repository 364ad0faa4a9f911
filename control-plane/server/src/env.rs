//! Process wiring types handed to the [`registry::Registry`] (spec §4.9):
//! concrete instantiations of its four generic context types for this
//! process's two kinds.

use std::sync::Arc;

use actix_web::web;
use common_lib::SvcError;
use dinosaurs::service::DinosaurService;
use fossils::service::FossilService;
use parking_lot::Mutex;
use store::{AdvisoryLockService, EventStore};

/// What a registered service factory needs to build its `Locator` (spec
/// §4.9's `Env`).
pub struct ServerEnv {
    pub events: Arc<dyn EventStore>,
    pub locks: Arc<dyn AdvisoryLockService>,
}

/// What a registered service factory hands back: one variant per resource
/// kind this process knows how to serve.
#[derive(Clone)]
pub enum ResourceServiceHandle {
    Dinosaurs(Arc<DinosaurService>),
    Fossils(Arc<FossilService>),
}

impl ResourceServiceHandle {
    pub fn into_dinosaurs(self) -> Option<Arc<DinosaurService>> {
        match self {
            Self::Dinosaurs(s) => Some(s),
            Self::Fossils(_) => None,
        }
    }

    pub fn into_fossils(self) -> Option<Arc<FossilService>> {
        match self {
            Self::Fossils(s) => Some(s),
            Self::Dinosaurs(_) => None,
        }
    }
}

/// Accumulates `actix-web` route configurators registered into the
/// `Registry`; applied once per worker when the REST `App` is built. The
/// registry maps themselves are written only before serving begins, but the
/// `App` factory re-runs per worker thread, so the accumulated list is kept
/// behind a cheap, clonable handle rather than replayed through the registry
/// itself (spec §4.9: "after [freeze] they are read-only").
#[derive(Clone, Default)]
pub struct RestRouteCtx {
    routes: Arc<Mutex<Vec<Arc<dyn Fn(&mut web::ServiceConfig) + Send + Sync>>>>,
}

impl RestRouteCtx {
    pub fn add(&self, configure: impl Fn(&mut web::ServiceConfig) + Send + Sync + 'static) {
        self.routes.lock().push(Arc::new(configure));
    }

    pub fn apply(&self, cfg: &mut web::ServiceConfig) {
        for configure in self.routes.lock().iter() {
            configure(cfg);
        }
    }
}

/// Controller-wiring context: the manager itself, since
/// [`controller::ControllerManager::register`] is already additive behind a
/// shared reference and needs no further indirection.
pub struct CtrlCtx {
    pub manager: Arc<controller::ControllerManager>,
}

/// The process-wide registry, concretely typed for this process's two kinds.
/// The gRPC bucket is left at `()`: `tonic`'s `Router<L>` changes type with
/// every `add_service` call, so a generic accumulator can't type-erase it the
/// way [`RestRouteCtx`] does for `actix-web`; the gRPC frontend is wired
/// directly in `grpc_server.rs` instead (documented in DESIGN.md).
pub type ServerRegistry = registry::Registry<ServerEnv, ResourceServiceHandle, RestRouteCtx, (), CtrlCtx>;

/// Registers both kinds' services, REST routes, and migration bookkeeping
/// into `registry` (spec §4.9, SPEC_FULL §2.1 "two concrete resource kinds
/// wired end-to-end"). Must run before [`registry::Registry::freeze`].
pub fn register_kinds(registry: &mut ServerRegistry) -> Result<(), SvcError> {
    registry.register_service("dinosaurs", |env: &ServerEnv| {
        let dao = Arc::new(dinosaurs::dao::PgDinosaurDao::new());
        let service = Arc::new(DinosaurService::new(dao, env.events.clone(), env.locks.clone()));
        ResourceServiceHandle::Dinosaurs(service)
    })?;
    registry.register_service("fossils", |env: &ServerEnv| {
        let dao = Arc::new(fossils::dao::PgFossilDao::new());
        let service = Arc::new(FossilService::new(dao, env.events.clone(), env.locks.clone()));
        ResourceServiceHandle::Fossils(service)
    })?;

    registry.register_rest_route("dinosaurs", |ctx: &RestRouteCtx| ctx.add(rest::dinosaurs::configure))?;
    registry.register_rest_route("fossils", |ctx: &RestRouteCtx| ctx.add(rest::fossils::configure))?;

    registry.register_migration("0001_events", include_str!("../../../migrations/0001_events.sql"))?;
    registry.register_migration("0002_dinosaurs", include_str!("../../../migrations/0002_dinosaurs.sql"))?;
    registry.register_migration("0003_fossils", include_str!("../../../migrations/0003_fossils.sql"))?;

    Ok(())
}

/// Registers the default `on_upsert`/`on_delete` controller hooks for both
/// kinds (SPEC_FULL §2.5) into `registry`. Must run before
/// [`registry::Registry::freeze`]; the actual
/// [`controller::ControllerManager::register`] calls happen later, when
/// [`registry::Registry::wire_controllers`] replays these closures against
/// the frozen registry's [`CtrlCtx`].
pub fn register_controllers(
    registry: &mut ServerRegistry,
    dinosaur_service: Arc<DinosaurService>,
    fossil_service: Arc<FossilService>,
) -> Result<(), SvcError> {
    registry.register_controller("dinosaurs", move |ctx: &CtrlCtx| {
        let upsert = Arc::new(dinosaurs::service::OnUpsertHandler {
            service: dinosaur_service.clone(),
        });
        ctx.manager.register(dinosaurs::KIND, store::EventType::Created, upsert.clone());
        ctx.manager.register(dinosaurs::KIND, store::EventType::Updated, upsert);
        ctx.manager
            .register(dinosaurs::KIND, store::EventType::Deleted, Arc::new(dinosaurs::service::OnDeleteHandler));
    })?;

    registry.register_controller("fossils", move |ctx: &CtrlCtx| {
        let upsert = Arc::new(fossils::service::OnUpsertHandler {
            service: fossil_service.clone(),
        });
        ctx.manager.register(fossils::KIND, store::EventType::Created, upsert.clone());
        ctx.manager.register(fossils::KIND, store::EventType::Updated, upsert);
        ctx.manager
            .register(fossils::KIND, store::EventType::Deleted, Arc::new(fossils::service::OnDeleteHandler));
    })?;

    Ok(())
}

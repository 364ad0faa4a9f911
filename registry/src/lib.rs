//! Process-wide registration maps (spec §4.9). Every map is additive:
//! plugins register entries as they load at startup, and the registry is
//! frozen before `serve` starts any listener. After `freeze`, further
//! registration attempts are rejected rather than silently ignored.
//!
//! The four categories (services, REST routes, gRPC services, controllers)
//! are deliberately generic over the context type each needs, so this crate
//! stays a leaf with no dependency on the REST/gRPC/controller crates it
//! composes at the call site.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common_lib::SvcError;

fn already_frozen() -> SvcError {
    SvcError::general_error("registry is frozen: registration must happen before serve() starts")
}

/// One named registration category. `F` is the registration closure's type
/// (e.g. `dyn Fn(&RestRouterCtx)`); entries run in registration order.
struct Bucket<F: ?Sized> {
    entries: Vec<(String, Arc<F>)>,
    frozen: Arc<AtomicBool>,
}

impl<F: ?Sized> Bucket<F> {
    fn new(frozen: Arc<AtomicBool>) -> Self {
        Self {
            entries: Vec::new(),
            frozen,
        }
    }

    fn push(&mut self, name: impl Into<String>, f: Arc<F>) -> Result<(), SvcError> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(already_frozen());
        }
        self.entries.push((name.into(), f));
        Ok(())
    }
}

/// A registered schema step, applied in registration order.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub name: String,
    pub sql: String,
}

/// The process-wide registry. `Env` is whatever a service factory needs to
/// build its locator; `RestCtx`, `GrpcCtx`, `CtrlCtx` are the composition
/// root's own wiring contexts for routes, gRPC registrations, and
/// controller-handler registrations respectively.
pub struct Registry<Env, Locator, RestCtx, GrpcCtx, CtrlCtx> {
    frozen: Arc<AtomicBool>,
    services: Bucket<dyn Fn(&Env) -> Locator + Send + Sync>,
    rest_routes: Bucket<dyn Fn(&RestCtx) + Send + Sync>,
    grpc_services: Bucket<dyn Fn(&GrpcCtx) + Send + Sync>,
    controllers: Bucket<dyn Fn(&CtrlCtx) + Send + Sync>,
    migrations: Vec<MigrationStep>,
}

impl<Env, Locator, RestCtx, GrpcCtx, CtrlCtx> Default
    for Registry<Env, Locator, RestCtx, GrpcCtx, CtrlCtx>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Env, Locator, RestCtx, GrpcCtx, CtrlCtx> Registry<Env, Locator, RestCtx, GrpcCtx, CtrlCtx> {
    pub fn new() -> Self {
        let frozen = Arc::new(AtomicBool::new(false));
        Self {
            services: Bucket::new(frozen.clone()),
            rest_routes: Bucket::new(frozen.clone()),
            grpc_services: Bucket::new(frozen.clone()),
            controllers: Bucket::new(frozen.clone()),
            migrations: Vec::new(),
            frozen,
        }
    }

    pub fn register_service(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Env) -> Locator + Send + Sync + 'static,
    ) -> Result<(), SvcError> {
        self.services.push(name, Arc::new(factory))
    }

    pub fn register_rest_route(
        &mut self,
        name: impl Into<String>,
        wire: impl Fn(&RestCtx) + Send + Sync + 'static,
    ) -> Result<(), SvcError> {
        self.rest_routes.push(name, Arc::new(wire))
    }

    pub fn register_grpc_service(
        &mut self,
        name: impl Into<String>,
        wire: impl Fn(&GrpcCtx) + Send + Sync + 'static,
    ) -> Result<(), SvcError> {
        self.grpc_services.push(name, Arc::new(wire))
    }

    pub fn register_controller(
        &mut self,
        name: impl Into<String>,
        wire: impl Fn(&CtrlCtx) + Send + Sync + 'static,
    ) -> Result<(), SvcError> {
        self.controllers.push(name, Arc::new(wire))
    }

    pub fn register_migration(&mut self, name: impl Into<String>, sql: impl Into<String>) -> Result<(), SvcError> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(already_frozen());
        }
        self.migrations.push(MigrationStep {
            name: name.into(),
            sql: sql.into(),
        });
        Ok(())
    }

    /// Freezes the registry. All registration calls after this point return
    /// an error instead of mutating the maps.
    pub fn freeze(&mut self) {
        self.frozen.store(true, Ordering::SeqCst);
        tracing::info!(
            services = self.services.entries.len(),
            rest_routes = self.rest_routes.entries.len(),
            grpc_services = self.grpc_services.entries.len(),
            controllers = self.controllers.entries.len(),
            migrations = self.migrations.len(),
            "registry frozen"
        );
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    pub fn build_service(&self, name: &str, env: &Env) -> Option<Locator> {
        self.services
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f(env))
    }

    /// Runs every registered REST route wiring function, in registration order.
    pub fn wire_rest_routes(&self, ctx: &RestCtx) {
        for (_, wire) in &self.rest_routes.entries {
            wire(ctx);
        }
    }

    pub fn wire_grpc_services(&self, ctx: &GrpcCtx) {
        for (_, wire) in &self.grpc_services.entries {
            wire(ctx);
        }
    }

    pub fn wire_controllers(&self, ctx: &CtrlCtx) {
        for (_, wire) in &self.controllers.entries {
            wire(ctx);
        }
    }

    pub fn migrations(&self) -> &[MigrationStep] {
        &self.migrations
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.entries.iter().map(|(n, _)| n.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrations_accumulate_in_order() {
        let mut registry: Registry<(), (), Vec<String>, (), ()> = Registry::new();
        registry
            .register_rest_route("dinosaurs", |ctx: &Vec<String>| {
                // closures can't mutate captured Vec through &Vec<String>; this
                // route just records that it ran via a side channel in the test.
                let _ = ctx;
            })
            .unwrap();
        registry
            .register_rest_route("fossils", |ctx: &Vec<String>| {
                let _ = ctx;
            })
            .unwrap();
        assert_eq!(registry.rest_routes.entries.len(), 2);
        assert_eq!(registry.rest_routes.entries[0].0, "dinosaurs");
        assert_eq!(registry.rest_routes.entries[1].0, "fossils");
    }

    #[test]
    fn freeze_rejects_further_registration() {
        let mut registry: Registry<(), (), (), (), ()> = Registry::new();
        registry.freeze();
        let err = registry.register_migration("late", "CREATE TABLE x ()").unwrap_err();
        assert_eq!(err.kind(), common_lib::ErrorKind::GeneralError);
    }

    #[test]
    fn service_lookup_invokes_factory() {
        let mut registry: Registry<u32, u32, (), (), ()> = Registry::new();
        registry.register_service("doubler", |env: &u32| env * 2).unwrap();
        assert_eq!(registry.build_service("doubler", &21), Some(42));
        assert_eq!(registry.build_service("missing", &21), None);
    }
}

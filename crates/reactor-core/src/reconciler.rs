//! Blueprint reconciler (component F of SPEC_FULL.md §2): on every blueprint change, compute this
//! node's desired `(region, role)` assignments and spawn or cancel role runners to match.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::blueprint::{Blueprint, BlueprintWatch, Role};
use crate::drainer::Drainer;
use crate::interruptor::Interruptor;
use crate::peer::PeerId;
use crate::region::Region;
use crate::runners::RunnerContext;

/// Owns the mapping from region to the runner currently driving it, keeping it converged with
/// whatever the blueprint watch reports.
pub struct Reconciler {
    me: PeerId,
    watch: Arc<dyn BlueprintWatch>,
    ctx: RunnerContext,
    drainer: Drainer,
    current_roles: Mutex<BTreeMap<Region, (Role, Interruptor)>>,
}

impl Reconciler {
    pub fn new(me: PeerId, watch: Arc<dyn BlueprintWatch>, ctx: RunnerContext, drainer: Drainer) -> Self {
        Reconciler { me, watch, ctx, drainer, current_roles: Mutex::new(BTreeMap::new()) }
    }

    /// Runs until `interruptor` fires, reconciling once up front and again after every blueprint
    /// change. Returning does not itself cancel already-spawned runners — callers shut those down
    /// through the shared [`Drainer`] separately.
    pub async fn run(&self, interruptor: &Interruptor) {
        loop {
            let blueprint = self.watch.current();
            self.reconcile(&blueprint);
            if interruptor.race(self.watch.changed()).await.is_err() {
                return;
            }
        }
    }

    /// The set of regions this node is currently running a role for, and which role — exposed for
    /// tests and diagnostics.
    pub fn current_roles(&self) -> BTreeMap<Region, Role> {
        self.current_roles.lock().unwrap().iter().map(|(region, (role, _))| (*region, *role)).collect()
    }

    fn reconcile(&self, blueprint: &Arc<Blueprint>) {
        let desired: BTreeMap<Region, Role> = blueprint.assignments_for(self.me).into_iter().collect();
        let mut current = self.current_roles.lock().unwrap();

        current.retain(|region, (role, interruptor)| match desired.get(region) {
            Some(new_role) if new_role == role => true,
            _ => {
                tracing::info!(%region, ?role, "blueprint no longer assigns this role, cancelling runner");
                interruptor.pulse();
                false
            }
        });

        for (region, role) in desired {
            if current.contains_key(&region) {
                continue;
            }
            let interruptor = Interruptor::new();
            tracing::info!(%region, ?role, "blueprint assigns a new role, spawning runner");
            self.spawn_runner(region, role, blueprint.clone(), interruptor.clone());
            current.insert(region, (role, interruptor));
        }
    }

    fn spawn_runner(&self, region: Region, role: Role, blueprint: Arc<Blueprint>, interruptor: Interruptor) {
        let ctx = self.ctx.clone();
        self.drainer.spawn(async move {
            let result = match role {
                Role::Primary => crate::runners::be_primary(&ctx, region, &blueprint, &interruptor).await,
                Role::Secondary => crate::runners::be_secondary(&ctx, region, &blueprint, &interruptor).await,
                Role::Nothing => crate::runners::be_nothing(&ctx, region, &blueprint, &interruptor).await,
            };
            match result {
                Ok(()) => {}
                Err(err) if err.is_interrupted() => {
                    tracing::debug!(%region, "role runner unwound after interruption");
                }
                Err(err) => {
                    tracing::error!(%region, %err, "role runner exited with an unrecoverable error");
                }
            }
        });
    }
}

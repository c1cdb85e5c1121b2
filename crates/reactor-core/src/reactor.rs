//! The top-level `Reactor`: owns the directory-echo access, the drainer parenting every
//! role-runner task, and the reconciler that keeps them converged with the blueprint.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::blueprint::{BlueprintWatch, Role};
use crate::branch_history::BranchHistory;
use crate::config::ReactorConfig;
use crate::directory::{Directory, DirectoryEchoAccess};
use crate::drainer::Drainer;
use crate::interruptor::Interruptor;
use crate::mailbox::{Backfillee, ConnectivityService, MailboxManager};
use crate::master::MasterDirectory;
use crate::peer::PeerId;
use crate::reconciler::Reconciler;
use crate::region::Region;
use crate::runners::RunnerContext;
use crate::store::StoreView;

/// Drives this node's share of a storage cluster: one role runner per region the blueprint
/// assigns to it, kept converged by an internal [`Reconciler`] task.
///
/// Construction wires up every external collaborator (§6); [`Reactor::shutdown`] tears the whole
/// thing down, guaranteeing no role-runner task survives it.
pub struct Reactor {
    drainer: Drainer,
    shutdown: Interruptor,
    reconciler: Arc<Reconciler>,
    reconciler_task: Mutex<Option<JoinHandle<()>>>,
}

impl Reactor {
    /// The reactor's only public construction surface (§6): a mailbox manager, a connectivity
    /// service, a writable view of this node's reactor directory, a writable view of the shared
    /// master directory, a read-write branch history, a blueprint watchable, a store view, and a
    /// backfillee implementation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        me: PeerId,
        mailbox: Arc<dyn MailboxManager>,
        connectivity: Arc<dyn ConnectivityService>,
        directory: Arc<dyn Directory>,
        master: Arc<dyn MasterDirectory>,
        history: Arc<dyn BranchHistory>,
        blueprint_watch: Arc<dyn BlueprintWatch>,
        store: Arc<dyn StoreView>,
        backfillee: Arc<dyn Backfillee>,
        config: ReactorConfig,
    ) -> Self {
        let drainer = Drainer::new();
        let ctx = RunnerContext {
            directory: DirectoryEchoAccess::new(directory),
            store,
            history,
            mailbox,
            connectivity,
            backfillee,
            master,
            config,
        };
        let reconciler = Arc::new(Reconciler::new(me, blueprint_watch, ctx, drainer.clone()));
        let shutdown = Interruptor::new();

        let reconciler_task = {
            let reconciler = reconciler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { reconciler.run(&shutdown).await })
        };

        Reactor { drainer, shutdown, reconciler, reconciler_task: Mutex::new(Some(reconciler_task)) }
    }

    /// The regions this node currently runs a role for, and which role — a live view of the
    /// reconciler's convergence state.
    pub fn current_roles(&self) -> BTreeMap<Region, Role> {
        self.reconciler.current_roles()
    }

    /// Pulses the reconciler's interruptor, waits for it to stop watching the blueprint, then
    /// drains every role-runner task the reconciler spawned. After this returns, no task this
    /// reactor ever spawned is still running.
    pub async fn shutdown(&self) {
        self.shutdown.pulse();
        let task = self.reconciler_task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.drainer.close_and_drain().await;
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor").field("current_roles", &self.current_roles()).finish_non_exhaustive()
    }
}

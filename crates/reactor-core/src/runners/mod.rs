//! Role runners (component E of SPEC_FULL.md §2): one cancellable task per region, driving it
//! through whatever role the blueprint currently assigns.
//!
//! All three runners share the same bundle of external collaborators, gathered here as
//! [`RunnerContext`] so the reconciler only has to assemble it once per reactor.

pub mod nothing;
pub mod primary;
pub mod secondary;

use std::sync::Arc;

use crate::branch_history::BranchHistory;
use crate::config::ReactorConfig;
use crate::directory::DirectoryEchoAccess;
use crate::mailbox::{Backfillee, ConnectivityService, MailboxManager};
use crate::master::MasterDirectory;
use crate::store::StoreView;

pub use nothing::be_nothing;
pub use primary::be_primary;
pub use secondary::be_secondary;

/// Everything a role runner needs beyond its region, blueprint snapshot, and interruptor.
#[derive(Clone)]
pub struct RunnerContext {
    pub directory: DirectoryEchoAccess,
    pub store: Arc<dyn StoreView>,
    pub history: Arc<dyn BranchHistory>,
    pub mailbox: Arc<dyn MailboxManager>,
    pub connectivity: Arc<dyn ConnectivityService>,
    pub backfillee: Arc<dyn Backfillee>,
    pub master: Arc<dyn MasterDirectory>,
    pub config: ReactorConfig,
}

impl std::fmt::Debug for RunnerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerContext").field("directory", &self.directory).field("config", &self.config).finish_non_exhaustive()
    }
}

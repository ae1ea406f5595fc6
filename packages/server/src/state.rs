use std::sync::Arc;

use common::photos::PhotoStore;
use common::storage::ObjectStore;
use events::EventPublisher;
use plugin_core::PluginSupervisor;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::users::UserManager;

/// Everything a handler needs, threaded explicitly instead of living in
/// process-wide globals. Adapters are trait objects so tests can swap in the
/// in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub photos: Arc<dyn PhotoStore>,
    pub storage: Arc<dyn ObjectStore>,
    /// `None` when the event broker was unreachable at boot; publishing is
    /// then skipped with a log line, everything else keeps working.
    pub publisher: Option<Arc<dyn EventPublisher>>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserManager>,
    pub plugins: Arc<PluginSupervisor>,
}

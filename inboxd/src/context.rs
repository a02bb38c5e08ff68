use std::sync::Arc;

use inboxd_collections::db::Db;
use inboxd_notify::Notify;
use inboxd_proto::{CoreHooks, ImapHooks};

use crate::config::Config;

/// Everything a request handler needs, threaded explicitly instead of
/// reached through module-level statics.
#[derive(Clone)]
pub struct Context {
    pub db: Arc<Db>,
    pub notify: Arc<Notify>,
    pub config: Arc<Config>,
    /// The inbound IMAP command hooks, wired over the same `db`/`notify` the
    /// updates HTTP surface reads. No wire-level IMAP front-end is driven by
    /// this crate yet; holding it here is what a front-end would take a
    /// dependency on.
    pub hooks: Arc<dyn ImapHooks>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let db = Arc::new(Db::new());
        let notify = Arc::new(Notify::new());
        let hooks = Arc::new(CoreHooks::new(db.clone(), notify.clone()));
        Self {
            db,
            notify,
            config: Arc::new(config),
            hooks,
        }
    }
}

use futures::future::BoxFuture;

use ramble_core::{Claim, Contradiction, Id, Millis, Pattern, Value};

use crate::trigger::ObserverConfig;

/// One output an observer run can produce, routed to the matching Store
/// table.
#[derive(Debug, Clone)]
pub enum ObserverOutputKind {
    Contradiction(Contradiction),
    Pattern(Pattern),
    Value(Value),
}

/// Everything an observer needs for one run: the claims that triggered
/// it (empty for schedule/manual triggers), the session, and a
/// timestamp.
pub struct ObserverContext {
    pub new_claims: Vec<Claim>,
    pub session_id: Option<Id>,
    pub timestamp: Millis,
}

/// A registered watcher over the knowledge graph. Implementations should
/// be side-effect-free except through their returned outputs — the
/// dispatcher, not the observer, writes to the Store.
pub trait Observer: Send + Sync {
    fn config(&self) -> ObserverConfig;
    fn execute<'a>(&'a self, ctx: &'a ObserverContext) -> BoxFuture<'a, anyhow::Result<Vec<ObserverOutputKind>>>;
}

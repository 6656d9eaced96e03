pub mod decay;
pub mod error;
pub mod handler;
pub mod salience;
pub mod top_of_mind;

pub use decay::{decay_claims, DecayReport};
pub use error::{MemoryError, Result};
pub use handler::DecayClaimsHandler;
pub use salience::compute_salience;
pub use top_of_mind::{top_of_mind, TopOfMind};

use ramble_core::{now_millis, Id};
use ramble_store::Store;

/// Records that a claim was just surfaced to the user; boosts its salience
/// for `accessBoostDurationSecs` on the next decay pass.
pub fn record_access(store: &Store, claim_id: &Id) -> Result<()> {
    store.record_claim_access(claim_id, now_millis())?;
    Ok(())
}

//! Strategy Evaluator
//!
//! Decides whether an entry's metadata still makes it usable.

use serde::Serialize;
use tracing::warn;

use crate::cache::entry::{EntryMetadata, Strategy};
use crate::cache::key::extract_params;
use crate::cache::oracle::StateVersionOracle;

// == Validity ==
/// Outcome of evaluating an entry against its strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Valid,
    /// TTL elapsed
    Expired,
    /// External state version moved on since the write
    StateChanged,
    /// The oracle failed, so the state is assumed to have changed
    StateUnknown,
    /// The key's params no longer match the ones recorded at write time
    ParamsChanged,
}

impl Validity {
    pub fn is_valid(self) -> bool {
        self == Validity::Valid
    }

    pub fn describe(self) -> &'static str {
        match self {
            Validity::Valid => "valid",
            Validity::Expired => "expired",
            Validity::StateChanged => "state-changed",
            Validity::StateUnknown => "state-unknown",
            Validity::ParamsChanged => "params-changed",
        }
    }
}

// == Evaluate ==
/// Evaluates `metadata` for `key` at time `now`.
///
/// | Strategy      | Valid when |
/// |---------------|------------|
/// | `Permanent`   | always |
/// | `TimeBased`   | `now - timestamp < ttl` |
/// | `StateBased`  | fresh and the oracle reports the recorded version |
/// | `ParamBased`  | fresh and the key's params equal the recorded params |
///
/// The oracle is only consulted for `StateBased` entries that are still
/// fresh. An oracle failure is logged and yields `StateUnknown`.
pub async fn evaluate(
    key: &str,
    metadata: &EntryMetadata,
    now: u64,
    oracle: &dyn StateVersionOracle,
) -> Validity {
    if metadata.strategy == Strategy::Permanent {
        return Validity::Valid;
    }
    if !metadata.is_fresh(now) {
        return Validity::Expired;
    }

    match metadata.strategy {
        Strategy::Permanent | Strategy::TimeBased => Validity::Valid,
        Strategy::StateBased => match oracle.current_version().await {
            Ok(current) if current == metadata.state_version => Validity::Valid,
            Ok(_) => Validity::StateChanged,
            Err(e) => {
                warn!("State version check failed for '{}', treating as changed: {}", key, e);
                Validity::StateUnknown
            }
        },
        Strategy::ParamBased => {
            if extract_params(key) == metadata.params {
                Validity::Valid
            } else {
                Validity::ParamsChanged
            }
        }
    }
}

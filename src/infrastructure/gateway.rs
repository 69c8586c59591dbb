use crate::domain::invoice::Invoice;
use crate::domain::ports::{ChargeError, PaymentGateway};
use async_trait::async_trait;
use rand::Rng;

/// How the simulated gateway answers charge requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargeMode {
    /// Every charge is captured.
    Approve,
    /// Every charge is declined for insufficient balance.
    Decline,
    /// Charges succeed with the given probability; a small fraction of
    /// calls fail with a transient network error instead.
    Flaky { success_rate: f64 },
}

/// A stand-in payment provider for local runs and demos.
///
/// Real deployments would implement `PaymentGateway` against the provider's
/// API; this one answers from configuration so a run is observable without
/// any external dependency.
pub struct SimulatedGateway {
    mode: ChargeMode,
}

const FLAKY_NETWORK_ERROR_RATE: f64 = 0.05;

impl SimulatedGateway {
    pub fn new(mode: ChargeMode) -> Self {
        Self { mode }
    }

    pub fn approving() -> Self {
        Self::new(ChargeMode::Approve)
    }

    pub fn declining() -> Self {
        Self::new(ChargeMode::Decline)
    }

    pub fn flaky(success_rate: f64) -> Self {
        Self::new(ChargeMode::Flaky {
            success_rate: success_rate.clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, _invoice: &Invoice) -> Result<bool, ChargeError> {
        match self.mode {
            ChargeMode::Approve => Ok(true),
            ChargeMode::Decline => Ok(false),
            ChargeMode::Flaky { success_rate } => {
                let mut rng = rand::thread_rng();
                if rng.gen_bool(FLAKY_NETWORK_ERROR_RATE) {
                    Err(ChargeError::Network)
                } else {
                    Ok(rng.gen_bool(success_rate))
                }
            }
        }
    }
}

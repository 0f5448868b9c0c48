// Demo operations
//
// A stand-in API for `fetchwrite simulate`: fetches and writes sleep for a
// random latency and fetches succeed at a configurable rate.

use std::thread;
use std::time::Duration;

use fetchwrite_coordinator::{AbortReason, OperationModel};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn};

/// Behaviour of the simulated API and store
#[derive(Debug, Clone)]
pub struct DemoSettings {
    pub requests: u32,
    pub fetch_delays: Vec<Duration>,
    pub write_delays: Vec<Duration>,
    /// Probability in `[0, 1]` that a fetch succeeds
    pub success_rate: f64,
}

#[derive(Debug)]
pub struct DemoResponse {
    pub succeeded: bool,
    pub latency: Duration,
}

pub struct DemoOperations {
    settings: DemoSettings,
    rng: Mutex<StdRng>,
}

impl DemoOperations {
    pub fn new(settings: DemoSettings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            settings,
            rng: Mutex::new(rng),
        }
    }

    fn pick(&self, delays: &[Duration]) -> Duration {
        delays
            .choose(&mut *self.rng.lock())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    fn simulate_write(&self) -> Duration {
        let latency = self.pick(&self.settings.write_delays);
        thread::sleep(latency);
        latency
    }
}

impl OperationModel for DemoOperations {
    type RequestArg = u32;
    type Response = DemoResponse;

    fn initial_operation(&self) -> Vec<u32> {
        (0..self.settings.requests).collect()
    }

    fn fetch_from_api(&self, request: &u32) -> DemoResponse {
        let latency = self.pick(&self.settings.fetch_delays);
        thread::sleep(latency);
        let succeeded = self.rng.lock().gen_bool(self.settings.success_rate);
        info!(request, succeeded, latency_ms = latency.as_millis() as u64, "Fetched");
        DemoResponse { succeeded, latency }
    }

    fn response_succeeded(&self, response: &DemoResponse) -> bool {
        response.succeeded
    }

    fn write_fetched_data(&self, request: u32, response: DemoResponse) {
        let latency = self.simulate_write();
        info!(
            request,
            fetch_latency_ms = response.latency.as_millis() as u64,
            write_latency_ms = latency.as_millis() as u64,
            "Wrote fetched data"
        );
    }

    fn upon_definitive_request_failure(&self, request: u32, _response: DemoResponse) {
        let latency = self.simulate_write();
        error!(
            request,
            write_latency_ms = latency.as_millis() as u64,
            "Recorded failed request"
        );
    }

    fn upon_request_abortion(&self, request: u32, reason: AbortReason) {
        warn!(request, %reason, "Request aborted");
    }
}

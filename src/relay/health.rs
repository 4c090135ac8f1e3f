//! Liveness responder.

use crate::relay::log::EventLog;
use tracing::Level;

/// Body returned by the health endpoint.
pub const HEALTH_MESSAGE: &str = "Welcome to Azure Functions!";

/// Always healthy; logs one informational line.
pub fn handle_health(log: &dyn EventLog) -> &'static str {
    log.log(Level::INFO, "HTTP trigger function processed a request.");
    HEALTH_MESSAGE
}

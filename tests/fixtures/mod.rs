use once_cell::sync::Lazy;

use benchtrail::telemetry::TEST_TRACING;

#[allow(dead_code)]
pub fn init_tracing() {
    Lazy::force(&TEST_TRACING);
}

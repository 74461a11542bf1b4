use medtag_api::OpsAlert;

/// Alert sink backed by the tracing stack; the default wiring for contained
/// audit/security write failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlert;

impl OpsAlert for TracingAlert {
    fn notify(&self, subsystem: &'static str, detail: &str) {
        tracing::error!(subsystem, detail, "contained side-effect failure");
    }
}

/// Operational-monitoring boundary for contained side-effect failures.
///
/// Audit and security-event writes are best-effort relative to the operation
/// being recorded: their failures never propagate to the caller, but they
/// must reach whoever runs the system. Implementations forward to the
/// monitoring stack of choice.
pub trait OpsAlert: Send + Sync {
    fn notify(&self, subsystem: &'static str, detail: &str);
}

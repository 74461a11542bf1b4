use std::net::IpAddr;
use std::time::Duration;

use uuid::Uuid;

/// Ambient request metadata, threaded explicitly into every core operation.
///
/// Scans arrive from unauthenticated devices, so `actor` is optional; the
/// authentication subsystem resolves it (and `is_privileged`) before the
/// request reaches this core.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Option<Uuid>,
    pub is_privileged: bool,
    pub ip_address: IpAddr,
    pub user_agent: Option<String>,
    pub device_info: Option<String>,
    pub endpoint: Option<String>,
    pub method: Option<String>,
    /// Time allowed for outbound collaborator calls. When absent the
    /// configured default applies.
    pub timeout: Option<Duration>,
}

impl RequestContext {
    pub fn anonymous(ip_address: IpAddr) -> Self {
        Self {
            actor: None,
            is_privileged: false,
            ip_address,
            user_agent: None,
            device_info: None,
            endpoint: None,
            method: None,
            timeout: None,
        }
    }

    pub fn authenticated(actor: Uuid, ip_address: IpAddr) -> Self {
        Self {
            actor: Some(actor),
            ..Self::anonymous(ip_address)
        }
    }

    pub fn privileged(actor: Uuid, ip_address: IpAddr) -> Self {
        Self {
            is_privileged: true,
            ..Self::authenticated(actor, ip_address)
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_device_info(mut self, device_info: impl Into<String>) -> Self {
        self.device_info = Some(device_info.into());
        self
    }

    pub fn with_endpoint(mut self, method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_context_has_no_actor() {
        let ctx = RequestContext::anonymous("10.0.0.7".parse().unwrap());
        assert!(ctx.actor.is_none());
        assert!(!ctx.is_privileged);
    }

    #[test]
    fn privileged_context_keeps_the_actor() {
        let actor = Uuid::new_v4();
        let ctx = RequestContext::privileged(actor, "10.0.0.7".parse().unwrap());
        assert_eq!(ctx.actor, Some(actor));
        assert!(ctx.is_privileged);
    }
}

//! Audit trail for security-relevant events.
//!
//! Every auth and membership mutation reports an event after the fact;
//! sinks must never fail the operation that produced the event.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Absent for unauthenticated events (failed logins, resets).
    pub actor_id: Option<Uuid>,
    pub action: &'static str,
    pub resource_type: &'static str,
    pub resource_id: Option<Uuid>,
    pub result: &'static str,
    pub risk_level: RiskLevel,
}

impl AuditEvent {
    pub fn success(
        actor_id: Option<Uuid>,
        action: &'static str,
        resource_type: &'static str,
        resource_id: Option<Uuid>,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            actor_id,
            action,
            resource_type,
            resource_id,
            result: "success",
            risk_level,
        }
    }

    pub fn failure(
        actor_id: Option<Uuid>,
        action: &'static str,
        resource_type: &'static str,
        resource_id: Option<Uuid>,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            actor_id,
            action,
            resource_type,
            resource_id,
            result: "failure",
            risk_level,
        }
    }
}

/// Audit sinks are fire-and-forget from the caller's point of view.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Emits audit events as structured log lines.
#[derive(Default, Clone)]
pub struct TracingAudit;

impl TracingAudit {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAudit {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            actor_id = ?event.actor_id,
            action = event.action,
            resource_type = event.resource_type,
            resource_id = ?event.resource_id,
            result = event.result,
            risk_level = event.risk_level.as_str(),
            "audit event"
        );
    }
}

/// Collects events in memory. Test double.
#[derive(Default)]
pub struct MockAudit {
    pub events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl MockAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_action(&self, action: &str) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.action == action).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl AuditSink for MockAudit {
    async fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

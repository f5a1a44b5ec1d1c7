use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Tracing target for every audited event, so operators can route security
/// events separately from ordinary request logs.
pub const SECURITY_TARGET: &str = "authgate::security";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SecurityEventType {
    AuthenticationAttempt,
    AuthenticationSuccess,
    AuthenticationFailure,
    SuspiciousActivity,
    SessionTerminated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SecuritySeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: SecurityEventType,
    pub severity: SecuritySeverity,
    pub user_id: Option<String>,
    /// Fingerprint of the browser session, never the raw id
    pub session: Option<String>,
    pub action: Option<String>,
    pub details: HashMap<String, String>,
    pub error_message: Option<String>,
}

impl SecurityEvent {
    pub fn new(
        event_type: SecurityEventType,
        severity: SecuritySeverity,
        user_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            severity,
            user_id,
            session: None,
            action: None,
            details: HashMap::new(),
            error_message: None,
        }
    }

    pub fn with_session(mut self, fingerprint: String) -> Self {
        self.session = Some(fingerprint);
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_detail<K: ToString, V: ToString>(mut self, key: K, value: V) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error_message = Some(error);
        self
    }
}

#[derive(Clone, Default)]
pub struct SecurityAuditor {}

impl SecurityAuditor {
    pub fn new() -> Self {
        Self {}
    }

    /// Log a security event
    pub async fn log_event(&self, event: SecurityEvent) {
        match event.severity {
            SecuritySeverity::Low => {
                info!(
                    target: SECURITY_TARGET,
                    event_id = %event.id,
                    event_type = ?event.event_type,
                    user_id = ?event.user_id,
                    session = ?event.session,
                    action = ?event.action,
                    "Security event logged"
                );
            }
            SecuritySeverity::Medium => {
                warn!(
                    target: SECURITY_TARGET,
                    event_id = %event.id,
                    event_type = ?event.event_type,
                    user_id = ?event.user_id,
                    session = ?event.session,
                    action = ?event.action,
                    error = ?event.error_message,
                    "Security warning logged"
                );
            }
            SecuritySeverity::High => {
                error!(
                    target: SECURITY_TARGET,
                    event_id = %event.id,
                    event_type = ?event.event_type,
                    severity = ?event.severity,
                    user_id = ?event.user_id,
                    session = ?event.session,
                    action = ?event.action,
                    details = ?event.details,
                    error = ?event.error_message,
                    "High severity security event logged"
                );
            }
        }
    }

    /// Log the start of a login flow
    pub async fn log_auth_attempt(&self, session: String) {
        let event = SecurityEvent::new(
            SecurityEventType::AuthenticationAttempt,
            SecuritySeverity::Low,
            None,
        )
        .with_session(session)
        .with_action("login_start");

        self.log_event(event).await;
    }

    /// Log successful authentication
    pub async fn log_auth_success(&self, user_id: String, session: String) {
        let event = SecurityEvent::new(
            SecurityEventType::AuthenticationSuccess,
            SecuritySeverity::Low,
            Some(user_id),
        )
        .with_session(session)
        .with_action("login_success");

        self.log_event(event).await;
    }

    /// Log failed authentication that is not itself suspicious
    /// (provider outage, denied consent, rejected code)
    pub async fn log_auth_failure(&self, session: String, reason: String) {
        let event = SecurityEvent::new(
            SecurityEventType::AuthenticationFailure,
            SecuritySeverity::Medium,
            None,
        )
        .with_session(session)
        .with_action("login_failure")
        .with_error(reason);

        self.log_event(event).await;
    }

    /// Log suspicious activity
    pub async fn log_suspicious_activity(
        &self,
        session: Option<String>,
        activity_type: &str,
        details: HashMap<String, String>,
    ) {
        let mut event = SecurityEvent::new(
            SecurityEventType::SuspiciousActivity,
            SecuritySeverity::High,
            None,
        )
        .with_action(activity_type);

        if let Some(session) = session {
            event = event.with_session(session);
        }

        for (key, value) in details {
            event = event.with_detail(key, value);
        }

        self.log_event(event).await;
    }

    /// Log a logout
    pub async fn log_logout(&self, user_id: Option<String>, session: Option<String>) {
        let mut event = SecurityEvent::new(
            SecurityEventType::SessionTerminated,
            SecuritySeverity::Low,
            user_id,
        )
        .with_action("logout");

        if let Some(session) = session {
            event = event.with_session(session);
        }

        self.log_event(event).await;
    }
}

//! Delivery of finished reports to the configured recipients.
//!
//! Each recipient is handled on its own: the coordinator negotiates transport
//! security in a fixed order, sends once, and records the outcome. Failures are
//! logged and counted, never returned to the caller.

use crate::services::metrics::record_email_delivery;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Connection security strategies, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSecurity {
    /// TLS from the first byte (SMTPS).
    ImplicitTls,
    /// STARTTLS when the server offers it, plaintext otherwise.
    Opportunistic,
    Plaintext,
}

impl TransportSecurity {
    pub const FALLBACK_ORDER: [TransportSecurity; 3] = [
        TransportSecurity::ImplicitTls,
        TransportSecurity::Opportunistic,
        TransportSecurity::Plaintext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImplicitTls => "implicit_tls",
            Self::Opportunistic => "opportunistic",
            Self::Plaintext => "plaintext",
        }
    }
}

impl fmt::Display for TransportSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("connection with {security} failed: {reason}")]
    Connect {
        security: TransportSecurity,
        reason: String,
    },

    #[error("no transport strategy succeeded")]
    NegotiationExhausted,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to compose message: {0}")]
    Compose(String),

    #[error("failed to send message: {0}")]
    Send(String),
}

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Message content shared by every recipient of one report.
#[derive(Debug, Clone)]
pub struct ReportEmail {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub attachment: EmailAttachment,
}

/// An established, authenticated connection to the mail relay.
#[async_trait]
pub trait MailSession: Send + Sync {
    async fn send(&self, to: &str, email: &ReportEmail) -> Result<(), DispatchError>;
}

/// Opens mail sessions with a given security strategy.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn connect(
        &self,
        security: TransportSecurity,
    ) -> Result<Box<dyn MailSession>, DispatchError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent(TransportSecurity),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub status: DeliveryStatus,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    pub fn sent_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DeliveryStatus::Sent(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.sent_count()
    }

    pub fn outcome_for(&self, recipient: &str) -> Option<&DeliveryStatus> {
        self.outcomes
            .iter()
            .find(|o| o.recipient == recipient)
            .map(|o| &o.status)
    }
}

#[derive(Clone)]
pub struct DispatchCoordinator {
    transport: Arc<dyn MailTransport>,
    max_concurrency: usize,
}

impl DispatchCoordinator {
    pub fn new(transport: Arc<dyn MailTransport>, max_concurrency: usize) -> Self {
        Self {
            transport,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Send `email` to every recipient. Never fails; the returned report and
    /// the logs are the only record of what happened.
    #[instrument(skip_all, fields(subject = %email.subject, recipients = recipients.len()))]
    pub async fn dispatch(&self, recipients: &[String], email: &ReportEmail) -> DispatchReport {
        if recipients.is_empty() {
            warn!("No report recipients configured, nothing to send");
            return DispatchReport::default();
        }

        // Built up front: a borrowing `map` closure is not Send under tokio::spawn.
        let deliveries: Vec<_> = recipients
            .iter()
            .map(|recipient| Box::pin(self.deliver(recipient, email)))
            .collect();
        let outcomes: Vec<DeliveryOutcome> = stream::iter(deliveries)
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let report = DispatchReport { outcomes };
        info!(
            sent = report.sent_count(),
            failed = report.failed_count(),
            "Report dispatch finished"
        );
        report
    }

    async fn deliver(&self, recipient: &str, email: &ReportEmail) -> DeliveryOutcome {
        let status = match self.try_deliver(recipient, email).await {
            Ok(security) => {
                info!(recipient, security = %security, "Report email sent");
                record_email_delivery("sent");
                DeliveryStatus::Sent(security)
            }
            Err(e) => {
                error!(recipient, error = %e, "Report email failed");
                record_email_delivery("failed");
                DeliveryStatus::Failed(e.to_string())
            }
        };

        DeliveryOutcome {
            recipient: recipient.to_string(),
            status,
        }
    }

    async fn try_deliver(
        &self,
        recipient: &str,
        email: &ReportEmail,
    ) -> Result<TransportSecurity, DispatchError> {
        let (security, session) = self.negotiate(recipient).await?;
        session.send(recipient, email).await?;
        Ok(security)
    }

    /// First strategy that connects wins. Each one is tried at most once.
    async fn negotiate(
        &self,
        recipient: &str,
    ) -> Result<(TransportSecurity, Box<dyn MailSession>), DispatchError> {
        for security in TransportSecurity::FALLBACK_ORDER {
            match self.transport.connect(security).await {
                Ok(session) => return Ok((security, session)),
                Err(e) => {
                    warn!(recipient, security = %security, error = %e, "SMTP connection attempt failed");
                }
            }
        }
        Err(DispatchError::NegotiationExhausted)
    }
}

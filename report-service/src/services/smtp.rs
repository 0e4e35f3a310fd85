//! lettre backed mail transport.

use crate::config::SmtpConfig;
use crate::services::dispatch::{
    DispatchError, MailSession, MailTransport, ReportEmail, TransportSecurity,
};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

pub struct SmtpMailTransport {
    config: SmtpConfig,
    from: Mailbox,
}

impl SmtpMailTransport {
    pub fn new(config: SmtpConfig) -> Result<Self, DispatchError> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| DispatchError::InvalidAddress(format!("from address: {}", e)))?;
        Ok(Self { config, from })
    }

    fn tls_parameters(&self) -> Result<TlsParameters, DispatchError> {
        TlsParameters::builder(self.config.host.clone())
            .dangerous_accept_invalid_certs(self.config.accept_invalid_certs)
            .build()
            .map_err(|e| DispatchError::Connect {
                security: TransportSecurity::ImplicitTls,
                reason: format!("invalid TLS parameters: {}", e),
            })
    }

    fn build_transport(
        &self,
        security: TransportSecurity,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchError> {
        let tls = match security {
            TransportSecurity::ImplicitTls => Tls::Wrapper(self.tls_parameters()?),
            TransportSecurity::Opportunistic => Tls::Opportunistic(self.tls_parameters()?),
            TransportSecurity::Plaintext => Tls::None,
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
            .port(self.config.port)
            .tls(tls)
            .timeout(Some(self.config.timeout));

        if !self.config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.user.clone(),
                self.config.password.clone(),
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn connect(
        &self,
        security: TransportSecurity,
    ) -> Result<Box<dyn MailSession>, DispatchError> {
        debug!(
            host = %self.config.host,
            port = self.config.port,
            security = %security,
            "Connecting to SMTP relay"
        );

        let transport = self.build_transport(security)?;
        let connect_error = |reason: String| DispatchError::Connect { security, reason };

        // Opens a connection, runs EHLO and AUTH, then quits.
        match transport.test_connection().await {
            Ok(true) => Ok(Box::new(SmtpSession {
                transport,
                from: self.from.clone(),
            })),
            Ok(false) => Err(connect_error("server did not accept the connection".to_string())),
            Err(e) => Err(connect_error(e.to_string())),
        }
    }
}

struct SmtpSession {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSession {
    fn compose(&self, to: &str, email: &ReportEmail) -> Result<Message, DispatchError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| DispatchError::InvalidAddress(format!("{}: {}", to, e)))?;
        let content_type = ContentType::parse(&email.attachment.content_type)
            .map_err(|e| DispatchError::Compose(format!("attachment content type: {}", e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::mixed()
                    .multipart(MultiPart::alternative_plain_html(
                        email.text_body.clone(),
                        email.html_body.clone(),
                    ))
                    .singlepart(
                        Attachment::new(email.attachment.file_name.clone())
                            .body(email.attachment.bytes.clone(), content_type),
                    ),
            )
            .map_err(|e| DispatchError::Compose(e.to_string()))
    }
}

#[async_trait]
impl MailSession for SmtpSession {
    async fn send(&self, to: &str, email: &ReportEmail) -> Result<(), DispatchError> {
        let message = self.compose(to, email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DispatchError::Send(e.to_string()))?;
        Ok(())
    }
}

//! Common test utilities for report-service integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use report_service::config::{DatabaseConfig, ReportConfig, ReportSettings, SmtpConfig};
use report_service::models::{ApprovalState, DailyRegistration, RawTransaction, RegistrationRecord};
use report_service::services::{
    DispatchError, InMemorySource, MailSession, MailTransport, ReportEmail, TransportSecurity,
};
use report_service::startup::AppState;
use rust_decimal::Decimal;
use service_core::config::Config as CommonConfig;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,report_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const APPROVED_STATE_ID: i32 = 4;

pub fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
}

pub fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, 0, 0).unwrap()
}

pub fn approval_states() -> Vec<ApprovalState> {
    vec![
        ApprovalState {
            id: 1,
            state: "Iniciada".to_string(),
        },
        ApprovalState {
            id: APPROVED_STATE_ID,
            state: "Aprobada".to_string(),
        },
        ApprovalState {
            id: 5,
            state: "Cancelada".to_string(),
        },
    ]
}

pub fn registration(id: i32, document: &str) -> RegistrationRecord {
    RegistrationRecord {
        id,
        first_names: Some(format!("Nombre{}", id)),
        last_names: Some(format!("Apellido{}", id)),
        email: Some(format!("persona{}@example.com", id)),
        address: None,
        birth_date: Some("1990-04-12".to_string()),
        document_type: Some("CC".to_string()),
        document_number: Some(document.to_string()),
        gender: None,
        phone: Some("3000000000".to_string()),
        registered_at: at(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(), 9),
    }
}

/// An approved transaction on the report date.
pub fn transaction(id: i32, document: &str, amount: i64, terminal: &str) -> RawTransaction {
    RawTransaction {
        id,
        document: Some(document.to_string()),
        reference: Some(format!("REF-{}", id)),
        product: Some("Inscripción".to_string()),
        amount: Some(Decimal::new(amount, 0)),
        paypad_id: Some(id * 10),
        paypad_description: Some(terminal.to_string()),
        state_id: Some(APPROVED_STATE_ID),
        created_at: at(report_date(), 8 + id as u32 % 10),
    }
}

pub fn daily_registration(first: &str, last: &str, hour: u32) -> DailyRegistration {
    DailyRegistration {
        first_names: Some(first.to_string()),
        last_names: Some(last.to_string()),
        email: None,
        address: Some("Calle 10".to_string()),
        birth_date: None,
        document_type: Some("CC".to_string()),
        document_number: Some("1001".to_string()),
        gender: Some("F".to_string()),
        phone: None,
        age: Some(30),
        place: Some("Coliseo".to_string()),
        registered_at: at(report_date(), hour),
    }
}

/// Three matched transactions over two terminals, plus noise the report
/// must leave out.
pub fn example_source() -> InMemorySource {
    let mut not_approved = transaction(7, "12345", 999, "A");
    not_approved.state_id = Some(1);
    let mut other_day = transaction(8, "12345", 999, "A");
    other_day.created_at = at(NaiveDate::from_ymd_opt(2025, 5, 19).unwrap(), 12);

    InMemorySource {
        transactions: vec![
            transaction(1, "1.234-5", 100, "A"),
            transaction(2, "1234 5", 50, "A"),
            transaction(3, "999", 10, "B"),
            transaction(4, "", 70, "A"),
            transaction(5, "404", 30, "B"),
            transaction(6, "12345", 500, "PAYPAD PRUEBAS"),
            not_approved,
            other_day,
        ],
        approval_states: approval_states(),
        registrations: vec![registration(1, "12345"), registration(2, "999")],
        daily_registrations: vec![
            daily_registration("Zoe", "Rojas", 9),
            daily_registration("Ana", "Álvarez", 10),
            daily_registration("Luis", "Mejía", 11),
        ],
        unavailable: false,
    }
}

pub fn settings(output_dir: &Path) -> ReportSettings {
    ReportSettings {
        recipients: vec!["auditoria@example.com".to_string()],
        output_dir: output_dir.to_path_buf(),
        branding_image_path: output_dir.join("missing-branding.png"),
        excluded_paypad: "PAYPAD PRUEBAS".to_string(),
        timeout: Duration::from_secs(10),
    }
}

pub fn test_config(output_dir: &Path) -> ReportConfig {
    ReportConfig {
        common: CommonConfig {
            port: 0,
            environment: "dev".to_string(),
        },
        service_name: "report-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        registry_database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        dashboard_database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 465,
            user: String::new(),
            password: String::new(),
            from_email: "noreply@example.com".to_string(),
            from_name: "API INDER Informes".to_string(),
            timeout: Duration::from_secs(1),
            accept_invalid_certs: false,
            max_concurrency: 1,
        },
        report: settings(output_dir),
    }
}

/// State over one in-memory source serving both stores.
pub fn test_state(
    source: InMemorySource,
    transport: Arc<MockMailTransport>,
    output_dir: &Path,
    include_stack_traces: bool,
) -> AppState {
    let source = Arc::new(source);
    AppState::new(
        source.clone(),
        source,
        transport,
        settings(output_dir),
        1,
        include_stack_traces,
    )
}

/// Mail transport that refuses the first `failing_connects` connection
/// attempts and records every delivered message.
pub struct MockMailTransport {
    failing_connects: usize,
    connect_attempts: AtomicUsize,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockMailTransport {
    pub fn new(failing_connects: usize) -> Self {
        Self {
            failing_connects,
            connect_attempts: AtomicUsize::new(0),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(0)
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// (recipient, subject) of every delivered message.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for background dispatch to deliver `count` messages.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

struct MockSession {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl MailSession for MockSession {
    async fn send(&self, to: &str, email: &ReportEmail) -> Result<(), DispatchError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), email.subject.clone()));
        Ok(())
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn connect(
        &self,
        security: TransportSecurity,
    ) -> Result<Box<dyn MailSession>, DispatchError> {
        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failing_connects {
            return Err(DispatchError::Connect {
                security,
                reason: "[MOCK] connection refused".to_string(),
            });
        }
        Ok(Box::new(MockSession {
            sent: self.sent.clone(),
        }))
    }
}

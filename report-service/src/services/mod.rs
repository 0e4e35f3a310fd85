//! Services module for report-service.

pub mod aggregator;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod registrations;
pub mod registry;
pub mod renderer;
pub mod selector;
pub mod smtp;
pub mod sources;
pub mod storage;

pub use database::Database;
pub use dispatch::{
    DeliveryStatus, DispatchCoordinator, DispatchError, DispatchReport, MailSession,
    MailTransport, ReportEmail, TransportSecurity,
};
pub use error::ReportError;
pub use metrics::{get_metrics, init_metrics, record_error};
pub use normalizer::{normalize, NormalizedIdentifier};
pub use pipeline::{RenderedRegistrations, RenderedReport, ReportPipeline};
pub use registry::RegistryIndex;
pub use renderer::{render, XLSX_MIME};
pub use smtp::SmtpMailTransport;
pub use sources::{InMemorySource, RegistrySource, TransactionSource};
pub use storage::ReportStore;

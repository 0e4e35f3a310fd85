//! Database service for report-service.

use crate::models::{ApprovalState, DailyRegistration, RawTransaction, RegistrationRecord};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::sources::{RegistrySource, TransactionSource};
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    name: &'static str,
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "report-service"))]
    pub async fn new(
        name: &'static str,
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            database = name,
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to connect to {}: {}", name, e))
            })?;

        info!(database = name, "PostgreSQL connection pool established");

        Ok(Self { name, pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self), fields(database = self.name))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Health check failed for {}: {}",
                    self.name,
                    e
                ))
            })?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl TransactionSource for Database {
    #[instrument(skip(self))]
    async fn fetch_transactions(&self, date: NaiveDate) -> Result<Vec<RawTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_transactions"])
            .start_timer();

        let next_day = date.succ_opt().unwrap_or(NaiveDate::MAX);
        let rows = sqlx::query_as::<_, RawTransaction>(
            r#"
            SELECT t."ID" AS id,
                   t."DOCUMENT" AS document,
                   t."REFERENCE" AS reference,
                   t."PRODUCT" AS product,
                   t."TOTAL_AMOUNT"::numeric AS amount,
                   t."ID_PAYPAD" AS paypad_id,
                   p."DESCRIPTION" AS paypad_description,
                   t."ID_STATE_TRANSACTION" AS state_id,
                   t."DATE_CREATED" AS created_at
            FROM business."Transactions" t
            LEFT JOIN business."PayPads" p ON p."ID" = t."ID_PAYPAD"
            WHERE t."DATE_CREATED" >= $1 AND t."DATE_CREATED" < $2
            "#,
        )
        .bind(date.and_time(chrono::NaiveTime::MIN))
        .bind(next_day.and_time(chrono::NaiveTime::MIN))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch transactions: {}", e)))?;

        timer.observe_duration();
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn fetch_approval_states(&self) -> Result<Vec<ApprovalState>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_approval_states"])
            .start_timer();

        let rows = sqlx::query_as::<_, ApprovalState>(
            r#"SELECT "ID" AS id, "STATE" AS state FROM business."StateTransactions""#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch approval states: {}", e))
        })?;

        timer.observe_duration();
        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Database::health_check(self).await
    }
}

#[async_trait]
impl RegistrySource for Database {
    #[instrument(skip(self))]
    async fn fetch_registrations(&self) -> Result<Vec<RegistrationRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_registrations"])
            .start_timer();

        // Ordered by id so collisions resolve the same way on every run.
        let rows = sqlx::query_as::<_, RegistrationRecord>(
            r#"
            SELECT "Id" AS id,
                   "Nombres" AS first_names,
                   "Apellidos" AS last_names,
                   "Correo" AS email,
                   "Direccion" AS address,
                   "FechaNacimiento" AS birth_date,
                   "TipoDocumento" AS document_type,
                   "NumeroDocumento" AS document_number,
                   "Genero" AS gender,
                   "Celular" AS phone,
                   "FechaRegistro" AS registered_at
            FROM "FormularioInder"
            ORDER BY "Id"
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch registrations: {}", e))
        })?;

        timer.observe_duration();
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn fetch_daily_registrations(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DailyRegistration>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_daily_registrations"])
            .start_timer();

        let rows = sqlx::query_as::<_, DailyRegistration>(
            r#"
            SELECT f."Nombres" AS first_names,
                   f."Apellidos" AS last_names,
                   f."Correo" AS email,
                   f."Direccion" AS address,
                   f."FechaNacimiento" AS birth_date,
                   f."TipoDocumento" AS document_type,
                   f."NumeroDocumento" AS document_number,
                   f."Genero" AS gender,
                   f."Celular" AS phone,
                   f."Edad" AS age,
                   d."Lugar" AS place,
                   f."FechaRegistro" AS registered_at
            FROM "FormularioInder" f
            JOIN "DisponibilidadHorariosInder" d ON d."IdDis" = f."Id"
            WHERE f."FechaRegistro"::date = $1
            ORDER BY f."Apellidos", f."Nombres"
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to fetch daily registrations: {}",
                e
            ))
        })?;

        timer.observe_duration();
        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Database::health_check(self).await
    }
}

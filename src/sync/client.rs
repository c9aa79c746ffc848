//! Device side of the sync: pushes the local journal and pulls server changes.

use reqwest::StatusCode;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::merge::merge_rows;
use super::{
    ChangeSet, OperationStatus, PushRequest, PushResponse, SyncOperation, SyncStatus,
    count_operations, get_state, set_state,
};
use crate::config::{RemoteConfig, SyncRole};
use crate::domain::DomainError;
use crate::models::{
    customer, delivery, delivery_item,
    operation_log::{self, Entity as OperationLog},
    product, stock_adjustment, stock_alert, supplier,
    sync_state::LAST_PULLED_AT,
    vehicle,
};
use crate::utils::now_timestamp;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SyncReport {
    pub pushed: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pulled: usize,
    pub merged: usize,
    pub last_pulled_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

pub struct SyncService {
    db: DatabaseConnection,
    http: reqwest::Client,
    remote: RemoteConfig,
    batch_size: u64,
    token: Mutex<Option<String>>,
    // One sync at a time, whether triggered by the loop or the API
    running: Mutex<()>,
}

fn external(e: reqwest::Error) -> DomainError {
    DomainError::External(format!("Sync server unreachable: {}", e))
}

impl SyncService {
    pub fn new(
        db: DatabaseConnection,
        remote: RemoteConfig,
        batch_size: u64,
    ) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DomainError::Internal(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            db,
            http,
            remote,
            batch_size: batch_size.max(1),
            token: Mutex::new(None),
            running: Mutex::new(()),
        })
    }

    pub fn remote_url(&self) -> &str {
        &self.remote.url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.remote.url, path)
    }

    async fn login(&self) -> Result<String, DomainError> {
        tracing::debug!("Logging in to {} as {}", self.remote.url, self.remote.username);

        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({
                "username": self.remote.username,
                "password": self.remote.password,
            }))
            .send()
            .await
            .map_err(external)?;

        if !response.status().is_success() {
            return Err(DomainError::External(format!(
                "Sync login rejected with status {}",
                response.status()
            )));
        }

        let body: LoginResponse = response.json().await.map_err(external)?;
        *self.token.lock().await = Some(body.token.clone());
        Ok(body.token)
    }

    async fn token(&self) -> Result<String, DomainError> {
        let cached = self.token.lock().await.clone();
        match cached {
            Some(token) => Ok(token),
            None => self.login().await,
        }
    }

    /// Send an authenticated request, logging in again once if the token
    /// was rejected
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, DomainError>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.token().await?;
        let mut response = build(&token).send().await.map_err(external)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("Sync token rejected, logging in again");
            *self.token.lock().await = None;
            let token = self.login().await?;
            response = build(&token).send().await.map_err(external)?;
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::External(format!(
                "Sync server answered {}: {}",
                status, body
            )));
        }
        Ok(response)
    }

    async fn pending_batch(&self) -> Result<Vec<operation_log::Model>, DomainError> {
        Ok(OperationLog::find()
            .filter(operation_log::Column::Status.eq(OperationStatus::Pending.as_str()))
            .order_by_asc(operation_log::Column::CreatedAt)
            .order_by_asc(operation_log::Column::Id)
            .limit(self.batch_size)
            .all(&self.db)
            .await?)
    }

    /// Push pending operations in journal order
    pub async fn push(&self) -> Result<SyncReport, DomainError> {
        let mut report = SyncReport::default();

        loop {
            let batch = self.pending_batch().await?;
            if batch.is_empty() {
                break;
            }

            let request = PushRequest {
                operations: batch.iter().cloned().map(SyncOperation::from).collect(),
            };
            let url = self.url("/sync/push");
            let response: PushResponse = self
                .send(|token| self.http.post(&url).bearer_auth(token).json(&request))
                .await?
                .json()
                .await
                .map_err(external)?;

            let now = now_timestamp();
            let mut answered = HashSet::new();
            for result in response.results {
                // Anything the server left pending is simply "delivered"
                let status = match result.status {
                    OperationStatus::Pending => OperationStatus::Pushed,
                    other => other,
                };
                match status {
                    OperationStatus::Applied => report.applied += 1,
                    OperationStatus::Skipped => report.skipped += 1,
                    OperationStatus::Failed => {
                        tracing::warn!(
                            "Server rejected operation {}: {}",
                            result.id,
                            result.error.as_deref().unwrap_or("no reason given")
                        );
                        report.failed += 1;
                    }
                    _ => {}
                }

                OperationLog::update_many()
                    .col_expr(
                        operation_log::Column::Status,
                        Expr::value(status.as_str()),
                    )
                    .col_expr(operation_log::Column::ErrorMessage, Expr::value(result.error))
                    .col_expr(operation_log::Column::ProcessedAt, Expr::value(now.clone()))
                    .filter(operation_log::Column::Id.eq(result.id.as_str()))
                    .exec(&self.db)
                    .await?;
                answered.insert(result.id);
            }

            // Never resend a batch the server accepted
            let unanswered: Vec<String> = batch
                .into_iter()
                .map(|op| op.id)
                .filter(|id| !answered.contains(id))
                .collect();
            if !unanswered.is_empty() {
                OperationLog::update_many()
                    .col_expr(
                        operation_log::Column::Status,
                        Expr::value(OperationStatus::Pushed.as_str()),
                    )
                    .col_expr(operation_log::Column::ProcessedAt, Expr::value(now))
                    .filter(operation_log::Column::Id.is_in(unanswered))
                    .exec(&self.db)
                    .await?;
            }

            report.pushed += request.operations.len();
        }

        if report.pushed > 0 {
            tracing::info!(
                "Pushed {} operation(s): {} applied, {} skipped, {} failed",
                report.pushed,
                report.applied,
                report.skipped,
                report.failed
            );
        }
        Ok(report)
    }

    /// Pull and merge everything changed on the server since the last pull
    pub async fn pull(&self) -> Result<SyncReport, DomainError> {
        let since = get_state(&self.db, LAST_PULLED_AT).await?;

        let url = self.url("/sync/pull");
        let changes: ChangeSet = self
            .send(|token| {
                let request = self.http.get(&url).bearer_auth(token);
                match &since {
                    Some(since) => request.query(&[("since", since.as_str())]),
                    None => request,
                }
            })
            .await?
            .json()
            .await
            .map_err(external)?;

        let pulled = changes.len();
        let txn = self.db.begin().await?;
        // Parents before children so foreign keys hold
        let mut merged = 0;
        merged += merge_rows::<supplier::ActiveModel, _>(&txn, &changes.suppliers).await?;
        merged += merge_rows::<customer::ActiveModel, _>(&txn, &changes.customers).await?;
        merged += merge_rows::<vehicle::ActiveModel, _>(&txn, &changes.vehicles).await?;
        merged += merge_rows::<product::ActiveModel, _>(&txn, &changes.products).await?;
        merged += merge_rows::<delivery::ActiveModel, _>(&txn, &changes.deliveries).await?;
        merged += merge_rows::<delivery_item::ActiveModel, _>(&txn, &changes.delivery_items).await?;
        merged +=
            merge_rows::<stock_adjustment::ActiveModel, _>(&txn, &changes.stock_adjustments).await?;
        merged += merge_rows::<stock_alert::ActiveModel, _>(&txn, &changes.stock_alerts).await?;
        set_state(&txn, LAST_PULLED_AT, &changes.server_time).await?;
        txn.commit().await?;

        tracing::info!("Pulled {} row(s), merged {}", pulled, merged);

        Ok(SyncReport {
            pulled,
            merged,
            last_pulled_at: Some(changes.server_time),
            ..Default::default()
        })
    }

    /// Push then pull
    pub async fn sync(&self) -> Result<SyncReport, DomainError> {
        let _running = self.running.lock().await;

        let pushed = self.push().await?;
        let pulled = self.pull().await?;

        Ok(SyncReport {
            pulled: pulled.pulled,
            merged: pulled.merged,
            last_pulled_at: pulled.last_pulled_at,
            ..pushed
        })
    }

    pub async fn status(&self) -> Result<SyncStatus, DomainError> {
        Ok(SyncStatus {
            role: SyncRole::Client.as_str().to_string(),
            pending_operations: count_operations(&self.db, OperationStatus::Pending).await?,
            failed_operations: count_operations(&self.db, OperationStatus::Failed).await?,
            last_pulled_at: get_state(&self.db, LAST_PULLED_AT).await?,
            remote_url: Some(self.remote.url.clone()),
        })
    }
}

/// Background loop; errors are logged and retried on the next tick
pub async fn run_sync_loop(service: Arc<SyncService>, interval: Duration) {
    tracing::info!(
        "🔄 Sync loop started against {} (every {:?})",
        service.remote_url(),
        interval
    );

    loop {
        match service.sync().await {
            Ok(report) => tracing::debug!("Sync finished: {:?}", report),
            Err(e) => tracing::warn!("Sync failed, will retry: {}", e),
        }
        tokio::time::sleep(interval).await;
    }
}

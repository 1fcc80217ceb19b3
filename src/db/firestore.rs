// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Connections (OAuth links to the provider)
//! - Activities (processed provider activities)
//! - FTP history (dated threshold-power values)
//! - Fitness (daily training metrics rows)

use crate::db::collections;
use crate::error::AppError;
use crate::models::activity::activity_doc_id;
use crate::models::connection::connection_doc_id;
use crate::models::fitness::fitness_doc_id;
use crate::models::{Activity, DailyFitness, FtpEntry, ServiceConnection};
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::{stream, StreamExt};
use std::collections::HashSet;

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations. Fitness rows
// are written in much smaller chunks to keep transactions short-lived.
const FITNESS_WRITE_BATCH: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Connection Operations ───────────────────────────────────

    /// All connections for a provider (the activity-sync target set).
    pub async fn find_connections(
        &self,
        provider: &str,
    ) -> Result<Vec<ServiceConnection>, AppError> {
        let provider = provider.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CONNECTIONS)
            .filter(move |q| q.for_all([q.field("provider").eq(provider.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's connection to a provider, if any.
    pub async fn find_connection_for_user(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<ServiceConnection>, AppError> {
        let user_id = user_id.to_string();
        let provider = provider.to_string();
        let mut matches: Vec<ServiceConnection> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::CONNECTIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("provider").eq(provider.clone()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.pop())
    }

    /// Store a connection (used after token refresh).
    pub async fn set_connection(&self, connection: &ServiceConnection) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CONNECTIONS)
            .document_id(connection.doc_id())
            .object(connection)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a connection (provider deauthorization).
    pub async fn delete_connection(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::CONNECTIONS)
            .document_id(connection_doc_id(provider, provider_account_id))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find the connection for a provider account id.
    pub async fn find_connection_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<ServiceConnection>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CONNECTIONS)
            .obj()
            .one(connection_doc_id(provider, provider_account_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Which of the given source ids already exist for a provider.
    ///
    /// Document ids encode `{source}_{source_id}`, so this is a batch lookup
    /// by id rather than a collection scan.
    pub async fn find_existing_source_ids(
        &self,
        source_ids: &[String],
        source: &str,
    ) -> Result<HashSet<String>, AppError> {
        if source_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let doc_ids: Vec<String> = source_ids
            .iter()
            .map(|id| activity_doc_id(source, id))
            .collect();

        let found = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj::<Activity>()
            .batch(doc_ids)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .collect::<Vec<(String, Option<Activity>)>>()
            .await;

        Ok(found
            .into_iter()
            .filter_map(|(_, activity)| activity.map(|a| a.source_id))
            .collect())
    }

    /// Bulk insert that skips ids already present.
    ///
    /// Firestore has no native insert-or-ignore across documents, so this
    /// pre-filters against a fresh existing-id lookup and tolerates the
    /// residual race: a concurrent writer winning the insert is logged and
    /// skipped, never a batch failure. Returns the number created.
    pub async fn create_activities(&self, activities: &[Activity]) -> Result<u32, AppError> {
        if activities.is_empty() {
            return Ok(0);
        }

        let source = activities[0].source.clone();
        let ids: Vec<String> = activities.iter().map(|a| a.source_id.clone()).collect();
        let existing = self.find_existing_source_ids(&ids, &source).await?;

        let client = self.get_client()?;
        let to_create: Vec<Activity> = activities
            .iter()
            .filter(|a| !existing.contains(&a.source_id))
            .cloned()
            .collect();

        let results: Vec<Result<bool, AppError>> = stream::iter(to_create)
            .map(|activity| {
                let client = client.clone();
                async move {
                let created: Result<Activity, _> = client
                    .fluent()
                    .insert()
                    .into(collections::ACTIVITIES)
                    .document_id(activity.doc_id())
                    .object(&activity)
                    .execute()
                    .await;

                match created {
                    Ok(_) => Ok(true),
                    Err(e) if is_already_exists(&e) => {
                        // Lost the duplicate race to a concurrent writer.
                        tracing::warn!(
                            source_id = %activity.source_id,
                            "Activity already created concurrently, skipping"
                        );
                        Ok(false)
                    }
                    Err(e) => Err(AppError::Database(e.to_string())),
                }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        let mut created = 0u32;
        for result in results {
            if result? {
                created += 1;
            }
        }

        Ok(created)
    }

    /// Overwrite an activity matched by (source, source id).
    pub async fn update_activity_by_source(&self, activity: &Activity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(activity.doc_id())
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete an activity by (source, source id) on a provider delete event.
    pub async fn delete_activity_by_source(
        &self,
        source: &str,
        source_id: &str,
    ) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ACTIVITIES)
            .document_id(activity_doc_id(source, source_id))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// A user's activities inside an inclusive date range, ascending.
    pub async fn find_activities_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("start_date")
                        .greater_than_or_equal(firestore::FirestoreTimestamp(start)),
                    q.field("start_date")
                        .less_than_or_equal(firestore::FirestoreTimestamp(end)),
                ])
            })
            .order_by([(
                "start_date",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── FTP History Operations ──────────────────────────────────

    /// All dated FTP values for a user.
    pub async fn find_ftp_history(&self, user_id: &str) -> Result<Vec<FtpEntry>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::FTP_HISTORY)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Fitness Operations ──────────────────────────────────────

    /// Distinct users that have any daily-fitness rows.
    ///
    /// Firestore cannot do a server-side distinct, so this scans the fitness
    /// collection and dedupes client-side. Expensive for very large series
    /// but runs once per sync; revisit if the user base outgrows it.
    pub async fn find_users_with_fitness_history(&self) -> Result<Vec<String>, AppError> {
        let rows: Vec<DailyFitness> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::FITNESS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut users = Vec::new();
        for row in rows {
            if seen.insert(row.user_id.clone()) {
                users.push(row.user_id);
            }
        }

        Ok(users)
    }

    /// A user's fitness rows inside an inclusive day range.
    pub async fn find_fitness_in_range(
        &self,
        user_id: &str,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> Result<Vec<DailyFitness>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::FITNESS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("date").greater_than_or_equal(start_day),
                    q.field("date").less_than_or_equal(end_day),
                ])
            })
            .order_by([("date", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The most recent fitness row strictly before a day, if any.
    ///
    /// Seeds the metrics builder with the state of the day preceding the
    /// requested range.
    pub async fn find_latest_fitness_before(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyFitness>, AppError> {
        let user_id = user_id.to_string();
        let mut rows: Vec<DailyFitness> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::FITNESS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("date").less_than(day),
                ])
            })
            .order_by([("date", firestore::FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.pop())
    }

    /// Upsert a single fitness row (one user, one day).
    pub async fn upsert_fitness(&self, row: &DailyFitness) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::FITNESS)
            .document_id(row.doc_id())
            .object(row)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write many fitness rows in bounded transactions.
    ///
    /// Rows are chunked so each transaction stays small and short-lived;
    /// long-held transactions time out under concurrent sync load.
    pub async fn batch_write_fitness(&self, rows: &[DailyFitness]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in rows.chunks(FITNESS_WRITE_BATCH) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for row in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::FITNESS)
                    .document_id(row.doc_id())
                    .object(row)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add fitness row to transaction: {}", e))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit fitness batch: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Whether a Firestore error means the document id is already taken.
fn is_already_exists(error: &firestore::errors::FirestoreError) -> bool {
    let message = error.to_string();
    message.contains("AlreadyExists") || message.contains("already exists")
}

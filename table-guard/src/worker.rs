//! Reconcile worker
//!
//! [`Reconciler`] runs one detect-and-repair pass against a store.
//! [`ReconcileWorker`] repeats it on an interval until shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::error::AppResult;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::Config;
use crate::reconcile::{
    Finding, Fix, Severity, SeverityCounts, Snapshot, coalesce, detect,
};
use crate::store::TableOrderStore;
use crate::utils::RECONCILE_TARGET;

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    pub findings: Vec<Finding>,
    pub counts: SeverityCounts,
    /// Writes planned after coalescing
    pub planned: usize,
    pub applied: usize,
    /// Rejected because the record changed since the snapshot
    pub stale: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

fn log_finding(finding: &Finding) {
    let table_id = finding.table_id.as_deref().unwrap_or("-");
    let order_id = finding.order_id.as_deref().unwrap_or("-");
    match finding.severity {
        Severity::High => tracing::warn!(
            target: RECONCILE_TARGET,
            code = %finding.code,
            severity = finding.severity.as_str(),
            table_id,
            order_id,
            "Table/order inconsistency"
        ),
        Severity::Medium => tracing::info!(
            target: RECONCILE_TARGET,
            code = %finding.code,
            severity = finding.severity.as_str(),
            table_id,
            order_id,
            "Table/order inconsistency"
        ),
        Severity::Low => tracing::debug!(
            target: RECONCILE_TARGET,
            code = %finding.code,
            severity = finding.severity.as_str(),
            table_id,
            order_id,
            "Table/order inconsistency"
        ),
    }
}

/// `updated_at` of each record as read, first record per key
struct Guards {
    tables: HashMap<(Option<String>, String), Option<String>>,
    orders: HashMap<(Option<String>, String), Option<String>>,
}

impl Guards {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut tables = HashMap::new();
        for table in &snapshot.tables {
            if let Some(id) = table.key() {
                tables
                    .entry((table.business_id.clone(), id))
                    .or_insert_with(|| table.updated_at.clone());
            }
        }
        let mut orders = HashMap::new();
        for order in &snapshot.open_orders {
            if let Some(id) = order.key() {
                orders
                    .entry((order.business_id.clone(), id))
                    .or_insert_with(|| order.updated_at.clone());
            }
        }
        Self { tables, orders }
    }

    fn for_fix(&self, fix: &Fix) -> Option<&str> {
        let guard = match fix {
            Fix::UpdateTable { target, .. } => self
                .tables
                .get(&(target.business_id.clone(), target.table_id.clone())),
            Fix::UpdateOrder { target, .. } => self
                .orders
                .get(&(target.business_id.clone(), target.order_id.clone())),
        };
        guard.and_then(|g| g.as_deref())
    }
}

/// Runs detect-and-repair passes against a store
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn TableOrderStore>,
    dry_run: bool,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TableOrderStore>, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// One pass over a business (`None`: every business in the store).
    ///
    /// Only reading the snapshot can fail the pass; write failures are
    /// counted in the report.
    pub async fn run_pass(&self, business_id: Option<&str>) -> AppResult<PassReport> {
        let snapshot = self.store.snapshot(business_id).await?;
        let report = detect(&snapshot);

        for finding in &report.findings {
            log_finding(finding);
        }

        let fixes = coalesce(&report.fixes);
        let mut pass = PassReport {
            business_id: business_id.map(str::to_string),
            counts: report.severity_counts(),
            findings: report.findings,
            planned: fixes.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        if self.dry_run {
            if !fixes.is_empty() {
                tracing::info!(
                    target: RECONCILE_TARGET,
                    planned = fixes.len(),
                    "Dry run, fixes not applied"
                );
            }
            return Ok(pass);
        }

        let guards = Guards::from_snapshot(&snapshot);
        for fix in &fixes {
            let guard = guards.for_fix(fix);
            let result = match fix {
                Fix::UpdateTable { target, payload } => {
                    self.store.update_table(target, payload, guard).await
                }
                Fix::UpdateOrder { target, payload } => {
                    self.store.update_order(target, payload, guard).await
                }
            };

            match result {
                Ok(()) => {
                    pass.applied += 1;
                    tracing::info!(
                        target: RECONCILE_TARGET,
                        kind = fix.kind(),
                        id = fix.target_id(),
                        "Applied fix"
                    );
                }
                Err(e) if e.is_stale() => {
                    pass.stale += 1;
                    tracing::warn!(
                        target: RECONCILE_TARGET,
                        kind = fix.kind(),
                        id = fix.target_id(),
                        "Record changed since snapshot, fix skipped"
                    );
                }
                Err(e) => {
                    pass.failed += 1;
                    tracing::error!(
                        target: RECONCILE_TARGET,
                        kind = fix.kind(),
                        id = fix.target_id(),
                        error = %e,
                        "Failed to apply fix"
                    );
                }
            }
        }

        Ok(pass)
    }
}

/// Periodic reconciler
pub struct ReconcileWorker {
    reconciler: Reconciler,
    business_ids: Vec<String>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ReconcileWorker {
    pub fn new(reconciler: Reconciler, config: &Config, shutdown: CancellationToken) -> Self {
        Self {
            reconciler,
            business_ids: config.business_ids.clone(),
            interval: config.interval(),
            shutdown,
        }
    }

    /// One pass per configured business, or a single pass over all of them
    pub async fn run_once(&self) -> Vec<PassReport> {
        let scopes: Vec<Option<&str>> = if self.business_ids.is_empty() {
            vec![None]
        } else {
            self.business_ids.iter().map(|b| Some(b.as_str())).collect()
        };

        let mut reports = Vec::with_capacity(scopes.len());
        for business_id in scopes {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.reconciler.run_pass(business_id).await {
                Ok(report) => {
                    if report.is_clean() {
                        tracing::debug!(business_id = ?business_id, "Reconcile pass clean");
                    } else {
                        tracing::info!(
                            business_id = ?business_id,
                            high = report.counts.high,
                            medium = report.counts.medium,
                            low = report.counts.low,
                            applied = report.applied,
                            stale = report.stale,
                            failed = report.failed,
                            "Reconcile pass finished"
                        );
                    }
                    reports.push(report);
                }
                Err(e) => {
                    tracing::error!(business_id = ?business_id, error = %e, "Reconcile pass failed");
                }
            }
        }
        reports
    }

    /// 主循环：立即执行一次，然后按间隔触发，直到 shutdown
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            dry_run = self.reconciler.is_dry_run(),
            "Reconcile worker started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Reconcile worker received shutdown signal");
                    break;
                }
            }

            self.run_once().await;
        }

        tracing::info!("Reconcile worker stopped");
    }
}

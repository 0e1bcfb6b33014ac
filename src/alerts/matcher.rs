use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::registry::AlertRegistry;
use crate::models::{Alert, DealFiring, Product};
use crate::plugins::traits::Notification;
use crate::plugins::PluginManager;
use crate::utils::error::Result;

/// Tally of one matching pass. `evaluated` counts alerts; the other
/// counters count listings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchReport {
    pub evaluated: usize,
    pub fired: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Registry errors while evaluating.
    pub errors: usize,
}

/// What happened to one matching listing under an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Same deal as the last notification for this listing.
    Suppressed,
    Fired,
    /// Claimed, but delivery failed. The firing stays recorded.
    DispatchFailed,
    /// Another pass claimed this firing first.
    Skipped,
    /// The registry could not be read or written.
    Errored,
}

impl MatchReport {
    fn record(&mut self, outcome: AlertOutcome) {
        match outcome {
            AlertOutcome::Suppressed => self.suppressed += 1,
            AlertOutcome::Fired => self.fired += 1,
            AlertOutcome::DispatchFailed => self.failed += 1,
            AlertOutcome::Skipped => self.skipped += 1,
            AlertOutcome::Errored => self.errors += 1,
        }
    }
}

/// Every distinct listing `alert` matches, in result order. A listing that
/// shows up twice counts once.
pub fn matching_deals<'a>(alert: &Alert, products: &'a [Product]) -> Vec<&'a Product> {
    let mut seen = HashSet::new();
    products
        .iter()
        .filter(|p| alert.matches(p))
        .filter(|&p| seen.insert(p.deal_key()))
        .collect()
}

#[derive(Clone)]
pub struct AlertMatcher {
    registry: AlertRegistry,
    plugins: PluginManager,
}

impl AlertMatcher {
    pub fn new(registry: AlertRegistry, plugins: PluginManager) -> Self {
        Self { registry, plugins }
    }

    /// Evaluate every stored alert against `products`.
    pub async fn run_pass(&self, products: &[Product]) -> Result<MatchReport> {
        let alerts = self.registry.list().await?;
        let mut report = MatchReport::default();

        for alert in &alerts {
            report.evaluated += 1;
            match self.process_alert(alert, products).await {
                Ok(outcomes) => outcomes.into_iter().for_each(|o| report.record(o)),
                Err(e) => {
                    tracing::warn!(alert_id = %alert.id, error = %e, "Alert evaluation failed");
                    report.record(AlertOutcome::Errored);
                }
            }
        }

        tracing::info!(
            evaluated = report.evaluated,
            fired = report.fired,
            suppressed = report.suppressed,
            failed = report.failed,
            skipped = report.skipped,
            errors = report.errors,
            "Alert pass finished"
        );
        Ok(report)
    }

    /// Evaluate one alert against every listing it matches. Each listing is
    /// notified at most once per snapshot, independently of the others.
    pub async fn process_alert(&self, alert: &Alert, products: &[Product]) -> Result<Vec<AlertOutcome>> {
        let deals = matching_deals(alert, products);
        if deals.is_empty() {
            return Ok(Vec::new());
        }

        let firings = self.registry.firings(&alert.id).await?;
        let mut outcomes = Vec::with_capacity(deals.len());
        for product in deals {
            let outcome = match self.process_deal(alert, product, firings.get(product.deal_key())).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(alert_id = %alert.id, deal = %product.deal_key(), error = %e, "Deal evaluation failed");
                    AlertOutcome::Errored
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Skip `product` if `previous` already notified this snapshot, otherwise
    /// claim the firing and dispatch exactly once.
    pub async fn process_deal(
        &self,
        alert: &Alert,
        product: &Product,
        previous: Option<&DealFiring>,
    ) -> Result<AlertOutcome> {
        let snapshot = product.fingerprint();
        if previous.map(|f| f.snapshot.as_str()) == Some(snapshot.as_str()) {
            tracing::debug!(alert_id = %alert.id, snapshot = %snapshot, "Deal already notified");
            return Ok(AlertOutcome::Suppressed);
        }

        if !self
            .registry
            .claim_firing(&alert.id, product.deal_key(), previous.map(|f| f.version), &snapshot, Utc::now())
            .await?
        {
            tracing::debug!(alert_id = %alert.id, snapshot = %snapshot, "Firing claimed elsewhere");
            return Ok(AlertOutcome::Skipped);
        }

        let notification = Notification::for_match(alert, product);
        match self.plugins.send_notification(&notification).await {
            Ok(receipt) => {
                tracing::info!(
                    alert_id = %alert.id,
                    method = %alert.method,
                    receipt_id = %receipt.receipt_id,
                    title = %product.title,
                    discount = ?product.discount_percent,
                    "Alert fired"
                );
                metrics::counter!("dealscope_alerts_fired_total", "method" => alert.method.as_str()).increment(1);
                Ok(AlertOutcome::Fired)
            }
            Err(e) => {
                tracing::error!(alert_id = %alert.id, method = %alert.method, error = %e, "Alert dispatch failed");
                metrics::counter!("dealscope_alert_dispatch_failures_total", "method" => alert.method.as_str())
                    .increment(1);
                Ok(AlertOutcome::DispatchFailed)
            }
        }
    }
}

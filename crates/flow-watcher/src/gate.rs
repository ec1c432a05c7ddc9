use flow_core::{Observation, SourceMetadata};
use notification_service::{Alert, ChannelKind, FlowReport, NotificationService};
use reference_rate::ReferencePriceCache;
use std::sync::Arc;

use crate::config::MaterialityScope;

/// What the gate decided for one detected change.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub report: FlowReport,
    pub structured_dispatched: bool,
    pub short_text_dispatched: bool,
}

/// Turns a validated holdings change into outbound alerts.
pub struct NotificationGate {
    prices: Arc<ReferencePriceCache>,
    notifier: Arc<NotificationService>,
    min_reportable_delta: f64,
    scope: MaterialityScope,
}

impl NotificationGate {
    pub fn new(
        prices: Arc<ReferencePriceCache>,
        notifier: Arc<NotificationService>,
        min_reportable_delta: f64,
        scope: MaterialityScope,
    ) -> Self {
        Self {
            prices,
            notifier,
            min_reportable_delta,
            scope,
        }
    }

    fn is_material(&self, delta: f64) -> bool {
        delta.abs() > self.min_reportable_delta
    }

    fn passes(&self, kind: ChannelKind, delta: f64) -> bool {
        !self.scope.gates(kind) || self.is_material(delta)
    }

    pub async fn evaluate(
        &self,
        delta: f64,
        observation: &Observation,
        metadata: &SourceMetadata,
        override_driven: bool,
    ) -> GateOutcome {
        let price = match self.prices.price_for(metadata.delayed).await {
            Some(point) => point.value,
            None => {
                tracing::error!(
                    "{}: no reference price available, reporting flow as zero",
                    metadata.ticker
                );
                0.0
            }
        };

        let report = FlowReport {
            ticker: metadata.ticker.clone(),
            display_name: metadata.display_name.clone(),
            as_of: observation.as_of,
            delta,
            total: observation.total_asset,
            flow: delta * price,
            reference_price: price,
            footnote: if override_driven || metadata.footnote.is_empty() {
                None
            } else {
                Some(metadata.footnote.clone())
            },
        };

        let structured_dispatched = self.passes(ChannelKind::Structured, delta);
        if structured_dispatched {
            self.notifier
                .send_alert(ChannelKind::Structured, &Alert::structured_flow(report.clone()))
                .await;
        }

        let short_text_dispatched = self.passes(ChannelKind::ShortText, delta);
        if short_text_dispatched {
            self.notifier
                .send_alert(ChannelKind::ShortText, &Alert::short_text_flow(report.clone()))
                .await;
        } else {
            tracing::info!(
                "{}: change of {:.2} is under the {:.2} reporting threshold, skipping short post",
                metadata.ticker,
                delta,
                self.min_reportable_delta
            );
        }

        GateOutcome {
            report,
            structured_dispatched,
            short_text_dispatched,
        }
    }
}

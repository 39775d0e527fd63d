//! Deterministic threshold alerts. These never need the completion service,
//! so the alerts panel always has something to show.

use chrono::{DateTime, Utc};
use intel_core::config::AlertThresholds;
use intel_core::types::{Alert, AlertSeverity, HealthLabel};

use crate::context::{percent, ContextBundle};

const DORMANT_NAMES_SHOWN: usize = 5;

fn alert(severity: AlertSeverity, title: String, body: String, at: DateTime<Utc>) -> Alert {
    Alert {
        severity,
        title,
        body,
        generated_at: at,
    }
}

/// Evaluate every threshold against the bundle. Never returns an empty list:
/// with nothing to report a single informational alert is produced.
/// Sorted most severe first.
pub fn threshold_alerts(bundle: &ContextBundle, thresholds: &AlertThresholds) -> Vec<Alert> {
    let at = bundle.generated_at;

    if bundle.customers_scanned == 0 {
        return vec![alert(
            AlertSeverity::Info,
            "No customers yet".to_string(),
            "There are no customers to score, so no health trends are available.".to_string(),
            at,
        )];
    }

    let mut alerts = Vec::new();
    let total = bundle.customers_scanned;
    let at_risk = bundle.count(HealthLabel::AtRisk);
    let lost = bundle.count(HealthLabel::Lost);
    let champions = bundle.count(HealthLabel::Champion);

    if let Some(trend) = &bundle.trend {
        let days = trend.window_days;

        let before = trend.previous_count(HealthLabel::AtRisk);
        if at_risk > before {
            let growth = if before == 0 {
                None
            } else {
                Some(percent(at_risk - before, before))
            };
            match growth {
                Some(pct) if pct >= thresholds.at_risk_growth_pct => alerts.push(alert(
                    AlertSeverity::Warning,
                    format!("At Risk customers up {pct:.0}%"),
                    format!(
                        "{at_risk} customers are At Risk, up from {before} {days} days ago ({pct:.1}% growth)."
                    ),
                    at,
                )),
                None => alerts.push(alert(
                    AlertSeverity::Warning,
                    format!("{at_risk} customers newly At Risk"),
                    format!("{at_risk} customers are At Risk; {days} days ago there were none."),
                    at,
                )),
                _ => {}
            }
        }

        let champions_before = trend.previous_count(HealthLabel::Champion);
        if champions_before > champions {
            let drop = percent(champions_before - champions, champions_before);
            if drop >= thresholds.champion_drop_pct {
                alerts.push(alert(
                    AlertSeverity::Warning,
                    format!("Champions down {drop:.0}%"),
                    format!(
                        "{champions} Champions today versus {champions_before} {days} days ago."
                    ),
                    at,
                ));
            }
        }

        if !trend.dormant_high_value.is_empty() {
            let names: Vec<&str> = trend
                .dormant_high_value
                .iter()
                .take(DORMANT_NAMES_SHOWN)
                .map(|c| c.name.as_str())
                .collect();
            let more = trend.dormant_high_value.len().saturating_sub(names.len());
            let mut body = format!(
                "{} high-value customers have not ordered in {}+ days: {}",
                trend.dormant_high_value.len(),
                thresholds.dormant_days,
                names.join(", ")
            );
            if more > 0 {
                body.push_str(&format!(" and {more} more"));
            }
            body.push('.');
            alerts.push(alert(
                AlertSeverity::Warning,
                "High-value customers going dormant".to_string(),
                body,
                at,
            ));
        }
    }

    let lost_share = percent(lost, total);
    if lost_share >= thresholds.lost_share_pct {
        let severity = if lost_share >= thresholds.lost_share_pct * 2.0 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        alerts.push(alert(
            severity,
            format!("{lost_share:.0}% of customers are Lost"),
            format!("{lost} of {total} customers score in the Lost band."),
            at,
        ));
    }

    if alerts.is_empty() {
        alerts.push(alert(
            AlertSeverity::Info,
            "All clear".to_string(),
            format!(
                "No health thresholds crossed across {total} customers ({champions} Champions, {at_risk} At Risk)."
            ),
            at,
        ));
    }

    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DormantCustomer, LabelCount, RequestKind, TrendSummary};
    use intel_core::types::PopulationStats;

    fn counts(values: [usize; 5]) -> Vec<LabelCount> {
        HealthLabel::ALL
            .into_iter()
            .zip(values)
            .map(|(label, count)| LabelCount { label, count })
            .collect()
    }

    /// Counts are in `HealthLabel::ALL` order: Champion, Loyal, Promising, At Risk, Lost.
    fn bundle(now: [usize; 5], before: Option<[usize; 5]>) -> ContextBundle {
        let total = now.iter().sum();
        ContextBundle {
            kind: RequestKind::Alerts,
            generated_at: Utc::now(),
            population: PopulationStats {
                customer_count: total,
                average_spend: 100.0,
                average_order_count: 2.0,
            },
            customers_scanned: total,
            distribution: counts(now),
            segments: Vec::new(),
            customer: None,
            trend: before.map(|b| TrendSummary {
                window_days: 7,
                previous: counts(b),
                previous_total: b.iter().sum(),
                dormant_high_value: Vec::new(),
            }),
            notes: None,
            truncated: false,
        }
    }

    #[test]
    fn test_empty_population_is_informational() {
        let alerts = threshold_alerts(&bundle([0; 5], None), &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Info);
        assert_eq!(alerts[0].title, "No customers yet");
    }

    #[test]
    fn test_all_clear_when_nothing_fires() {
        let alerts = threshold_alerts(
            &bundle([10, 10, 10, 10, 5], Some([10, 10, 10, 10, 5])),
            &AlertThresholds::default(),
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "All clear");
    }

    #[test]
    fn test_at_risk_growth() {
        let alerts = threshold_alerts(
            &bundle([10, 10, 10, 12, 3], Some([10, 10, 10, 10, 3])),
            &AlertThresholds::default(),
        );
        assert_eq!(alerts[0].title, "At Risk customers up 20%");
        assert!(alerts[0].body.contains("up from 10 7 days ago"));

        // 5% growth stays under the default 10% threshold.
        let quiet = threshold_alerts(
            &bundle([10, 10, 10, 21, 3], Some([10, 10, 10, 20, 3])),
            &AlertThresholds::default(),
        );
        assert_eq!(quiet[0].title, "All clear");
    }

    #[test]
    fn test_at_risk_from_zero() {
        let alerts = threshold_alerts(
            &bundle([5, 5, 5, 2, 0], Some([5, 5, 5, 0, 0])),
            &AlertThresholds::default(),
        );
        assert_eq!(alerts[0].title, "2 customers newly At Risk");
    }

    #[test]
    fn test_champion_decline_and_lost_share_ordering() {
        let alerts = threshold_alerts(
            &bundle([2, 0, 0, 0, 8], Some([5, 0, 0, 0, 5])),
            &AlertThresholds::default(),
        );
        // 80% Lost is more than twice the 25% threshold.
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].title, "80% of customers are Lost");
        assert!(alerts.iter().any(|a| a.title == "Champions down 60%"));
    }

    #[test]
    fn test_dormant_high_value_lists_names() {
        let mut b = bundle([10, 10, 10, 10, 5], Some([10, 10, 10, 10, 5]));
        if let Some(trend) = b.trend.as_mut() {
            trend.dormant_high_value = (0..7)
                .map(|i| DormantCustomer {
                    id: format!("c-{i}"),
                    name: format!("Customer {i}"),
                    lifetime_spend: 1_000.0,
                    days_since_last_order: 90,
                })
                .collect();
        }
        let alerts = threshold_alerts(&b, &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].body.starts_with("7 high-value customers"));
        assert!(alerts[0].body.ends_with("and 2 more."));
    }
}

//! Fixture data served in demo mode.
//!
//! The fixtures flow through the same snapshot and derivation types as live
//! payloads, so nothing downstream special-cases demo data.

use crate::gateway::Project;
use crate::overview::{
    Billing, CardValue, Highlight, Money, OverviewSnapshot, ServiceCost, Summary, SummaryCard,
};

pub const DEMO_PROJECT_PROD: &str = "demo-project-prod";
pub const DEMO_PROJECT_STAGING: &str = "demo-project-staging";

pub fn demo_projects() -> Vec<Project> {
    vec![
        project(DEMO_PROJECT_PROD, "acme-prod"),
        project(DEMO_PROJECT_STAGING, "acme-staging"),
    ]
}

/// Overview for the selected demo scope. No scope, or an unknown one, yields
/// the combined view across both projects.
pub fn demo_overview(project: Option<&str>) -> OverviewSnapshot {
    match project {
        Some(DEMO_PROJECT_PROD) => prod_overview(),
        Some(DEMO_PROJECT_STAGING) => staging_overview(),
        _ => combined_overview(),
    }
}

fn prod_overview() -> OverviewSnapshot {
    OverviewSnapshot {
        summary: Summary {
            total_resources: 24,
            waste_count: 12,
            with_metrics: 18,
            over_provisioned: 3,
            under_provisioned: 1,
        },
        summary_cards: cards(24, 12, 18, "447.8"),
        highlights: prod_highlights(),
        compute: Vec::new(),
        metrics: Vec::new(),
        billing: billing(
            447.8,
            vec![
                service("Compute Engine", 412.5),
                service("Cloud Storage", 89.2),
                service("BigQuery", 56.8),
                service("Cloud Run", 34.1),
                service("Networking", 28.4),
            ],
        ),
    }
}

fn staging_overview() -> OverviewSnapshot {
    OverviewSnapshot {
        summary: Summary {
            total_resources: 8,
            waste_count: 2,
            with_metrics: 6,
            over_provisioned: 1,
            under_provisioned: 0,
        },
        summary_cards: cards(8, 2, 6, "24"),
        highlights: staging_highlights(),
        compute: Vec::new(),
        metrics: Vec::new(),
        billing: billing(
            24.0,
            vec![
                service("Compute Engine", 156.2),
                service("Cloud Storage", 32.1),
                service("Cloud Run", 18.5),
            ],
        ),
    }
}

fn combined_overview() -> OverviewSnapshot {
    let mut highlights = prod_highlights();
    highlights.extend(staging_highlights());

    OverviewSnapshot {
        summary: Summary {
            total_resources: 32,
            waste_count: 14,
            with_metrics: 24,
            over_provisioned: 4,
            under_provisioned: 1,
        },
        summary_cards: cards(32, 14, 24, "471.8"),
        highlights,
        compute: Vec::new(),
        metrics: Vec::new(),
        billing: billing(
            471.8,
            vec![
                service("Compute Engine", 568.7),
                service("Cloud Storage", 121.3),
                service("BigQuery", 56.8),
                service("Cloud Run", 52.6),
                service("Networking", 28.4),
            ],
        ),
    }
}

fn prod_highlights() -> Vec<Highlight> {
    vec![
        highlight(
            "vm",
            "vm-1",
            "e2-medium-instance-prod",
            "Idle / low utilization",
            "Downsize to e2-small or stop when not needed.",
            28.0,
        ),
        highlight(
            "disk",
            "disk-1",
            "pd-ssd-100gb-unattached",
            "Unattached disk",
            "Delete if no longer needed or snapshot and remove.",
            17.0,
        ),
        highlight(
            "ip",
            "ip-1",
            "static-ip-unused",
            "Static IP not in use",
            "Release the address to avoid ongoing cost.",
            3.6,
        ),
        highlight(
            "vm",
            "vm-3",
            "n2-standard-4-batch-worker",
            "Stopped for 18 days",
            "Delete or snapshot if not scheduled to restart.",
            95.0,
        ),
        highlight(
            "vm",
            "vm-4",
            "e2-micro-legacy-proxy",
            "Avg CPU 0.3% over 30 days",
            "Migrate traffic to Cloud Run and terminate.",
            6.5,
        ),
        highlight(
            "disk",
            "disk-3",
            "pd-ssd-500gb-old-db-backup",
            "Unattached disk, created 6 months ago",
            "Snapshot to Cloud Storage and delete.",
            85.0,
        ),
        highlight(
            "disk",
            "disk-4",
            "pd-standard-200gb-test-data",
            "Unattached, no reads in 90 days",
            "Delete if test data is no longer needed.",
            8.0,
        ),
        highlight(
            "ip",
            "ip-2",
            "static-ip-old-lb",
            "Reserved IP, load balancer deleted",
            "Release the address.",
            3.6,
        ),
        highlight(
            "vm",
            "vm-5",
            "n1-highmem-4-analytics",
            "Over-provisioned (avg RAM 12%)",
            "Downsize to e2-standard-2 or n2-standard-2.",
            120.0,
        ),
        highlight(
            "vm",
            "vm-6",
            "e2-standard-2-jenkins-ci",
            "Runs only during business hours but billed 24/7",
            "Use instance schedule or preemptible VM.",
            35.0,
        ),
        highlight(
            "disk",
            "disk-5",
            "pd-ssd-250gb-ml-training",
            "Unattached since last training run",
            "Archive to Cloud Storage bucket and delete.",
            42.5,
        ),
        highlight(
            "ip",
            "ip-3",
            "static-ip-dev-vpn",
            "VPN gateway deleted, IP still reserved",
            "Release the address.",
            3.6,
        ),
    ]
}

fn staging_highlights() -> Vec<Highlight> {
    vec![
        highlight(
            "vm",
            "vm-2",
            "n1-standard-2-staging-api",
            "Over-provisioned (avg CPU 4%)",
            "Downsize to e2-small or switch to Cloud Run.",
            18.0,
        ),
        highlight(
            "disk",
            "disk-2",
            "pd-standard-50gb-old-backup",
            "Unattached disk, no recent reads",
            "Snapshot and delete if no longer needed.",
            6.0,
        ),
    ]
}

fn project(id: &str, name: &str) -> Project {
    Project {
        id: id.to_string(),
        name: name.to_string(),
        provider: Some("gcp".to_string()),
    }
}

fn cards(total: u64, waste: u64, with_metrics: u64, savings: &str) -> Vec<SummaryCard> {
    vec![
        card("total_resources", "Total resources", CardValue::Number(total as f64), None),
        card("waste_count", "Waste", CardValue::Number(waste as f64), Some("need attention")),
        card("with_metrics", "With metrics", CardValue::Number(with_metrics as f64), None),
        card(
            "potential_savings",
            "Potential savings",
            CardValue::Text(savings.to_string()),
            Some("USD/month"),
        ),
    ]
}

fn card(id: &str, label: &str, value: CardValue, sublabel: Option<&str>) -> SummaryCard {
    SummaryCard {
        id: id.to_string(),
        label: label.to_string(),
        value,
        sublabel: sublabel.map(str::to_string),
    }
}

fn highlight(
    resource_type: &str,
    id: &str,
    name: &str,
    reason: &str,
    action: &str,
    savings: f64,
) -> Highlight {
    Highlight {
        kind: "compute".to_string(),
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
        status: None,
        recommended_action: Some(action.to_string()),
        estimated_savings: Some(Money {
            value: savings,
            currency: "USD".to_string(),
        }),
    }
}

fn service(name: &str, cost: f64) -> ServiceCost {
    ServiceCost {
        service: Some(name.to_string()),
        cost: Some(cost),
    }
}

fn billing(potential: f64, top_services: Vec<ServiceCost>) -> Billing {
    Billing {
        billing_account_display_name: Some("My Billing Account".to_string()),
        currency_code: Some("USD".to_string()),
        potential_savings: Some(Money {
            value: potential,
            currency: "USD".to_string(),
        }),
        top_services,
        extra: serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overview::DerivedTotals;

    #[test]
    fn fixture_totals_match_their_billing_blocks() {
        let prod = DerivedTotals::from_snapshot(&prod_overview());
        assert_eq!(prod.highlight_savings_rounded(), 447.8);
        assert!(prod.needs_attention);

        let staging = DerivedTotals::from_snapshot(&staging_overview());
        assert_eq!(staging.highlight_savings_rounded(), 24.0);

        let combined = combined_overview();
        let totals = DerivedTotals::from_snapshot(&combined);
        assert_eq!(totals.highlight_savings_rounded(), 471.8);
        assert_eq!(combined.highlights.len(), 14);
    }

    #[test]
    fn unknown_scope_falls_back_to_the_combined_view() {
        let unknown = demo_overview(Some("no-such-project"));
        assert_eq!(unknown.summary.total_resources, 32);

        let unscoped = demo_overview(None);
        assert_eq!(unscoped.summary.total_resources, 32);

        let staging = demo_overview(Some(DEMO_PROJECT_STAGING));
        assert_eq!(staging.summary.total_resources, 8);
    }

    #[test]
    fn demo_projects_cover_both_environments() {
        let projects = demo_projects();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].id, DEMO_PROJECT_PROD);
        assert_eq!(projects[1].name, "acme-staging");
    }
}

use serde::Serialize;

/// Entitlement template a plan code resolves to at activation time.
#[derive(Debug, Clone, Serialize)]
pub struct PlanTemplate {
    pub code: &'static str,
    pub name: &'static str,
    pub amount_cents: i64,
    pub currency: &'static str,
    pub duration_days: i64,
    pub features: &'static [&'static str],
    pub max_jobs: i32,
    pub max_candidates: i32,
}

/// Static catalog of purchasable plans.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog;

const PLANS: &[PlanTemplate] = &[
    PlanTemplate {
        code: "basic",
        name: "Basic",
        amount_cents: 1_500,
        currency: "BRL",
        duration_days: 30,
        features: &["job_posting"],
        max_jobs: 3,
        max_candidates: 50,
    },
    PlanTemplate {
        code: "premium",
        name: "Premium",
        amount_cents: 5_500,
        currency: "BRL",
        duration_days: 365,
        features: &["job_posting", "candidate_search", "featured_listings"],
        max_jobs: 25,
        max_candidates: 1_000,
    },
    PlanTemplate {
        code: "premium-monthly",
        name: "Premium Monthly",
        amount_cents: 700,
        currency: "BRL",
        duration_days: 30,
        features: &["job_posting", "candidate_search", "featured_listings"],
        max_jobs: 25,
        max_candidates: 1_000,
    },
    PlanTemplate {
        code: "enterprise",
        name: "Enterprise",
        amount_cents: 19_900,
        currency: "BRL",
        duration_days: 365,
        features: &[
            "job_posting",
            "candidate_search",
            "featured_listings",
            "priority_support",
            "bulk_export",
        ],
        max_jobs: 500,
        max_candidates: 50_000,
    },
];

impl PlanCatalog {
    pub fn resolve(&self, code: &str) -> Option<&'static PlanTemplate> {
        PLANS.iter().find(|p| p.code == code)
    }

    pub fn all(&self) -> &'static [PlanTemplate] {
        PLANS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        let catalog = PlanCatalog;
        assert_eq!(catalog.resolve("premium").unwrap().duration_days, 365);
        assert_eq!(catalog.resolve("basic").unwrap().max_jobs, 3);
        assert!(catalog.resolve("gold").is_none());
    }

    #[test]
    fn plan_codes_are_unique() {
        let catalog = PlanCatalog;
        let mut codes: Vec<_> = catalog.all().iter().map(|p| p.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), catalog.all().len());
    }
}

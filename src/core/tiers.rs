use crate::models::Membership;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Tier assumed when neither table knows the plan
pub const FALLBACK_TIER: u32 = 1;

/// Known plan hierarchies, by provider
const PROVIDER_TIERS: &[(&str, &[(&str, u32)])] = &[
    ("revolut", &[("standard", 1), ("premium", 2), ("metal", 3), ("ultra", 4)]),
    ("amex", &[("everyday", 1), ("gold", 2), ("platinum", 3), ("centurion", 4)]),
    ("lloyds", &[("club", 1), ("platinum", 2), ("premier", 3)]),
    ("hsbc", &[("advance", 1), ("premier", 2)]),
    ("barclays", &[("blue", 1), ("platinum", 2)]),
    ("o2", &[("standard", 1), ("priority", 2)]),
    ("netflix", &[("basic", 1), ("standard", 2), ("premium", 3)]),
    // family sits level with premium
    ("spotify", &[("free", 1), ("premium", 2), ("family", 2)]),
    ("amazon", &[("prime", 1)]),
    ("aa", &[("membership", 1)]),
    ("rac", &[("membership", 1)]),
    ("virgin", &[("media", 1), ("volt", 2)]),
    ("costco", &[("membership", 1)]),
];

/// Common plan-name words for providers without their own table
const GENERIC_TIERS: &[(&str, u32)] = &[
    ("free", 1),
    ("basic", 1),
    ("standard", 1),
    ("starter", 1),
    ("essential", 1),
    ("club", 1),
    ("plus", 2),
    ("premium", 2),
    ("gold", 2),
    ("platinum", 3),
    ("metal", 3),
    ("ultra", 4),
    ("elite", 4),
    ("centurion", 4),
];

/// Errors loading an external tier table
#[derive(Debug, Error)]
pub enum TierTableError {
    #[error("Failed to read tier table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid tier table: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Shape of a tier table file
///
/// ```toml
/// [providers.monzo]
/// plus = 2
/// perks = 3
///
/// [generic]
/// signature = 3
/// ```
#[derive(Debug, Default, Deserialize)]
struct TierTableFile {
    #[serde(default)]
    providers: HashMap<String, HashMap<String, u32>>,
    #[serde(default)]
    generic: HashMap<String, u32>,
}

/// Static knowledge of provider plan hierarchies
#[derive(Debug, Clone)]
pub struct TierModel {
    providers: HashMap<String, HashMap<String, u32>>,
    generic: HashMap<String, u32>,
}

impl TierModel {
    /// Model seeded with the built-in provider and generic tables
    pub fn new() -> Self {
        let providers = PROVIDER_TIERS
            .iter()
            .map(|(provider, plans)| {
                let plans = plans.iter().map(|(p, t)| (p.to_string(), *t)).collect();
                (provider.to_string(), plans)
            })
            .collect();
        let generic = GENERIC_TIERS.iter().map(|(p, t)| (p.to_string(), *t)).collect();

        Self { providers, generic }
    }

    /// Built-in tables extended (and overridden) by a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, TierTableError> {
        let mut model = Self::new();
        model.extend_from_toml(source)?;
        Ok(model)
    }

    /// Built-in tables extended by a TOML file on disk
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, TierTableError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TierTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn extend_from_toml(&mut self, source: &str) -> Result<(), TierTableError> {
        let file: TierTableFile = toml::from_str(source)?;

        for (provider, plans) in file.providers {
            let table = self.providers.entry(normalize(&provider)).or_default();
            for (plan, tier) in plans {
                table.insert(normalize(&plan), tier);
            }
        }
        for (plan, tier) in file.generic {
            self.generic.insert(normalize(&plan), tier);
        }

        tracing::debug!(
            providers = self.providers.len(),
            generic = self.generic.len(),
            "Tier tables extended"
        );
        Ok(())
    }

    /// Resolve a plan's tier: provider table, then generic words, then the fallback
    pub fn tier_of(&self, provider_name: &str, plan_name: &str) -> u32 {
        let provider = normalize(provider_name);
        let plan = normalize(plan_name);

        if plan.is_empty() {
            return FALLBACK_TIER;
        }

        self.providers
            .get(&provider)
            .and_then(|plans| plans.get(&plan))
            .or_else(|| self.generic.get(&plan))
            .copied()
            .unwrap_or(FALLBACK_TIER)
    }

    /// Tier of a membership record; an explicit tier wins over the lookup
    pub fn effective_tier(&self, membership: &Membership) -> u32 {
        if let Some(tier) = membership.plan_tier {
            return tier;
        }

        match (&membership.provider_name, &membership.plan_name) {
            (Some(provider), Some(plan)) => self.tier_of(provider, plan),
            (None, Some(plan)) => self.tier_of("", plan),
            _ => FALLBACK_TIER,
        }
    }

    #[inline]
    pub fn is_upgrade(current_tier: u32, candidate_tier: u32) -> bool {
        candidate_tier > current_tier
    }

    #[inline]
    pub fn is_downgrade(current_tier: u32, candidate_tier: u32) -> bool {
        candidate_tier < current_tier
    }

    /// Human-readable tier name
    pub fn label(tier: u32) -> &'static str {
        match tier {
            0 => "Free",
            1 => "Basic/Standard",
            2 => "Premium/Gold",
            3 => "Platinum/Metal",
            4 => "Ultra/Elite",
            _ => "Unknown",
        }
    }
}

impl Default for TierModel {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(provider: &str, plan: &str, tier: Option<u32>) -> Membership {
        Membership {
            id: 1,
            name: format!("{} {}", provider, plan),
            provider_name: Some(provider.to_string()),
            provider_slug: None,
            plan_name: Some(plan.to_string()),
            plan_tier: tier,
            is_catalog: true,
            is_active: true,
        }
    }

    #[test]
    fn test_provider_table() {
        let tiers = TierModel::new();
        assert!(tiers.tier_of("Revolut", "Metal") > tiers.tier_of("Revolut", "Standard"));
        assert_eq!(tiers.tier_of("  AMEX ", " Platinum"), 3);
        assert_eq!(tiers.tier_of("Netflix", "Standard"), 2);
    }

    #[test]
    fn test_generic_table_for_unknown_provider() {
        let tiers = TierModel::new();
        assert_eq!(tiers.tier_of("Monzo", "Premium"), 2);
        assert_eq!(tiers.tier_of("Monzo", "Metal"), 3);
        assert_eq!(tiers.tier_of("Monzo", "Free"), 1);
    }

    #[test]
    fn test_known_provider_unknown_plan_uses_generic_words() {
        let tiers = TierModel::new();
        assert_eq!(tiers.tier_of("Lloyds", "Gold"), 2);
    }

    #[test]
    fn test_fallback() {
        let tiers = TierModel::new();
        assert_eq!(tiers.tier_of("Unknown Co", "Whatever"), FALLBACK_TIER);
        assert_eq!(tiers.tier_of("", ""), FALLBACK_TIER);
    }

    #[test]
    fn test_explicit_tier_overrides_lookup() {
        let tiers = TierModel::new();
        assert_eq!(tiers.effective_tier(&membership("Revolut", "Metal", None)), 3);
        assert_eq!(tiers.effective_tier(&membership("Revolut", "Metal", Some(7))), 7);
    }

    #[test]
    fn test_upgrade_and_downgrade() {
        assert!(TierModel::is_upgrade(2, 3));
        assert!(!TierModel::is_upgrade(2, 2));
        assert!(TierModel::is_downgrade(2, 1));
        assert!(!TierModel::is_downgrade(2, 2));
    }

    #[test]
    fn test_toml_extension() {
        let tiers = TierModel::from_toml_str(
            r#"
            [providers.Monzo]
            plus = 2
            perks = 3

            [generic]
            signature = 3
            "#,
        )
        .unwrap();

        assert_eq!(tiers.tier_of("monzo", "Perks"), 3);
        assert_eq!(tiers.tier_of("Anyone", "Signature"), 3);
        // built-ins survive
        assert_eq!(tiers.tier_of("Revolut", "Ultra"), 4);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(TierModel::from_toml_str("[providers.x]\nplus = \"two\"").is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(TierModel::label(3), "Platinum/Metal");
        assert_eq!(TierModel::label(42), "Unknown");
    }
}

use serde::{Deserialize, Serialize};
use validator::Validate;

pub type BenefitId = i64;
pub type MembershipId = i64;

/// Review state of a catalog benefit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// A single perk attached to a membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benefit {
    pub id: BenefitId,
    pub membership_id: MembershipId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub vendor_domain: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default, alias = "validation_status")]
    pub validation_state: ValidationState,
}

impl Benefit {
    /// Only approved benefits are eligible as match candidates
    pub fn is_approved(&self) -> bool {
        self.validation_state == ValidationState::Approved
    }
}

/// A subscribable plan offered by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub name: String,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub provider_slug: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    /// Explicit tier; overrides the tier derived from provider and plan name
    #[serde(default)]
    pub plan_tier: Option<u32>,
    #[serde(default = "default_true")]
    pub is_catalog: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Membership {
    /// Provider identity used when comparing plans of the same provider
    pub fn provider_key(&self) -> Option<String> {
        self.provider_name
            .as_deref()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
    }
}

fn default_true() -> bool {
    true
}

/// Metadata scraped from the page the user is browsing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PageMetadata {
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub url: Option<String>,
    #[validate(length(max = 253))]
    pub domain: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "h1")]
    pub heading: Option<String>,
    #[serde(default, alias = "content_snippet")]
    pub snippet: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
}

/// Per-request context a relevance query is made against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryContext {
    /// Bare domain from the lightweight check endpoint
    Domain { domain: String },
    /// Rich page metadata for the semantic page check
    Page(PageMetadata),
    /// Open-ended search text (chat search), scored with the looser threshold
    Search { text: String },
    /// Raw merchant description, e.g. a bank-statement line
    Merchant { description: String },
}

/// How a candidate was matched
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MatchScore {
    Exact,
    Similarity(f64),
}

/// A benefit judged relevant to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub benefit_id: BenefitId,
    pub membership_id: MembershipId,
    pub score: MatchScore,
}

impl MatchCandidate {
    pub fn exact(benefit: &Benefit) -> Self {
        Self {
            benefit_id: benefit.id,
            membership_id: benefit.membership_id,
            score: MatchScore::Exact,
        }
    }

    pub fn similarity(&self) -> Option<f64> {
        match self.score {
            MatchScore::Exact => None,
            MatchScore::Similarity(s) => Some(s),
        }
    }
}

/// Closed set of recommendation kinds the generation step may propose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Overlap,
    AddMembership,
    Upgrade,
    Switch,
    Tip,
    Unused,
    Bundle,
}

/// A structured suggestion proposed by the generation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub kind: RecommendationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default, alias = "benefit_match_ids")]
    pub benefit_ids: Vec<BenefitId>,
    #[serde(default)]
    pub membership_ids: Vec<MembershipId>,
    /// Minor currency units (pence/cents)
    #[serde(default)]
    pub estimated_saving_min: Option<u64>,
    #[serde(default)]
    pub estimated_saving_max: Option<u64>,
    #[serde(default)]
    pub action_url: Option<String>,
}

/// Which similarity cut-off a semantic query runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticMode {
    /// Browser-extension page check, stricter
    #[default]
    PageCheck,
    /// Open-ended search
    Search,
}

/// Tuning constants for matching and validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub page_check_similarity: f64,
    pub search_similarity: f64,
    pub top_k: usize,
    /// Fuzzy name score on a 0-100 scale
    pub fuzzy_score: f64,
    pub savings_ceiling_minor: u64,
}

impl MatchThresholds {
    pub fn similarity_for(&self, mode: SemanticMode) -> f64 {
        match mode {
            SemanticMode::PageCheck => self.page_check_similarity,
            SemanticMode::Search => self.search_similarity,
        }
    }
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            page_check_similarity: 0.7,
            search_similarity: 0.5,
            top_k: 5,
            fuzzy_score: 80.0,
            savings_ceiling_minor: 500_000,
        }
    }
}

/// A user's owned memberships together with their benefits
#[derive(Debug, Clone, Default)]
pub struct UserHoldings {
    pub memberships: Vec<Membership>,
    pub benefits: Vec<Benefit>,
}

impl UserHoldings {
    pub fn new(memberships: Vec<Membership>, benefits: Vec<Benefit>) -> Self {
        Self { memberships, benefits }
    }

    pub fn membership(&self, id: MembershipId) -> Option<&Membership> {
        self.memberships.iter().find(|m| m.id == id)
    }

    /// Approved benefits paired with the membership that owns them
    pub fn approved_pairs(&self) -> Vec<(&Benefit, &Membership)> {
        self.benefits
            .iter()
            .filter(|b| b.is_approved())
            .filter_map(|b| self.membership(b.membership_id).map(|m| (b, m)))
            .collect()
    }

    pub fn approved_benefits(&self) -> impl Iterator<Item = &Benefit> {
        self.benefits.iter().filter(|b| b.is_approved())
    }
}

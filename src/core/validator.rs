use crate::core::tiers::TierModel;
use crate::models::{
    Benefit, BenefitId, Membership, MembershipId, RecommendationCandidate, RecommendationKind, UserHoldings,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Most recommendations a single batch may return
pub const MAX_ACCEPTED_RECOMMENDATIONS: usize = 10;

/// Why a recommendation was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// Every referenced benefit belongs to one membership
    SameMembershipOverlap,
    /// Suggested plan is not strictly above the user's current one
    NotAnUpgrade,
    /// User holds nothing from the suggested plan's provider
    NoSuchProviderMembership,
    /// Upgrade names no plan the user could move to
    MissingUpgradeTarget,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::SameMembershipOverlap => "same_membership_overlap",
            RejectionReason::NotAnUpgrade => "not_an_upgrade",
            RejectionReason::NoSuchProviderMembership => "no_such_provider_membership",
            RejectionReason::MissingUpgradeTarget => "missing_upgrade_target",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A dropped recommendation and the reason it was dropped
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub candidate: RecommendationCandidate,
}

/// Lookups a recommendation is checked against
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    benefits: HashMap<BenefitId, Benefit>,
    memberships: HashMap<MembershipId, Membership>,
    user_memberships: HashSet<MembershipId>,
}

impl ValidationContext {
    pub fn new(
        benefits: impl IntoIterator<Item = Benefit>,
        memberships: impl IntoIterator<Item = Membership>,
        user_memberships: impl IntoIterator<Item = MembershipId>,
    ) -> Self {
        Self {
            benefits: benefits.into_iter().map(|b| (b.id, b)).collect(),
            memberships: memberships.into_iter().map(|m| (m.id, m)).collect(),
            user_memberships: user_memberships.into_iter().collect(),
        }
    }

    /// Context for a user's holdings; `catalog` supplies plans the user may move to
    pub fn from_holdings(holdings: &UserHoldings, catalog: &[Membership]) -> Self {
        Self::new(
            holdings.benefits.iter().cloned(),
            catalog.iter().chain(&holdings.memberships).cloned(),
            holdings.memberships.iter().map(|m| m.id),
        )
    }

    pub fn benefit(&self, id: BenefitId) -> Option<&Benefit> {
        self.benefits.get(&id)
    }

    pub fn membership(&self, id: MembershipId) -> Option<&Membership> {
        self.memberships.get(&id)
    }

    pub fn owns(&self, id: MembershipId) -> bool {
        self.user_memberships.contains(&id)
    }

    fn owned_memberships(&self) -> impl Iterator<Item = &Membership> {
        self.user_memberships.iter().filter_map(|id| self.memberships.get(id))
    }
}

/// Accepted and rejected recommendations from one batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<RecommendationCandidate>,
    pub rejected: Vec<Rejection>,
}

/// Gates generated recommendations against deterministic business rules
#[derive(Debug, Clone)]
pub struct RecommendationValidator {
    tiers: Arc<TierModel>,
    savings_ceiling: u64,
}

impl RecommendationValidator {
    pub fn new(tiers: Arc<TierModel>, savings_ceiling: u64) -> Self {
        Self {
            tiers,
            savings_ceiling,
        }
    }

    /// Validate one candidate
    ///
    /// Dangling ids are pruned first; the kind-specific rule runs on what is
    /// left, then savings are made plausible. An accepted candidate is the
    /// input apart from pruning and savings clamping.
    pub fn validate(
        &self,
        mut candidate: RecommendationCandidate,
        ctx: &ValidationContext,
    ) -> Result<RecommendationCandidate, Rejection> {
        prune_references(&mut candidate, ctx);

        let checked = match candidate.kind {
            RecommendationKind::Overlap => self.check_overlap(&candidate, ctx),
            RecommendationKind::Upgrade => self.check_upgrade(&candidate, ctx),
            RecommendationKind::AddMembership
            | RecommendationKind::Switch
            | RecommendationKind::Tip
            | RecommendationKind::Unused
            | RecommendationKind::Bundle => Ok(()),
        };

        if let Err(reason) = checked {
            return Err(Rejection { reason, candidate });
        }

        self.clamp_savings(&mut candidate);
        Ok(candidate)
    }

    /// Validate a batch, keeping at most [`MAX_ACCEPTED_RECOMMENDATIONS`]
    pub fn filter_batch(&self, candidates: Vec<RecommendationCandidate>, ctx: &ValidationContext) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for candidate in candidates {
            match self.validate(candidate, ctx) {
                Ok(accepted) => outcome.accepted.push(accepted),
                Err(rejection) => {
                    tracing::info!(
                        reason = rejection.reason.code(),
                        kind = ?rejection.candidate.kind,
                        title = %rejection.candidate.title,
                        benefit_ids = ?rejection.candidate.benefit_ids,
                        membership_ids = ?rejection.candidate.membership_ids,
                        "Recommendation rejected"
                    );
                    outcome.rejected.push(rejection);
                }
            }
        }

        if outcome.accepted.len() > MAX_ACCEPTED_RECOMMENDATIONS {
            tracing::debug!(
                accepted = outcome.accepted.len(),
                "Truncating accepted recommendations to {}",
                MAX_ACCEPTED_RECOMMENDATIONS
            );
            outcome.accepted.truncate(MAX_ACCEPTED_RECOMMENDATIONS);
        }

        outcome
    }

    fn check_overlap(
        &self,
        candidate: &RecommendationCandidate,
        ctx: &ValidationContext,
    ) -> Result<(), RejectionReason> {
        if candidate.benefit_ids.len() < 2 {
            return Ok(());
        }

        let owners: HashSet<MembershipId> = candidate
            .benefit_ids
            .iter()
            .filter_map(|id| ctx.benefit(*id))
            .map(|b| b.membership_id)
            .collect();

        if owners.len() < 2 {
            return Err(RejectionReason::SameMembershipOverlap);
        }
        Ok(())
    }

    fn check_upgrade(
        &self,
        candidate: &RecommendationCandidate,
        ctx: &ValidationContext,
    ) -> Result<(), RejectionReason> {
        let target = upgrade_target(candidate, ctx).ok_or(RejectionReason::MissingUpgradeTarget)?;
        let provider = target.provider_key().ok_or(RejectionReason::NoSuchProviderMembership)?;

        // highest plan the user already holds with this provider
        let current_tier = ctx
            .owned_memberships()
            .filter(|m| m.id != target.id)
            .filter(|m| m.provider_key().as_deref() == Some(provider.as_str()))
            .map(|m| self.tiers.effective_tier(m))
            .max()
            .ok_or(RejectionReason::NoSuchProviderMembership)?;

        let target_tier = self.tiers.effective_tier(target);
        if !TierModel::is_upgrade(current_tier, target_tier) {
            tracing::debug!(
                provider = %provider,
                current_tier,
                target_tier,
                "Suggested plan is not above the current one"
            );
            return Err(RejectionReason::NotAnUpgrade);
        }
        Ok(())
    }

    fn clamp_savings(&self, candidate: &mut RecommendationCandidate) {
        if let (Some(min), Some(max)) = (candidate.estimated_saving_min, candidate.estimated_saving_max) {
            if min > max {
                candidate.estimated_saving_min = Some(max);
                candidate.estimated_saving_max = Some(min);
            }
        }

        let ceiling = self.savings_ceiling;
        for saving in [&mut candidate.estimated_saving_min, &mut candidate.estimated_saving_max] {
            if let Some(value) = saving.as_mut() {
                if *value > ceiling {
                    tracing::debug!(value = *value, ceiling, "Clamping estimated saving");
                    *value = ceiling;
                }
            }
        }
    }
}

/// First referenced plan the user does not hold yet
///
/// Falls back to the plans owning the referenced benefits when no
/// membership ids were given.
fn upgrade_target<'a>(candidate: &RecommendationCandidate, ctx: &'a ValidationContext) -> Option<&'a Membership> {
    let from_memberships = candidate.membership_ids.iter().copied();
    let from_benefits = candidate
        .benefit_ids
        .iter()
        .filter_map(|id| ctx.benefit(*id))
        .map(|b| b.membership_id);

    let ids: Vec<MembershipId> = if candidate.membership_ids.is_empty() {
        from_benefits.collect()
    } else {
        from_memberships.collect()
    };

    ids.into_iter()
        .filter(|id| !ctx.owns(*id))
        .find_map(|id| ctx.membership(id))
}

/// Drop ids that do not resolve, and duplicates, keeping first-seen order
fn prune_references(candidate: &mut RecommendationCandidate, ctx: &ValidationContext) {
    let before = (candidate.benefit_ids.len(), candidate.membership_ids.len());

    let mut seen = HashSet::new();
    candidate
        .benefit_ids
        .retain(|id| ctx.benefit(*id).is_some() && seen.insert(*id));

    let mut seen = HashSet::new();
    candidate
        .membership_ids
        .retain(|id| ctx.membership(*id).is_some() && seen.insert(*id));

    let after = (candidate.benefit_ids.len(), candidate.membership_ids.len());
    if before != after {
        tracing::debug!(
            benefits_dropped = before.0 - after.0,
            memberships_dropped = before.1 - after.1,
            "Pruned dangling recommendation references"
        );
    }
}

/// Parse the generation step's JSON into candidates
///
/// Accepts `{"recommendations": [...]}` or a bare array. Entries that do not
/// parse are dropped one by one; the rest of the batch survives.
pub fn parse_generated_batch(value: &Value) -> Vec<RecommendationCandidate> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("recommendations") {
            Some(Value::Array(entries)) => entries,
            _ => {
                tracing::warn!("Generated output has no recommendations array");
                return Vec::new();
            }
        },
        _ => {
            tracing::warn!("Generated output is not a JSON object or array");
            return Vec::new();
        }
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry.clone()) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                tracing::warn!(index, error = %e, "Dropping malformed generated recommendation");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{approved_benefit, membership};
    use serde_json::json;

    fn validator() -> RecommendationValidator {
        RecommendationValidator::new(Arc::new(TierModel::new()), 500_000)
    }

    fn candidate(kind: RecommendationKind, benefit_ids: Vec<i64>, membership_ids: Vec<i64>) -> RecommendationCandidate {
        RecommendationCandidate {
            kind,
            title: "test".into(),
            rationale: String::new(),
            benefit_ids,
            membership_ids,
            estimated_saving_min: None,
            estimated_saving_max: None,
            action_url: None,
        }
    }

    fn tiered(id: i64, provider: &str, tier: u32) -> Membership {
        let mut m = membership(id, &format!("{} plan {}", provider, tier), provider, "Plan");
        m.plan_tier = Some(tier);
        m
    }

    fn overlap_context() -> ValidationContext {
        ValidationContext::new(
            vec![
                approved_benefit(1, 7, "Roadside Assistance", Some("breakdown_cover")),
                approved_benefit(2, 7, "Recovery Service", Some("breakdown_cover")),
                approved_benefit(3, 5, "RAC Breakdown", Some("breakdown_cover")),
            ],
            vec![tiered(5, "RAC", 1), tiered(7, "Lloyds", 1)],
            vec![5, 7],
        )
    }

    #[test]
    fn test_overlap_same_membership_rejected() {
        let overlap = candidate(RecommendationKind::Overlap, vec![1, 2], vec![]);
        let result = validator().validate(overlap, &overlap_context());
        let rejection = result.unwrap_err();
        assert_eq!(rejection.reason, RejectionReason::SameMembershipOverlap);
        assert_eq!(rejection.reason.code(), "same_membership_overlap");
    }

    #[test]
    fn test_overlap_distinct_memberships_accepted() {
        let overlap = candidate(RecommendationKind::Overlap, vec![1, 3], vec![]);
        let result = validator().validate(overlap, &overlap_context());
        assert_eq!(result.unwrap().benefit_ids, vec![1, 3]);
    }

    #[test]
    fn test_overlap_with_one_reference_left_after_pruning_passes() {
        let overlap = candidate(RecommendationKind::Overlap, vec![1, 99], vec![]);
        let result = validator().validate(overlap, &overlap_context());
        assert_eq!(result.unwrap().benefit_ids, vec![1]);
    }

    #[test]
    fn test_dangling_and_duplicate_ids_pruned() {
        let result = validator()
            .validate(candidate(RecommendationKind::Tip, vec![3, 42, 1, 3], vec![7, 8, 7]), &overlap_context())
            .unwrap();
        assert_eq!(result.benefit_ids, vec![3, 1]);
        assert_eq!(result.membership_ids, vec![7]);
    }

    #[test]
    fn test_upgrade_rules() {
        let ctx = ValidationContext::new(
            vec![],
            vec![tiered(1, "Lloyds", 2), tiered(2, "Lloyds", 1), tiered(3, "Lloyds", 3), tiered(4, "HSBC", 3)],
            vec![1],
        );
        let v = validator();

        let down = v.validate(candidate(RecommendationKind::Upgrade, vec![], vec![2]), &ctx);
        assert_eq!(down.unwrap_err().reason, RejectionReason::NotAnUpgrade);

        let up = v.validate(candidate(RecommendationKind::Upgrade, vec![], vec![3]), &ctx);
        assert!(up.is_ok());

        let other_provider = v.validate(candidate(RecommendationKind::Upgrade, vec![], vec![4]), &ctx);
        assert_eq!(other_provider.unwrap_err().reason, RejectionReason::NoSuchProviderMembership);

        let nothing = v.validate(candidate(RecommendationKind::Upgrade, vec![], vec![1]), &ctx);
        assert_eq!(nothing.unwrap_err().reason, RejectionReason::MissingUpgradeTarget);
    }

    #[test]
    fn test_upgrade_uses_tier_tables_without_explicit_tier() {
        let ctx = ValidationContext::new(
            vec![],
            vec![
                membership(1, "Lloyds Club", "Lloyds", "Club"),
                membership(2, "Lloyds Premier", "Lloyds", "Premier"),
            ],
            vec![1],
        );
        assert!(validator()
            .validate(candidate(RecommendationKind::Upgrade, vec![], vec![1, 2]), &ctx)
            .is_ok());
    }

    #[test]
    fn test_savings_swapped_and_clamped() {
        let mut c = candidate(RecommendationKind::Switch, vec![], vec![]);
        c.estimated_saving_min = Some(900_000);
        c.estimated_saving_max = Some(1_000);

        let accepted = validator().validate(c, &ValidationContext::default()).unwrap();
        assert_eq!(accepted.estimated_saving_min, Some(1_000));
        assert_eq!(accepted.estimated_saving_max, Some(500_000));
    }

    #[test]
    fn test_filter_batch_caps_accepted() {
        let batch = (0..15)
            .map(|_| candidate(RecommendationKind::Tip, vec![], vec![]))
            .chain(std::iter::once(candidate(RecommendationKind::Overlap, vec![1, 2], vec![])))
            .collect();

        let outcome = validator().filter_batch(batch, &overlap_context());
        assert_eq!(outcome.accepted.len(), MAX_ACCEPTED_RECOMMENDATIONS);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_parse_generated_batch_drops_malformed() {
        let value = json!({
            "recommendations": [
                {"kind": "overlap", "title": "Two breakdown covers", "benefit_match_ids": [1, 3]},
                {"kind": "teleport", "title": "?"},
                {"kind": "tip", "estimated_saving_min": -50},
                "not an object",
                {"kind": "upgrade", "membership_ids": [3]}
            ]
        });

        let parsed = parse_generated_batch(&value);
        let kinds: Vec<_> = parsed.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![RecommendationKind::Overlap, RecommendationKind::Upgrade]);
    }

    #[test]
    fn test_parse_generated_batch_bare_array_and_garbage() {
        assert_eq!(parse_generated_batch(&json!([{"kind": "unused"}])).len(), 1);
        assert!(parse_generated_batch(&json!("text")).is_empty());
        assert!(parse_generated_batch(&json!({"items": []})).is_empty());
    }
}

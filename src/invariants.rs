use anyhow::anyhow;
use serde::Serialize;

use crate::error::{LibError, Result};
use crate::hierarchy::LeadershipRole;
use crate::models::{Devotee, DevoteeId, ValidationIssue, ValidationReport};

/// Snapshot of everything the replacement rules need, loaded by the caller in
/// one read pass so validation itself stays pure and exhaustively testable.
#[derive(Debug, Clone)]
pub struct ReplacementContext {
    pub occupant_id: DevoteeId,
    pub candidate_id: DevoteeId,
    pub occupant: Option<Devotee>,
    pub candidate: Option<Devotee>,
    /// District code resolved through the occupant's affiliated center.
    /// `None` means no center resolved.
    pub occupant_district: Option<String>,
    pub candidate_district: Option<String>,
    /// Ancestors of the occupant, nearest first.
    pub occupant_upward_chain: Vec<DevoteeId>,
}

/// Snapshot for the promotion precondition helper. Deliberately has no
/// district fields: promotions are not district-scoped the way replacements
/// are (preserved asymmetry, see DESIGN.md).
#[derive(Debug, Clone)]
pub struct PromotionContext {
    pub candidate_id: DevoteeId,
    pub candidate: Option<Devotee>,
    pub supervisor_id: Option<DevoteeId>,
    pub supervisor: Option<Devotee>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleChangeViolation {
    DevoteeNotFound {
        field: &'static str,
        devotee_id: DevoteeId,
    },
    NothingToReplace {
        devotee_id: DevoteeId,
    },
    CandidateAlreadyHoldsRole {
        devotee_id: DevoteeId,
        role: LeadershipRole,
    },
    DistrictUnresolved {
        field: &'static str,
        devotee_id: DevoteeId,
    },
    DistrictMismatch {
        occupant_district: String,
        candidate_district: String,
    },
    CircularReporting {
        candidate_id: DevoteeId,
        occupant_id: DevoteeId,
    },
    SupervisorHoldsNoRole {
        devotee_id: DevoteeId,
    },
}

impl RoleChangeViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            RoleChangeViolation::DevoteeNotFound { .. } => "devotee_not_found",
            RoleChangeViolation::NothingToReplace { .. } => "nothing_to_replace",
            RoleChangeViolation::CandidateAlreadyHoldsRole { .. } => "candidate_role_occupied",
            RoleChangeViolation::DistrictUnresolved { .. } => "district_unresolved",
            RoleChangeViolation::DistrictMismatch { .. } => "district_mismatch",
            RoleChangeViolation::CircularReporting { .. } => "circular_reporting",
            RoleChangeViolation::SupervisorHoldsNoRole { .. } => "supervisor_role_missing",
        }
    }

    pub const fn field(&self) -> &'static str {
        match self {
            RoleChangeViolation::DevoteeNotFound { field, .. }
            | RoleChangeViolation::DistrictUnresolved { field, .. } => field,
            RoleChangeViolation::NothingToReplace { .. } => "currentOccupantId",
            RoleChangeViolation::CandidateAlreadyHoldsRole { .. } => "candidateId",
            RoleChangeViolation::DistrictMismatch { .. } => "district",
            RoleChangeViolation::CircularReporting { .. } => "reportingTo",
            RoleChangeViolation::SupervisorHoldsNoRole { .. } => "newReportingTo",
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            RoleChangeViolation::DevoteeNotFound { devotee_id, .. } => {
                format!("Devotee {devotee_id} was not found")
            }
            RoleChangeViolation::NothingToReplace { devotee_id } => {
                format!("Devotee {devotee_id} holds no leadership role. Nothing to replace.")
            }
            RoleChangeViolation::CandidateAlreadyHoldsRole { role, .. } => {
                format!(
                    "Replacement devotee already has an active role: {role}. \
                     Remove role before replacement."
                )
            }
            RoleChangeViolation::DistrictUnresolved { devotee_id, .. } => {
                format!("Devotee {devotee_id} is not affiliated with a center in any district")
            }
            RoleChangeViolation::DistrictMismatch {
                occupant_district,
                candidate_district,
            } => {
                format!(
                    "Replacement must stay within one district \
                     ({occupant_district} vs {candidate_district})"
                )
            }
            RoleChangeViolation::CircularReporting {
                candidate_id,
                occupant_id,
            } => {
                format!(
                    "Devotee {candidate_id} already supervises the reporting chain above \
                     {occupant_id}; the replacement would create a circular reporting chain"
                )
            }
            RoleChangeViolation::SupervisorHoldsNoRole { devotee_id } => {
                format!("Proposed supervisor {devotee_id} holds no leadership role")
            }
        }
    }

    pub fn issue(&self) -> ValidationIssue {
        ValidationIssue::error(self.field(), self.public_message())
    }
}

/// Rules 1-6 of the replacement protocol, in order. Missing devotees stop the
/// run after the existence rule; everything after accumulates.
pub fn replacement_violations(ctx: &ReplacementContext) -> Vec<RoleChangeViolation> {
    let mut violations = Vec::new();
    if ctx.occupant.is_none() {
        violations.push(RoleChangeViolation::DevoteeNotFound {
            field: "currentOccupantId",
            devotee_id: ctx.occupant_id,
        });
    }
    if ctx.candidate.is_none() {
        violations.push(RoleChangeViolation::DevoteeNotFound {
            field: "candidateId",
            devotee_id: ctx.candidate_id,
        });
    }
    let (Some(occupant), Some(candidate)) = (&ctx.occupant, &ctx.candidate) else {
        return violations;
    };

    if occupant.leadership_role.is_none() {
        violations.push(RoleChangeViolation::NothingToReplace {
            devotee_id: ctx.occupant_id,
        });
    }

    if let Some(role) = candidate.leadership_role {
        violations.push(RoleChangeViolation::CandidateAlreadyHoldsRole {
            devotee_id: ctx.candidate_id,
            role,
        });
    }

    match (&ctx.occupant_district, &ctx.candidate_district) {
        (Some(occupant_district), Some(candidate_district)) => {
            if occupant_district != candidate_district {
                violations.push(RoleChangeViolation::DistrictMismatch {
                    occupant_district: occupant_district.clone(),
                    candidate_district: candidate_district.clone(),
                });
            }
        }
        (occupant_district, candidate_district) => {
            if occupant_district.is_none() {
                violations.push(RoleChangeViolation::DistrictUnresolved {
                    field: "currentOccupantId",
                    devotee_id: ctx.occupant_id,
                });
            }
            if candidate_district.is_none() {
                violations.push(RoleChangeViolation::DistrictUnresolved {
                    field: "candidateId",
                    devotee_id: ctx.candidate_id,
                });
            }
        }
    }

    if ctx.occupant_upward_chain.contains(&ctx.candidate_id) {
        violations.push(RoleChangeViolation::CircularReporting {
            candidate_id: ctx.candidate_id,
            occupant_id: ctx.occupant_id,
        });
    }

    violations
}

pub fn validate_role_replacement(ctx: &ReplacementContext) -> ValidationReport {
    let violations = replacement_violations(ctx);
    let mut issues: Vec<ValidationIssue> = violations.iter().map(|v| v.issue()).collect();

    if let (Some(occupant), Some(candidate)) = (&ctx.occupant, &ctx.candidate) {
        issues.push(ValidationIssue::warning(
            "replacement",
            format!(
                "Replacing {} with {}",
                occupant.display_name(),
                candidate.display_name()
            ),
        ));
    }

    ValidationReport::from_issues(issues)
}

/// Existence and role-state preconditions for the promotion flow. Same
/// existence checks as replacement but no district rule.
pub fn promotion_precondition_violations(ctx: &PromotionContext) -> Vec<RoleChangeViolation> {
    let mut violations = Vec::new();
    if ctx.candidate.is_none() {
        violations.push(RoleChangeViolation::DevoteeNotFound {
            field: "devoteeId",
            devotee_id: ctx.candidate_id,
        });
    }
    if let Some(supervisor_id) = ctx.supervisor_id {
        if ctx.supervisor.is_none() {
            violations.push(RoleChangeViolation::DevoteeNotFound {
                field: "newReportingTo",
                devotee_id: supervisor_id,
            });
        }
    }
    if !violations.is_empty() {
        return violations;
    }

    if let Some(candidate) = &ctx.candidate {
        if let Some(role) = candidate.leadership_role {
            violations.push(RoleChangeViolation::CandidateAlreadyHoldsRole {
                devotee_id: ctx.candidate_id,
                role,
            });
        }
    }
    if let (Some(supervisor_id), Some(supervisor)) = (ctx.supervisor_id, &ctx.supervisor) {
        if supervisor.leadership_role.is_none() {
            violations.push(RoleChangeViolation::SupervisorHoldsNoRole {
                devotee_id: supervisor_id,
            });
        }
    }

    violations
}

pub fn validate_promotion_preconditions(ctx: &PromotionContext) -> ValidationReport {
    let issues = promotion_precondition_violations(ctx)
        .iter()
        .map(|v| v.issue())
        .collect();
    ValidationReport::from_issues(issues)
}

/// Converts a blocking report into the structured error the API returns.
pub fn ensure_can_proceed(report: ValidationReport) -> Result<ValidationReport> {
    if report.can_proceed {
        return Ok(report);
    }
    let issues = report.errors.clone();
    Err(LibError::validation_failed(
        "Role change validation failed",
        issues,
        anyhow!("{} blocking validation issue(s)", report.blocking_issues().len()),
    ))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkValidationEntry {
    pub index: usize,
    pub current_occupant_id: DevoteeId,
    pub candidate_id: DevoteeId,
    #[serde(flatten)]
    pub report: ValidationReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkValidationReport {
    pub results: Vec<BulkValidationEntry>,
    pub can_proceed_with_all: bool,
}

/// Each pair is judged against the same pristine snapshot list; later pairs
/// never see the effects of earlier ones. Execution of a validated batch and
/// partial-failure handling are the caller's responsibility.
pub fn validate_bulk_role_changes(contexts: &[ReplacementContext]) -> BulkValidationReport {
    let results: Vec<BulkValidationEntry> = contexts
        .iter()
        .enumerate()
        .map(|(index, ctx)| BulkValidationEntry {
            index,
            current_occupant_id: ctx.occupant_id,
            candidate_id: ctx.candidate_id,
            report: validate_role_replacement(ctx),
        })
        .collect();
    let can_proceed_with_all = results.iter().all(|entry| entry.report.can_proceed);
    BulkValidationReport {
        results,
        can_proceed_with_all,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::Severity;

    fn devotee(
        id: DevoteeId,
        role: Option<LeadershipRole>,
        reporting_to: Option<DevoteeId>,
    ) -> Devotee {
        let now = NaiveDate::from_ymd_opt(2026, 1, 1)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("valid datetime");
        Devotee {
            id,
            legal_name: format!("Devotee {}", id.0.as_u128()),
            initiated_name: None,
            email: None,
            phone: None,
            namahatta_id: None,
            leadership_role: role,
            reporting_to_devotee_id: reporting_to,
            has_system_access: false,
            appointed_by: None,
            appointed_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(n: u128) -> DevoteeId {
        DevoteeId(Uuid::from_u128(n))
    }

    fn valid_context() -> ReplacementContext {
        let occupant_id = id(1);
        let candidate_id = id(2);
        let supervisor_id = id(3);
        ReplacementContext {
            occupant_id,
            candidate_id,
            occupant: Some(devotee(
                occupant_id,
                Some(LeadershipRole::ChakraSenapoti),
                Some(supervisor_id),
            )),
            candidate: Some(devotee(candidate_id, None, None)),
            occupant_district: Some("NADIA".to_string()),
            candidate_district: Some("NADIA".to_string()),
            occupant_upward_chain: vec![supervisor_id],
        }
    }

    #[test]
    fn valid_replacement_passes_with_a_warning() {
        let report = validate_role_replacement(&valid_context());
        assert!(report.is_valid);
        assert!(report.can_proceed);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].severity, Severity::Warning);
        assert!(report.errors[0].message.starts_with("Replacing"));
    }

    #[test]
    fn missing_devotees_short_circuit_remaining_rules() {
        let mut ctx = valid_context();
        ctx.occupant = None;
        ctx.candidate = None;
        // District data that would otherwise fail must stay unchecked.
        ctx.occupant_district = None;
        ctx.candidate_district = Some("PURI".to_string());

        let violations = replacement_violations(&ctx);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.error_code() == "devotee_not_found"));
    }

    #[test]
    fn single_missing_devotee_reports_only_that_id() {
        let mut ctx = valid_context();
        ctx.candidate = None;
        let violations = replacement_violations(&ctx);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            &violations[0],
            RoleChangeViolation::DevoteeNotFound { field: "candidateId", devotee_id }
                if *devotee_id == ctx.candidate_id
        ));
    }

    #[test]
    fn occupant_without_role_has_nothing_to_replace() {
        let mut ctx = valid_context();
        ctx.occupant = Some(devotee(ctx.occupant_id, None, None));
        let violations = replacement_violations(&ctx);
        assert!(violations.iter().any(|v| v.error_code() == "nothing_to_replace"));
    }

    #[test]
    fn occupied_candidate_is_rejected_even_when_everything_else_matches() {
        let mut ctx = valid_context();
        ctx.candidate = Some(devotee(
            ctx.candidate_id,
            Some(LeadershipRole::UpaChakraSenapoti),
            None,
        ));
        let report = validate_role_replacement(&ctx);
        assert!(!report.can_proceed);
        let issue = report
            .errors
            .iter()
            .find(|issue| issue.severity == Severity::Error)
            .expect("occupied candidate should produce an error");
        assert!(issue.message.contains("UPA_CHAKRA_SENAPOTI"));
        assert!(issue.message.contains("Remove role before replacement"));
    }

    #[test]
    fn district_mismatch_is_rejected() {
        let mut ctx = valid_context();
        ctx.candidate_district = Some("PURI".to_string());
        let violations = replacement_violations(&ctx);
        assert!(matches!(
            violations
                .iter()
                .find(|v| v.error_code() == "district_mismatch")
                .expect("mismatch should be reported"),
            RoleChangeViolation::DistrictMismatch { occupant_district, candidate_district }
                if occupant_district == "NADIA" && candidate_district == "PURI"
        ));
    }

    #[test]
    fn unresolved_district_suppresses_mismatch_rule() {
        let mut ctx = valid_context();
        ctx.occupant_district = None;
        let violations = replacement_violations(&ctx);
        assert!(violations.iter().any(|v| v.error_code() == "district_unresolved"));
        assert!(!violations.iter().any(|v| v.error_code() == "district_mismatch"));
    }

    #[test]
    fn candidate_in_upward_chain_is_circular() {
        let mut ctx = valid_context();
        ctx.occupant_upward_chain = vec![id(3), ctx.candidate_id, id(7)];
        let violations = replacement_violations(&ctx);
        assert!(violations.iter().any(|v| v.error_code() == "circular_reporting"));
    }

    #[test]
    fn errors_accumulate_rather_than_short_circuit() {
        let mut ctx = valid_context();
        ctx.candidate = Some(devotee(
            ctx.candidate_id,
            Some(LeadershipRole::MalaSenapoti),
            None,
        ));
        ctx.candidate_district = Some("PURI".to_string());
        ctx.occupant_upward_chain = vec![ctx.candidate_id];

        let codes: Vec<&str> = replacement_violations(&ctx)
            .iter()
            .map(|v| v.error_code())
            .collect();
        assert_eq!(
            codes,
            vec![
                "candidate_role_occupied",
                "district_mismatch",
                "circular_reporting"
            ]
        );
    }

    #[test]
    fn bulk_validation_is_idempotent_over_pristine_contexts() {
        let mut conflicting = valid_context();
        conflicting.candidate = Some(devotee(
            conflicting.candidate_id,
            Some(LeadershipRole::ChakraSenapoti),
            None,
        ));
        let contexts = vec![valid_context(), conflicting];

        let first = validate_bulk_role_changes(&contexts);
        let second = validate_bulk_role_changes(&contexts);

        assert!(!first.can_proceed_with_all);
        assert_eq!(first.results.len(), 2);
        assert!(first.results[0].report.can_proceed);
        assert!(!first.results[1].report.can_proceed);
        for (a, b) in first.results.iter().zip(second.results.iter()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.report.can_proceed, b.report.can_proceed);
            assert_eq!(a.report.errors, b.report.errors);
        }
    }

    #[test]
    fn promotion_preconditions_ignore_districts() {
        let candidate_id = id(10);
        let supervisor_id = id(11);
        let ctx = PromotionContext {
            candidate_id,
            candidate: Some(devotee(candidate_id, None, None)),
            supervisor_id: Some(supervisor_id),
            supervisor: Some(devotee(
                supervisor_id,
                Some(LeadershipRole::MahaChakraSenapoti),
                None,
            )),
        };
        // No district data exists in the context at all; the check passes.
        assert!(validate_promotion_preconditions(&ctx).can_proceed);
    }

    #[test]
    fn promotion_rejects_occupied_candidate_and_roleless_supervisor() {
        let candidate_id = id(10);
        let supervisor_id = id(11);
        let ctx = PromotionContext {
            candidate_id,
            candidate: Some(devotee(
                candidate_id,
                Some(LeadershipRole::UpaChakraSenapoti),
                None,
            )),
            supervisor_id: Some(supervisor_id),
            supervisor: Some(devotee(supervisor_id, None, None)),
        };
        let codes: Vec<&str> = promotion_precondition_violations(&ctx)
            .iter()
            .map(|v| v.error_code())
            .collect();
        assert_eq!(codes, vec!["candidate_role_occupied", "supervisor_role_missing"]);
    }

    #[test]
    fn promotion_missing_parties_short_circuit() {
        let ctx = PromotionContext {
            candidate_id: id(10),
            candidate: None,
            supervisor_id: Some(id(11)),
            supervisor: None,
        };
        let violations = promotion_precondition_violations(&ctx);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.error_code() == "devotee_not_found"));
    }

    #[test]
    fn ensure_can_proceed_surfaces_issue_list() {
        let mut ctx = valid_context();
        ctx.candidate_district = Some("PURI".to_string());
        let err = ensure_can_proceed(validate_role_replacement(&ctx))
            .expect_err("mismatch should block");
        assert_eq!(err.code, "validation_failed");
        match err.details.expect("details should be attached") {
            crate::error::ErrorDetails::Validation(issues) => {
                assert!(issues.iter().any(|issue| issue.field == "district"));
            }
        }
    }
}

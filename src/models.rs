use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::hierarchy::{ChangeType, LeadershipRole};

const REASON_MIN_CHARS: usize = 3;
const REASON_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct DevoteeId(pub Uuid);

impl fmt::Display for DevoteeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DevoteeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for DevoteeId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NamahattaId(pub Uuid);

impl fmt::Display for NamahattaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for NamahattaId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct RecordId(pub Uuid);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Acting user id, sourced from validated auth/session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One field-level validation message, rendered as-is by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Validator outcome. `can_proceed` mirrors `is_valid`; both are serialized
/// because existing callers read either name. Warnings never block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub can_proceed: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        let is_valid = !errors
            .iter()
            .any(|issue| issue.severity == Severity::Error);
        Self {
            is_valid,
            can_proceed: is_valid,
            errors,
        }
    }

    pub fn blocking_issues(&self) -> Vec<ValidationIssue> {
        self.errors
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
            .cloned()
            .collect()
    }
}

/// A member record. Identity and contact fields ride along; the role fields
/// (`leadership_role`, `reporting_to_devotee_id`, appointment metadata) are
/// mutated only through [`crate::operations::RoleOperations`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Devotee {
    pub id: DevoteeId,
    pub legal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiated_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namahatta_id: Option<NamahattaId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leadership_role: Option<LeadershipRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporting_to_devotee_id: Option<DevoteeId>,
    pub has_system_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointed_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointed_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Devotee {
    /// Preferred display name: initiated name when present, legal name otherwise.
    pub fn display_name(&self) -> &str {
        self.initiated_name.as_deref().unwrap_or(&self.legal_name)
    }
}

/// Listing row for supervisor pickers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevoteeSummary {
    pub id: DevoteeId,
    pub legal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiated_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leadership_role: Option<LeadershipRole>,
    pub district_code: String,
}

/// Append-only audit row, written exactly once per successful mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeRecord {
    pub id: RecordId,
    pub devotee_id: DevoteeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_role: Option<LeadershipRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_role: Option<LeadershipRole>,
    pub change_type: ChangeType,
    pub reason: String,
    pub changed_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_devotee_id: Option<DevoteeId>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub page: u32,
    pub limit: u32,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub fn pagination(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(25).clamp(1, 200);
        (page, limit)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSupervisorsQuery {
    /// Comma-separated devotee ids to leave out of the listing.
    pub exclude: Option<String>,
}

impl AvailableSupervisorsQuery {
    pub fn excluded_ids(&self) -> Result<Vec<DevoteeId>> {
        let Some(raw) = self.exclude.as_deref() else {
            return Ok(Vec::new());
        };

        let mut ids = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let id = DevoteeId::from_str(part).map_err(|_| {
                LibError::invalid(
                    "Invalid devotee id in exclude list",
                    anyhow!("unparseable exclude entry '{}'", part),
                )
            })?;
            ids.push(id);
        }
        Ok(ids)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRolePayload {
    pub devotee_id: DevoteeId,
    pub target_role: LeadershipRole,
    pub new_reporting_to: Option<DevoteeId>,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoteRolePayload {
    pub devotee_id: DevoteeId,
    pub target_role: Option<LeadershipRole>,
    pub new_reporting_to: Option<DevoteeId>,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceRolePayload {
    pub devotee_being_promoted_id: DevoteeId,
    pub senapoti_being_replaced_id: DevoteeId,
    pub replacement_reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRolePayload {
    pub devotee_id: DevoteeId,
    pub successor_id: Option<DevoteeId>,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSubordinatesPayload {
    pub from_devotee_id: DevoteeId,
    pub to_devotee_id: Option<DevoteeId>,
    pub subordinate_ids: Vec<DevoteeId>,
    pub reason: String,
    pub district_code: Option<String>,
}

/// One occupant/candidate pair for bulk validation.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangePair {
    pub current_occupant_id: DevoteeId,
    pub candidate_id: DevoteeId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkValidatePayload {
    pub changes: Vec<RoleChangePair>,
}

#[derive(Debug, Clone)]
pub struct PromoteCommand {
    pub devotee_id: DevoteeId,
    pub target_role: LeadershipRole,
    pub new_reporting_to: Option<DevoteeId>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct DemoteCommand {
    pub devotee_id: DevoteeId,
    pub target_role: Option<LeadershipRole>,
    pub new_reporting_to: Option<DevoteeId>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ReplaceCommand {
    pub candidate_id: DevoteeId,
    pub occupant_id: DevoteeId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RemoveCommand {
    pub devotee_id: DevoteeId,
    pub successor_id: Option<DevoteeId>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub from_devotee_id: DevoteeId,
    pub to_devotee_id: Option<DevoteeId>,
    pub subordinate_ids: Vec<DevoteeId>,
    pub reason: String,
    pub district_code: Option<String>,
}

impl PromoteRolePayload {
    pub fn normalize(self) -> Result<PromoteCommand> {
        let reason = normalize_reason(self.reason)?;
        if self.new_reporting_to == Some(self.devotee_id) {
            return Err(LibError::invalid(
                "A devotee cannot report to themselves",
                anyhow!("promote {} with self as supervisor", self.devotee_id),
            ));
        }

        Ok(PromoteCommand {
            devotee_id: self.devotee_id,
            target_role: self.target_role,
            new_reporting_to: self.new_reporting_to,
            reason,
        })
    }
}

impl DemoteRolePayload {
    pub fn normalize(self) -> Result<DemoteCommand> {
        let reason = normalize_reason(self.reason)?;
        if self.target_role.is_none() && self.new_reporting_to.is_some() {
            // Forest invariant: no reporting link without a role.
            return Err(LibError::invalid(
                "A devotee without a leadership role cannot have a supervisor",
                anyhow!(
                    "demote {} clears the role but keeps a reporting target",
                    self.devotee_id
                ),
            ));
        }
        if self.new_reporting_to == Some(self.devotee_id) {
            return Err(LibError::invalid(
                "A devotee cannot report to themselves",
                anyhow!("demote {} with self as supervisor", self.devotee_id),
            ));
        }

        Ok(DemoteCommand {
            devotee_id: self.devotee_id,
            target_role: self.target_role,
            new_reporting_to: self.new_reporting_to,
            reason,
        })
    }
}

impl ReplaceRolePayload {
    pub fn normalize(self) -> Result<ReplaceCommand> {
        let reason = normalize_reason(self.replacement_reason)?;
        if self.devotee_being_promoted_id == self.senapoti_being_replaced_id {
            return Err(LibError::invalid(
                "A devotee cannot replace themselves",
                anyhow!(
                    "replacement pair collapsed to a single devotee {}",
                    self.devotee_being_promoted_id
                ),
            ));
        }

        Ok(ReplaceCommand {
            candidate_id: self.devotee_being_promoted_id,
            occupant_id: self.senapoti_being_replaced_id,
            reason,
        })
    }
}

impl RemoveRolePayload {
    pub fn normalize(self) -> Result<RemoveCommand> {
        let reason = normalize_reason(self.reason)?;
        if self.successor_id == Some(self.devotee_id) {
            return Err(LibError::invalid(
                "The removed devotee cannot be their own successor",
                anyhow!("remove {} with self as successor", self.devotee_id),
            ));
        }

        Ok(RemoveCommand {
            devotee_id: self.devotee_id,
            successor_id: self.successor_id,
            reason,
        })
    }
}

impl TransferSubordinatesPayload {
    pub fn normalize(self) -> Result<TransferCommand> {
        let reason = normalize_reason(self.reason)?;
        if self.to_devotee_id == Some(self.from_devotee_id) {
            return Err(LibError::invalid(
                "Subordinates already report to this devotee",
                anyhow!("transfer from and to the same devotee {}", self.from_devotee_id),
            ));
        }

        let mut seen = HashSet::with_capacity(self.subordinate_ids.len());
        let mut subordinate_ids = Vec::with_capacity(self.subordinate_ids.len());
        for id in self.subordinate_ids {
            if id == self.from_devotee_id || Some(id) == self.to_devotee_id {
                return Err(LibError::invalid(
                    "Subordinate list cannot include the devotees being transferred between",
                    anyhow!("subordinate list contains endpoint {}", id),
                ));
            }
            if seen.insert(id) {
                subordinate_ids.push(id);
            }
        }

        if subordinate_ids.is_empty() {
            // Callers must check subordinateTransferNeeded first; an empty
            // transfer is a caller error, not a no-op.
            return Err(LibError::invalid(
                "At least one subordinate is required for a transfer",
                anyhow!("empty subordinate list for {}", self.from_devotee_id),
            ));
        }

        let district_code = match self.district_code {
            Some(code) => {
                let code = code.trim().to_string();
                if code.is_empty() { None } else { Some(code) }
            }
            None => None,
        };

        Ok(TransferCommand {
            from_devotee_id: self.from_devotee_id,
            to_devotee_id: self.to_devotee_id,
            subordinate_ids,
            reason,
            district_code,
        })
    }
}

fn normalize_reason(reason: String) -> Result<String> {
    let reason = reason.trim().to_string();
    let chars = reason.chars().count();
    if !(REASON_MIN_CHARS..=REASON_MAX_CHARS).contains(&chars) {
        return Err(LibError::invalid_with_code(
            "invalid_reason",
            "Reason must be between 3 and 500 characters",
            anyhow!("reason length {} outside accepted range", chars),
        ));
    }
    Ok(reason)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::hierarchy::LeadershipRole;

    fn payload(reason: &str) -> RemoveRolePayload {
        RemoveRolePayload {
            devotee_id: DevoteeId(Uuid::new_v4()),
            successor_id: None,
            reason: reason.to_string(),
        }
    }

    #[test]
    fn reason_shorter_than_three_chars_is_rejected() {
        let err = payload("ok").normalize().expect_err("short reason should fail");
        assert_eq!(err.code, "invalid_reason");
    }

    #[test]
    fn reason_of_exactly_three_chars_is_accepted() {
        let command = payload(" oky ").normalize().expect("trimmed reason should pass");
        assert_eq!(command.reason, "oky");
    }

    #[test]
    fn reason_longer_than_five_hundred_chars_is_rejected() {
        let err = payload(&"x".repeat(501))
            .normalize()
            .expect_err("long reason should fail");
        assert_eq!(err.code, "invalid_reason");
    }

    #[test]
    fn demote_to_no_role_cannot_keep_a_supervisor() {
        let err = DemoteRolePayload {
            devotee_id: DevoteeId(Uuid::new_v4()),
            target_role: None,
            new_reporting_to: Some(DevoteeId(Uuid::new_v4())),
            reason: "stepping down".to_string(),
        }
        .normalize()
        .expect_err("role-less devotee with supervisor should fail");
        assert_eq!(err.public, "A devotee without a leadership role cannot have a supervisor");
    }

    #[test]
    fn demote_to_lower_rank_keeps_supervisor() {
        let command = DemoteRolePayload {
            devotee_id: DevoteeId(Uuid::new_v4()),
            target_role: Some(LeadershipRole::UpaChakraSenapoti),
            new_reporting_to: Some(DevoteeId(Uuid::new_v4())),
            reason: "restructure".to_string(),
        }
        .normalize()
        .expect("demotion to lower rank should normalize");
        assert_eq!(command.target_role, Some(LeadershipRole::UpaChakraSenapoti));
    }

    #[test]
    fn replace_rejects_identical_pair() {
        let id = DevoteeId(Uuid::new_v4());
        let err = ReplaceRolePayload {
            devotee_being_promoted_id: id,
            senapoti_being_replaced_id: id,
            replacement_reason: "succession".to_string(),
        }
        .normalize()
        .expect_err("self-replacement should fail");
        assert_eq!(err.public, "A devotee cannot replace themselves");
    }

    #[test]
    fn transfer_requires_at_least_one_subordinate() {
        let err = TransferSubordinatesPayload {
            from_devotee_id: DevoteeId(Uuid::new_v4()),
            to_devotee_id: None,
            subordinate_ids: vec![],
            reason: "handover".to_string(),
            district_code: None,
        }
        .normalize()
        .expect_err("empty subordinate list should fail");
        assert_eq!(err.public, "At least one subordinate is required for a transfer");
    }

    #[test]
    fn transfer_deduplicates_subordinates_and_rejects_endpoints() {
        let from = DevoteeId(Uuid::new_v4());
        let to = DevoteeId(Uuid::new_v4());
        let sub = DevoteeId(Uuid::new_v4());

        let command = TransferSubordinatesPayload {
            from_devotee_id: from,
            to_devotee_id: Some(to),
            subordinate_ids: vec![sub, sub],
            reason: "handover".to_string(),
            district_code: Some("  NADIA ".to_string()),
        }
        .normalize()
        .expect("deduplicated transfer should normalize");
        assert_eq!(command.subordinate_ids, vec![sub]);
        assert_eq!(command.district_code.as_deref(), Some("NADIA"));

        let err = TransferSubordinatesPayload {
            from_devotee_id: from,
            to_devotee_id: Some(to),
            subordinate_ids: vec![to],
            reason: "handover".to_string(),
            district_code: None,
        }
        .normalize()
        .expect_err("successor listed as subordinate should fail");
        assert_eq!(
            err.public,
            "Subordinate list cannot include the devotees being transferred between"
        );
    }

    #[test]
    fn validation_report_blocks_only_on_errors() {
        let report = ValidationReport::from_issues(vec![ValidationIssue::warning(
            "replacement",
            "Replacing A with B",
        )]);
        assert!(report.is_valid);
        assert!(report.can_proceed);

        let report = ValidationReport::from_issues(vec![
            ValidationIssue::warning("replacement", "Replacing A with B"),
            ValidationIssue::error("candidateId", "Candidate already holds a role"),
        ]);
        assert!(!report.is_valid);
        assert_eq!(report.blocking_issues().len(), 1);
    }

    #[test]
    fn history_pagination_clamps() {
        let query = HistoryQuery {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(query.pagination(), (1, 200));
        let query = HistoryQuery { page: None, limit: None };
        assert_eq!(query.pagination(), (1, 25));
    }

    #[test]
    fn exclude_list_parses_and_rejects_garbage() {
        let id = Uuid::new_v4();
        let query = AvailableSupervisorsQuery {
            exclude: Some(format!(" {id} ,, ")),
        };
        assert_eq!(
            query.excluded_ids().expect("well-formed list should parse"),
            vec![DevoteeId(id)]
        );

        let query = AvailableSupervisorsQuery {
            exclude: Some("not-a-uuid".to_string()),
        };
        let err = query.excluded_ids().expect_err("garbage entry should fail");
        assert_eq!(err.public, "Invalid devotee id in exclude list");
    }
}

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::algorithms::{self, SubordinateTransferCheck};
use crate::db::{self, NewRoleChangeRecord, RoleFieldsUpdate};
use crate::error::{LibError, Result};
use crate::hierarchy::{ChangeType, LeadershipRole};
use crate::invariants::{
    self, BulkValidationReport, PromotionContext, ReplacementContext, ensure_can_proceed,
};
use crate::models::{
    BulkValidatePayload, DemoteRolePayload, Devotee, DevoteeId, DevoteeSummary, HistoryQuery,
    Paged, PromoteRolePayload, RemoveRolePayload, ReplaceRolePayload, RoleChangeRecord,
    TransferSubordinatesPayload, UserId, ValidationIssue, ValidationReport,
};

/// High-level role-mutation actions for embedding hosts.
///
/// Callers must provide a trusted `actor` sourced from validated auth/session
/// state, not from request bodies.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum RoleOperation {
    Promote {
        payload: PromoteRolePayload,
    },
    Demote {
        payload: DemoteRolePayload,
    },
    Replace {
        payload: ReplaceRolePayload,
    },
    Remove {
        payload: RemoveRolePayload,
    },
    TransferSubordinates {
        payload: TransferSubordinatesPayload,
    },
    ValidateReplacement {
        current_occupant_id: DevoteeId,
        candidate_id: DevoteeId,
    },
    ValidateBulk {
        payload: BulkValidatePayload,
    },
    AvailableSupervisors {
        district_code: String,
        target_role: LeadershipRole,
        #[serde(default)]
        exclude: Vec<DevoteeId>,
    },
    Subordinates {
        devotee_id: DevoteeId,
    },
    AllSubordinates {
        devotee_id: DevoteeId,
    },
    History {
        devotee_id: DevoteeId,
        query: HistoryQuery,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeOutcome {
    pub devotee: Devotee,
    pub subordinates_transferred: u64,
    pub role_change_record: RoleChangeRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutcome {
    pub message: String,
    pub transferred: u64,
    pub subordinates: Vec<Devotee>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub transferred: u64,
    pub subordinates: Vec<Devotee>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RoleOperationResult {
    RoleChanged {
        outcome: RoleChangeOutcome,
    },
    Replaced {
        outcome: ReplaceOutcome,
    },
    Transferred {
        outcome: TransferOutcome,
    },
    Validation {
        report: ValidationReport,
    },
    BulkValidation {
        report: BulkValidationReport,
    },
    Supervisors {
        items: Vec<DevoteeSummary>,
    },
    Subordinates {
        items: Vec<Devotee>,
    },
    HistoryPage {
        page: u32,
        limit: u32,
        items: Vec<RoleChangeRecord>,
    },
}

#[derive(Clone)]
pub struct RoleOperations {
    pool: Arc<PgPool>,
}

impl RoleOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn from_pool(pool: &PgPool) -> Self {
        Self {
            pool: Arc::new(pool.clone()),
        }
    }

    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    pub async fn execute(
        &self,
        actor: UserId,
        operation: RoleOperation,
    ) -> Result<RoleOperationResult> {
        match operation {
            RoleOperation::Promote { payload } => {
                let outcome = self.promote(actor, payload).await?;
                Ok(RoleOperationResult::RoleChanged { outcome })
            }
            RoleOperation::Demote { payload } => {
                let outcome = self.demote(actor, payload).await?;
                Ok(RoleOperationResult::RoleChanged { outcome })
            }
            RoleOperation::Replace { payload } => {
                let outcome = self.replace(actor, payload).await?;
                Ok(RoleOperationResult::Replaced { outcome })
            }
            RoleOperation::Remove { payload } => {
                let outcome = self.remove(actor, payload).await?;
                Ok(RoleOperationResult::RoleChanged { outcome })
            }
            RoleOperation::TransferSubordinates { payload } => {
                let outcome = self.transfer_subordinates(actor, payload).await?;
                Ok(RoleOperationResult::Transferred { outcome })
            }
            RoleOperation::ValidateReplacement {
                current_occupant_id,
                candidate_id,
            } => {
                let report = self
                    .validate_replacement(current_occupant_id, candidate_id)
                    .await?;
                Ok(RoleOperationResult::Validation { report })
            }
            RoleOperation::ValidateBulk { payload } => {
                let report = self.validate_bulk(payload).await?;
                Ok(RoleOperationResult::BulkValidation { report })
            }
            RoleOperation::AvailableSupervisors {
                district_code,
                target_role,
                exclude,
            } => {
                let items = self
                    .available_supervisors(&district_code, target_role, &exclude)
                    .await?;
                Ok(RoleOperationResult::Supervisors { items })
            }
            RoleOperation::Subordinates { devotee_id } => {
                let items = self.direct_subordinates(devotee_id).await?;
                Ok(RoleOperationResult::Subordinates { items })
            }
            RoleOperation::AllSubordinates { devotee_id } => {
                let items = self.all_subordinates(devotee_id).await?;
                Ok(RoleOperationResult::Subordinates { items })
            }
            RoleOperation::History { devotee_id, query } => {
                let page = self.history(devotee_id, query).await?;
                Ok(RoleOperationResult::HistoryPage {
                    page: page.page,
                    limit: page.limit,
                    items: page.items,
                })
            }
        }
    }

    async fn load_replacement_context(
        &self,
        occupant_id: DevoteeId,
        candidate_id: DevoteeId,
    ) -> Result<ReplacementContext> {
        let occupant = db::get_devotee(&self.pool, occupant_id).await?;
        let candidate = db::get_devotee(&self.pool, candidate_id).await?;

        let occupant_district = if occupant.is_some() {
            db::resolve_district(&self.pool, occupant_id).await?
        } else {
            None
        };
        let candidate_district = if candidate.is_some() {
            db::resolve_district(&self.pool, candidate_id).await?
        } else {
            None
        };

        let occupant_upward_chain = if occupant.is_some() {
            let slice = db::load_upward_slice(&self.pool, occupant_id).await?;
            algorithms::reporting_chain(occupant_id, &slice)
        } else {
            Vec::new()
        };

        Ok(ReplacementContext {
            occupant_id,
            candidate_id,
            occupant,
            candidate,
            occupant_district,
            candidate_district,
            occupant_upward_chain,
        })
    }

    /// Rejects a reporting target that would loop, using the stored upward
    /// slice above the proposed supervisor.
    async fn ensure_no_cycle(
        &self,
        candidate_id: DevoteeId,
        proposed_supervisor: DevoteeId,
        field: &'static str,
    ) -> Result<()> {
        let slice = db::load_upward_slice(&self.pool, proposed_supervisor).await?;
        let check = algorithms::would_create_cycle(candidate_id, proposed_supervisor, &slice);
        if check.is_valid {
            return Ok(());
        }
        let message = check
            .message
            .unwrap_or_else(|| "Circular reporting chain detected".to_string());
        Err(LibError::validation_failed(
            "Role change validation failed",
            vec![ValidationIssue::error(field, message)],
            anyhow!(
                "cycle check rejected supervisor {} for {}",
                proposed_supervisor,
                candidate_id
            ),
        ))
    }

    pub async fn validate_replacement(
        &self,
        occupant_id: DevoteeId,
        candidate_id: DevoteeId,
    ) -> Result<ValidationReport> {
        let ctx = self
            .load_replacement_context(occupant_id, candidate_id)
            .await?;
        Ok(invariants::validate_role_replacement(&ctx))
    }

    /// Validates every pair against pristine stored state. Two pairs touching
    /// the same devotee can both pass here yet conflict once applied; batch
    /// execution and its rollback story stay with the caller.
    pub async fn validate_bulk(&self, payload: BulkValidatePayload) -> Result<BulkValidationReport> {
        let mut contexts = Vec::with_capacity(payload.changes.len());
        for pair in &payload.changes {
            contexts.push(
                self.load_replacement_context(pair.current_occupant_id, pair.candidate_id)
                    .await?,
            );
        }
        Ok(invariants::validate_bulk_role_changes(&contexts))
    }

    pub async fn subordinate_transfer_needed(
        &self,
        devotee_id: DevoteeId,
    ) -> Result<SubordinateTransferCheck> {
        db::subordinate_transfer_needed(&self.pool, devotee_id).await
    }

    pub async fn promote(
        &self,
        actor: UserId,
        payload: PromoteRolePayload,
    ) -> Result<RoleChangeOutcome> {
        let command = payload.normalize()?;

        let candidate = db::get_devotee(&self.pool, command.devotee_id).await?;
        let supervisor = match command.new_reporting_to {
            Some(supervisor_id) => db::get_devotee(&self.pool, supervisor_id).await?,
            None => None,
        };
        let ctx = PromotionContext {
            candidate_id: command.devotee_id,
            candidate,
            supervisor_id: command.new_reporting_to,
            supervisor,
        };
        ensure_can_proceed(invariants::validate_promotion_preconditions(&ctx))?;

        if let Some(supervisor_id) = command.new_reporting_to {
            self.ensure_no_cycle(command.devotee_id, supervisor_id, "newReportingTo")
                .await?;
        }

        let appointed_date = Utc::now().naive_utc();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LibError::database("Failed to start transaction", anyhow!(err)))?;

        db::update_role_fields(
            &mut tx,
            command.devotee_id,
            &RoleFieldsUpdate {
                leadership_role: Some(command.target_role),
                reporting_to_devotee_id: command.new_reporting_to,
                appointed_by: Some(actor),
                appointed_date: Some(appointed_date),
                revoke_system_access: false,
            },
        )
        .await?;

        let record = db::insert_role_change_record(
            &mut tx,
            NewRoleChangeRecord {
                devotee_id: command.devotee_id,
                previous_role: None,
                new_role: Some(command.target_role),
                change_type: ChangeType::Replace,
                reason: command.reason,
                changed_by: actor,
                replacement_devotee_id: None,
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|err| LibError::database("Failed to commit transaction", anyhow!(err)))?;

        tracing::info!(
            devotee = %command.devotee_id,
            role = %command.target_role,
            "promoted devotee"
        );

        let devotee = db::get_devotee_required(&self.pool, command.devotee_id).await?;
        Ok(RoleChangeOutcome {
            devotee,
            subordinates_transferred: 0,
            role_change_record: record,
        })
    }

    pub async fn demote(
        &self,
        actor: UserId,
        payload: DemoteRolePayload,
    ) -> Result<RoleChangeOutcome> {
        let command = payload.normalize()?;

        let occupant = db::get_devotee_required(&self.pool, command.devotee_id).await?;
        let Some(previous_role) = occupant.leadership_role else {
            return Err(LibError::validation_failed(
                "Role change validation failed",
                vec![ValidationIssue::error(
                    "devoteeId",
                    format!("Devotee {} holds no leadership role", command.devotee_id),
                )],
                anyhow!("demote called on role-less devotee {}", command.devotee_id),
            ));
        };

        if let Some(supervisor_id) = command.new_reporting_to {
            db::get_devotee(&self.pool, supervisor_id)
                .await?
                .ok_or_else(|| {
                    LibError::not_found(
                        "Proposed supervisor not found",
                        anyhow!("supervisor {} not found", supervisor_id),
                    )
                })?;
            self.ensure_no_cycle(command.devotee_id, supervisor_id, "newReportingTo")
                .await?;
        }

        // Direct reports move to the occupant's new supervisor, or detach.
        let transfer_check = db::subordinate_transfer_needed(&self.pool, command.devotee_id).await?;
        let subordinate_ids: Vec<DevoteeId> = if transfer_check.needs_transfer {
            db::direct_subordinates(&self.pool, command.devotee_id)
                .await?
                .into_iter()
                .map(|devotee| devotee.id)
                .collect()
        } else {
            Vec::new()
        };

        let appointed_date = Utc::now().naive_utc();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LibError::database("Failed to start transaction", anyhow!(err)))?;

        db::update_role_fields(
            &mut tx,
            command.devotee_id,
            &RoleFieldsUpdate {
                leadership_role: command.target_role,
                reporting_to_devotee_id: command.new_reporting_to,
                appointed_by: command.target_role.map(|_| actor),
                appointed_date: command.target_role.map(|_| appointed_date),
                revoke_system_access: false,
            },
        )
        .await?;

        let mut transferred = 0u64;
        if !subordinate_ids.is_empty() {
            transferred = db::transfer_subordinates(
                &mut tx,
                command.devotee_id,
                command.new_reporting_to,
                &subordinate_ids,
            )
            .await?;
        }

        let record = db::insert_role_change_record(
            &mut tx,
            NewRoleChangeRecord {
                devotee_id: command.devotee_id,
                previous_role: Some(previous_role),
                new_role: command.target_role,
                change_type: ChangeType::Replace,
                reason: command.reason,
                changed_by: actor,
                replacement_devotee_id: None,
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|err| LibError::database("Failed to commit transaction", anyhow!(err)))?;

        tracing::info!(
            devotee = %command.devotee_id,
            previous = %previous_role,
            transferred,
            "demoted devotee"
        );

        let devotee = db::get_devotee_required(&self.pool, command.devotee_id).await?;
        Ok(RoleChangeOutcome {
            devotee,
            subordinates_transferred: transferred,
            role_change_record: record,
        })
    }

    /// The primary promotion-via-replacement flow: the candidate inherits the
    /// occupant's rank, reporting target, and direct reports in one unit.
    pub async fn replace(&self, actor: UserId, payload: ReplaceRolePayload) -> Result<ReplaceOutcome> {
        let command = payload.normalize()?;

        let ctx = self
            .load_replacement_context(command.occupant_id, command.candidate_id)
            .await?;
        ensure_can_proceed(invariants::validate_role_replacement(&ctx))?;

        let occupant = ctx
            .occupant
            .ok_or_else(|| LibError::message("Occupant vanished during validation"))?;
        let candidate = ctx
            .candidate
            .ok_or_else(|| LibError::message("Candidate vanished during validation"))?;
        let vacated_role = occupant
            .leadership_role
            .ok_or_else(|| LibError::message("Occupant role vanished during validation"))?;

        let subordinate_ids: Vec<DevoteeId> =
            db::direct_subordinates(&self.pool, command.occupant_id)
                .await?
                .into_iter()
                .map(|devotee| devotee.id)
                .collect();

        let appointed_date = Utc::now().naive_utc();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LibError::database("Failed to start transaction", anyhow!(err)))?;

        db::update_role_fields(
            &mut tx,
            command.occupant_id,
            &RoleFieldsUpdate {
                leadership_role: None,
                reporting_to_devotee_id: None,
                appointed_by: None,
                appointed_date: None,
                revoke_system_access: false,
            },
        )
        .await?;

        db::update_role_fields(
            &mut tx,
            command.candidate_id,
            &RoleFieldsUpdate {
                leadership_role: Some(vacated_role),
                reporting_to_devotee_id: occupant.reporting_to_devotee_id,
                appointed_by: Some(actor),
                appointed_date: Some(appointed_date),
                revoke_system_access: false,
            },
        )
        .await?;

        let mut transferred = 0u64;
        if !subordinate_ids.is_empty() {
            transferred = db::transfer_subordinates(
                &mut tx,
                command.occupant_id,
                Some(command.candidate_id),
                &subordinate_ids,
            )
            .await?;
        }

        db::insert_role_change_record(
            &mut tx,
            NewRoleChangeRecord {
                devotee_id: command.occupant_id,
                previous_role: Some(vacated_role),
                new_role: None,
                change_type: ChangeType::Replace,
                reason: command.reason,
                changed_by: actor,
                replacement_devotee_id: Some(command.candidate_id),
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|err| LibError::database("Failed to commit transaction", anyhow!(err)))?;

        tracing::info!(
            occupant = %command.occupant_id,
            candidate = %command.candidate_id,
            role = %vacated_role,
            transferred,
            "replaced role occupant"
        );

        let subordinates = db::get_devotees(&self.pool, &subordinate_ids).await?;
        Ok(ReplaceOutcome {
            message: format!(
                "{} replaced {} as {}",
                candidate.display_name(),
                occupant.display_name(),
                vacated_role
            ),
            transferred,
            subordinates,
        })
    }

    pub async fn remove(&self, actor: UserId, payload: RemoveRolePayload) -> Result<RoleChangeOutcome> {
        let command = payload.normalize()?;

        let occupant = db::get_devotee_required(&self.pool, command.devotee_id).await?;
        let Some(previous_role) = occupant.leadership_role else {
            return Err(LibError::validation_failed(
                "Role change validation failed",
                vec![ValidationIssue::error(
                    "devoteeId",
                    format!("Devotee {} holds no leadership role", command.devotee_id),
                )],
                anyhow!("remove called on role-less devotee {}", command.devotee_id),
            ));
        };

        if let Some(successor_id) = command.successor_id {
            db::get_devotee(&self.pool, successor_id)
                .await?
                .ok_or_else(|| {
                    LibError::not_found(
                        "Successor not found",
                        anyhow!("successor {} not found", successor_id),
                    )
                })?;
        }

        let transfer_check = db::subordinate_transfer_needed(&self.pool, command.devotee_id).await?;
        let subordinate_ids: Vec<DevoteeId> = if transfer_check.needs_transfer {
            db::direct_subordinates(&self.pool, command.devotee_id)
                .await?
                .into_iter()
                .map(|devotee| devotee.id)
                .collect()
        } else {
            Vec::new()
        };
        let plan = plan_remove_transfer(&subordinate_ids, command.successor_id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LibError::database("Failed to start transaction", anyhow!(err)))?;

        db::update_role_fields(
            &mut tx,
            command.devotee_id,
            &RoleFieldsUpdate {
                leadership_role: None,
                reporting_to_devotee_id: None,
                appointed_by: None,
                appointed_date: None,
                revoke_system_access: true,
            },
        )
        .await?;

        let mut transferred = 0u64;
        if !plan.to_successor.is_empty() {
            transferred += db::transfer_subordinates(
                &mut tx,
                command.devotee_id,
                command.successor_id,
                &plan.to_successor,
            )
            .await?;
        }
        if !plan.to_detach.is_empty() {
            transferred += db::transfer_subordinates(
                &mut tx,
                command.devotee_id,
                None,
                &plan.to_detach,
            )
            .await?;
        }

        let record = db::insert_role_change_record(
            &mut tx,
            NewRoleChangeRecord {
                devotee_id: command.devotee_id,
                previous_role: Some(previous_role),
                new_role: None,
                change_type: ChangeType::Remove,
                reason: command.reason,
                changed_by: actor,
                replacement_devotee_id: command.successor_id,
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|err| LibError::database("Failed to commit transaction", anyhow!(err)))?;

        tracing::info!(
            devotee = %command.devotee_id,
            previous = %previous_role,
            transferred,
            "removed leadership role"
        );

        let devotee = db::get_devotee_required(&self.pool, command.devotee_id).await?;
        Ok(RoleChangeOutcome {
            devotee,
            subordinates_transferred: transferred,
            role_change_record: record,
        })
    }

    pub async fn transfer_subordinates(
        &self,
        actor: UserId,
        payload: TransferSubordinatesPayload,
    ) -> Result<TransferOutcome> {
        let command = payload.normalize()?;

        db::get_devotee_required(&self.pool, command.from_devotee_id).await?;
        if let Some(to_devotee_id) = command.to_devotee_id {
            db::get_devotee(&self.pool, to_devotee_id)
                .await?
                .ok_or_else(|| {
                    LibError::not_found(
                        "Transfer target not found",
                        anyhow!("transfer target {} not found", to_devotee_id),
                    )
                })?;

            if let Some(district_code) = &command.district_code {
                let target_district = db::resolve_district(&self.pool, to_devotee_id).await?;
                if target_district.as_deref() != Some(district_code.as_str()) {
                    return Err(LibError::validation_failed(
                        "Role change validation failed",
                        vec![ValidationIssue::error(
                            "toDevoteeId",
                            format!(
                                "Transfer target must belong to district {district_code}"
                            ),
                        )],
                        anyhow!(
                            "transfer target {} resolves to {:?}, expected {}",
                            to_devotee_id,
                            target_district,
                            district_code
                        ),
                    ));
                }
            }

            for subordinate_id in &command.subordinate_ids {
                self.ensure_no_cycle(*subordinate_id, to_devotee_id, "toDevoteeId")
                    .await?;
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LibError::database("Failed to start transaction", anyhow!(err)))?;
        let transferred = db::transfer_subordinates(
            &mut tx,
            command.from_devotee_id,
            command.to_devotee_id,
            &command.subordinate_ids,
        )
        .await?;
        tx.commit()
            .await
            .map_err(|err| LibError::database("Failed to commit transaction", anyhow!(err)))?;

        tracing::info!(
            from = %command.from_devotee_id,
            to = ?command.to_devotee_id,
            transferred,
            changed_by = %actor,
            reason = %command.reason,
            "transferred subordinates"
        );

        let subordinates = db::get_devotees(&self.pool, &command.subordinate_ids).await?;
        Ok(TransferOutcome {
            transferred,
            subordinates,
        })
    }

    pub async fn available_supervisors(
        &self,
        district_code: &str,
        target_role: LeadershipRole,
        exclude: &[DevoteeId],
    ) -> Result<Vec<DevoteeSummary>> {
        match target_role.reports_to_rank() {
            crate::hierarchy::SupervisorRank::Role { role } => {
                db::available_supervisors(&self.pool, district_code, role, exclude).await
            }
            // Mala Senapotis answer to the district supervisor, who is not a
            // devotee row; there is nobody to list.
            crate::hierarchy::SupervisorRank::DistrictSupervisor => Ok(Vec::new()),
        }
    }

    pub async fn direct_subordinates(&self, devotee_id: DevoteeId) -> Result<Vec<Devotee>> {
        db::direct_subordinates(&self.pool, devotee_id).await
    }

    pub async fn all_subordinates(&self, devotee_id: DevoteeId) -> Result<Vec<Devotee>> {
        db::all_subordinates(&self.pool, devotee_id).await
    }

    pub async fn history(
        &self,
        devotee_id: DevoteeId,
        query: HistoryQuery,
    ) -> Result<Paged<RoleChangeRecord>> {
        let (page, limit) = query.pagination();
        let items = db::list_role_change_history(&self.pool, devotee_id, page, limit).await?;
        Ok(Paged { page, limit, items })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RemoveTransferPlan {
    to_successor: Vec<DevoteeId>,
    to_detach: Vec<DevoteeId>,
}

/// Splits a removed occupant's direct reports between the successor and a
/// detach list. A successor who is themselves a direct report cannot be
/// re-pointed at themselves; they are detached instead.
fn plan_remove_transfer(
    subordinate_ids: &[DevoteeId],
    successor_id: Option<DevoteeId>,
) -> RemoveTransferPlan {
    match successor_id {
        None => RemoveTransferPlan {
            to_successor: Vec::new(),
            to_detach: subordinate_ids.to_vec(),
        },
        Some(successor_id) => {
            let (to_detach, to_successor): (Vec<DevoteeId>, Vec<DevoteeId>) = subordinate_ids
                .iter()
                .copied()
                .partition(|id| *id == successor_id);
            RemoveTransferPlan {
                to_successor,
                to_detach,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn id(n: u128) -> DevoteeId {
        DevoteeId(Uuid::from_u128(n))
    }

    #[test]
    fn remove_plan_without_successor_detaches_everyone() {
        let subs = vec![id(1), id(2)];
        let plan = plan_remove_transfer(&subs, None);
        assert!(plan.to_successor.is_empty());
        assert_eq!(plan.to_detach, subs);
    }

    #[test]
    fn remove_plan_routes_reports_to_successor() {
        let subs = vec![id(1), id(2)];
        let plan = plan_remove_transfer(&subs, Some(id(9)));
        assert_eq!(plan.to_successor, subs);
        assert!(plan.to_detach.is_empty());
    }

    #[test]
    fn remove_plan_never_points_successor_at_themselves() {
        let successor = id(1);
        let subs = vec![successor, id(2), id(3)];
        let plan = plan_remove_transfer(&subs, Some(successor));
        assert_eq!(plan.to_successor, vec![id(2), id(3)]);
        assert_eq!(plan.to_detach, vec![successor]);
    }

    #[test]
    fn role_operation_deserializes_from_tagged_json() {
        let operation: RoleOperation = serde_json::from_str(
            r#"{
                "operation": "remove",
                "payload": {
                    "devoteeId": "00000000-0000-0000-0000-000000000001",
                    "reason": "stepping down after many years"
                }
            }"#,
        )
        .expect("tagged operation should deserialize");
        assert!(matches!(
            operation,
            RoleOperation::Remove { payload }
                if payload.devotee_id == id(1) && payload.successor_id.is_none()
        ));
    }

    #[test]
    fn available_supervisors_operation_defaults_exclude_list() {
        let operation: RoleOperation = serde_json::from_str(
            r#"{
                "operation": "available_supervisors",
                "district_code": "NADIA",
                "target_role": "CHAKRA_SENAPOTI"
            }"#,
        )
        .expect("operation without exclude should deserialize");
        assert!(matches!(
            operation,
            RoleOperation::AvailableSupervisors { exclude, .. } if exclude.is_empty()
        ));
    }
}

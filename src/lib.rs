pub mod algorithms;
#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod invariants;
pub mod models;
#[cfg(feature = "sqlx")]
pub mod operations;
pub mod permissions;

pub mod prelude {
    pub use crate::algorithms::{
        CycleCheck, SubordinateTransferCheck, SupervisorMap, reporting_chain,
        subordinate_closure, would_create_cycle,
    };
    #[cfg(feature = "api")]
    pub use crate::api::{HasPool, RoleApp};
    #[cfg(feature = "sqlx")]
    pub use crate::db::create_hierarchy_tables;
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::hierarchy::{
        ALL_LEADERSHIP_ROLES, ChangeType, LeadershipRole, SupervisorRank, valid_target_roles,
    };
    pub use crate::invariants::{
        BulkValidationReport, PromotionContext, ReplacementContext,
        validate_bulk_role_changes, validate_promotion_preconditions, validate_role_replacement,
    };
    pub use crate::models::{
        BulkValidatePayload, DemoteRolePayload, Devotee, DevoteeId, DevoteeSummary, HistoryQuery,
        NamahattaId, Paged, PromoteRolePayload, RecordId, RemoveRolePayload, ReplaceRolePayload,
        RoleChangePair, RoleChangeRecord, Severity, TransferSubordinatesPayload, UserId,
        ValidationIssue, ValidationReport,
    };
    #[cfg(feature = "sqlx")]
    pub use crate::operations::{RoleOperation, RoleOperationResult, RoleOperations};
    pub use crate::permissions::ActingUser;
}

use anyhow::anyhow;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::algorithms::{SubordinateTransferCheck, SupervisorMap};
use crate::error::{LibError, Result};
use crate::hierarchy::{ChangeType, LeadershipRole};
use crate::models::{
    Devotee, DevoteeId, DevoteeSummary, NamahattaId, RecordId, RoleChangeRecord, UserId,
};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

pub async fn create_hierarchy_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[derive(Debug, Clone, FromRow)]
struct DevoteeRow {
    id: Uuid,
    legal_name: String,
    initiated_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    namahatta_id: Option<Uuid>,
    leadership_role: Option<String>,
    reporting_to_devotee_id: Option<Uuid>,
    has_system_access: bool,
    appointed_by: Option<Uuid>,
    appointed_date: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
struct SupervisorSummaryRow {
    id: Uuid,
    legal_name: String,
    initiated_name: Option<String>,
    leadership_role: Option<String>,
    district_code: String,
}

#[derive(Debug, Clone, FromRow)]
struct RoleChangeRecordRow {
    id: Uuid,
    devotee_id: Uuid,
    previous_role: Option<String>,
    new_role: Option<String>,
    change_type: String,
    reason: String,
    changed_by: Uuid,
    replacement_devotee_id: Option<Uuid>,
    created_at: NaiveDateTime,
}

const DEVOTEE_COLUMNS: &str = "id, legal_name, initiated_name, email, phone, namahatta_id, \
     leadership_role, reporting_to_devotee_id, has_system_access, appointed_by, \
     appointed_date, created_at, updated_at";

fn parse_stored_role(value: Option<String>, id: Uuid) -> Result<Option<LeadershipRole>> {
    match value {
        None => Ok(None),
        Some(raw) => LeadershipRole::from_db_value(&raw).map(Some).ok_or_else(|| {
            LibError::database(
                "Stored leadership role is invalid",
                anyhow!("unknown leadership role '{}' on row {}", raw, id),
            )
        }),
    }
}

fn hydrate_devotee(row: DevoteeRow) -> Result<Devotee> {
    let leadership_role = parse_stored_role(row.leadership_role, row.id)?;
    Ok(Devotee {
        id: DevoteeId(row.id),
        legal_name: row.legal_name,
        initiated_name: row.initiated_name,
        email: row.email,
        phone: row.phone,
        namahatta_id: row.namahatta_id.map(NamahattaId),
        leadership_role,
        reporting_to_devotee_id: row.reporting_to_devotee_id.map(DevoteeId),
        has_system_access: row.has_system_access,
        appointed_by: row.appointed_by.map(UserId),
        appointed_date: row.appointed_date,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn hydrate_record(row: RoleChangeRecordRow) -> Result<RoleChangeRecord> {
    let change_type = ChangeType::from_db_value(&row.change_type).ok_or_else(|| {
        LibError::database(
            "Stored change type is invalid",
            anyhow!("unknown change type '{}' on record {}", row.change_type, row.id),
        )
    })?;
    Ok(RoleChangeRecord {
        id: RecordId(row.id),
        devotee_id: DevoteeId(row.devotee_id),
        previous_role: parse_stored_role(row.previous_role, row.id)?,
        new_role: parse_stored_role(row.new_role, row.id)?,
        change_type,
        reason: row.reason,
        changed_by: UserId(row.changed_by),
        replacement_devotee_id: row.replacement_devotee_id.map(DevoteeId),
        created_at: row.created_at,
    })
}

fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::database(public, anyhow!(err))
}

pub async fn get_devotee(pool: &PgPool, devotee_id: DevoteeId) -> Result<Option<Devotee>> {
    let row = sqlx::query_as::<_, DevoteeRow>(&format!(
        r#"
        SELECT {DEVOTEE_COLUMNS}
        FROM hierarchy.devotees
        WHERE id = $1
        "#
    ))
    .bind(devotee_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query devotee", err))?;

    row.map(hydrate_devotee).transpose()
}

pub async fn get_devotees(pool: &PgPool, devotee_ids: &[DevoteeId]) -> Result<Vec<Devotee>> {
    let ids: Vec<Uuid> = devotee_ids.iter().map(|id| id.0).collect();
    let rows = sqlx::query_as::<_, DevoteeRow>(&format!(
        r#"
        SELECT {DEVOTEE_COLUMNS}
        FROM hierarchy.devotees
        WHERE id = ANY($1)
        ORDER BY legal_name ASC, id ASC
        "#
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to query devotees", err))?;

    rows.into_iter().map(hydrate_devotee).collect()
}

pub async fn get_devotee_required(pool: &PgPool, devotee_id: DevoteeId) -> Result<Devotee> {
    get_devotee(pool, devotee_id).await?.ok_or_else(|| {
        LibError::not_found(
            "Devotee not found",
            anyhow!("devotee {} not found", devotee_id),
        )
    })
}

/// District of the devotee's affiliated local center, when one resolves.
pub async fn resolve_district(pool: &PgPool, devotee_id: DevoteeId) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT n.district_code
        FROM hierarchy.devotees d
        JOIN hierarchy.namahattas n
        ON n.id = d.namahatta_id
        WHERE d.id = $1
        "#,
    )
    .bind(devotee_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to resolve district", err))?;

    Ok(row.map(|(district,)| district))
}

/// Supervisor links reachable upward from `start`, as a snapshot map for the
/// pure cycle checker. The path guard keeps malformed stored cycles finite.
pub async fn load_upward_slice(pool: &PgPool, start: DevoteeId) -> Result<SupervisorMap> {
    let rows: Vec<(Uuid, Option<Uuid>)> = sqlx::query_as(
        r#"
        WITH RECURSIVE chain AS (
            SELECT d.id, d.reporting_to_devotee_id, ARRAY[d.id] AS path
            FROM hierarchy.devotees d
            WHERE d.id = $1
            UNION ALL
            SELECT d.id, d.reporting_to_devotee_id, chain.path || d.id
            FROM hierarchy.devotees d
            JOIN chain ON d.id = chain.reporting_to_devotee_id
            WHERE NOT d.id = ANY(chain.path)
        )
        SELECT id, reporting_to_devotee_id FROM chain
        "#,
    )
    .bind(start.0)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to load reporting chain", err))?;

    Ok(rows
        .into_iter()
        .map(|(id, supervisor)| (DevoteeId(id), supervisor.map(DevoteeId)))
        .collect())
}

pub async fn direct_subordinates(pool: &PgPool, of: DevoteeId) -> Result<Vec<Devotee>> {
    let rows = sqlx::query_as::<_, DevoteeRow>(&format!(
        r#"
        SELECT {DEVOTEE_COLUMNS}
        FROM hierarchy.devotees
        WHERE reporting_to_devotee_id = $1
        ORDER BY legal_name ASC, id ASC
        "#
    ))
    .bind(of.0)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to query subordinates", err))?;

    rows.into_iter().map(hydrate_devotee).collect()
}

/// The full subtree below `of`, breadth irrelevant, path-guarded against
/// malformed stored cycles.
pub async fn all_subordinates(pool: &PgPool, of: DevoteeId) -> Result<Vec<Devotee>> {
    let rows = sqlx::query_as::<_, DevoteeRow>(
        r#"
        WITH RECURSIVE subs AS (
            SELECT d.id, d.legal_name, d.initiated_name, d.email, d.phone,
                   d.namahatta_id, d.leadership_role, d.reporting_to_devotee_id,
                   d.has_system_access, d.appointed_by, d.appointed_date,
                   d.created_at, d.updated_at,
                   ARRAY[$1::uuid, d.id] AS path
            FROM hierarchy.devotees d
            WHERE d.reporting_to_devotee_id = $1
            UNION ALL
            SELECT d.id, d.legal_name, d.initiated_name, d.email, d.phone,
                   d.namahatta_id, d.leadership_role, d.reporting_to_devotee_id,
                   d.has_system_access, d.appointed_by, d.appointed_date,
                   d.created_at, d.updated_at,
                   subs.path || d.id
            FROM hierarchy.devotees d
            JOIN subs ON d.reporting_to_devotee_id = subs.id
            WHERE NOT d.id = ANY(subs.path)
        )
        SELECT id, legal_name, initiated_name, email, phone, namahatta_id,
               leadership_role, reporting_to_devotee_id, has_system_access,
               appointed_by, appointed_date, created_at, updated_at
        FROM subs
        ORDER BY legal_name ASC, id ASC
        "#,
    )
    .bind(of.0)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to query subordinate closure", err))?;

    rows.into_iter().map(hydrate_devotee).collect()
}

pub async fn subordinate_transfer_needed(
    pool: &PgPool,
    of: DevoteeId,
) -> Result<SubordinateTransferCheck> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)::bigint
        FROM hierarchy.devotees
        WHERE reporting_to_devotee_id = $1
        "#,
    )
    .bind(of.0)
    .fetch_one(pool)
    .await
    .map_err(|err| db_err("Failed to count subordinates", err))?;

    Ok(SubordinateTransferCheck {
        needs_transfer: count > 0,
        subordinate_count: count as u64,
    })
}

pub async fn available_supervisors(
    pool: &PgPool,
    district_code: &str,
    rank: LeadershipRole,
    exclude: &[DevoteeId],
) -> Result<Vec<DevoteeSummary>> {
    let excluded: Vec<Uuid> = exclude.iter().map(|id| id.0).collect();
    let rows = sqlx::query_as::<_, SupervisorSummaryRow>(
        r#"
        SELECT d.id, d.legal_name, d.initiated_name, d.leadership_role, n.district_code
        FROM hierarchy.devotees d
        JOIN hierarchy.namahattas n
        ON n.id = d.namahatta_id
        WHERE d.leadership_role = $1
          AND n.district_code = $2
          AND NOT (d.id = ANY($3))
        ORDER BY d.legal_name ASC, d.id ASC
        "#,
    )
    .bind(rank.as_db_value())
    .bind(district_code)
    .bind(&excluded)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list available supervisors", err))?;

    rows.into_iter()
        .map(|row| {
            let leadership_role = parse_stored_role(row.leadership_role, row.id)?;
            Ok(DevoteeSummary {
                id: DevoteeId(row.id),
                legal_name: row.legal_name,
                initiated_name: row.initiated_name,
                leadership_role,
                district_code: row.district_code,
            })
        })
        .collect()
}

pub async fn list_role_change_history(
    pool: &PgPool,
    devotee_id: DevoteeId,
    page: u32,
    limit: u32,
) -> Result<Vec<RoleChangeRecord>> {
    let offset = (page.saturating_sub(1) as i64).saturating_mul(limit as i64);
    let rows = sqlx::query_as::<_, RoleChangeRecordRow>(
        r#"
        SELECT id, devotee_id, previous_role, new_role, change_type, reason,
               changed_by, replacement_devotee_id, created_at
        FROM hierarchy.role_change_records
        WHERE devotee_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(devotee_id.0)
    .bind(limit as i64)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list role change history", err))?;

    rows.into_iter().map(hydrate_record).collect()
}

/// Role-field write applied inside an orchestrated mutation's transaction.
#[derive(Debug, Clone)]
pub struct RoleFieldsUpdate {
    pub leadership_role: Option<LeadershipRole>,
    pub reporting_to_devotee_id: Option<DevoteeId>,
    pub appointed_by: Option<UserId>,
    pub appointed_date: Option<NaiveDateTime>,
    pub revoke_system_access: bool,
}

pub async fn update_role_fields(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    devotee_id: DevoteeId,
    update: &RoleFieldsUpdate,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE hierarchy.devotees
        SET leadership_role = $1,
            reporting_to_devotee_id = $2,
            appointed_by = $3,
            appointed_date = $4,
            has_system_access = CASE WHEN $5 THEN FALSE ELSE has_system_access END,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $6
        "#,
    )
    .bind(update.leadership_role.map(LeadershipRole::as_db_value))
    .bind(update.reporting_to_devotee_id.map(|id| id.0))
    .bind(update.appointed_by.map(|id| id.0))
    .bind(update.appointed_date)
    .bind(update.revoke_system_access)
    .bind(devotee_id.0)
    .execute(&mut **tx)
    .await
    .map_err(|err| db_err("Failed to update role fields", err))?;

    if result.rows_affected() != 1 {
        return Err(LibError::not_found(
            "Devotee not found",
            anyhow!("role update matched no row for {}", devotee_id),
        ));
    }
    Ok(())
}

/// Re-points every listed subordinate from `from` to `to` (NULL detaches).
/// The row-count check rejects stale subordinate lists: each id must still
/// report to `from` at write time.
pub async fn transfer_subordinates(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    from: DevoteeId,
    to: Option<DevoteeId>,
    subordinate_ids: &[DevoteeId],
) -> Result<u64> {
    let ids: Vec<Uuid> = subordinate_ids.iter().map(|id| id.0).collect();
    let result = sqlx::query(
        r#"
        UPDATE hierarchy.devotees
        SET reporting_to_devotee_id = $1,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ANY($2)
          AND reporting_to_devotee_id = $3
        "#,
    )
    .bind(to.map(|id| id.0))
    .bind(&ids)
    .bind(from.0)
    .execute(&mut **tx)
    .await
    .map_err(|err| db_err("Failed to transfer subordinates", err))?;

    let transferred = result.rows_affected();
    if transferred != subordinate_ids.len() as u64 {
        return Err(LibError::invalid(
            "Some listed subordinates no longer report to the departing devotee",
            anyhow!(
                "expected {} subordinate rows for {}, updated {}",
                subordinate_ids.len(),
                from,
                transferred
            ),
        ));
    }
    Ok(transferred)
}

#[derive(Debug, Clone)]
pub struct NewRoleChangeRecord {
    pub devotee_id: DevoteeId,
    pub previous_role: Option<LeadershipRole>,
    pub new_role: Option<LeadershipRole>,
    pub change_type: ChangeType,
    pub reason: String,
    pub changed_by: UserId,
    pub replacement_devotee_id: Option<DevoteeId>,
}

pub async fn insert_role_change_record(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    record: NewRoleChangeRecord,
) -> Result<RoleChangeRecord> {
    let record_id = RecordId(Uuid::new_v4());
    let (created_at,): (NaiveDateTime,) = sqlx::query_as(
        r#"
        INSERT INTO hierarchy.role_change_records (
            id,
            devotee_id,
            previous_role,
            new_role,
            change_type,
            reason,
            changed_by,
            replacement_devotee_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING created_at
        "#,
    )
    .bind(record_id.0)
    .bind(record.devotee_id.0)
    .bind(record.previous_role.map(LeadershipRole::as_db_value))
    .bind(record.new_role.map(LeadershipRole::as_db_value))
    .bind(record.change_type.as_db_value())
    .bind(&record.reason)
    .bind(record.changed_by.0)
    .bind(record.replacement_devotee_id.map(|id| id.0))
    .fetch_one(&mut **tx)
    .await
    .map_err(|err| db_err("Failed to write role change record", err))?;

    Ok(RoleChangeRecord {
        id: record_id,
        devotee_id: record.devotee_id,
        previous_role: record.previous_role,
        new_role: record.new_role,
        change_type: record.change_type,
        reason: record.reason,
        changed_by: record.changed_by,
        replacement_devotee_id: record.replacement_devotee_id,
        created_at,
    })
}

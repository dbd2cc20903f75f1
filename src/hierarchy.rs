use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four fixed leadership ranks. `level` runs from 1 (highest authority)
/// to 4 (lowest); each rank reports to the rank one level up and manages the
/// rank one level down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadershipRole {
    MalaSenapoti,
    MahaChakraSenapoti,
    ChakraSenapoti,
    UpaChakraSenapoti,
}

/// Highest-authority first.
pub const ALL_LEADERSHIP_ROLES: &[LeadershipRole] = &[
    LeadershipRole::MalaSenapoti,
    LeadershipRole::MahaChakraSenapoti,
    LeadershipRole::ChakraSenapoti,
    LeadershipRole::UpaChakraSenapoti,
];

/// The reporting target one level above a rank. Mala Senapotis report to the
/// district supervisor, a role type outside the devotee-indexed hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorRank {
    Role { role: LeadershipRole },
    DistrictSupervisor,
}

impl LeadershipRole {
    pub const fn as_db_value(self) -> &'static str {
        match self {
            LeadershipRole::MalaSenapoti => "MALA_SENAPOTI",
            LeadershipRole::MahaChakraSenapoti => "MAHA_CHAKRA_SENAPOTI",
            LeadershipRole::ChakraSenapoti => "CHAKRA_SENAPOTI",
            LeadershipRole::UpaChakraSenapoti => "UPA_CHAKRA_SENAPOTI",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "MALA_SENAPOTI" => Some(LeadershipRole::MalaSenapoti),
            "MAHA_CHAKRA_SENAPOTI" => Some(LeadershipRole::MahaChakraSenapoti),
            "CHAKRA_SENAPOTI" => Some(LeadershipRole::ChakraSenapoti),
            "UPA_CHAKRA_SENAPOTI" => Some(LeadershipRole::UpaChakraSenapoti),
            _ => None,
        }
    }

    /// 1 = highest authority, 4 = lowest.
    pub const fn level(self) -> u8 {
        match self {
            LeadershipRole::MalaSenapoti => 1,
            LeadershipRole::MahaChakraSenapoti => 2,
            LeadershipRole::ChakraSenapoti => 3,
            LeadershipRole::UpaChakraSenapoti => 4,
        }
    }

    pub const fn reports_to_rank(self) -> SupervisorRank {
        match self {
            LeadershipRole::MalaSenapoti => SupervisorRank::DistrictSupervisor,
            LeadershipRole::MahaChakraSenapoti => SupervisorRank::Role {
                role: LeadershipRole::MalaSenapoti,
            },
            LeadershipRole::ChakraSenapoti => SupervisorRank::Role {
                role: LeadershipRole::MahaChakraSenapoti,
            },
            LeadershipRole::UpaChakraSenapoti => SupervisorRank::Role {
                role: LeadershipRole::ChakraSenapoti,
            },
        }
    }

    /// Ranks directly managed by this one. Empty for the lowest rank.
    pub const fn manages(self) -> &'static [LeadershipRole] {
        match self {
            LeadershipRole::MalaSenapoti => &[LeadershipRole::MahaChakraSenapoti],
            LeadershipRole::MahaChakraSenapoti => &[LeadershipRole::ChakraSenapoti],
            LeadershipRole::ChakraSenapoti => &[LeadershipRole::UpaChakraSenapoti],
            LeadershipRole::UpaChakraSenapoti => &[],
        }
    }
}

impl fmt::Display for LeadershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_value())
    }
}

impl FromStr for LeadershipRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LeadershipRole::from_db_value(s).ok_or_else(|| format!("unknown leadership role '{s}'"))
    }
}

/// Audit classification of a role mutation. Promotions and demotions are
/// replacement-shaped (the record's previous/new role fields carry the rest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Replace,
    Remove,
}

impl ChangeType {
    pub const fn as_db_value(self) -> &'static str {
        match self {
            ChangeType::Replace => "REPLACE",
            ChangeType::Remove => "REMOVE",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "REPLACE" => Some(ChangeType::Replace),
            "REMOVE" => Some(ChangeType::Remove),
            _ => None,
        }
    }
}

/// Ranks a devotee may be assigned for a given change type. Replacement
/// permits lateral moves and promotions across all four ranks, with or
/// without a current rank; removal has no target rank.
pub const fn valid_target_roles(
    change_type: ChangeType,
    _current_role: Option<LeadershipRole>,
) -> &'static [LeadershipRole] {
    match change_type {
        ChangeType::Remove => &[],
        ChangeType::Replace => ALL_LEADERSHIP_ROLES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_authority_order() {
        let mut last = 0u8;
        for role in ALL_LEADERSHIP_ROLES {
            assert!(role.level() > last);
            last = role.level();
        }
    }

    #[test]
    fn reporting_chain_terminates_at_district_supervisor() {
        let mut rank = LeadershipRole::UpaChakraSenapoti;
        let mut hops = 0;
        loop {
            match rank.reports_to_rank() {
                SupervisorRank::Role { role } => {
                    assert_eq!(role.level(), rank.level() - 1);
                    rank = role;
                    hops += 1;
                }
                SupervisorRank::DistrictSupervisor => break,
            }
        }
        assert_eq!(rank, LeadershipRole::MalaSenapoti);
        assert_eq!(hops, 3);
    }

    #[test]
    fn manages_is_inverse_of_reports_to() {
        for role in ALL_LEADERSHIP_ROLES {
            for managed in role.manages() {
                assert_eq!(
                    managed.reports_to_rank(),
                    SupervisorRank::Role { role: *role }
                );
            }
        }
        assert!(LeadershipRole::UpaChakraSenapoti.manages().is_empty());
    }

    #[test]
    fn db_values_round_trip() {
        for role in ALL_LEADERSHIP_ROLES {
            assert_eq!(LeadershipRole::from_db_value(role.as_db_value()), Some(*role));
        }
        assert_eq!(LeadershipRole::from_db_value("SENAPOTI"), None);

        for change in [ChangeType::Replace, ChangeType::Remove] {
            assert_eq!(ChangeType::from_db_value(change.as_db_value()), Some(change));
        }
    }

    #[test]
    fn replace_targets_cover_all_ranks_remove_has_none() {
        assert_eq!(
            valid_target_roles(ChangeType::Replace, None),
            ALL_LEADERSHIP_ROLES
        );
        assert_eq!(
            valid_target_roles(ChangeType::Replace, Some(LeadershipRole::ChakraSenapoti)),
            ALL_LEADERSHIP_ROLES
        );
        assert!(valid_target_roles(ChangeType::Remove, Some(LeadershipRole::MalaSenapoti)).is_empty());
    }

    #[test]
    fn serde_uses_screaming_snake_values() {
        let json = serde_json::to_string(&LeadershipRole::MahaChakraSenapoti)
            .expect("role should serialize");
        assert_eq!(json, "\"MAHA_CHAKRA_SENAPOTI\"");
        let parsed: LeadershipRole =
            serde_json::from_str("\"UPA_CHAKRA_SENAPOTI\"").expect("role should deserialize");
        assert_eq!(parsed, LeadershipRole::UpaChakraSenapoti);
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// ContractStatus is the workflow state of a contract.
///
/// Statuses are persisted as plain text, so parsing is fallible: rows created
/// before the current state set existed carry strings this enum does not know.
/// Such rows are allowed to transition anywhere (see [`check_transition`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    Proposed,
    Approved,
    Rejected,
    Published,
    Archived,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Proposed => "proposed",
            ContractStatus::Approved => "approved",
            ContractStatus::Rejected => "rejected",
            ContractStatus::Published => "published",
            ContractStatus::Archived => "archived",
        }
    }

    /// Parses a status string. "under_review" is a backward-compatible synonym
    /// of "proposed".
    pub fn parse(s: &str) -> Option<ContractStatus> {
        match s {
            "draft" => Some(ContractStatus::Draft),
            "proposed" | "under_review" => Some(ContractStatus::Proposed),
            "approved" => Some(ContractStatus::Approved),
            "rejected" => Some(ContractStatus::Rejected),
            "published" => Some(ContractStatus::Published),
            "archived" => Some(ContractStatus::Archived),
            _ => None,
        }
    }

    /// The states this status may move to.
    pub fn successors(self) -> &'static [ContractStatus] {
        match self {
            ContractStatus::Draft => &[ContractStatus::Proposed],
            ContractStatus::Proposed => &[ContractStatus::Approved, ContractStatus::Rejected],
            ContractStatus::Approved => &[ContractStatus::Published],
            ContractStatus::Published => &[ContractStatus::Archived],
            ContractStatus::Rejected => &[ContractStatus::Draft],
            ContractStatus::Archived => &[],
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejects transitions not present in the table, naming the illegal pair.
///
/// A current status that does not parse at all permits any transition; states
/// predating the table must stay workable.
pub fn check_transition(from: &str, to: ContractStatus) -> Result<()> {
    let Some(current) = ContractStatus::parse(from) else {
        return Ok(());
    };
    if current.successors().contains(&to) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "illegal status transition from '{from}' to '{to}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_review_is_proposed() {
        assert_eq!(
            ContractStatus::parse("under_review"),
            Some(ContractStatus::Proposed)
        );
    }

    #[test]
    fn test_legal_transitions() {
        assert!(check_transition("draft", ContractStatus::Proposed).is_ok());
        assert!(check_transition("proposed", ContractStatus::Approved).is_ok());
        assert!(check_transition("proposed", ContractStatus::Rejected).is_ok());
        assert!(check_transition("approved", ContractStatus::Published).is_ok());
        assert!(check_transition("published", ContractStatus::Archived).is_ok());
        assert!(check_transition("rejected", ContractStatus::Draft).is_ok());
    }

    #[test]
    fn test_illegal_transitions_name_the_pair() {
        let err = check_transition("draft", ContractStatus::Approved).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("draft"), "{msg}");
        assert!(msg.contains("approved"), "{msg}");

        assert!(check_transition("archived", ContractStatus::Draft).is_err());
        assert!(check_transition("published", ContractStatus::Draft).is_err());
    }

    #[test]
    fn test_unknown_status_permits_anything() {
        assert!(check_transition("experimental", ContractStatus::Archived).is_ok());
        assert!(check_transition("", ContractStatus::Draft).is_ok());
    }
}

//! Admin review of doctor profiles.

use serde::Deserialize;

use super::models::DoctorStatus;
use crate::error::AppError;

/// Decisions on the pending-applications screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// Actions on the manage-doctors screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManageAction {
    Activate,
    Deactivate,
    Delete,
}

/// Only pending applications can be decided; anything else is treated as
/// not found.
pub fn review(current: DoctorStatus, action: ReviewAction) -> Result<DoctorStatus, AppError> {
    if current != DoctorStatus::Pending {
        return Err(AppError::NotFound);
    }
    Ok(match action {
        ReviewAction::Approve => DoctorStatus::Active,
        ReviewAction::Reject => DoctorStatus::Inactive,
    })
}

/// The status a manage action leaves behind, `None` for delete.
pub fn manage(action: ManageAction) -> Option<DoctorStatus> {
    match action {
        ManageAction::Activate => Some(DoctorStatus::Active),
        ManageAction::Deactivate => Some(DoctorStatus::Inactive),
        ManageAction::Delete => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_applications_are_decided() {
        assert_eq!(review(DoctorStatus::Pending, ReviewAction::Approve).unwrap(), DoctorStatus::Active);
        assert_eq!(review(DoctorStatus::Pending, ReviewAction::Reject).unwrap(), DoctorStatus::Inactive);
    }

    #[test]
    fn decided_applications_are_not_found() {
        for status in [DoctorStatus::Active, DoctorStatus::Inactive] {
            assert!(matches!(review(status, ReviewAction::Approve), Err(AppError::NotFound)));
        }
    }

    #[test]
    fn manage_toggles_any_time() {
        assert_eq!(manage(ManageAction::Activate), Some(DoctorStatus::Active));
        assert_eq!(manage(ManageAction::Deactivate), Some(DoctorStatus::Inactive));
        assert_eq!(manage(ManageAction::Delete), None);
    }

    #[test]
    fn actions_deserialize_lowercase() {
        let action: ReviewAction = serde_json::from_str("\"approve\"").unwrap();
        assert_eq!(action, ReviewAction::Approve);
        assert!(serde_json::from_str::<ManageAction>("\"promote\"").is_err());
    }
}

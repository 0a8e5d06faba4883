use tracing::warn;

use super::{PermissionLevel, Principal};
use crate::error::AppError;

/// Ownership predicate gating read/update/delete of every owned record.
///
/// Admins see everything, tutors see their own records plus those of
/// supervised students, students see only their own.
pub fn may_access(principal: &Principal, owner_id: &str) -> bool {
    match principal.level {
        PermissionLevel::Admin => true,
        PermissionLevel::Tutor => principal.id == owner_id || principal.supervises(owner_id),
        PermissionLevel::Student => principal.id == owner_id,
    }
}

pub fn require_access(principal: &Principal, owner_id: &str) -> Result<(), AppError> {
    if may_access(principal, owner_id) {
        Ok(())
    } else {
        warn!(
            principal_id = %principal.id,
            level = %principal.level,
            owner_id = %owner_id,
            "Access denied"
        );
        Err(AppError::Authorization(format!(
            "No access to records owned by user {}",
            owner_id
        )))
    }
}

/// Expands the owner set a create operation applies to.
///
/// A tutor may fan a record out to supervised students; requesting an
/// unsupervised id rejects the whole operation. An admin's requested list is
/// taken verbatim, with no supervision check. Anyone without a target list
/// creates for themself.
pub fn resolve_owners(
    principal: &Principal,
    requested_student_ids: &[String],
) -> Result<Vec<String>, AppError> {
    if requested_student_ids.is_empty() {
        return Ok(vec![principal.id.clone()]);
    }

    match principal.level {
        PermissionLevel::Admin => Ok(requested_student_ids.to_vec()),
        PermissionLevel::Tutor => {
            for student_id in requested_student_ids {
                if !principal.supervises(student_id) {
                    warn!(
                        principal_id = %principal.id,
                        student_id = %student_id,
                        "Tutor requested an unsupervised student"
                    );
                    return Err(AppError::Authorization(format!(
                        "Student {} is not supervised by this tutor",
                        student_id
                    )));
                }
            }
            Ok(requested_student_ids.to_vec())
        }
        PermissionLevel::Student => Ok(vec![principal.id.clone()]),
    }
}

/// Single-target variant of [`resolve_owners`], used by time logging and
/// aggregation where exactly one owner is addressed.
pub fn resolve_target(
    principal: &Principal,
    target_user_id: Option<&str>,
) -> Result<String, AppError> {
    let target = match target_user_id {
        Some(id) => id,
        None => return Ok(principal.id.clone()),
    };

    if target == principal.id {
        return Ok(target.to_string());
    }

    match principal.level {
        PermissionLevel::Admin => Ok(target.to_string()),
        PermissionLevel::Tutor if principal.supervises(target) => Ok(target.to_string()),
        _ => {
            warn!(
                principal_id = %principal.id,
                target_user_id = %target,
                "Principal may not act for target user"
            );
            Err(AppError::Authorization(format!(
                "Student {} is not supervised by this tutor",
                target
            )))
        }
    }
}

/// Visibility scope for list/search operations. `None` means unrestricted
/// (admin). Unlike [`resolve_owners`] this never fails: a tutor's requested
/// ids are intersected with the supervised set and degrade to self when the
/// intersection is empty, and a student's requested list is ignored outright.
pub fn scope_filter(
    principal: &Principal,
    requested_student_ids: &[String],
) -> Option<Vec<String>> {
    match principal.level {
        PermissionLevel::Admin => None,
        PermissionLevel::Tutor => {
            let mut owners: Vec<String> = requested_student_ids
                .iter()
                .filter(|id| principal.supervises(id.as_str()))
                .cloned()
                .collect();

            if owners.is_empty() {
                owners.push(principal.id.clone());
            } else {
                owners.insert(0, principal.id.clone());
            }
            Some(owners)
        }
        PermissionLevel::Student => Some(vec![principal.id.clone()]),
    }
}

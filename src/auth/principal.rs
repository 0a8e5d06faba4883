use anyhow::Error;
use serde::Serialize;
use std::fmt;

/// Permission levels as supplied by the auth collaborator. Lower is more
/// privileged: Admin=0, Tutor=1, Student=2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PermissionLevel {
    Admin,
    Tutor,
    Student,
}

impl PermissionLevel {
    pub fn as_level(&self) -> i64 {
        match self {
            PermissionLevel::Admin => 0,
            PermissionLevel::Tutor => 1,
            PermissionLevel::Student => 2,
        }
    }

    pub fn from_level(level: i64) -> Result<Self, Error> {
        match level {
            0 => Ok(PermissionLevel::Admin),
            1 => Ok(PermissionLevel::Tutor),
            2 => Ok(PermissionLevel::Student),
            _ => Err(Error::msg(format!("Unknown permission level: {}", level))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PermissionLevel::Admin => "admin",
            PermissionLevel::Tutor => "tutor",
            PermissionLevel::Student => "student",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "admin" => Ok(PermissionLevel::Admin),
            "tutor" => Ok(PermissionLevel::Tutor),
            "student" => Ok(PermissionLevel::Student),
            _ => Err(Error::msg(format!("Unknown permission level: {}", s))),
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authenticated caller. Built by the auth collaborator (or by
/// [`crate::db::load_principal`] in-process); the core treats it as a value.
///
/// `students` is only meaningfully populated for tutors and holds the ids of
/// the students a tutor supervises through confirmed relationships.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: String,
    pub level: PermissionLevel,
    pub students: Vec<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, level: PermissionLevel, students: Vec<String>) -> Self {
        Self {
            id: id.into(),
            level,
            students,
        }
    }

    pub fn supervises(&self, student_id: &str) -> bool {
        self.students.iter().any(|id| id == student_id)
    }
}

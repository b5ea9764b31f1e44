use std::{fmt, str::FromStr};

use async_graphql::Enum;
use serde::{Deserialize, Serialize};

use crate::{
    auth::Caller,
    errors::{AppError, AppResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, Enum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Learner,
    Instructor,
    Admin,
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "learner" | "student" => Ok(Role::Learner),
            "instructor" | "teacher" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Unauthorized(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    TakeQuizzes,
    ViewOwnRecords,
    ViewLearnerRecords,
    ManageCourses,
    EvaluateAwards,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::TakeQuizzes => "take quizzes",
            Capability::ViewOwnRecords => "view own records",
            Capability::ViewLearnerRecords => "view learner records",
            Capability::ManageCourses => "manage courses",
            Capability::EvaluateAwards => "evaluate awards",
        };
        f.write_str(name)
    }
}

const LEARNER: &[Capability] = &[Capability::TakeQuizzes, Capability::ViewOwnRecords];

const INSTRUCTOR: &[Capability] = &[
    Capability::TakeQuizzes,
    Capability::ViewOwnRecords,
    Capability::ViewLearnerRecords,
    Capability::ManageCourses,
];

const ADMIN: &[Capability] = &[
    Capability::TakeQuizzes,
    Capability::ViewOwnRecords,
    Capability::ViewLearnerRecords,
    Capability::ManageCourses,
    Capability::EvaluateAwards,
];

impl Role {
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Role::Learner => LEARNER,
            Role::Instructor => INSTRUCTOR,
            Role::Admin => ADMIN,
        }
    }

    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// The single authorization gate: the role must hold every listed capability.
pub fn require_capabilities(role: Role, required: &[Capability]) -> AppResult<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !role.can(**c))
        .map(ToString::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role {:?} may not {}",
            role,
            missing.join(", ")
        )))
    }
}

/// Access to a learner's own records, or to anyone's with `capability`.
pub fn require_self_or(caller: &Caller, learner_id: &str, capability: Capability) -> AppResult<()> {
    if caller.user_id == learner_id {
        return Ok(());
    }
    require_capabilities(caller.role, &[capability])
}

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use comanda_core::{CompanyId, EmployeeId, UserId};

use crate::{Feature, GroupMembershipLookup, Requirement};

pub const DEFAULT_DENIAL_MESSAGE: &str = "access denied";

/// The authenticated actor invoking a use case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub employee_id: Option<EmployeeId>,
}

impl Caller {
    pub fn new(user_id: UserId, company_id: CompanyId) -> Self {
        Self {
            user_id,
            company_id,
            employee_id: None,
        }
    }

    pub fn with_employee(mut self, employee_id: EmployeeId) -> Self {
        self.employee_id = Some(employee_id);
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unauthorized: {message}")]
pub struct Unauthorized {
    pub message: String,
}

/// Outcome of one authorization check, as written to the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub all: Vec<String>,
    pub any: Vec<String>,
    pub missing_all: Vec<String>,
    pub any_satisfied: bool,
}

impl Decision {
    fn evaluate(requirement: &Requirement, granted: &HashSet<Feature>) -> Self {
        let any_satisfied = requirement.any_satisfied(granted);
        let missing_all: Vec<String> = requirement
            .missing(granted)
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        Self {
            allowed: missing_all.is_empty() && any_satisfied,
            all: requirement.all_of().iter().map(|f| f.as_str().to_string()).collect(),
            any: requirement.any_of().iter().map(|f| f.as_str().to_string()).collect(),
            missing_all,
            any_satisfied,
        }
    }
}

/// Pre-invocation gate for use cases.
///
/// Cheap to clone; resolves the caller's features on every check.
#[derive(Clone)]
pub struct AuthorizationGuard {
    lookup: Arc<dyn GroupMembershipLookup>,
    default_message: String,
}

impl AuthorizationGuard {
    pub fn new(lookup: Arc<dyn GroupMembershipLookup>) -> Self {
        Self {
            lookup,
            default_message: DEFAULT_DENIAL_MESSAGE.to_string(),
        }
    }

    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = message.into();
        self
    }

    pub fn check(&self, caller: &Caller, requirement: &Requirement) -> Result<(), Unauthorized> {
        self.check_named(caller, requirement, "unnamed")
    }

    /// Same as [`check`](Self::check), tagging the audit entry with `use_case`.
    pub fn check_named(
        &self,
        caller: &Caller,
        requirement: &Requirement,
        use_case: &str,
    ) -> Result<(), Unauthorized> {
        if requirement.is_empty() {
            audit(caller, use_case, &Decision::evaluate(requirement, &HashSet::new()));
            return Ok(());
        }

        let granted = match self.lookup.effective_features(caller.user_id) {
            Ok(granted) => granted,
            Err(err) => {
                error!(
                    user_id = %caller.user_id,
                    company_id = %caller.company_id,
                    use_case,
                    error = %err,
                    "feature lookup failed; denying"
                );
                return Err(self.denial(requirement));
            }
        };

        let decision = Decision::evaluate(requirement, &granted);
        audit(caller, use_case, &decision);

        if decision.allowed {
            return Ok(());
        }

        let mut features: Vec<&str> = granted.iter().map(Feature::as_str).collect();
        features.sort_unstable();
        warn!(
            user_id = %caller.user_id,
            company_id = %caller.company_id,
            use_case,
            missing_all = ?decision.missing_all,
            any_satisfied = decision.any_satisfied,
            features = ?features,
            message = requirement.message().unwrap_or(&self.default_message),
            "access denied"
        );
        Err(self.denial(requirement))
    }

    /// Run `f` only if `caller` satisfies `requirement`.
    pub fn guard<T, E, F>(
        &self,
        caller: &Caller,
        requirement: &Requirement,
        use_case: &str,
        f: F,
    ) -> Result<T, E>
    where
        E: From<Unauthorized>,
        F: FnOnce() -> Result<T, E>,
    {
        self.check_named(caller, requirement, use_case)?;
        f()
    }

    fn denial(&self, requirement: &Requirement) -> Unauthorized {
        Unauthorized {
            message: requirement
                .message()
                .unwrap_or(&self.default_message)
                .to_string(),
        }
    }
}

fn audit(caller: &Caller, use_case: &str, decision: &Decision) {
    info!(
        user_id = %caller.user_id,
        company_id = %caller.company_id,
        use_case,
        all = ?decision.all,
        any = ?decision.any,
        allowed = decision.allowed,
        "authorization decision"
    );
}

impl core::fmt::Debug for AuthorizationGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorizationGuard")
            .field("default_message", &self.default_message)
            .finish_non_exhaustive()
    }
}

/// A use-case entry point.
pub trait UseCase {
    type Input;
    type Output;
    type Error: From<Unauthorized>;

    fn name(&self) -> &'static str;

    fn execute(&self, caller: &Caller, input: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// Decorator attaching a [`Requirement`] to a [`UseCase`] at wiring time.
pub struct Guarded<U> {
    inner: U,
    requirement: Requirement,
    guard: AuthorizationGuard,
}

impl<U: UseCase> Guarded<U> {
    pub fn new(inner: U, requirement: Requirement, guard: AuthorizationGuard) -> Self {
        Self {
            inner,
            requirement,
            guard,
        }
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub fn into_inner(self) -> U {
        self.inner
    }
}

impl<U: UseCase> UseCase for Guarded<U> {
    type Input = U::Input;
    type Output = U::Output;
    type Error = U::Error;

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn execute(&self, caller: &Caller, input: Self::Input) -> Result<Self::Output, Self::Error> {
        self.guard
            .check_named(caller, &self.requirement, self.inner.name())?;
        self.inner.execute(caller, input)
    }
}

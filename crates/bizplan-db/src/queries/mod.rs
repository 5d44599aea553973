//! Per-table query functions.
//!
//! Functions that take `&PgPool` run in their own implicit transaction.
//! Functions that take `&mut PgConnection` are meant to be composed inside
//! an explicit transaction owned by the caller.

pub mod business_plans;
pub mod consulting;
pub mod onboarding;
pub mod projects;
pub mod users;

/// Whether `err` wraps a PostgreSQL unique-constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|db| db.is_unique_violation())
    })
}

#[cfg(test)]
mod tests {
    use super::is_unique_violation;

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        let err = anyhow::anyhow!("plain failure");
        assert!(!is_unique_violation(&err));

        let err = anyhow::Error::new(sqlx::Error::RowNotFound).context("lookup");
        assert!(!is_unique_violation(&err));
    }
}

//! Closing units of work.

use store::UnitOfWork;

use crate::error::DomainError;

/// Commits `uow` if `result` is ok, otherwise rolls it back and returns the
/// original error.
///
/// A failed rollback is logged; the locks are released regardless when the
/// unit of work is dropped.
pub(crate) async fn finish<U, T>(uow: U, result: Result<T, DomainError>) -> Result<T, DomainError>
where
    U: UnitOfWork,
{
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

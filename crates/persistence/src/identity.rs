//! Conversion between external identity strings and the stores' native ids.
//!
//! Both backends key records by UUID. The external form is the canonical
//! hyphenated lowercase string.

use std::future::Future;
use std::time::Duration;

use common::{AppError, AppResult};
use domain::Entity;
use uuid::Uuid;

/// Parse an external identity. Malformed input is an `InvalidArgument`,
/// never a silent miss.
pub fn parse_identity(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::invalid_argument(format!("Malformed identity: '{}'", raw)))
}

/// Native id of an entity that must already be persisted.
pub fn require_identity<E: Entity>(entity: &E) -> AppResult<Uuid> {
    if entity.identity().is_transient() {
        return Err(AppError::invalid_argument(format!(
            "{} entity has not been persisted yet",
            E::NAMESPACE
        )));
    }
    parse_identity(entity.id())
}

/// Run a store call under an optional deadline.
pub(crate) async fn with_deadline<T, Fut>(
    deadline: Option<Duration>,
    operation: &str,
    call: Fut,
) -> AppResult<T>
where
    Fut: Future<Output = AppResult<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AppError::timeout(format!("{} exceeded {:?}", operation, limit)))?,
        None => call.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identity() {
        let id = Uuid::new_v4();
        assert_eq!(parse_identity(&id.to_string()).unwrap(), id);
        assert_eq!(parse_identity(&id.to_string().to_uppercase()).unwrap(), id);
        assert!(matches!(
            parse_identity("not-an-id"),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let result: AppResult<()> = with_deadline(Some(Duration::from_millis(5)), "sleep", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }
}

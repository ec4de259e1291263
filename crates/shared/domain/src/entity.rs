//! Base shape shared by every persisted aggregate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::query::EntityField;

/// Store-assigned identity. Transient until the first `add`, then fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Option<String>);

impl Identity {
    pub fn transient() -> Self {
        Self(None)
    }

    /// Identity of a record that already exists in a store.
    pub fn persisted(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    /// The identity string, empty while transient.
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    pub fn is_transient(&self) -> bool {
        self.0.is_none()
    }

    /// Assign the store's identity. A second assignment is rejected.
    pub fn assign(&mut self, id: impl Into<String>) -> DomainResult<()> {
        if let Some(existing) = &self.0 {
            return Err(DomainError::invalid_argument(format!(
                "Identity is already assigned ({})",
                existing
            )));
        }
        self.0 = Some(id.into());
        Ok(())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted aggregate living in one storage namespace.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Queryable property set
    type Field: EntityField;

    /// Table or collection name
    const NAMESPACE: &'static str;

    fn identity(&self) -> &Identity;

    fn identity_mut(&mut self) -> &mut Identity;

    fn id(&self) -> &str {
        self.identity().as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_assigned_once() {
        let mut id = Identity::transient();
        assert!(id.is_transient());
        assert_eq!(id.as_str(), "");

        id.assign("abc").unwrap();
        assert_eq!(id.as_str(), "abc");

        let again = id.assign("def");
        assert!(matches!(again, Err(DomainError::InvalidArgument(_))));
        assert_eq!(id.as_str(), "abc");
    }
}

//! Label aggregate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{LABEL_PALETTE, MAX_LABEL_NAME_LENGTH, NAMESPACE_LABELS};
use crate::entity::{Entity, Identity};
use crate::error::{DomainError, DomainResult};
use crate::query::{EntityField, FieldKind};

/// Trimmed, lowercased form of a name, used for uniqueness checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedName(String);

impl NormalizedName {
    pub fn new(raw: &str) -> DomainResult<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("Name is required"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelField {
    Id,
    Name,
    NormalizedName,
    Color,
    CreatedBy,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

impl EntityField for LabelField {
    const ALL: &'static [Self] = &[
        LabelField::Id,
        LabelField::Name,
        LabelField::NormalizedName,
        LabelField::Color,
        LabelField::CreatedBy,
        LabelField::IsActive,
        LabelField::CreatedAt,
        LabelField::UpdatedAt,
    ];

    fn name(&self) -> &'static str {
        match self {
            LabelField::Id => "id",
            LabelField::Name => "name",
            LabelField::NormalizedName => "normalizedName",
            LabelField::Color => "color",
            LabelField::CreatedBy => "createdBy",
            LabelField::IsActive => "isActive",
            LabelField::CreatedAt => "createdAt",
            LabelField::UpdatedAt => "updatedAt",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            LabelField::Id => FieldKind::Id,
            LabelField::Name | LabelField::NormalizedName | LabelField::Color | LabelField::CreatedBy => {
                FieldKind::Text
            }
            LabelField::IsActive => FieldKind::Boolean,
            LabelField::CreatedAt | LabelField::UpdatedAt => FieldKind::Timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: Identity,
    pub name: String,
    pub normalized_name: String,
    pub color: String,
    pub created_by: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Label {
    pub fn new(name: impl Into<String>, created_by: impl Into<String>) -> DomainResult<Self> {
        let name = Self::checked_name(name.into())?;
        let normalized = NormalizedName::new(&name)?;
        Ok(Self {
            id: Identity::transient(),
            color: color_for(&name),
            normalized_name: normalized.as_str().to_string(),
            name,
            created_by: created_by.into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        })
    }

    /// Change the display name. Color stays as first assigned.
    pub fn rename(&mut self, name: impl Into<String>) -> DomainResult<()> {
        let name = Self::checked_name(name.into())?;
        self.normalized_name = NormalizedName::new(&name)?.as_str().to_string();
        self.name = name;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    pub fn soft_delete(&mut self) {
        self.is_active = false;
        self.updated_at = Some(Utc::now());
    }

    fn checked_name(name: String) -> DomainResult<String> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Label name is required"));
        }
        if name.chars().count() > MAX_LABEL_NAME_LENGTH {
            return Err(DomainError::validation(format!(
                "Label name must be at most {} characters",
                MAX_LABEL_NAME_LENGTH
            )));
        }
        Ok(name)
    }
}

/// Deterministic color keyed on the uppercased first character.
pub fn color_for(name: &str) -> String {
    let first = name
        .trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().next().unwrap_or(c))
        .unwrap_or('#');
    LABEL_PALETTE[first as usize % LABEL_PALETTE.len()].to_string()
}

impl Entity for Label {
    type Field = LabelField;
    const NAMESPACE: &'static str = NAMESPACE_LABELS;

    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

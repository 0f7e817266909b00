//! Partnership records and write payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::ValidationError;

/// Jurisdiction codes a partnership region list may contain.
pub const VALID_REGIONS: [&str; 13] = [
    "AB", "BC", "MB", "NB", "NL", "NS", "NT", "NU", "ON", "PE", "QC", "SK", "YT",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartnershipStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    Suspended,
}

impl PartnershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnershipStatus::Active => "Active",
            PartnershipStatus::Inactive => "Inactive",
            PartnershipStatus::Pending => "Pending",
            PartnershipStatus::Suspended => "Suspended",
        }
    }
}

impl fmt::Display for PartnershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartnershipStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(PartnershipStatus::Active),
            "Inactive" => Ok(PartnershipStatus::Inactive),
            "Pending" => Ok(PartnershipStatus::Pending),
            "Suspended" => Ok(PartnershipStatus::Suspended),
            other => Err(ValidationError::new(
                "status",
                "must be one of Active, Inactive, Pending, Suspended",
            )
            .with_value(other)),
        }
    }
}

/// How a partnership was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Email,
    Portal,
    Phone,
    Meeting,
    Referral,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Email => "Email",
            SourceType::Portal => "Portal",
            SourceType::Phone => "Phone",
            SourceType::Meeting => "Meeting",
            SourceType::Referral => "Referral",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Email" => Ok(SourceType::Email),
            "Portal" => Ok(SourceType::Portal),
            "Phone" => Ok(SourceType::Phone),
            "Meeting" => Ok(SourceType::Meeting),
            "Referral" => Ok(SourceType::Referral),
            other => Err(ValidationError::new(
                "source_type",
                "must be one of Email, Portal, Phone, Meeting, Referral",
            )
            .with_value(other)),
        }
    }
}

/// A partnership as stored in the warehouse.
///
/// Field names on the wire follow the warehouse column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    pub id: String,
    pub name: String,
    pub status: PartnershipStatus,
    pub region: String,
    pub tier: Option<String>,
    #[serde(rename = "Parent_Partnership", alias = "parent_name")]
    pub parent_name: Option<String>,
    #[serde(rename = "Parent_ID", alias = "parent_id")]
    pub parent_id: Option<String>,
    pub source_type: Option<SourceType>,
    pub source_link: Option<String>,
    pub point_contact: Option<String>,
    #[serde(rename = "Internal_Contact", alias = "internal_contact")]
    pub internal_contact: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

/// Validate a comma-separated region list against [`VALID_REGIONS`].
///
/// Entries are trimmed before comparison; an empty entry is invalid.
pub fn validate_region(region: &str) -> Result<(), ValidationError> {
    for code in region.split(',').map(str::trim) {
        if !VALID_REGIONS.contains(&code) {
            return Err(ValidationError::new(
                "region",
                format!(
                    "Invalid region: {code}. Valid regions: {}",
                    VALID_REGIONS.join(", ")
                ),
            )
            .with_value(code));
        }
    }
    Ok(())
}

/// Weak email-shape check: a non-empty contact must contain `@`.
pub fn validate_point_contact(contact: &str) -> Result<(), ValidationError> {
    if !contact.is_empty() && !contact.contains('@') {
        return Err(ValidationError::new("point_contact", "Invalid email format").with_value(contact));
    }
    Ok(())
}

fn require_non_blank(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// Payload for creating a partnership.
///
/// Audit columns are never accepted from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatePartnership {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: PartnershipStatus,
    pub region: String,
    pub tier: Option<String>,
    #[serde(rename = "Parent_Partnership", alias = "parent_name")]
    pub parent_name: Option<String>,
    #[serde(rename = "Parent_ID", alias = "parent_id")]
    pub parent_id: Option<String>,
    pub source_type: Option<SourceType>,
    pub source_link: Option<String>,
    pub point_contact: Option<String>,
    #[serde(rename = "Internal_Contact", alias = "internal_contact")]
    pub internal_contact: Option<String>,
}

impl CreatePartnership {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("id", &self.id)?;
        require_non_blank("name", &self.name)?;
        validate_region(&self.region)?;
        if let Some(contact) = &self.point_contact {
            validate_point_contact(contact)?;
        }
        Ok(())
    }

    /// Build the stored record, stamping both audit column pairs.
    pub fn into_record(self, actor_id: &str, now: DateTime<Utc>) -> Partnership {
        Partnership {
            id: self.id,
            name: self.name,
            status: self.status,
            region: self.region,
            tier: self.tier,
            parent_name: self.parent_name,
            parent_id: self.parent_id,
            source_type: self.source_type,
            source_link: self.source_link,
            point_contact: self.point_contact,
            internal_contact: self.internal_contact,
            created_at: Some(now),
            updated_at: Some(now),
            created_by: Some(actor_id.to_string()),
            updated_by: Some(actor_id.to_string()),
        }
    }
}

/// A tri-state field in a partial update.
///
/// Combined with `#[serde(default)]`, a missing key is `Absent`, an explicit
/// `null` is `Null`, and anything else is `Value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}

/// One column assignment produced by a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub column: &'static str,
    /// `None` clears the column.
    pub value: Option<String>,
}

/// Partial update of a partnership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PartnershipPatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub status: Patch<PartnershipStatus>,
    #[serde(default)]
    pub region: Patch<String>,
    #[serde(default)]
    pub tier: Patch<String>,
    #[serde(default, rename = "Parent_Partnership", alias = "parent_name")]
    pub parent_name: Patch<String>,
    #[serde(default, rename = "Parent_ID", alias = "parent_id")]
    pub parent_id: Patch<String>,
    #[serde(default)]
    pub source_type: Patch<SourceType>,
    #[serde(default)]
    pub source_link: Patch<String>,
    #[serde(default)]
    pub point_contact: Patch<String>,
    #[serde(default, rename = "Internal_Contact", alias = "internal_contact")]
    pub internal_contact: Patch<String>,
}

impl PartnershipPatch {
    /// Validate the patch and list the column assignments it makes, in a
    /// fixed column order. Absent fields produce nothing.
    pub fn changes(&self) -> Result<Vec<FieldChange>, ValidationError> {
        let mut changes = Vec::new();

        required(&mut changes, "name", &self.name, |name| {
            require_non_blank("name", name).map(|_| name.clone())
        })?;
        required(&mut changes, "status", &self.status, |status| {
            Ok(status.as_str().to_string())
        })?;
        required(&mut changes, "region", &self.region, |region| {
            validate_region(region).map(|_| region.clone())
        })?;

        nullable(&mut changes, "tier", &self.tier, |v| Ok(v.clone()))?;
        nullable(&mut changes, "Parent_Partnership", &self.parent_name, |v| {
            Ok(v.clone())
        })?;
        nullable(&mut changes, "Parent_ID", &self.parent_id, |v| Ok(v.clone()))?;
        nullable(&mut changes, "source_type", &self.source_type, |v| {
            Ok(v.as_str().to_string())
        })?;
        nullable(&mut changes, "source_link", &self.source_link, |v| {
            Ok(v.clone())
        })?;
        nullable(&mut changes, "point_contact", &self.point_contact, |v| {
            validate_point_contact(v).map(|_| v.clone())
        })?;
        nullable(&mut changes, "Internal_Contact", &self.internal_contact, |v| {
            Ok(v.clone())
        })?;

        Ok(changes)
    }
}

fn required<T>(
    changes: &mut Vec<FieldChange>,
    column: &'static str,
    patch: &Patch<T>,
    render: impl FnOnce(&T) -> Result<String, ValidationError>,
) -> Result<(), ValidationError> {
    match patch {
        Patch::Absent => {}
        Patch::Null => {
            return Err(ValidationError::new(column, "is required and cannot be null"));
        }
        Patch::Value(value) => changes.push(FieldChange {
            column,
            value: Some(render(value)?),
        }),
    }
    Ok(())
}

fn nullable<T>(
    changes: &mut Vec<FieldChange>,
    column: &'static str,
    patch: &Patch<T>,
    render: impl FnOnce(&T) -> Result<String, ValidationError>,
) -> Result<(), ValidationError> {
    match patch {
        Patch::Absent => {}
        Patch::Null => changes.push(FieldChange {
            column,
            value: None,
        }),
        Patch::Value(value) => changes.push(FieldChange {
            column,
            value: Some(render(value)?),
        }),
    }
    Ok(())
}

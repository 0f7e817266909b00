//! Capability model.
//!
//! Capabilities are derived from the caller's email alone: everyone can read,
//! members of the internal domain can also write and delete, and internal
//! members on the admin allow-list additionally approve and administer.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A class of operation a principal may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    Delete,
    Approve,
    Admin,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Read,
        Capability::Write,
        Capability::Delete,
        Capability::Approve,
        Capability::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Delete => "delete",
            Capability::Approve => "approve",
            Capability::Admin => "admin",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Capability::Read => "Read partnership data",
            Capability::Write => "Create and update partnerships",
            Capability::Delete => "Delete partnerships",
            Capability::Approve => "Approve partnership changes",
            Capability::Admin => "Full administrative access",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse role label reported alongside capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employee,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
            Role::User => "user",
        }
    }
}

/// The set of capabilities granted to a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Whether an operation gated on `capability` is permitted.
    ///
    /// `Admin` satisfies every check.
    pub fn allows(&self, capability: Capability) -> bool {
        self.contains(Capability::Admin) || self.contains(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    fn grant(&mut self, capabilities: &[Capability]) {
        self.0.extend(capabilities.iter().copied());
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Email-based permission policy.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    internal_domain: String,
    admin_emails: BTreeSet<String>,
}

impl PermissionPolicy {
    pub fn new<I, S>(internal_domain: &str, admin_emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            internal_domain: internal_domain
                .trim()
                .trim_start_matches('@')
                .to_ascii_lowercase(),
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Derive the role and capabilities for `email`.
    ///
    /// Never fails: empty or unrecognised input gets `User` with `Read` only.
    pub fn derive(&self, email: &str) -> (Role, CapabilitySet) {
        let email = email.trim().to_ascii_lowercase();
        let mut capabilities = CapabilitySet::default();
        capabilities.grant(&[Capability::Read]);

        if !self.is_internal(&email) {
            return (Role::User, capabilities);
        }

        capabilities.grant(&[Capability::Write, Capability::Delete]);

        if self.admin_emails.contains(&email) {
            capabilities.grant(&[Capability::Approve, Capability::Admin]);
            return (Role::Admin, capabilities);
        }

        (Role::Employee, capabilities)
    }

    fn is_internal(&self, email: &str) -> bool {
        if self.internal_domain.is_empty() {
            return false;
        }
        match email.rsplit_once('@') {
            Some((local, domain)) => !local.is_empty() && domain == self.internal_domain,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy() -> PermissionPolicy {
        PermissionPolicy::new("weedme.ca", ["boss@weedme.ca", "ops@partner.com"])
    }

    fn set(caps: &[Capability]) -> CapabilitySet {
        caps.iter().copied().collect()
    }

    #[rstest]
    #[case("someone@gmail.com", Role::User, &[Capability::Read])]
    #[case("", Role::User, &[Capability::Read])]
    #[case("not-an-email", Role::User, &[Capability::Read])]
    #[case("@weedme.ca", Role::User, &[Capability::Read])]
    #[case("someone@notweedme.ca", Role::User, &[Capability::Read])]
    #[case("staff@weedme.ca", Role::Employee, &[Capability::Read, Capability::Write, Capability::Delete])]
    #[case("Staff@WeedMe.ca", Role::Employee, &[Capability::Read, Capability::Write, Capability::Delete])]
    #[case(
        "boss@weedme.ca",
        Role::Admin,
        &[Capability::Read, Capability::Write, Capability::Delete, Capability::Approve, Capability::Admin]
    )]
    fn test_derive(#[case] email: &str, #[case] role: Role, #[case] caps: &[Capability]) {
        let (derived_role, derived_caps) = policy().derive(email);
        assert_eq!(derived_role, role);
        assert_eq!(derived_caps, set(caps));
    }

    #[test]
    fn test_external_admin_listing_grants_nothing_extra() {
        // The allow-list only applies inside the internal domain.
        let (role, caps) = policy().derive("ops@partner.com");
        assert_eq!(role, Role::User);
        assert_eq!(caps, set(&[Capability::Read]));
    }

    #[test]
    fn test_admin_satisfies_every_capability() {
        let (_, caps) = policy().derive("boss@weedme.ca");
        for capability in Capability::ALL {
            assert!(caps.allows(capability));
        }

        let admin_only = set(&[Capability::Admin]);
        assert!(admin_only.allows(Capability::Approve));
    }

    #[test]
    fn test_employee_cannot_approve() {
        let (_, caps) = policy().derive("staff@weedme.ca");
        assert!(caps.allows(Capability::Write));
        assert!(!caps.allows(Capability::Approve));
        assert!(!caps.allows(Capability::Admin));
    }

    #[test]
    fn test_empty_domain_treats_everyone_as_external() {
        let policy = PermissionPolicy::new("", Vec::<String>::new());
        let (role, caps) = policy.derive("anyone@weedme.ca");
        assert_eq!(role, Role::User);
        assert_eq!(caps, set(&[Capability::Read]));
    }

    #[test]
    fn test_capability_set_serializes_as_strings() {
        let json = serde_json::to_string(&set(&[Capability::Write, Capability::Read])).unwrap();
        assert_eq!(json, r#"["read","write"]"#);
    }
}

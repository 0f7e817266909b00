//! Authentication and capability derivation.

pub mod authenticator;
pub mod dev;
pub mod firebase;
pub mod identity;
pub mod permissions;

pub use authenticator::{AuthError, Authenticator, Principal};
pub use dev::DevIdentityProvider;
pub use firebase::{FirebaseConfig, FirebaseTokenVerifier};
pub use identity::{IdentityProvider, VerifiedIdentity, VerifyError};
pub use permissions::{Capability, CapabilitySet, PermissionPolicy, Role};

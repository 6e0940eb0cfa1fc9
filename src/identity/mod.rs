//! Token verification and caller identity.

pub mod claims;
pub mod jwt;
pub mod resolver;

pub use claims::IdentityClaims;
pub use jwt::{Jwk, JwkSet, JwtVerifier};
pub use resolver::{IdentityResolver, VerifiedSubject};

//! Token issuance and credential verification for Parley.
//!
//! Bearer credentials are HS256 JWTs carrying the user id as `sub`.
//! Passwords are stored as salted SHA-256 digests in the form
//! `{salt_hex}${digest_hex}`.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenService};

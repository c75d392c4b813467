/// Authentication module
///
/// Password hashing, JWT issuance and decoding, the refresh token store,
/// and the session protocol that ties them together.

mod claims;
mod jwt;
mod password;
pub mod refresh_token;
pub mod session;

pub use claims::{Claims, TokenType, ADMIN_ROLE, DEFAULT_ROLE};
pub use jwt::TokenIssuer;
pub use password::{hash_password, verify_password};
pub use session::TokenPair;

//! Authentication: JWT session tokens, Argon2id password hashing, session
//! lifecycle, and the initial admin bootstrap.

pub mod bootstrap;
pub mod jwt;
pub mod password;
pub mod session;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
pub use password::PasswordHasher;
pub use session::{AuthContext, LoginResult, SessionManager};

/// Authentication module
///
/// Password verification, the token codec, and the rotation engine that
/// ties them to the session store.

mod claims;
mod password;
mod rotation;
mod token;

pub use claims::Claims;
pub use password::hash_password;
pub use password::verify_password;
pub use rotation::{login, logout, refresh, register, TokenPair, UserView};
pub use token::{sign_token, verify_token, TokenKind};

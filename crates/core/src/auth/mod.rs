//! Credential selection for the notary service.
//!
//! Picks between App Store Connect API keys and Apple ID credentials and
//! turns the choice into `notarytool` flags. Every check runs before any
//! external tool is invoked.

mod error;
mod key_file;
mod method;

pub use error::AuthError;
pub use key_file::{find_key_file, key_file_name, search_dirs, KEYS_DIR_ENV};
pub use method::{AuthMethod, ENV_PASSWORD_PREFIX, KEYCHAIN_PASSWORD_PREFIX};

//! Lookup of App Store Connect private key files.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::AuthError;

/// Overrides the default search directories when set.
pub const KEYS_DIR_ENV: &str = "API_PRIVATE_KEYS_DIR";

/// File name the key for `key_id` is stored under.
pub fn key_file_name(key_id: &str) -> String {
    format!("AuthKey_{}.p8", key_id)
}

/// Directories searched for key files, in order.
pub fn search_dirs<F>(env: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env(KEYS_DIR_ENV).filter(|d| !d.is_empty()) {
        return vec![PathBuf::from(dir)];
    }

    let mut dirs = vec![PathBuf::from("./private_keys")];
    if let Some(home) = env("HOME").filter(|h| !h.is_empty()) {
        let home = Path::new(&home);
        dirs.push(home.join("private_keys"));
        dirs.push(home.join(".private_keys"));
        dirs.push(home.join(".appstoreconnect").join("private_keys"));
    }
    dirs
}

/// Finds `AuthKey_<key_id>.p8` in the first directory that has it.
pub fn find_key_file<F>(key_id: &str, env: F) -> Result<PathBuf, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    let file_name = key_file_name(key_id);
    let dirs = search_dirs(env);

    for dir in &dirs {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "Found API key file");
            return Ok(candidate);
        }
    }

    Err(AuthError::ApiKeyFileNotFound {
        file_name,
        searched: dirs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_dirs_default() {
        let dirs = search_dirs(|name| (name == "HOME").then(|| "/home/dev".to_string()));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("./private_keys"),
                PathBuf::from("/home/dev/private_keys"),
                PathBuf::from("/home/dev/.private_keys"),
                PathBuf::from("/home/dev/.appstoreconnect/private_keys"),
            ]
        );
    }

    #[test]
    fn test_search_dirs_override() {
        let dirs = search_dirs(|name| match name {
            KEYS_DIR_ENV => Some("/keys".to_string()),
            "HOME" => Some("/home/dev".to_string()),
            _ => None,
        });
        assert_eq!(dirs, vec![PathBuf::from("/keys")]);
    }

    #[test]
    fn test_find_key_file() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join(".appstoreconnect").join("private_keys");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("AuthKey_ABC123.p8"), "key").unwrap();

        let home_str = home.path().to_string_lossy().to_string();
        let found = find_key_file("ABC123", |name| (name == "HOME").then(|| home_str.clone())).unwrap();
        assert_eq!(found, dir.join("AuthKey_ABC123.p8"));
    }

    #[test]
    fn test_find_key_file_missing() {
        let keys = tempfile::tempdir().unwrap();
        let keys_str = keys.path().to_string_lossy().to_string();
        let err = find_key_file("NOPE", |name| (name == KEYS_DIR_ENV).then(|| keys_str.clone()))
            .unwrap_err();
        match err {
            AuthError::ApiKeyFileNotFound { file_name, searched } => {
                assert_eq!(file_name, "AuthKey_NOPE.p8");
                assert_eq!(searched, vec![keys.path().to_path_buf()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

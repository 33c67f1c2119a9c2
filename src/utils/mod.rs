pub mod markdown;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// `~/.wxbridge`, created on demand by callers via [`ensure_dir`].
pub fn get_wxbridge_home() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".wxbridge"))
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_is_under_user_home() {
        let home = get_wxbridge_home().expect("home dir");
        assert!(home.ends_with(".wxbridge"));
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let nested = tmp.path().join("a").join("b");
        ensure_dir(&nested).expect("create");
        ensure_dir(&nested).expect("create again");
        assert!(nested.is_dir());
    }
}

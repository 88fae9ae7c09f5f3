use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// A Chrome user-data directory for a measurement session
pub struct ProfileManager {
    path: PathBuf,
    is_temporary: bool,
}

impl ProfileManager {
    /// A fresh profile, deleted on drop. Measurements start from an empty cache this way.
    pub fn temporary() -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("extperf-profile-")
            .tempdir()?
            .keep();

        tracing::debug!("Created temporary profile at {}", path.display());
        Ok(Self {
            path,
            is_temporary: true,
        })
    }

    /// Use (and create if needed) a named profile under `~/.extperf/profiles`
    pub fn named(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(Error::Browser(format!("Invalid profile name: '{}'", name)));
        }
        Self::persistent(Self::profiles_dir()?.join(name))
    }

    pub fn persistent(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(&path)?;
        }

        Ok(Self {
            path,
            is_temporary: false,
        })
    }

    pub fn profiles_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".extperf").join("profiles"))
            .ok_or_else(|| Error::Browser("Could not determine home directory".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }
}

impl Drop for ProfileManager {
    fn drop(&mut self) {
        if self.is_temporary && self.path.exists() {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_profile_is_removed_on_drop() {
        let profile = ProfileManager::temporary().unwrap();
        let path = profile.path().to_path_buf();

        assert!(path.is_dir());
        assert!(profile.is_temporary());

        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn test_persistent_profile_survives_drop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let profile_path = temp_dir.path().join("measure");

        let profile = ProfileManager::persistent(profile_path.clone()).unwrap();
        assert!(profile_path.is_dir());
        assert!(!profile.is_temporary());

        drop(profile);
        assert!(profile_path.exists());
    }

    #[test]
    fn test_named_profile_rejects_path_names() {
        assert!(ProfileManager::named("../escape").is_err());
        assert!(ProfileManager::named("").is_err());
    }
}

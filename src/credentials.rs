use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A stored user id / API key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub api_key: String,
}

/// Filesystem-backed credential store: two lines under the user's home,
/// readable by the owner only. The submission path assumes this file is
/// private.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new() -> Option<Self> {
        let path = dirs::home_dir()?.join(".barrage").join("credentials");
        Some(Self { path })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// A missing, unreadable or incomplete file reads as "no credentials".
    pub fn read(&self) -> Option<Credentials> {
        let text = fs::read_to_string(&self.path).ok()?;
        let mut lines = text.lines();
        let user = lines.next()?.trim().to_string();
        let api_key = lines.next()?.trim().to_string();
        if user.is_empty() || api_key.is_empty() {
            return None;
        }
        Some(Credentials { user, api_key })
    }

    pub fn write(&self, credentials: &Credentials) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
            restrict(dir, 0o700)?;
        }
        fs::write(
            &self.path,
            format!("{}\n{}\n", credentials.user, credentials.api_key),
        )?;
        restrict(&self.path, 0o600)
    }

    /// Best effort: a store that cannot be deleted is not an error.
    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn restrict(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

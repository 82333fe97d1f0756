use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        if let Ok(home) = std::env::var("TRADEPILOT_HOME") {
            if !home.trim().is_empty() {
                return Self { base: PathBuf::from(home) };
            }
        }
        let base = dirs::home_dir()
            .map(|h| h.join(".tradepilot"))
            .unwrap_or_else(|| PathBuf::from(".tradepilot"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn ui_text_file(&self) -> PathBuf {
        self.base.join("ui_text.json")
    }

    /// Saved login state (cookies, local storage) from the last session.
    pub fn state_file(&self) -> PathBuf {
        self.base.join("state.json")
    }

    /// Persistent browser profile directory (user data dir).
    pub fn profile_dir(&self) -> PathBuf {
        self.base.join("profile")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.base.join("media")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.base.join("templates")
    }

    pub fn template_file(&self, name: &str) -> PathBuf {
        self.templates_dir().join(name)
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.profile_dir())?;
        std::fs::create_dir_all(self.media_dir())?;
        std::fs::create_dir_all(self.templates_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_layout() {
        let paths = Paths::with_base(PathBuf::from("/tmp/tp-test"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/tp-test/config.json"));
        assert_eq!(paths.state_file(), PathBuf::from("/tmp/tp-test/state.json"));
        assert_eq!(
            paths.template_file("test_mode.json"),
            PathBuf::from("/tmp/tp-test/templates/test_mode.json")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_tree() {
        let temp = tempfile::TempDir::new().unwrap();
        let paths = Paths::with_base(temp.path().join("home"));
        paths.ensure_dirs().unwrap();
        assert!(paths.profile_dir().is_dir());
        assert!(paths.media_dir().is_dir());
        assert!(paths.templates_dir().is_dir());
    }
}

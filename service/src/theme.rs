//! Theme resource lookup.

use std::path::PathBuf;

/// Resolves a logical script name to a path inside one of the active themes.
pub trait ThemeLookup: Send + Sync {
    /// Path relative to the public root, or `None` if no theme has the script.
    fn find_themed_javascript(&self, name: &str) -> Option<String>;
}

/// Looks for `<themes_dir>/<theme>/javascript/<name>.js`, then
/// `<themes_dir>/<theme>/<name>.js`, in theme priority order.
#[derive(Debug, Clone)]
pub struct DirectoryThemeLookup {
    public_root: PathBuf,
    themes_dir: String,
    themes: Vec<String>,
}

impl DirectoryThemeLookup {
    #[must_use]
    pub fn new(public_root: impl Into<PathBuf>, themes_dir: &str, themes: Vec<String>) -> Self {
        Self {
            public_root: public_root.into(),
            themes_dir: themes_dir.trim_matches('/').to_string(),
            themes,
        }
    }
}

impl ThemeLookup for DirectoryThemeLookup {
    fn find_themed_javascript(&self, name: &str) -> Option<String> {
        let file = if name.ends_with(".js") {
            name.to_string()
        } else {
            format!("{name}.js")
        };
        self.themes
            .iter()
            .flat_map(|theme| {
                [
                    format!("{}/{theme}/javascript/{file}", self.themes_dir),
                    format!("{}/{theme}/{file}", self.themes_dir),
                ]
            })
            .find(|candidate| self.public_root.join(candidate).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "defer-backend-theme-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_script_in_first_matching_theme() {
        let root = scratch_dir("first");
        fs::create_dir_all(root.join("themes/base/javascript")).unwrap();
        fs::create_dir_all(root.join("themes/custom/javascript")).unwrap();
        fs::write(root.join("themes/base/javascript/menu.js"), "").unwrap();
        fs::write(root.join("themes/custom/javascript/menu.js"), "").unwrap();

        let lookup = DirectoryThemeLookup::new(
            &root,
            "themes",
            vec!["custom".into(), "base".into()],
        );
        assert_eq!(
            lookup.find_themed_javascript("menu").as_deref(),
            Some("themes/custom/javascript/menu.js")
        );
        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn falls_back_to_theme_root_and_accepts_extension() {
        let root = scratch_dir("root");
        fs::create_dir_all(root.join("themes/base")).unwrap();
        fs::write(root.join("themes/base/app.js"), "").unwrap();

        let lookup = DirectoryThemeLookup::new(&root, "/themes/", vec!["base".into()]);
        assert_eq!(
            lookup.find_themed_javascript("app.js").as_deref(),
            Some("themes/base/app.js")
        );
        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_script_resolves_to_none() {
        let root = scratch_dir("missing");
        let lookup = DirectoryThemeLookup::new(&root, "themes", vec!["base".into()]);
        assert!(lookup.find_themed_javascript("nope").is_none());
        fs::remove_dir_all(root).unwrap();
    }
}

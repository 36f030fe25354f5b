use std::path::PathBuf;

use thiserror::Error;

use crate::config::PullLayout;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("refusing to place empty path")]
    Empty,
    #[error("refusing to place absolute path '{path}'")]
    Absolute { path: String },
    #[error("refusing to place path '{path}' outside the destination")]
    ParentTraversal { path: String },
}

/// Directory segments under `src` and where their files land in the app layout.
const SOURCE_DIRECTORY_RULES: &[(&[&str], &str)] = &[
    (&["pages"], "ui/src/pages"),
    (&["components"], "ui/src/components"),
    (&["util", "utils"], "ui/src/utils"),
    (&["hooks"], "ui/src/hooks"),
];

const SCRIPT_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js"];
const STYLE_EXTENSIONS: &[&str] = &["css", "scss", "sass"];

/// Target path for a repository file, relative to the pull destination.
/// `Ok(None)` means the layout has no place for this file and it is skipped.
pub fn place(path: &str, layout: PullLayout) -> Result<Option<PathBuf>, PlacementError> {
    let segments = clean_segments(path)?;
    match layout {
        PullLayout::Mirror => Ok(Some(segments.iter().collect())),
        PullLayout::App => Ok(place_in_app(&segments)),
    }
}

fn clean_segments(path: &str) -> Result<Vec<&str>, PlacementError> {
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(PlacementError::Absolute {
            path: path.to_string(),
        });
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(PlacementError::ParentTraversal {
                    path: path.to_string(),
                });
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return Err(PlacementError::Empty);
    }

    Ok(segments)
}

fn place_in_app(segments: &[&str]) -> Option<PathBuf> {
    let file_name = *segments.last()?;
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();

    if let Some(src_index) = segments.iter().position(|segment| *segment == "src") {
        let under_src = &segments[src_index..];

        for (names, target) in SOURCE_DIRECTORY_RULES {
            if under_src.iter().any(|segment| names.contains(segment)) {
                return Some(PathBuf::from(target).join(file_name));
            }
        }

        if under_src.contains(&"backends") && extension == "py" {
            return Some(PathBuf::from("src/app/apis").join(file_name));
        }
    }

    let directory = if extension == "py" {
        "src/app/apis"
    } else if SCRIPT_EXTENSIONS.contains(&extension.as_str()) {
        let lowered = file_name.to_lowercase();
        if file_name.starts_with("use") || file_name.starts_with("Use") {
            "ui/src/hooks"
        } else if lowered.contains("page") {
            "ui/src/pages"
        } else if lowered.contains("component") {
            "ui/src/components"
        } else {
            "ui/src/utils"
        }
    } else if STYLE_EXTENSIONS.contains(&extension.as_str()) {
        "ui/src/styles"
    } else {
        return None;
    };

    Some(PathBuf::from(directory).join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(path: &str) -> Option<String> {
        place(path, PullLayout::App)
            .expect("valid path")
            .map(|target| target.to_string_lossy().replace('\\', "/"))
    }

    #[test]
    fn mirror_keeps_relative_path() {
        let target = place("./src//lib/mod.rs", PullLayout::Mirror)
            .expect("valid")
            .expect("placed");

        assert_eq!(target, PathBuf::from("src").join("lib").join("mod.rs"));
    }

    #[test]
    fn mirror_rejects_escaping_paths() {
        assert_eq!(
            place("/etc/passwd", PullLayout::Mirror),
            Err(PlacementError::Absolute {
                path: "/etc/passwd".to_string()
            })
        );
        assert!(matches!(
            place("src/../../secret", PullLayout::Mirror),
            Err(PlacementError::ParentTraversal { .. })
        ));
        assert_eq!(place("./", PullLayout::Mirror), Err(PlacementError::Empty));
    }

    #[test]
    fn app_routes_known_source_directories() {
        assert_eq!(
            app("web/src/pages/Home.tsx").as_deref(),
            Some("ui/src/pages/Home.tsx")
        );
        assert_eq!(
            app("src/components/nav/Bar.tsx").as_deref(),
            Some("ui/src/components/Bar.tsx")
        );
        assert_eq!(
            app("src/util/date.ts").as_deref(),
            Some("ui/src/utils/date.ts")
        );
        assert_eq!(
            app("src/hooks/state.ts").as_deref(),
            Some("ui/src/hooks/state.ts")
        );
        assert_eq!(
            app("src/backends/users.py").as_deref(),
            Some("src/app/apis/users.py")
        );
    }

    #[test]
    fn app_falls_back_to_extension_rules() {
        assert_eq!(app("lib/useThing.ts").as_deref(), Some("ui/src/hooks/useThing.ts"));
        assert_eq!(
            app("lib/LandingPage.jsx").as_deref(),
            Some("ui/src/pages/LandingPage.jsx")
        );
        assert_eq!(
            app("lib/ButtonComponent.js").as_deref(),
            Some("ui/src/components/ButtonComponent.js")
        );
        assert_eq!(app("lib/format.ts").as_deref(), Some("ui/src/utils/format.ts"));
        assert_eq!(app("server/main.PY").as_deref(), Some("src/app/apis/main.PY"));
        assert_eq!(app("theme/site.scss").as_deref(), Some("ui/src/styles/site.scss"));
    }

    #[test]
    fn app_skips_unsupported_files() {
        assert_eq!(app("README.md"), None);
        assert_eq!(app("src/backends/schema.sql"), None);
        assert_eq!(app("Makefile"), None);
    }

    #[test]
    fn src_segment_must_match_whole_segment() {
        assert_eq!(app("source/pages/notes.txt"), None);
    }
}

//! Classification and renaming rules for GameMaker project files.

use std::fmt;

use serde::Serialize;

/// Single-file exports that the tool unpacks into a project folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    Yymp,
    Yymps,
    Yyz,
    Gmez,
    Gmz,
}

/// Project descriptor files that live at the root of a project directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectFormat {
    Yyp,
    ProjectGmx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "format", rename_all = "snake_case")]
pub enum ProjectKind {
    Package(PackageFormat),
    ProjectFile(ProjectFormat),
}

impl ProjectKind {
    /// File-name suffix including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ProjectKind::Package(PackageFormat::Yymp) => ".yymp",
            ProjectKind::Package(PackageFormat::Yymps) => ".yymps",
            ProjectKind::Package(PackageFormat::Yyz) => ".yyz",
            ProjectKind::Package(PackageFormat::Gmez) => ".gmez",
            ProjectKind::Package(PackageFormat::Gmz) => ".gmz",
            ProjectKind::ProjectFile(ProjectFormat::Yyp) => ".yyp",
            ProjectKind::ProjectFile(ProjectFormat::ProjectGmx) => ".project.gmx",
        }
    }

    /// GameMaker Studio 1.x formats. Their converted folders carry a ` gmx` suffix.
    pub fn is_legacy(self) -> bool {
        matches!(
            self,
            ProjectKind::Package(PackageFormat::Gmez | PackageFormat::Gmz)
                | ProjectKind::ProjectFile(ProjectFormat::ProjectGmx)
        )
    }

    pub fn is_package(self) -> bool {
        matches!(self, ProjectKind::Package(_))
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// Longer suffixes first so `.yymps` never matches as `.yymp`.
const KNOWN_KINDS: [ProjectKind; 7] = [
    ProjectKind::ProjectFile(ProjectFormat::ProjectGmx),
    ProjectKind::Package(PackageFormat::Yymps),
    ProjectKind::Package(PackageFormat::Yymp),
    ProjectKind::Package(PackageFormat::Gmez),
    ProjectKind::Package(PackageFormat::Gmz),
    ProjectKind::Package(PackageFormat::Yyz),
    ProjectKind::ProjectFile(ProjectFormat::Yyp),
];

/// Suffix appended to output folders of legacy projects.
pub const LEGACY_FOLDER_SUFFIX: &str = " gmx";

/// A recognised project file name split into stem and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectName {
    pub stem: String,
    pub kind: ProjectKind,
}

impl ProjectName {
    /// Parse a bare file name (no directory components).
    ///
    /// Returns `None` for names that are not a project file, including a bare
    /// extension such as `.yyp` with an empty stem.
    pub fn parse(file_name: &str) -> Option<Self> {
        let kind = classify(file_name)?;
        let stem = &file_name[..file_name.len() - kind.extension().len()];
        if stem.is_empty() {
            return None;
        }
        Some(Self {
            stem: stem.to_string(),
            kind,
        })
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem, self.kind.extension())
    }

    pub fn shortened_stem(&self) -> &str {
        shortened_name(&self.stem)
    }

    /// File name with the author prefix removed and the original extension.
    pub fn shortened_file_name(&self) -> String {
        format!("{}{}", self.shortened_stem(), self.kind.extension())
    }

    pub fn has_author_prefix(&self) -> bool {
        self.shortened_stem() != self.stem
    }

    /// Name of the `.yyp` the tool writes for this project.
    pub fn converted_file_name(&self) -> String {
        format!("{}.yyp", self.shortened_stem())
    }

    /// Output folder for a package converted next to itself: the full
    /// (unshortened) stem, suffixed for legacy formats.
    pub fn package_folder_name(&self) -> String {
        if self.kind.is_legacy() {
            format!("{}{}", self.stem, LEGACY_FOLDER_SUFFIX)
        } else {
            self.stem.clone()
        }
    }
}

/// Classify a file name by its project extension (case-sensitive).
pub fn classify(file_name: &str) -> Option<ProjectKind> {
    KNOWN_KINDS
        .iter()
        .copied()
        .find(|kind| file_name.ends_with(kind.extension()))
}

/// Drop an author prefix of the form `"<user> - "`.
///
/// Everything after the first `" - "` is kept, so `"a - b - c"` becomes `"b - c"`.
pub fn shortened_name(name: &str) -> &str {
    match name.split_once(" - ") {
        Some((_, rest)) => rest,
        None => name,
    }
}

/// Output folder name for a project directory found during a batch run.
///
/// Legacy `.project.gmx` projects get a ` gmx` suffix unless the folder or the
/// file already mentions `gm8` (those come from a GM8 import and keep their name).
pub fn batch_project_folder_name(folder_name: &str, project: &ProjectName) -> String {
    let mentions_gm8 = folder_name.to_lowercase().contains("gm8")
        || project.file_name().to_lowercase().contains("gm8");
    if project.kind == ProjectKind::ProjectFile(ProjectFormat::ProjectGmx) && !mentions_gm8 {
        format!("{folder_name}{LEGACY_FOLDER_SUFFIX}")
    } else {
        folder_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_known_extension() {
        assert_eq!(
            classify("game.yymps"),
            Some(ProjectKind::Package(PackageFormat::Yymps))
        );
        assert_eq!(
            classify("game.yymp"),
            Some(ProjectKind::Package(PackageFormat::Yymp))
        );
        assert_eq!(
            classify("game.yyz"),
            Some(ProjectKind::Package(PackageFormat::Yyz))
        );
        assert_eq!(
            classify("game.gmez"),
            Some(ProjectKind::Package(PackageFormat::Gmez))
        );
        assert_eq!(
            classify("game.gmz"),
            Some(ProjectKind::Package(PackageFormat::Gmz))
        );
        assert_eq!(
            classify("game.yyp"),
            Some(ProjectKind::ProjectFile(ProjectFormat::Yyp))
        );
        assert_eq!(
            classify("game.project.gmx"),
            Some(ProjectKind::ProjectFile(ProjectFormat::ProjectGmx))
        );
    }

    #[test]
    fn ignores_unrelated_files() {
        assert_eq!(classify("notes.txt"), None);
        assert_eq!(classify("sprite.gmx"), None);
        assert_eq!(classify("game.YYP"), None);
        assert_eq!(ProjectName::parse(".yyp"), None);
    }

    #[test]
    fn shortened_name_splits_on_first_separator() {
        assert_eq!(shortened_name("alice - Space Game"), "Space Game");
        assert_eq!(shortened_name("a - b - c"), "b - c");
        assert_eq!(shortened_name("Space-Game"), "Space-Game");
    }

    #[test]
    fn project_gmx_keeps_compound_extension() {
        let name = ProjectName::parse("bob - Platformer.project.gmx").expect("parse");
        assert_eq!(name.stem, "bob - Platformer");
        assert_eq!(name.shortened_file_name(), "Platformer.project.gmx");
        assert_eq!(name.converted_file_name(), "Platformer.yyp");
        assert!(name.has_author_prefix());
    }

    #[test]
    fn package_folder_keeps_full_stem() {
        let legacy = ProjectName::parse("bob - Maze.gmz").expect("parse");
        assert_eq!(legacy.package_folder_name(), "bob - Maze gmx");

        let modern = ProjectName::parse("bob - Maze.yyz").expect("parse");
        assert_eq!(modern.package_folder_name(), "bob - Maze");
        assert_eq!(modern.converted_file_name(), "Maze.yyp");
    }

    #[test]
    fn batch_folder_suffix_skips_gm8_imports() {
        let gmx = ProjectName::parse("Maze.project.gmx").expect("parse");
        assert_eq!(batch_project_folder_name("Maze", &gmx), "Maze gmx");
        assert_eq!(batch_project_folder_name("Maze GM8", &gmx), "Maze GM8");

        let gm8_file = ProjectName::parse("maze_gm8.project.gmx").expect("parse");
        assert_eq!(batch_project_folder_name("Maze", &gm8_file), "Maze");

        let yyp = ProjectName::parse("Maze.yyp").expect("parse");
        assert_eq!(batch_project_folder_name("Maze", &yyp), "Maze");
    }
}

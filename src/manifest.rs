use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use miette::Diagnostic;
use thiserror::Error;
use walkdir::WalkDir;
use xmltree::Element;

use crate::{fs, xml};

pub(crate) const PACKAGE_ID: &str = "PackageId";
pub(crate) const RELEASE_NOTES: &str = "PackageReleaseNotes";

/// The parts of a project file that are published: who the package is and what changed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Manifest {
    pub(crate) package_id: String,
    pub(crate) release_notes: String,
}

impl Manifest {
    pub(crate) fn read(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Extract the package id and release notes, each of which must appear exactly once.
    pub(crate) fn parse(path: &Path, content: &str) -> Result<Self, Error> {
        let project = Element::parse(content.as_bytes()).map_err(|source| Error::Xml {
            path: path.into(),
            source,
        })?;
        let package_id = xml::unique_text(&project, PACKAGE_ID)
            .map(|id| id.trim().to_string())
            .ok_or_else(|| Error::MissingField {
                path: path.into(),
                field: PACKAGE_ID,
            })?;
        let release_notes =
            xml::unique_text(&project, RELEASE_NOTES).ok_or_else(|| Error::MissingField {
                path: path.into(),
                field: RELEASE_NOTES,
            })?;
        Ok(Self {
            package_id,
            release_notes,
        })
    }
}

/// Every file under `root` with the given extension, sorted by file name within each directory.
pub(crate) fn discover(root: &Path, extension: &str) -> Result<Vec<PathBuf>, Error> {
    let extension = OsStr::new(extension);
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => (entry.file_type().is_file()
                && entry.path().extension() == Some(extension))
            .then(|| Ok(entry.into_path())),
            Err(source) => Some(Err(Error::Walk {
                root: root.into(),
                source,
            })),
        })
        .collect()
}

#[derive(Debug, Diagnostic, Error)]
pub enum Error {
    #[error("Could not search {root} for manifests: {source}")]
    #[diagnostic(
        code(manifest::walk),
        help("Make sure the source directory exists and is readable, or point --source-dir somewhere else.")
    )]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Invalid XML in {path}: {source}")]
    #[diagnostic(code(manifest::xml))]
    Xml {
        path: PathBuf,
        #[source]
        source: xmltree::ParseError,
    },
    #[error("{path} has no single {field} element")]
    #[diagnostic(
        code(manifest::missing_field),
        help("Only project files with exactly one PackageId and one PackageReleaseNotes are published.")
    )]
    MissingField { path: PathBuf, field: &'static str },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fs(#[from] fs::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs::{create_dir_all, write};

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_project() {
        let content = r"
        <Project Sdk='Microsoft.NET.Sdk'>
          <PropertyGroup>
            <TargetFramework>netstandard2.0</TargetFramework>
            <PackageId> Nexus.Link.Libraries.Core </PackageId>
            <Version>1.0.1</Version>
            <PackageReleaseNotes>1.0.1 Improved performance.
1.0.0 Fixed a crash.</PackageReleaseNotes>
          </PropertyGroup>
        </Project>
        ";

        let manifest = Manifest::parse(Path::new("Core.csproj"), content).unwrap();

        assert_eq!(
            manifest,
            Manifest {
                package_id: "Nexus.Link.Libraries.Core".to_string(),
                release_notes: "1.0.1 Improved performance.\n1.0.0 Fixed a crash.".to_string(),
            }
        );
    }

    #[test]
    fn missing_release_notes() {
        let content = r"
        <Project>
          <PropertyGroup>
            <PackageId>Nexus.Link.Libraries.Core</PackageId>
          </PropertyGroup>
        </Project>
        ";

        let err = Manifest::parse(Path::new("Core.csproj"), content).unwrap_err();

        let Error::MissingField { field, .. } = &err else {
            panic!("Expected a missing field, got {err}");
        };
        assert_eq!(*field, RELEASE_NOTES);
    }

    #[test]
    fn ambiguous_package_id() {
        let content = r"
        <Project>
          <PropertyGroup Condition=''>
            <PackageId>First</PackageId>
          </PropertyGroup>
          <PropertyGroup>
            <PackageId>Second</PackageId>
            <PackageReleaseNotes>1.0.0 Initial</PackageReleaseNotes>
          </PropertyGroup>
        </Project>
        ";

        let err = Manifest::parse(Path::new("Core.csproj"), content).unwrap_err();

        let Error::MissingField { field, .. } = &err else {
            panic!("Expected a missing field, got {err}");
        };
        assert_eq!(*field, PACKAGE_ID);
    }

    #[test]
    fn invalid_xml() {
        let err = Manifest::parse(Path::new("Broken.csproj"), "<Project><PackageId>").unwrap_err();

        assert!(matches!(err, Error::Xml { .. }));
    }

    #[test]
    fn discover_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        create_dir_all(root.join("Libraries.Core")).unwrap();
        create_dir_all(root.join("Libraries.Crud/nested")).unwrap();
        write(root.join("Libraries.Core/Core.csproj"), "").unwrap();
        write(root.join("Libraries.Core/Core.cs"), "").unwrap();
        write(root.join("Libraries.Crud/nested/Crud.csproj"), "").unwrap();
        write(root.join("Libraries.Crud/Crud.csproj.user"), "").unwrap();
        write(root.join("Libraries.Crud/README.md"), "").unwrap();

        let found = discover(root, "csproj").unwrap();

        assert_eq!(
            found,
            vec![
                root.join("Libraries.Core/Core.csproj"),
                root.join("Libraries.Crud/nested/Crud.csproj"),
            ]
        );
    }

    #[test]
    fn discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();

        let result = discover(&dir.path().join("nothing-here"), "csproj");

        assert!(matches!(result, Err(Error::Walk { .. })));
    }
}

//! Film manifest loading
//!
//! The manifest lists the films of a run. TOML and JSON are accepted (chosen
//! by file extension) with the same shape:
//!
//! ```toml
//! [[film]]
//! id = "ddlj"                      # optional, derived from the title
//! title = "Dilwale Dulhania Le Jayenge"
//! year = 1995
//! synopsis = "Raj and Simran meet on a trip across Europe..."
//! # synopsis_file = "synopses/ddlj.txt"
//! posters = ["posters/ddlj_img_1.jpg"]
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use super::movie_name::clean_movie_name;
use crate::error::{AnalysisError, Result};
use crate::report::file_stem;
use filmbias_common::Film;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(rename = "film", default)]
    films: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    synopsis: Option<String>,
    #[serde(default)]
    synopsis_file: Option<PathBuf>,
    #[serde(default)]
    posters: Vec<PathBuf>,
}

/// Film id derived from a title: cleaned, words joined by `-`
pub fn film_id_from_title(title: &str) -> String {
    clean_movie_name(title).replace(' ', "-")
}

/// Load and validate a manifest file
///
/// # Errors
/// `InvalidInput` for unparseable manifests, films without an id or title,
/// duplicate ids, ids mapping to the same report file name, films giving both `synopsis` and `synopsis_file`, and
/// unreadable synopsis files.
pub fn load_manifest(path: &Path) -> Result<Vec<Film>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AnalysisError::InvalidInput(format!("cannot read manifest {}: {}", path.display(), e))
    })?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let manifest: ManifestFile = if is_json {
        serde_json::from_str(&content).map_err(|e| {
            AnalysisError::InvalidInput(format!("invalid manifest {}: {}", path.display(), e))
        })?
    } else {
        toml::from_str(&content).map_err(|e| {
            AnalysisError::InvalidInput(format!("invalid manifest {}: {}", path.display(), e))
        })?
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let films = build_films(manifest.films, base_dir)?;

    info!(manifest = %path.display(), films = films.len(), "Loaded film manifest");
    Ok(films)
}

fn build_films(entries: Vec<ManifestEntry>, base_dir: &Path) -> Result<Vec<Film>> {
    // report file stem -> film id
    let mut stems: HashMap<String, String> = HashMap::new();
    let mut films = Vec::with_capacity(entries.len());

    for (i, entry) in entries.into_iter().enumerate() {
        let title = entry.title.trim().to_string();
        if title.is_empty() {
            return Err(AnalysisError::InvalidInput(format!("film #{} has an empty title", i + 1)));
        }

        let film_id = match entry.id {
            Some(id) => id.trim().to_string(),
            None => film_id_from_title(&title),
        };
        if film_id.is_empty() {
            return Err(AnalysisError::InvalidInput(format!(
                "film '{}' has no usable id",
                title
            )));
        }
        let stem = file_stem(&film_id);
        if let Some(other) = stems.get(&stem) {
            let reason = if *other == film_id {
                format!("duplicate film id '{}'", film_id)
            } else {
                format!(
                    "film ids '{}' and '{}' map to the same report file name",
                    other, film_id
                )
            };
            return Err(AnalysisError::InvalidInput(reason));
        }
        stems.insert(stem, film_id.clone());

        let synopsis = match (entry.synopsis, entry.synopsis_file) {
            (Some(_), Some(_)) => {
                return Err(AnalysisError::InvalidInput(format!(
                    "film '{}' sets both synopsis and synopsis_file",
                    film_id
                )))
            }
            (Some(text), None) => Some(text),
            (None, Some(file)) => {
                let file = resolve(base_dir, file);
                let text = std::fs::read_to_string(&file).map_err(|e| {
                    AnalysisError::InvalidInput(format!(
                        "film '{}': cannot read synopsis {}: {}",
                        film_id,
                        file.display(),
                        e
                    ))
                })?;
                Some(text)
            }
            (None, None) => None,
        }
        .filter(|s| !s.trim().is_empty());

        films.push(Film {
            film_id,
            title,
            release_year: entry.year,
            synopsis,
            posters: entry
                .posters
                .into_iter()
                .map(|p| resolve(base_dir, p))
                .collect(),
        });
    }

    Ok(films)
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base_dir.join(path)
    } else {
        path
    }
}

/// Keep only the films named in `ids` (all films when `ids` is empty)
///
/// Order follows the manifest. Unknown ids are an `InvalidInput` error.
pub fn select_films(films: Vec<Film>, ids: &[String]) -> Result<Vec<Film>> {
    if ids.is_empty() {
        return Ok(films);
    }

    if let Some(missing) = ids.iter().find(|id| !films.iter().any(|f| &f.film_id == *id)) {
        return Err(AnalysisError::InvalidInput(format!(
            "film '{}' is not in the manifest",
            missing
        )));
    }

    Ok(films
        .into_iter()
        .filter(|f| ids.contains(&f.film_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_toml_manifest() {
        let dir = TempDir::new().unwrap();
        write(&dir, "synopses/sholay.txt", "Thakur hires two small-time crooks.");
        let path = write(
            &dir,
            "films.toml",
            r#"
[[film]]
id = "ddlj"
title = "Dilwale Dulhania Le Jayenge"
year = 1995
synopsis = "Raj meets Simran."
posters = ["posters/ddlj_img_1.jpg"]

[[film]]
title = "Sholay (1975)"
year = 1975
synopsis_file = "synopses/sholay.txt"
"#,
        );

        let films = load_manifest(&path).unwrap();
        assert_eq!(films.len(), 2);
        assert_eq!(films[0].film_id, "ddlj");
        assert_eq!(films[0].posters, vec![dir.path().join("posters/ddlj_img_1.jpg")]);
        assert_eq!(films[1].film_id, "sholay");
        assert_eq!(
            films[1].synopsis.as_deref(),
            Some("Thakur hires two small-time crooks.")
        );
        assert_eq!(films[1].decade(), Some(1970));
    }

    #[test]
    fn test_json_manifest() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.json",
            r#"{"film": [{"id": "lagaan", "title": "Lagaan", "year": 2001}]}"#,
        );
        let films = load_manifest(&path).unwrap();
        assert_eq!(films[0].film_id, "lagaan");
        assert!(films[0].synopsis.is_none());
        assert!(films[0].posters.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.toml",
            "[[film]]\nid = \"a\"\ntitle = \"A\"\n\n[[film]]\nid = \"a\"\ntitle = \"B\"\n",
        );
        assert!(matches!(load_manifest(&path), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_colliding_report_names_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.toml",
            "[[film]]\nid = \"a.b\"\ntitle = \"A\"\n\n[[film]]\nid = \"a_b\"\ntitle = \"B\"\n",
        );
        match load_manifest(&path) {
            Err(AnalysisError::InvalidInput(msg)) => assert!(msg.contains("same report file name")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_both_synopsis_sources_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.toml",
            "[[film]]\ntitle = \"A\"\nsynopsis = \"x\"\nsynopsis_file = \"x.txt\"\n",
        );
        assert!(matches!(load_manifest(&path), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_synopsis_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.toml",
            "[[film]]\ntitle = \"A\"\nsynopsis_file = \"missing.txt\"\n",
        );
        assert!(matches!(load_manifest(&path), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_select_films() {
        let film = |id: &str| Film {
            film_id: id.to_string(),
            title: id.to_string(),
            release_year: None,
            synopsis: None,
            posters: Vec::new(),
        };
        let films = vec![film("a"), film("b"), film("c")];

        let selected = select_films(films.clone(), &["c".to_string(), "a".to_string()]).unwrap();
        let ids: Vec<_> = selected.iter().map(|f| f.film_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        assert_eq!(select_films(films.clone(), &[]).unwrap().len(), 3);
        assert!(select_films(films, &["z".to_string()]).is_err());
    }
}

//! Poster directory scanning
//!
//! Finds poster images under a directory and assigns them to films by the
//! title encoded in the file name (`<title>_img_<n>.<ext>`). Files are
//! verified as images by their magic bytes, not their extension.

use super::movie_name::{clean_movie_name, poster_title};
use crate::error::{AnalysisError, Result};
use filmbias_common::Film;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Recursively collect image files under `root`, sorted by path
pub fn scan_posters(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(AnalysisError::InvalidInput(format!(
            "poster directory not found: {}",
            root.display()
        )));
    }

    let mut posters = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_image(entry.path()) {
                    posters.push(entry.into_path());
                }
            }
            Err(e) => {
                warn!("Error accessing entry: {}", e);
            }
        }
    }

    posters.sort();
    debug!(root = %root.display(), posters = posters.len(), "Poster scan complete");
    Ok(posters)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn is_image(path: &Path) -> bool {
    match infer::get_from_path(path) {
        Ok(Some(kind)) => kind.matcher_type() == infer::MatcherType::Image,
        Ok(None) => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read file header");
            false
        }
    }
}

/// Append scanned posters to the films whose title (or id) they encode
///
/// Posters already listed for a film are not added twice. Returns the number
/// of posters that matched no film.
pub fn attach_posters(films: &mut [Film], posters: Vec<PathBuf>) -> usize {
    let mut by_title: HashMap<String, usize> = HashMap::new();
    for (i, film) in films.iter().enumerate() {
        by_title.entry(clean_movie_name(&film.title)).or_insert(i);
        by_title
            .entry(clean_movie_name(&film.film_id))
            .or_insert(i);
    }

    let mut attached = 0;
    let mut unmatched = 0;
    for poster in posters {
        let title = poster
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(poster_title);

        match title.and_then(|t| by_title.get(&t).copied()) {
            Some(i) => {
                let film = &mut films[i];
                if !film.posters.contains(&poster) {
                    film.posters.push(poster);
                    attached += 1;
                }
            }
            None => {
                debug!(poster = %poster.display(), "Poster matches no film");
                unmatched += 1;
            }
        }
    }

    info!(attached, unmatched, "Assigned scanned posters to films");
    unmatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn film(id: &str, title: &str) -> Film {
        Film {
            film_id: id.to_string(),
            title: title.to_string(),
            release_year: None,
            synopsis: None,
            posters: Vec::new(),
        }
    }

    #[test]
    fn test_scan_filters_by_content() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("Sholay_img_1.png"), PNG_HEADER).unwrap();
        std::fs::write(dir.path().join("nested/Lagaan_img_1.dat"), PNG_HEADER).unwrap();
        std::fs::write(dir.path().join("fake_img_1.jpg"), b"not an image").unwrap();
        std::fs::write(dir.path().join(".hidden.png"), PNG_HEADER).unwrap();

        let posters = scan_posters(dir.path()).unwrap();
        let names: Vec<_> = posters
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Sholay_img_1.png", "Lagaan_img_1.dat"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(scan_posters(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_attach_posters() {
        let mut films = vec![film("sholay", "Sholay (1975)"), film("ddlj", "Dilwale Dulhania Le Jayenge")];
        let posters = vec![
            PathBuf::from("/p/Sholay_img_1.jpg"),
            PathBuf::from("/p/Dilwale_Dulhania_Le_Jayenge_img_2.jpg"),
            PathBuf::from("/p/ddlj_img_3.jpg"),
            PathBuf::from("/p/Unknown_img_1.jpg"),
            PathBuf::from("/p/cover.jpg"),
        ];

        let unmatched = attach_posters(&mut films, posters);
        assert_eq!(unmatched, 2);
        assert_eq!(films[0].posters.len(), 1);
        assert_eq!(films[1].posters.len(), 2);
    }
}

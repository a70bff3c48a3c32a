//! Movie title normalization
//!
//! Titles come from several places (manifest, poster file names, external
//! datasets) with inconsistent years, punctuation and case. Both sides of a
//! comparison go through [`clean_movie_name`] before matching.

use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(?\d{4}\)?$").expect("valid regex"));
static UNDERSCORE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"_\d{4}$").expect("valid regex"));
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Marker separating the title from the image index in poster file names
pub const POSTER_MARKER: &str = "_img_";

/// Normalize a movie title for matching
///
/// Strips a trailing year (`" (2017)"`, `" 2017"`, `"_2017"`), lower-cases,
/// turns underscores into spaces, drops everything except `[a-z0-9]` and
/// whitespace, and collapses whitespace.
pub fn clean_movie_name(name: &str) -> String {
    let name = TRAILING_YEAR.replace(name.trim(), "");
    let name = UNDERSCORE_YEAR.replace(&name, "");
    let name = name.to_lowercase().replace('_', " ");
    let name = NON_ALNUM.replace_all(&name, "");
    WHITESPACE.replace_all(&name, " ").trim().to_string()
}

/// Cleaned title encoded in a poster file name (`<title>_img_<n>.<ext>`)
///
/// Returns `None` when the name does not follow the convention.
pub fn poster_title(file_name: &str) -> Option<String> {
    let stem = match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    };
    let (title, _) = stem.rsplit_once(POSTER_MARKER)?;
    let cleaned = clean_movie_name(title);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_movie_name() {
        assert_eq!(clean_movie_name("Dilwale Dulhania Le Jayenge (1995)"), "dilwale dulhania le jayenge");
        assert_eq!(clean_movie_name("Baahubali 2: The Conclusion 2017"), "baahubali 2 the conclusion");
        assert_eq!(clean_movie_name("Sholay_1975"), "sholay");
        assert_eq!(clean_movie_name("  Kabhi   Khushi Kabhie Gham... "), "kabhi khushi kabhie gham");
        assert_eq!(clean_movie_name("3 Idiots"), "3 idiots");
        assert_eq!(clean_movie_name(""), "");
    }

    #[test]
    fn test_poster_title() {
        assert_eq!(poster_title("Sholay_img_1.jpg").as_deref(), Some("sholay"));
        assert_eq!(
            poster_title("Dil_Chahta_Hai_img_12.png").as_deref(),
            Some("dil chahta hai")
        );
        assert_eq!(poster_title("random_poster.jpg"), None);
        assert_eq!(poster_title("_img_1.jpg"), None);
    }
}

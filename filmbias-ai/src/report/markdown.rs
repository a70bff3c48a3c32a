//! Markdown film report

use crate::workflow::FilmAnalysis;
use filmbias_common::Gender;
use std::fmt::Write;

/// Render the report for one film
///
/// Sections: summary, per-character scores, category breakdown by gender,
/// remediation suggestions, skipped sources.
pub fn render_film_report(analysis: &FilmAnalysis) -> String {
    let film = &analysis.film;
    let aggregate = &analysis.aggregate;
    let mut md = String::new();

    let _ = writeln!(md, "# Film Bias Analysis Report: {}\n", escape_markdown(&film.title));

    // Summary
    let _ = writeln!(md, "## Summary\n");
    let _ = writeln!(md, "- Film id: `{}`", film.film_id);
    match film.release_year {
        Some(year) => {
            let _ = writeln!(md, "- Release year: {} (decade {}s)", year, filmbias_common::model::decade_of(year));
        }
        None => {
            let _ = writeln!(md, "- Release year: unknown");
        }
    }
    let _ = writeln!(md, "- Characters: {}", aggregate.character_count);
    let _ = writeln!(md, "- Stereotype matches: {}", aggregate.match_count);
    let _ = writeln!(
        md,
        "- Total bias score: {:.2} (mean per character {:.2})\n",
        aggregate.total.sum, aggregate.total.mean
    );

    // Characters
    let _ = writeln!(md, "## Characters\n");
    if analysis.characters.is_empty() {
        let _ = writeln!(md, "No characters were extracted.\n");
    } else {
        let _ = writeln!(md, "| Character | Source | Gender | Score | Categories |");
        let _ = writeln!(md, "|---|---|---|---|---|");
        for character in &analysis.characters {
            let categories = character
                .category_scores()
                .into_iter()
                .map(|(c, s)| format!("{} ({:.2})", c, s))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                md,
                "| {} | {} | {} | {:.2} | {} |",
                escape_cell(character.mention.character_id()),
                character.mention.source(),
                character.mention.gender(),
                character.total_severity(),
                if categories.is_empty() { "-".to_string() } else { categories }
            );
        }
        md.push('\n');
    }

    // Category breakdown
    let _ = writeln!(md, "## Category Breakdown\n");
    if aggregate.by_category.is_empty() {
        let _ = writeln!(md, "No stereotype matches.\n");
    } else {
        let _ = writeln!(md, "| Category | Sum | Mean | Female | Male | Unknown |");
        let _ = writeln!(md, "|---|---|---|---|---|---|");
        for (category, cell) in &aggregate.by_category {
            let _ = writeln!(
                md,
                "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |",
                category,
                cell.sum,
                cell.mean,
                aggregate.category_gender(category, Gender::Female).sum,
                aggregate.category_gender(category, Gender::Male).sum,
                aggregate.category_gender(category, Gender::Unknown).sum,
            );
        }
        md.push('\n');
    }

    // Remediation
    let _ = writeln!(md, "## Remediation Suggestions\n");
    if analysis.remediation.is_empty() {
        let _ = writeln!(md, "No flagged characters.\n");
    }
    for suggestion in &analysis.remediation {
        let request = &suggestion.request;
        let _ = writeln!(
            md,
            "### {} ({})\n",
            escape_markdown(&request.character_id),
            request.source
        );
        let categories = request
            .categories
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(md, "Identified stereotypes: {}\n", categories);
        for line in request.excerpt.lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(md, "> {}", line);
        }
        md.push('\n');
        for line in &suggestion.suggestions {
            let _ = writeln!(md, "- {}", line);
        }
        md.push('\n');
    }

    if !analysis.warnings.is_empty() {
        let _ = writeln!(md, "## Skipped Sources\n");
        for warning in &analysis.warnings {
            let _ = writeln!(md, "- {}", warning);
        }
        md.push('\n');
    }

    md
}

/// Keep titles on one line and out of header syntax
fn escape_markdown(s: &str) -> String {
    s.replace('#', "\\#").replace('\n', " ").replace('\r', "")
}

fn escape_cell(s: &str) -> String {
    escape_markdown(s).replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate_film;
    use crate::remediation::{RemediationRequest, RemediationSuggestion};
    use crate::scoring::CharacterScorer;
    use filmbias_common::model::Category;
    use filmbias_common::{CharacterMention, Film, MentionSource, Taxonomy};
    use std::sync::Arc;

    fn analysis() -> FilmAnalysis {
        let scorer = CharacterScorer::new(Arc::new(Taxonomy::builtin()));
        let characters = vec![scorer.score(
            &CharacterMention::builder("ddlj", "Simran", MentionSource::Synopsis)
                .gender(Gender::Female)
                .verbs(["waits"])
                .build(),
        )];
        let aggregate = aggregate_film("ddlj", &characters);
        FilmAnalysis {
            film: Film {
                film_id: "ddlj".into(),
                title: "Dilwale Dulhania Le Jayenge".into(),
                release_year: Some(1995),
                synopsis: None,
                posters: Vec::new(),
            },
            characters,
            aggregate,
            remediation: vec![RemediationSuggestion {
                request: RemediationRequest {
                    film_id: "ddlj".into(),
                    character_id: "Simran".into(),
                    source: MentionSource::Synopsis,
                    excerpt: "Simran waits at home.".into(),
                    categories: vec![Category::new("passive-agency")],
                },
                suggestions: vec!["Simran plans her own journey.".into()],
                generated: true,
            }],
            warnings: vec!["poster skipped: Network error: timeout".into()],
        }
    }

    #[test]
    fn test_report_sections() {
        let md = render_film_report(&analysis());
        assert!(md.starts_with("# Film Bias Analysis Report: Dilwale Dulhania Le Jayenge"));
        assert!(md.contains("- Release year: 1995 (decade 1990s)"));
        assert!(md.contains("| Simran | synopsis | female | 3.00 | passive-agency (3.00) |"));
        assert!(md.contains("| passive-agency | 3.00 | 3.00 | 3.00 | 0.00 | 0.00 |"));
        assert!(md.contains("> Simran waits at home."));
        assert!(md.contains("- Simran plans her own journey."));
        assert!(md.contains("## Skipped Sources"));
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_markdown("# Title\nnext"), "\\# Title next");
        assert_eq!(escape_cell("a|b"), "a\\|b");
    }
}

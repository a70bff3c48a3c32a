//! Offline rule-based synopsis parser
//!
//! Used when no text model is configured. Finds characters by their
//! capitalized names (optionally preceded by an honorific), then collects
//! attributes from every sentence that mentions them:
//!
//! - professions, relationship words and appearance words in the sentence
//! - the verb directly following the name ("Simran *waits*")
//! - gender hints: honorific titles, and pronouns or gendered relationship
//!   words in sentences that mention no other character
//!
//! Conflicting hints leave the gender unknown. The vocabulary lists are
//! intentionally broader than the taxonomy: extraction reports what is there,
//! scoring decides what is stereotyped.

use super::{ExtractionError, SynopsisParser};
use async_trait::async_trait;
use filmbias_common::{CharacterMention, Gender, MentionSource};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid regex"));

static NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:(Mr|Mrs|Ms|Miss|Dr|Inspector|Detective|Officer|Sir|Madam|King|Queen|Prince|Princess)\.?\s+)?([A-Z][a-z]+)\b",
    )
    .expect("valid regex")
});

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").expect("valid regex"));

const PROFESSIONS: &[&str] = &[
    "doctor", "engineer", "teacher", "police", "policeman", "businessman", "lawyer", "student",
    "worker", "manager", "artist", "nurse", "secretary", "chef", "driver", "servant", "maid",
    "politician", "criminal", "gangster", "detective", "inspector", "actor", "actress",
    "director", "producer", "musician", "singer", "dancer", "writer", "journalist", "scientist",
    "architect", "shopkeeper", "farmer", "labourer", "soldier", "captain", "housewife",
    "receptionist",
];

const RELATIONSHIPS: &[&str] = &[
    "father", "mother", "son", "daughter", "brother", "sister", "husband", "wife", "friend",
    "lover", "boss", "colleague", "uncle", "aunt", "cousin", "grandma", "grandpa", "neighbor",
    "partner", "enemy", "stranger", "fiance", "fiancee", "guardian", "widow", "widower", "orphan",
];

const APPEARANCES: &[&str] = &[
    "beautiful", "handsome", "old", "young", "tall", "short", "strong", "weak", "pretty", "ugly",
    "fat", "thin", "rich", "poor", "fair", "dark", "attractive", "unattractive", "charming",
    "muscular", "fragile", "helpless", "tough", "brave", "cowardly",
];

const GENDERED_RELATIONSHIPS: &[(&str, Gender)] = &[
    ("father", Gender::Male),
    ("mother", Gender::Female),
    ("son", Gender::Male),
    ("daughter", Gender::Female),
    ("brother", Gender::Male),
    ("sister", Gender::Female),
    ("husband", Gender::Male),
    ("wife", Gender::Female),
    ("uncle", Gender::Male),
    ("aunt", Gender::Female),
    ("grandpa", Gender::Male),
    ("grandma", Gender::Female),
    ("widower", Gender::Male),
    ("widow", Gender::Female),
];

/// Capitalized words that are not character names
const NON_NAMES: &[&str] = &[
    "the", "a", "an", "and", "but", "or", "so", "when", "while", "after", "before", "as", "at",
    "in", "on", "of", "to", "with", "from", "for", "by", "he", "she", "they", "his", "her",
    "their", "it", "its", "this", "that", "these", "those", "there", "then", "however",
    "meanwhile", "later", "soon", "eventually", "finally", "one", "years", "during", "back",
    "now", "once", "although", "though", "despite", "unfortunately", "together", "both",
    "india", "indian", "mumbai", "bombay", "delhi", "london", "punjab", "europe", "god",
    // honorifics
    "mr", "mrs", "ms", "miss", "dr", "officer", "sir", "madam", "king", "queen", "prince",
    "princess",
];

/// Abbreviations whose trailing period is not a sentence end
const ABBREVIATIONS: &[&str] = &["mr", "mrs", "ms", "dr", "st", "jr", "sr"];

/// Words skipped when looking for the verb after a name
const AUXILIARIES: &[&str] = &[
    "is", "was", "are", "were", "has", "had", "have", "will", "would", "must", "can", "could",
    "also", "then", "finally", "soon", "only", "still", "never", "always", "eventually",
    "secretly", "quietly", "not",
];

/// Words after a name that end the verb search
const NON_VERBS: &[&str] = &[
    "and", "or", "but", "the", "a", "an", "to", "with", "who", "whose", "of", "in", "on", "at",
    "for", "from", "by", "as", "is", "was",
];

/// Honorific title to gender, where the title implies one
fn title_gender(title: &str) -> Option<Gender> {
    match title {
        "Mr" | "Sir" | "King" | "Prince" => Some(Gender::Male),
        "Mrs" | "Ms" | "Miss" | "Madam" | "Queen" | "Princess" => Some(Gender::Female),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Candidate {
    display: String,
    first_seen: usize,
    title_gender: Option<Gender>,
    professions: Vec<String>,
    verbs: Vec<String>,
    relationships: Vec<String>,
    appearance: Vec<String>,
    male_hints: usize,
    female_hints: usize,
}

impl Candidate {
    fn gender(&self) -> Gender {
        if let Some(gender) = self.title_gender {
            return gender;
        }
        match (self.male_hints > 0, self.female_hints > 0) {
            (true, false) => Gender::Male,
            (false, true) => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

/// Rule-based [`SynopsisParser`]
#[derive(Debug, Default, Clone)]
pub struct HeuristicSynopsisParser;

impl HeuristicSynopsisParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract character mentions from a synopsis
    pub fn extract(&self, film_id: &str, synopsis: &str) -> Vec<CharacterMention> {
        let mut candidates: HashMap<String, Candidate> = HashMap::new();

        let sentences = split_sentences(synopsis);

        for (sentence_index, sentence) in sentences.iter().enumerate() {
            let names = names_in(sentence);
            let lower = sentence.to_lowercase();
            let words: Vec<&str> = WORD.find_iter(&lower).map(|m| m.as_str()).collect();
            let sole_character = names.len() == 1;

            for (key, name) in &names {
                let candidate = candidates.entry(key.clone()).or_insert_with(|| Candidate {
                    display: name.name.clone(),
                    first_seen: sentence_index,
                    ..Candidate::default()
                });

                if candidate.title_gender.is_none() {
                    candidate.title_gender = name.title.as_deref().and_then(title_gender);
                }

                candidate
                    .professions
                    .extend(vocabulary_hits(&words, PROFESSIONS));
                candidate
                    .relationships
                    .extend(vocabulary_hits(&words, RELATIONSHIPS));
                candidate
                    .appearance
                    .extend(vocabulary_hits(&words, APPEARANCES));
                if let Some(verb) = verb_after(&words, key) {
                    candidate.verbs.push(verb);
                }

                if sole_character {
                    for word in &words {
                        match *word {
                            "he" | "him" | "his" => candidate.male_hints += 1,
                            "she" | "her" | "hers" => candidate.female_hints += 1,
                            _ => {}
                        }
                        if let Some((_, gender)) =
                            GENDERED_RELATIONSHIPS.iter().find(|(rel, _)| rel == word)
                        {
                            match gender {
                                Gender::Male => candidate.male_hints += 1,
                                Gender::Female => candidate.female_hints += 1,
                                Gender::Unknown => {}
                            }
                        }
                    }
                }
            }
        }

        let mut ordered: Vec<Candidate> = candidates.into_values().collect();
        ordered.sort_by(|a, b| {
            a.first_seen
                .cmp(&b.first_seen)
                .then_with(|| a.display.cmp(&b.display))
        });

        let mentions: Vec<CharacterMention> = ordered
            .into_iter()
            .map(|c| {
                let gender = c.gender();
                let mut builder =
                    CharacterMention::builder(film_id, c.display.clone(), MentionSource::Synopsis)
                        .gender(gender)
                        .verbs(c.verbs)
                        .relationships(c.relationships)
                        .appearance(c.appearance);
                if let Some(profession) = c.professions.into_iter().next() {
                    builder = builder.profession(profession);
                }
                builder.build()
            })
            .collect();

        debug!(
            film_id = %film_id,
            sentences = sentences.len(),
            characters = mentions.len(),
            "Heuristic synopsis parse complete"
        );
        mentions
    }
}

#[async_trait]
impl SynopsisParser for HeuristicSynopsisParser {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn parse_synopsis(
        &self,
        film_id: &str,
        synopsis: &str,
    ) -> Result<Vec<CharacterMention>, ExtractionError> {
        Ok(self.extract(film_id, synopsis))
    }
}

/// Split text into trimmed, non-empty sentences on `.`, `!` and `?`
///
/// A period closing an honorific abbreviation ("Mr.", "Dr.") does not end
/// the sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start: Option<usize> = None;

    for m in SENTENCE.find_iter(text) {
        let begin = *start.get_or_insert(m.start());
        if ends_with_abbreviation(m.as_str()) {
            continue;
        }
        sentences.push(text[begin..m.end()].trim());
        start = None;
    }
    if let Some(begin) = start {
        sentences.push(text[begin..].trim());
    }

    sentences.retain(|s| !s.is_empty());
    sentences
}

fn ends_with_abbreviation(fragment: &str) -> bool {
    let Some(body) = fragment.trim_end().strip_suffix('.') else {
        return false;
    };
    let last_word = body
        .rsplit(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or_default()
        .to_lowercase();
    ABBREVIATIONS.contains(&last_word.as_str())
}

struct NameMatch {
    name: String,
    title: Option<String>,
}

/// Character names in one sentence, keyed by lower-cased name
fn names_in(sentence: &str) -> Vec<(String, NameMatch)> {
    let mut out: Vec<(String, NameMatch)> = Vec::new();
    for caps in NAME.captures_iter(sentence) {
        let Some(name) = caps.get(2) else { continue };
        let key = name.as_str().to_lowercase();
        if NON_NAMES.contains(&key.as_str())
            || PROFESSIONS.contains(&key.as_str())
            || RELATIONSHIPS.contains(&key.as_str())
        {
            continue;
        }
        if out.iter().any(|(k, _)| *k == key) {
            continue;
        }
        out.push((
            key,
            NameMatch {
                name: name.as_str().to_string(),
                title: caps.get(1).map(|t| t.as_str().to_string()),
            },
        ));
    }
    out
}

fn vocabulary_hits(words: &[&str], vocabulary: &[&str]) -> Vec<String> {
    vocabulary
        .iter()
        .filter(|v| words.contains(*v))
        .map(|v| v.to_string())
        .collect()
}

/// First verb-like word following `key`, skipping auxiliaries and adverbs
fn verb_after(words: &[&str], key: &str) -> Option<String> {
    let pos = words.iter().position(|w| *w == key)?;
    words[pos + 1..]
        .iter()
        .copied()
        .take(3)
        .find(|w| !AUXILIARIES.contains(w))
        .filter(|w| !NON_VERBS.contains(w) && !w.contains('\''))
        .map(|w| w.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYNOPSIS: &str = "Simran is a beautiful young woman raised in London. \
        She waits for her father to choose a husband. \
        Raj travels across Europe as a rich businessman. \
        Mr Malhotra disapproves of the match. \
        Raj fights for Simran.";

    fn find<'a>(mentions: &'a [CharacterMention], id: &str) -> &'a CharacterMention {
        mentions
            .iter()
            .find(|m| m.character_id() == id)
            .unwrap_or_else(|| panic!("{} not extracted", id))
    }

    #[test]
    fn test_characters_in_order_of_appearance() {
        let mentions = HeuristicSynopsisParser::new().extract("ddlj", SYNOPSIS);
        let ids: Vec<_> = mentions.iter().map(|m| m.character_id()).collect();
        assert_eq!(ids, vec!["Simran", "Raj", "Malhotra"]);
    }

    #[test]
    fn test_title_implies_gender() {
        let mentions = HeuristicSynopsisParser::new().extract("ddlj", SYNOPSIS);
        assert_eq!(find(&mentions, "Malhotra").gender(), Gender::Male);
    }

    #[test]
    fn test_attributes_collected_from_mentioning_sentences() {
        let mentions = HeuristicSynopsisParser::new().extract("ddlj", SYNOPSIS);

        let simran = find(&mentions, "Simran");
        assert!(simran
            .appearance_descriptors()
            .iter()
            .any(|a| a == "beautiful"));

        let raj = find(&mentions, "Raj");
        assert_eq!(raj.profession(), Some("businessman"));
        assert!(raj.agency_verbs().iter().any(|v| v == "travels"));
        assert!(raj.agency_verbs().iter().any(|v| v == "fights"));
    }

    #[test]
    fn test_pronoun_hints_only_for_sole_character() {
        let parser = HeuristicSynopsisParser::new();
        let mentions = parser.extract("f", "Meena cries because her brother left. Meena waits.");
        let meena = find(&mentions, "Meena");
        // "her" (female) and "brother" (male) conflict
        assert_eq!(meena.gender(), Gender::Unknown);
        assert_eq!(meena.agency_verbs(), &["cries".to_string(), "waits".to_string()]);

        let mentions = parser.extract("f", "Meena and Vijay argue. She leaves.");
        assert_eq!(find(&mentions, "Meena").gender(), Gender::Unknown);
    }

    #[test]
    fn test_female_hints() {
        let mentions =
            HeuristicSynopsisParser::new().extract("f", "Radha is a nurse who cares for her mother.");
        let radha = find(&mentions, "Radha");
        assert_eq!(radha.gender(), Gender::Female);
        assert_eq!(radha.profession(), Some("nurse"));
        assert_eq!(radha.relationships(), &["mother".to_string()]);
    }

    #[test]
    fn test_empty_synopsis() {
        assert!(HeuristicSynopsisParser::new().extract("f", "").is_empty());
        assert!(HeuristicSynopsisParser::new()
            .extract("f", "the end of the story.")
            .is_empty());
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("One. Two!  Three? four"),
            vec!["One.", "Two!", "Three?", "four"]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_abbreviated_titles() {
        let mentions = HeuristicSynopsisParser::new().extract(
            "ddlj",
            "Mr. Malhotra disapproves of the match. Mrs. Kapoor waits at home.",
        );
        let ids: Vec<_> = mentions.iter().map(|m| m.character_id()).collect();
        assert_eq!(ids, vec!["Malhotra", "Kapoor"]);
        assert_eq!(find(&mentions, "Malhotra").gender(), Gender::Male);

        let kapoor = find(&mentions, "Kapoor");
        assert_eq!(kapoor.gender(), Gender::Female);
        assert_eq!(kapoor.agency_verbs(), &["waits".to_string()]);
    }

    #[test]
    fn test_split_sentences_keeps_abbreviations() {
        assert_eq!(
            split_sentences("Mr. Malhotra disapproves. Dr. Rao agrees. The end."),
            vec!["Mr. Malhotra disapproves.", "Dr. Rao agrees.", "The end."]
        );
        assert_eq!(split_sentences("Ask Mr."), vec!["Ask Mr."]);
    }

    #[test]
    fn test_verb_after_skips_auxiliaries() {
        assert_eq!(
            verb_after(&["raj", "finally", "confronts", "him"], "raj").as_deref(),
            Some("confronts")
        );
        assert_eq!(verb_after(&["raj", "and", "simran"], "raj"), None);
        assert_eq!(verb_after(&["raj"], "raj"), None);
    }
}

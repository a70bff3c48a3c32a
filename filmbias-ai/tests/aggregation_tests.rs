//! Aggregation properties
//!
//! Aggregates must not depend on the order characters or films are fed in,
//! and empty groups must produce zeros rather than NaN.

use filmbias_ai::aggregation::{
    aggregate_decades, aggregate_film, AggregateKey, AggregateScore, FilmAggregateInput,
};
use filmbias_ai::scoring::{CharacterScorer, ScoredCharacter};
use filmbias_common::model::{AttributeSlot, Category};
use filmbias_common::{CharacterMention, Gender, MentionSource, Taxonomy, TaxonomyEntry};
use proptest::prelude::*;
use std::sync::Arc;

/// Severities of very different magnitudes make float summation order visible
const SEVERITIES: [f64; 6] = [0.1, 0.2, 0.3, 1e-9, 7.7, 1e6];

fn scorer() -> CharacterScorer {
    let entries = SEVERITIES
        .iter()
        .enumerate()
        .map(|(i, &severity)| TaxonomyEntry {
            category: Category::new(format!("category-{}", i % 3)),
            slot: AttributeSlot::Verb,
            keywords: vec![format!("verb{}", i)],
            severity,
            applies_to: None,
        })
        .collect();
    CharacterScorer::new(Arc::new(Taxonomy::new(entries).unwrap()))
}

fn gender(i: usize) -> Gender {
    match i % 3 {
        0 => Gender::Female,
        1 => Gender::Male,
        _ => Gender::Unknown,
    }
}

/// (gender index, verb indices) per character
type CharacterSpec = (usize, Vec<usize>);

fn build(film_id: &str, specs: &[CharacterSpec]) -> Vec<ScoredCharacter> {
    let scorer = scorer();
    specs
        .iter()
        .enumerate()
        .map(|(n, (g, verbs))| {
            scorer.score(
                &CharacterMention::builder(film_id, format!("c{}", n), MentionSource::Synopsis)
                    .gender(gender(*g))
                    .verbs(verbs.iter().map(|v| format!("verb{}", v)))
                    .build(),
            )
        })
        .collect()
}

fn character_specs() -> impl Strategy<Value = Vec<CharacterSpec>> {
    prop::collection::vec(
        (0usize..3, prop::collection::vec(0usize..SEVERITIES.len(), 0..4)),
        0..12,
    )
}

proptest! {
    #[test]
    fn film_aggregate_is_order_independent(
        (specs, shuffled) in character_specs()
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let a = aggregate_film("f", &build("f", &specs));
        let b = aggregate_film("f", &build("f", &shuffled));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn decade_aggregate_is_order_independent(
        (films, shuffled) in prop::collection::vec((1970i32..2000, character_specs()), 0..6)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let decades = |films: &[(i32, Vec<CharacterSpec>)]| {
            let scored: Vec<(i32, Vec<ScoredCharacter>)> = films
                .iter()
                .map(|(year, specs)| (*year, build("f", specs)))
                .collect();
            let inputs: Vec<FilmAggregateInput<'_>> = scored
                .iter()
                .map(|(year, characters)| FilmAggregateInput {
                    film_id: "f",
                    release_year: Some(*year),
                    characters,
                })
                .collect();
            aggregate_decades(&inputs)
        };
        prop_assert_eq!(decades(&films), decades(&shuffled));
    }

    #[test]
    fn aggregates_never_produce_nan(specs in character_specs()) {
        let aggregate = aggregate_film("f", &build("f", &specs));
        prop_assert!(aggregate.total.sum.is_finite());
        prop_assert!(aggregate.total.mean.is_finite());
        prop_assert!(aggregate.total.sum >= 0.0);
        for cell in aggregate.by_category.values() {
            prop_assert!(cell.mean.is_finite());
        }
    }
}

#[test]
fn test_empty_inputs_are_zero() {
    let film = aggregate_film("empty", &[]);
    assert_eq!(film, AggregateScore::empty(AggregateKey::Film("empty".into())));

    let decades = aggregate_decades(&[FilmAggregateInput {
        film_id: "empty",
        release_year: Some(1983),
        characters: &[],
    }]);
    assert_eq!(decades.len(), 1);
    assert_eq!(decades[0].key, AggregateKey::Decade(1980));
    assert_eq!(decades[0].character_count, 0);
    assert_eq!(decades[0].total.sum, 0.0);
    assert_eq!(decades[0].total.mean, 0.0);
}

#[test]
fn test_decade_sum_matches_film_sums() {
    let a = build("a", &[(0, vec![0, 4]), (1, vec![5])]);
    let b = build("b", &[(2, vec![1, 2, 3])]);

    let film_a = aggregate_film("a", &a);
    let film_b = aggregate_film("b", &b);
    let decades = aggregate_decades(&[
        FilmAggregateInput { film_id: "a", release_year: Some(1991), characters: &a },
        FilmAggregateInput { film_id: "b", release_year: Some(1999), characters: &b },
    ]);

    assert_eq!(decades.len(), 1);
    let decade = &decades[0];
    assert_eq!(decade.character_count, 3);
    assert_eq!(decade.match_count, film_a.match_count + film_b.match_count);
    let expected = film_a.total.sum + film_b.total.sum;
    assert!((decade.total.sum - expected).abs() <= 1e-9 * expected.max(1.0));
    assert!((decade.total.mean - expected / 3.0).abs() <= 1e-9 * expected.max(1.0));

    assert!(!decade.by_category.is_empty());
    for (category, cell) in &decade.by_category {
        let expected = film_a.category(category).sum + film_b.category(category).sum;
        assert!(
            (cell.sum - expected).abs() <= 1e-9 * expected.max(1.0),
            "{}: {} != {}",
            category,
            cell.sum,
            expected
        );
    }
    for category in film_a.by_category.keys().chain(film_b.by_category.keys()) {
        assert!(decade.by_category.contains_key(category), "{} missing", category);
    }
}

#[test]
fn test_films_without_year_are_left_out() {
    let a = build("a", &[(0, vec![4])]);
    let decades = aggregate_decades(&[FilmAggregateInput {
        film_id: "a",
        release_year: None,
        characters: &a,
    }]);
    assert!(decades.is_empty());
}

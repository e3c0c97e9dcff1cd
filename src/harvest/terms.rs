//! Name-variant search terms for the name-based harvesters

/// Suffixes appended to the scientific name as extra search terms
const SUFFIXES: [&str; 3] = ["snake", "viper", "rattlesnake"];

/// All search terms for a scientific name, in query order
///
/// The scientific name itself, genus + species, the reversed pair, then the
/// name with each suffix. Duplicates are dropped keeping first occurrence.
pub fn search_terms(scientific_name: &str) -> Vec<String> {
    let name = normalize_whitespace(scientific_name);
    if name.is_empty() {
        return Vec::new();
    }

    let mut terms = vec![name.clone()];

    let parts: Vec<&str> = name.split(' ').collect();
    if parts.len() >= 2 {
        terms.push(format!("{} {}", parts[0], parts[1]));
        terms.push(format!("{} {}", parts[1], parts[0]));
    }

    for suffix in SUFFIXES {
        terms.push(format!("{} {}", name, suffix));
    }

    dedup_preserving_order(terms)
}

/// The scientific name and its binomial, for providers that match names exactly
pub fn binomial_terms(scientific_name: &str) -> Vec<String> {
    let name = normalize_whitespace(scientific_name);
    if name.is_empty() {
        return Vec::new();
    }

    let parts: Vec<&str> = name.split(' ').collect();
    let mut terms = vec![name.clone()];
    if parts.len() > 2 {
        terms.push(format!("{} {}", parts[0], parts[1]));
    }

    dedup_preserving_order(terms)
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn dedup_preserving_order(terms: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    terms
        .into_iter()
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

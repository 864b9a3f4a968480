/// Rule-based chat intent resolution
///
/// Maps free text from the assistant box to a filter command. Matching is a
/// plain keyword/alias lookup on the lower-cased input.

/// A filter action derived from chat input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCommand {
    Genre(String),
    Search(String),
    ClearFilters,
    NextPage,
    PreviousPage,
}

/// Alias → canonical genre name
const GENRE_ALIASES: &[(&str, &str)] = &[
    ("science fiction", "Science Fiction"),
    ("sci-fi", "Science Fiction"),
    ("scifi", "Science Fiction"),
    ("space", "Science Fiction"),
    ("horror", "Horror"),
    ("scary", "Horror"),
    ("spooky", "Horror"),
    ("comedy", "Comedy"),
    ("comedies", "Comedy"),
    ("funny", "Comedy"),
    ("laugh", "Comedy"),
    ("romance", "Romance"),
    ("romantic", "Romance"),
    ("love story", "Romance"),
    ("action", "Action"),
    ("explosions", "Action"),
    ("thriller", "Thriller"),
    ("suspense", "Thriller"),
    ("drama", "Drama"),
    ("documentary", "Documentary"),
    ("documentaries", "Documentary"),
    ("animation", "Animation"),
    ("animated", "Animation"),
    ("cartoon", "Animation"),
    ("family", "Family"),
    ("kids", "Family"),
    ("fantasy", "Fantasy"),
    ("adventure", "Adventure"),
    ("crime", "Crime"),
    ("mystery", "Mystery"),
    ("western", "Western"),
    ("war", "War"),
    ("history", "History"),
    ("historical", "History"),
    ("musical", "Music"),
    ("music", "Music"),
];

const RESET_PHRASES: &[&str] = &[
    "reset",
    "clear",
    "start over",
    "show all",
    "show everything",
    "everything",
    "all movies",
];

/// Explicit search requests win over genre aliases in the search text
const SEARCH_PREFIXES: &[&str] = &[
    "search for ",
    "look for ",
    "looking for ",
    "find me ",
    "find ",
    "search ",
];

/// Only a search when no genre alias matched
const LOOSE_SEARCH_PREFIXES: &[&str] = &["show me "];

pub fn resolve(text: &str) -> Option<FilterCommand> {
    let input = normalize(text);
    if input.is_empty() {
        return None;
    }

    if RESET_PHRASES.iter().any(|phrase| contains_phrase(&input, phrase)) {
        return Some(FilterCommand::ClearFilters);
    }

    if contains_phrase(&input, "next page") || input == "next" || input == "more" {
        return Some(FilterCommand::NextPage);
    }
    if contains_phrase(&input, "previous page")
        || contains_phrase(&input, "prev page")
        || input == "back"
    {
        return Some(FilterCommand::PreviousPage);
    }

    if let Some(search) = match_search(&input, SEARCH_PREFIXES) {
        return Some(search);
    }

    if let Some(genre) = match_genre(&input) {
        return Some(FilterCommand::Genre(genre.to_string()));
    }

    match_search(&input, LOOSE_SEARCH_PREFIXES)
}

fn match_search(input: &str, prefixes: &[&str]) -> Option<FilterCommand> {
    prefixes.iter().find_map(|prefix| {
        let rest = input.strip_prefix(prefix)?;
        let rest = strip_filler(rest);
        (!rest.is_empty()).then(|| FilterCommand::Search(rest.to_string()))
    })
}

fn match_genre(input: &str) -> Option<&'static str> {
    GENRE_ALIASES
        .iter()
        .find(|(alias, _)| contains_phrase(input, alias))
        .map(|(_, genre)| *genre)
}

/// Lower-case, strip punctuation, collapse whitespace
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole-word phrase match
fn contains_phrase(input: &str, phrase: &str) -> bool {
    let padded = format!(" {} ", input);
    padded.contains(&format!(" {} ", phrase))
}

fn strip_filler(rest: &str) -> &str {
    let rest = rest.trim();
    let rest = rest
        .strip_prefix("movies about ")
        .or_else(|| rest.strip_prefix("a movie called "))
        .or_else(|| rest.strip_prefix("the movie "))
        .unwrap_or(rest);
    rest.strip_suffix(" movie")
        .or_else(|| rest.strip_suffix(" movies"))
        .unwrap_or(rest)
        .trim()
}

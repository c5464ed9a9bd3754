//! Best-guess location detection in goal text.
//!
//! A table of known places is consulted first. Only when nothing in the
//! table matches is a capitalised phrase after a place preposition taken
//! as the location. "to" only counts as a place preposition in goals that
//! talk about travel, and a phrase followed by its own lowercase object
//! ("Cook Italian pasta") is not a place.

use std::sync::LazyLock;

use regex::Regex;

/// Known places, lowercase, with ISO 3166-1 alpha-2 country codes.
const KNOWN_PLACES: &[(&str, &str)] = &[
    // India
    ("mumbai", "IN"),
    ("navi mumbai", "IN"),
    ("delhi", "IN"),
    ("new delhi", "IN"),
    ("bangalore", "IN"),
    ("bengaluru", "IN"),
    ("hyderabad", "IN"),
    ("ahmedabad", "IN"),
    ("chennai", "IN"),
    ("kolkata", "IN"),
    ("pune", "IN"),
    ("jaipur", "IN"),
    ("surat", "IN"),
    ("lucknow", "IN"),
    ("kanpur", "IN"),
    ("nagpur", "IN"),
    ("indore", "IN"),
    ("bhopal", "IN"),
    ("visakhapatnam", "IN"),
    ("vizag", "IN"),
    ("patna", "IN"),
    ("vadodara", "IN"),
    ("agra", "IN"),
    ("varanasi", "IN"),
    ("srinagar", "IN"),
    ("amritsar", "IN"),
    ("ranchi", "IN"),
    ("coimbatore", "IN"),
    ("vijayawada", "IN"),
    ("jodhpur", "IN"),
    ("madurai", "IN"),
    ("guwahati", "IN"),
    ("chandigarh", "IN"),
    ("thiruvananthapuram", "IN"),
    ("mysuru", "IN"),
    ("mysore", "IN"),
    ("tirupati", "IN"),
    ("gurgaon", "IN"),
    ("gurugram", "IN"),
    ("noida", "IN"),
    ("kochi", "IN"),
    ("cochin", "IN"),
    ("dehradun", "IN"),
    ("udaipur", "IN"),
    ("mangalore", "IN"),
    ("goa", "IN"),
    ("kerala", "IN"),
    ("rajasthan", "IN"),
    ("kashmir", "IN"),
    ("ladakh", "IN"),
    ("shimla", "IN"),
    ("manali", "IN"),
    ("darjeeling", "IN"),
    ("ooty", "IN"),
    ("munnar", "IN"),
    ("rishikesh", "IN"),
    ("haridwar", "IN"),
    ("hampi", "IN"),
    ("pushkar", "IN"),
    ("india", "IN"),
    // Rest of the world
    ("london", "GB"),
    ("paris", "FR"),
    ("new york", "US"),
    ("los angeles", "US"),
    ("san francisco", "US"),
    ("chicago", "US"),
    ("boston", "US"),
    ("seattle", "US"),
    ("tokyo", "JP"),
    ("kyoto", "JP"),
    ("osaka", "JP"),
    ("singapore", "SG"),
    ("dubai", "AE"),
    ("hong kong", "HK"),
    ("sydney", "AU"),
    ("melbourne", "AU"),
    ("toronto", "CA"),
    ("vancouver", "CA"),
    ("amsterdam", "NL"),
    ("berlin", "DE"),
    ("munich", "DE"),
    ("rome", "IT"),
    ("madrid", "ES"),
    ("barcelona", "ES"),
    ("lisbon", "PT"),
    ("zurich", "CH"),
    ("geneva", "CH"),
    ("vienna", "AT"),
    ("prague", "CZ"),
    ("budapest", "HU"),
    ("istanbul", "TR"),
    ("cairo", "EG"),
    ("cape town", "ZA"),
    ("nairobi", "KE"),
    ("beijing", "CN"),
    ("shanghai", "CN"),
    ("seoul", "KR"),
    ("bangkok", "TH"),
    ("kuala lumpur", "MY"),
    ("jakarta", "ID"),
    ("bali", "ID"),
    ("manila", "PH"),
    ("hanoi", "VN"),
    ("ho chi minh city", "VN"),
    ("kathmandu", "NP"),
    ("dhaka", "BD"),
    ("colombo", "LK"),
];

/// Words that follow a place preposition without being places.
const NOT_PLACES: &[&str] = &[
    "I", "A", "An", "The", "My", "Our", "Your", "This", "That", "Next", "Learn", "Build", "Make",
    "Plan", "Get", "Start", "Python", "Rust", "Java", "JavaScript", "English", "Spanish",
    "French", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Lowercase words that may follow a place name.
const CONNECTORS: &[&str] = &[
    "and", "or", "for", "with", "during", "on", "in", "at", "to", "from", "by", "over", "this",
    "next", "then", "before", "after", "until", "via", "near",
];

static PLACE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(in|to|at|visit|visiting|near|around)\s+([A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+){0,2})",
    )
    .expect("hard-coded regex is valid")
});

static TRAVEL_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:trip|travel(?:l?ing)?|visit(?:ing)?|fly(?:ing)?|flight|vacation|holiday|journey|tour|itinerary|go(?:ing)?|move|moving|relocat(?:e|ing)|drive|driving|backpack(?:ing)?)\b",
    )
    .expect("hard-coded regex is valid")
});

/// How a location was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    Lookup,
    Heuristic,
}

/// A location detected in free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLocation {
    /// Display form, e.g. "New York".
    pub name: String,
    /// Country code when the place is in the lookup table.
    pub country: Option<&'static str>,
    pub source: LocationSource,
}

/// Find the single most likely location mentioned in `text`.
pub fn detect_location(text: &str) -> Option<DetectedLocation> {
    lookup(text).or_else(|| heuristic(text))
}

/// Country code for a known place name (case-insensitive).
pub fn country_code(name: &str) -> Option<&'static str> {
    let lower = name.trim().to_lowercase();
    KNOWN_PLACES
        .iter()
        .find(|(place, _)| *place == lower)
        .map(|(_, code)| *code)
}

fn lookup(text: &str) -> Option<DetectedLocation> {
    let lower = text.to_lowercase();

    // Earliest match wins; on equal start the longer name wins.
    let (_, place, code) = KNOWN_PLACES
        .iter()
        .filter_map(|(place, code)| find_word(&lower, place).map(|pos| (pos, *place, *code)))
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.len().cmp(&a.1.len())))?;

    Some(DetectedLocation {
        name: title_case(place),
        country: Some(code),
        source: LocationSource::Lookup,
    })
}

fn heuristic(text: &str) -> Option<DetectedLocation> {
    let travel = TRAVEL_INTENT.is_match(text);

    PLACE_PHRASE
        .captures_iter(text)
        .filter(|c| travel || &c[1] != "to")
        .filter_map(|c| c.get(2))
        .find(|phrase| {
            let starts_ok = phrase
                .as_str()
                .split_whitespace()
                .next()
                .is_some_and(|first| !NOT_PLACES.contains(&first));
            starts_ok && !has_lowercase_object(&text[phrase.end()..])
        })
        .map(|phrase| DetectedLocation {
            name: phrase.as_str().to_owned(),
            country: None,
            source: LocationSource::Heuristic,
        })
}

/// Whether `rest` starts with a lowercase word that reads as the object of
/// a verb phrase rather than text after a place name.
fn has_lowercase_object(rest: &str) -> bool {
    // Punctuation ends the phrase: "in Reykjavik, then ...".
    if !rest.starts_with(char::is_whitespace) {
        return false;
    }
    rest.split_whitespace().next().is_some_and(|word| {
        word.starts_with(char::is_lowercase)
            && !CONNECTORS.contains(&word.trim_end_matches(|c: char| !c.is_alphanumeric()))
    })
}

/// Byte offset of `word` in `haystack` where it is not part of a longer word.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    haystack.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// "new york" -> "New York".
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

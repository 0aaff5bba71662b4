//! Address value types shared by the resolver, the selection state and the
//! submission payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return None;
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }

    /// Textual stand-in used when no street address is known.
    pub fn to_address_fallback(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = String;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude).ok_or_else(|| {
            format!(
                "coordinate out of range: {}, {}",
                raw.latitude, raw.longitude
            )
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Geocoded,
    CurrentLocation,
}

/// One candidate address, already narrowed from the provider's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    pub formatted: String,
    pub coordinate: Coordinate,
    pub source_kind: SourceKind,
}

impl AddressSuggestion {
    pub fn geocoded(formatted: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            formatted: formatted.into(),
            coordinate,
            source_kind: SourceKind::Geocoded,
        }
    }

    pub fn current_location(label: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            formatted: label.into(),
            coordinate,
            source_kind: SourceKind::CurrentLocation,
        }
    }

    pub fn is_current_location(&self) -> bool {
        self.source_kind == SourceKind::CurrentLocation
    }

    pub fn postal_code(&self) -> Option<u32> {
        extract_postal_code(&self.formatted)
    }
}

/// First standalone run of exactly five ASCII digits.
pub fn extract_postal_code(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 5 {
                return text[start..i].parse().ok();
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Stable sort by postal code; addresses without one go last.
pub fn rank_by_postal_code(suggestions: &mut [AddressSuggestion]) {
    suggestions.sort_by_key(|s| {
        let code = s.postal_code();
        (code.is_none(), code.unwrap_or(0))
    });
}

/// City name for the report payload.
///
/// Takes the words following the postal code ("75002 Paris" gives "Paris"),
/// otherwise the second-to-last comma segment of a three-plus segment address.
pub fn extract_city(formatted: &str) -> Option<String> {
    let segments: Vec<&str> = formatted
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for segment in &segments {
        let mut words = segment.split_whitespace();
        if let Some(first) = words.next() {
            if first.len() == 5 && first.bytes().all(|b| b.is_ascii_digit()) {
                let rest = words.collect::<Vec<_>>().join(" ");
                if !rest.is_empty() {
                    return Some(rest);
                }
            }
        }
    }

    if segments.len() >= 3 {
        return Some(segments[segments.len() - 2].to_string());
    }
    None
}

/// Case-insensitive replacement of every `placeholder` occurrence.
pub fn replace_placeholder(text: &str, placeholder: &str, label: &str) -> String {
    if placeholder.is_empty() {
        return text.to_string();
    }
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let haystack = text.to_ascii_lowercase();
    let needle = placeholder.to_ascii_lowercase();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(found) = haystack[cursor..].find(&needle) {
        let start = cursor + found;
        out.push_str(&text[cursor..start]);
        out.push_str(label);
        cursor = start + needle.len();
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn deserializing_checks_coordinate_range() {
        let ok: Coordinate =
            serde_json::from_str(r#"{"latitude": 48.85, "longitude": 2.35}"#).unwrap();
        assert_eq!(Some(ok), Coordinate::new(48.85, 2.35));

        let err = serde_json::from_str::<Coordinate>(r#"{"latitude": 123.0, "longitude": 2.0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    fn at(formatted: &str) -> AddressSuggestion {
        AddressSuggestion::geocoded(formatted, Coordinate::new(48.0, 2.0).unwrap())
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(48.8687, 2.3318).is_some());
        assert!(Coordinate::new(91.0, 0.0).is_none());
        assert!(Coordinate::new(0.0, -180.5).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn postal_code_ignores_house_numbers_and_long_runs() {
        assert_eq!(
            extract_postal_code("10 Rue de la Paix, 75002 Paris, France"),
            Some(75002)
        );
        assert_eq!(extract_postal_code("123456 Somewhere"), None);
        assert_eq!(extract_postal_code("Place du Capitole, Toulouse"), None);
        assert_eq!(extract_postal_code("BP 13001-Marseille"), Some(13001));
    }

    #[test]
    fn ranking_puts_missing_codes_last_and_keeps_ties_stable() {
        let mut list = vec![
            at("Rue sans code, Lyon"),
            at("Avenue A, 69003 Lyon"),
            at("Quai B, 13001 Marseille"),
            at("Avenue C, 69003 Lyon"),
        ];
        rank_by_postal_code(&mut list);
        let order: Vec<_> = list.iter().map(|s| s.formatted.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "Quai B, 13001 Marseille",
                "Avenue A, 69003 Lyon",
                "Avenue C, 69003 Lyon",
                "Rue sans code, Lyon",
            ]
        );
    }

    #[test]
    fn city_follows_postal_code() {
        assert_eq!(
            extract_city("10 Rue de la Paix, 75002 Paris, France").as_deref(),
            Some("Paris")
        );
        assert_eq!(
            extract_city("1 Quai, 13001 Marseille 1er, France").as_deref(),
            Some("Marseille 1er")
        );
        assert_eq!(
            extract_city("Place du Capitole, Toulouse, France").as_deref(),
            Some("Toulouse")
        );
        assert_eq!(extract_city("France"), None);
    }

    #[test]
    fn placeholder_replaced_case_insensitively() {
        assert_eq!(
            replace_placeholder("Unnamed Road, 31000 Toulouse", "unnamed road", "Route inconnue"),
            "Route inconnue, 31000 Toulouse"
        );
        assert_eq!(
            replace_placeholder("unnamed road / UNNAMED ROAD", "unnamed road", "?"),
            "? / ?"
        );
        assert_eq!(
            replace_placeholder("Rue de l'Église", "unnamed road", "?"),
            "Rue de l'Église"
        );
    }

    proptest! {
        #[test]
        fn ranked_codes_are_non_decreasing(
            codes in proptest::collection::vec(proptest::option::of(10000u32..99999), 0..20)
        ) {
            let mut list: Vec<_> = codes
                .iter()
                .map(|c| match c {
                    Some(code) => at(&format!("Rue X, {code} Ville")),
                    None => at("Rue X, Ville"),
                })
                .collect();
            rank_by_postal_code(&mut list);

            let ranked: Vec<Option<u32>> = list.iter().map(|s| s.postal_code()).collect();
            for pair in ranked.windows(2) {
                match (pair[0], pair[1]) {
                    (Some(a), Some(b)) => prop_assert!(a <= b),
                    (None, Some(_)) => prop_assert!(false, "coded result after uncoded one"),
                    _ => {}
                }
            }
        }
    }
}

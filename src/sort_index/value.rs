//! How two index values compare depends on the index's declared type,
//! never on the runtime BSON variant. `Direction` only flips the
//! *reported* order (see `tree.rs`); every comparator here is the
//! ascending one.

use crate::types::ValueType;
use bson::Bson;
use std::cmp::Ordering;

/// Compare two values under a declared sort-index type.
#[must_use]
pub fn compare_value(ty: ValueType, a: &Bson, b: &Bson) -> Ordering {
    match ty {
        ValueType::String => compare_strings(a, b),
        ValueType::Number => compare_numbers(a, b),
        ValueType::Date => compare_dates(a, b),
    }
}

/// Case-variants of the same letters sort adjacent to each other: the
/// primary key is case-folded, and ties break on the raw string so the
/// tie-break itself never folds case.
fn compare_strings(a: &Bson, b: &Bson) -> Ordering {
    let sa = as_str(a);
    let sb = as_str(b);
    match sa.to_lowercase().cmp(&sb.to_lowercase()) {
        Ordering::Equal => sa.cmp(&sb),
        other => other,
    }
}

fn as_str(v: &Bson) -> String {
    match v {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_f64(v: &Bson) -> f64 {
    match v {
        Bson::Double(f) => *f,
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Bson::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => f64::NAN,
    }
}

/// NaN sorts before every non-NaN value and equals itself.
fn compare_numbers(a: &Bson, b: &Bson) -> Ordering {
    let (x, y) = (to_f64(a), to_f64(b));
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn to_unix_ms(v: &Bson) -> Option<i64> {
    match v {
        Bson::DateTime(dt) => Some(dt.timestamp_millis()),
        Bson::Int64(ms) => Some(*ms),
        Bson::Int32(ms) => Some(i64::from(*ms)),
        Bson::Double(ms) => Some(*ms as i64),
        Bson::String(s) => chrono::DateTime::parse_from_rfc3339(s).ok().map(|d| d.timestamp_millis()),
        _ => None,
    }
}

/// Values that fail to parse as a date sort after every value that does.
fn compare_dates(a: &Bson, b: &Bson) -> Ordering {
    match (to_unix_ms(a), to_unix_ms(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    fn s(v: &str) -> Bson {
        Bson::String(v.to_string())
    }

    #[test]
    fn number_type_coerces_numeral_strings() {
        let mut values = vec![s("10"), s("2"), s("100"), s("20")];
        values.sort_by(|a, b| compare_value(ValueType::Number, a, b));
        let rendered: Vec<&str> = values.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(rendered, vec!["2", "10", "20", "100"]);
    }

    #[test]
    fn string_type_is_lexicographic() {
        let mut values = vec![s("10"), s("2"), s("100"), s("20")];
        values.sort_by(|a, b| compare_value(ValueType::String, a, b));
        let rendered: Vec<&str> = values.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(rendered, vec!["10", "100", "2", "20"]);
    }

    #[test]
    fn string_type_groups_case_variants_by_letter() {
        let mut values = vec![s("Banana"), s("apple"), s("banana"), s("Apple")];
        values.sort_by(|a, b| compare_value(ValueType::String, a, b));
        let rendered: Vec<&str> = values.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(rendered, vec!["Apple", "apple", "Banana", "banana"]);
    }

    #[test]
    fn nan_sorts_before_everything_and_equals_itself() {
        let nan = Bson::Double(f64::NAN);
        let one = Bson::Double(1.0);
        assert_eq!(compare_value(ValueType::Number, &nan, &one), Ordering::Less);
        assert_eq!(compare_value(ValueType::Number, &nan, &nan), Ordering::Equal);
    }

    #[test]
    fn date_compares_numerically_after_parsing() {
        let early = Bson::String("2020-01-01T00:00:00Z".to_string());
        let late = Bson::String("2021-01-01T00:00:00Z".to_string());
        assert_eq!(compare_value(ValueType::Date, &early, &late), Ordering::Less);
    }
}

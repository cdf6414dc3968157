/// Formats a JSON number the way it reads on the wire: integral values drop
/// the fractional part (`100`, not `100.0`), everything else uses the
/// shortest round-trip form.
pub fn number(value: f64) -> String {
    if value == 0.0 {
        // Covers -0.0.
        return "0".to_string();
    }
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    format!("{value}")
}

/// Percentage with a trailing `%`.
pub fn percent(value: f64) -> String {
    format!("{}%", number(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_values_have_no_fraction() {
        assert_eq!(number(100.0), "100");
        assert_eq!(number(42.0), "42");
        assert_eq!(number(-0.0), "0");
    }

    #[test]
    fn fractional_values_are_shortest() {
        assert_eq!(number(99.95), "99.95");
        assert_eq!(number(1.2), "1.2");
        assert_eq!(number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(percent(46.7), "46.7%");
    }
}

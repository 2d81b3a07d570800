//! Utility functions and helpers.

pub mod log;

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  3 rooms \n\t 80 m² "), "3 rooms 80 m²");
        assert_eq!(normalize_whitespace(" \n "), "");
    }
}

use std::sync::LazyLock;

use regex::Regex;

static SIZE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let re = Regex::new(r"(\d+\.?\d*)\s*(KB|MB|GB)").ok();
    if re.is_none() {
        tracing::error!("size pattern failed to compile, sizes will read as 0");
    }
    re
});

/// Parses a rendered count.
///
/// Thousands separators and surrounding whitespace are dropped. A trailing
/// `k` (thousands) or `m` (millions) scales the numeric prefix, floored, and
/// the whole prefix must be a number: `"87 stars this week"` is 0. Without a
/// suffix the first run of digits is the value: `"1,234 stars today"` → 1234.
pub fn parse_count(text: &str) -> u64 {
    let cleaned = text.replace(',', "");
    let cleaned = cleaned.trim();

    if let Some(prefix) = cleaned.strip_suffix('k') {
        scale(prefix, 3).unwrap_or(0)
    } else if let Some(prefix) = cleaned.strip_suffix('m') {
        scale(prefix, 6).unwrap_or(0)
    } else {
        first_digit_run(cleaned)
    }
}

/// Parses a repository size into KB. MB and GB use binary multiples.
pub fn parse_size(text: &str) -> u64 {
    let Some(re) = SIZE_RE.as_ref() else {
        return 0;
    };
    let Some(caps) = re.captures(text) else {
        return 0;
    };
    let Ok(number) = caps[1].parse::<f64>() else {
        return 0;
    };
    let factor = match &caps[2] {
        "KB" => 1.0,
        "MB" => 1024.0,
        "GB" => 1024.0 * 1024.0,
        _ => return 0,
    };
    (number * factor).floor() as u64
}

/// `prefix × 10^exp`, floored. Plain decimals are scaled digit-wise so
/// `"12.3"` with exp 3 is exactly 12300. Other float syntax goes through f64.
fn scale(prefix: &str, exp: u32) -> Option<u64> {
    let prefix = prefix.trim();
    let (int_part, frac_part) = prefix.split_once('.').unwrap_or((prefix, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    if !(int_part.is_empty() && frac_part.is_empty()) && is_digits(int_part) && is_digits(frac_part)
    {
        let int_value = if int_part.is_empty() {
            0
        } else {
            int_part.parse::<u64>().ok()?
        };
        // floor(0.d1d2d3... × 10^exp) is exactly the first `exp` digits
        let frac_digits: String = frac_part
            .chars()
            .chain(std::iter::repeat('0'))
            .take(exp as usize)
            .collect();
        let frac_value = frac_digits.parse::<u64>().ok()?;
        return int_value
            .checked_mul(10u64.pow(exp))?
            .checked_add(frac_value);
    }

    let value = prefix.parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 10f64.powi(exp as i32)).floor() as u64)
}

fn first_digit_run(text: &str) -> u64 {
    let Some(start) = text.find(|c: char| c.is_ascii_digit()) else {
        return 0;
    };
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn counts_as_rendered() {
        assert_eq!(parse_count("42"), 42);
        assert_eq!(parse_count("  1,234  "), 1234);
        assert_eq!(parse_count("12.3k"), 12300);
        assert_eq!(parse_count("1.5m"), 1_500_000);
        assert_eq!(parse_count(".5k"), 500);
        assert_eq!(parse_count("3k"), 3000);
        assert_eq!(parse_count("1.5 k"), 1500);
        assert_eq!(parse_count("1,024 stars today"), 1024);
        assert_eq!(parse_count("123 commits"), 123);
    }

    #[test]
    fn suffix_is_case_sensitive() {
        // "K" is not a thousands suffix, so the digit run wins
        assert_eq!(parse_count("1.2K"), 1);
    }

    #[test]
    fn suffix_with_non_numeric_prefix_is_zero() {
        // "week" and "team" end in a suffix letter, so the whole prefix must parse
        assert_eq!(parse_count("87 stars this week"), 0);
        assert_eq!(parse_count("Built by 4 people from team"), 0);
        assert_eq!(parse_count("⭐ 1.2k"), 0);
        assert_eq!(parse_count("1.2.3k"), 0);
        assert_eq!(parse_count("v2k"), 0);
        assert_eq!(parse_count("top 3 of 4k"), 0);
    }

    #[test]
    fn non_numeric_counts_are_zero() {
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("Star"), 0);
        assert_eq!(parse_count("k"), 0);
        assert_eq!(parse_count("m"), 0);
        assert_eq!(parse_count("99999999999999999999999"), 0);
    }

    #[test]
    fn sizes_in_kb() {
        assert_eq!(parse_size("512KB"), 512);
        assert_eq!(parse_size("2MB"), 2048);
        assert_eq!(parse_size("1GB"), 1_048_576);
        assert_eq!(parse_size("1.5 MB"), 1536);
        assert_eq!(parse_size("Size: 3.25 GB on disk"), 3_407_872);
    }

    #[test]
    fn sizes_without_a_unit_are_zero() {
        assert_eq!(parse_size("no size"), 0);
        assert_eq!(parse_size("12"), 0);
        // units are case-sensitive as rendered
        assert_eq!(parse_size("12mb"), 0);
    }

    proptest! {
        #[test]
        fn plain_integers(n in 0u64..1_000_000_000_000) {
            prop_assert_eq!(parse_count(&n.to_string()), n);
        }

        #[test]
        fn comma_grouped_integers(hi in 1u64..1_000_000, lo in 0u64..1000) {
            let text = format!("{hi},{lo:03}");
            prop_assert_eq!(parse_count(&text), hi * 1000 + lo);
        }

        #[test]
        fn thousands_suffix(int in 0u64..1_000_000, frac in 0u64..1000) {
            let text = format!("{int}.{frac:03}k");
            prop_assert_eq!(parse_count(&text), int * 1000 + frac);
        }

        #[test]
        fn millions_suffix(int in 0u64..100_000, tenths in 0u64..10) {
            let text = format!("{int}.{tenths}m");
            prop_assert_eq!(parse_count(&text), int * 1_000_000 + tenths * 100_000);
        }

        #[test]
        fn letters_only_is_zero(text in "[a-jl-zA-Z ]{0,20}") {
            prop_assert_eq!(parse_count(&text), 0);
        }

        #[test]
        fn count_never_panics(text in any::<String>()) {
            let _ = parse_count(&text);
        }

        #[test]
        fn whole_sizes(n in 0u64..100_000) {
            prop_assert_eq!(parse_size(&format!("{n}KB")), n);
            prop_assert_eq!(parse_size(&format!("{n}MB")), n * 1024);
            prop_assert_eq!(parse_size(&format!("{n} GB")), n * 1024 * 1024);
        }

        #[test]
        fn size_never_panics(text in any::<String>()) {
            let _ = parse_size(&text);
        }
    }
}

//! Parsing of abbreviated engagement counts ("1.2K", "3M", "1,5K", "42").

use std::sync::LazyLock;

use regex::Regex;

/// Number with optional separators and an optional magnitude suffix not followed by a letter.
static COUNT_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"([0-9]+(?:[.,][0-9]+)*)\s*([kmb])?(?:[^\p{L}]|$)").expect("COUNT_RE should compile"));

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("DIGITS_RE should compile"));

/// Fractional digits kept when scaling a suffixed count.
const MAX_FRACTION_DIGITS: usize = 9;

/// A parsed count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
	/// The text was a clean count.
	Exact(u64),
	/// Best-effort value from text that was not a clean count; `0` when nothing numeric was found.
	Degraded(u64),
}

impl Metric {
	pub fn value(self) -> u64 {
		match self {
			Metric::Exact(value) | Metric::Degraded(value) => value,
		}
	}

	pub fn is_exact(self) -> bool {
		matches!(self, Metric::Exact(_))
	}
}

/// Parses a displayed count. Never fails; unreadable input degrades.
pub fn parse_metric(text: &str) -> Metric {
	let text = text.trim().to_lowercase();
	if text.is_empty() {
		return Metric::Degraded(0);
	}
	if text.bytes().all(|b| b.is_ascii_digit()) {
		return text.parse().map_or(Metric::Degraded(u64::MAX), Metric::Exact);
	}

	if let Some(caps) = COUNT_RE.captures(&text) {
		let number = &caps[1];
		let parsed = match caps.get(2).map(|m| m.as_str()) {
			Some(suffix) => scaled(number, suffix_scale(suffix)),
			None => grouped(number),
		};
		match parsed {
			Some(value) if caps[0].len() == text.len() => return Metric::Exact(value),
			Some(value) => return Metric::Degraded(value),
			// Unsuffixed decimal such as "1.5": keep the whole part only.
			None if caps.get(2).is_none() => return Metric::Degraded(whole_part(number)),
			None => {}
		}
	}

	let fallback = DIGITS_RE.find(&text).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
	Metric::Degraded(fallback)
}

fn suffix_scale(suffix: &str) -> u64 {
	match suffix {
		"k" => 1_000,
		"m" => 1_000_000,
		_ => 1_000_000_000,
	}
}

/// Digits joined across thousands separators; `None` unless every group after the first has three digits.
fn grouped(number: &str) -> Option<u64> {
	let mut groups = number.split(['.', ',']);
	let mut digits = groups.next()?.to_string();
	for group in groups {
		if group.len() != 3 {
			return None;
		}
		digits.push_str(group);
	}
	digits.parse().ok()
}

fn whole_part(number: &str) -> u64 {
	number.split(['.', ',']).next().and_then(|whole| whole.parse().ok()).unwrap_or(0)
}

/// `whole[.,]fraction` times `scale`, truncated toward zero.
fn scaled(number: &str, scale: u64) -> Option<u64> {
	let mut parts = number.split(['.', ',']);
	let whole: u64 = parts.next()?.parse().ok()?;
	let fraction = parts.next().unwrap_or("");
	if parts.next().is_some() {
		return None;
	}

	let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
	let fraction_value = if fraction.is_empty() {
		0
	} else {
		let digits: u64 = fraction.parse().ok()?;
		let divisor = 10u64.pow(fraction.len() as u32);
		(digits as u128 * scale as u128 / divisor as u128) as u64
	};
	whole.checked_mul(scale)?.checked_add(fraction_value)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn suffixed_counts_scale_and_truncate() {
		assert_eq!(parse_metric("1.2K"), Metric::Exact(1_200));
		assert_eq!(parse_metric("3M"), Metric::Exact(3_000_000));
		assert_eq!(parse_metric("1,5K"), Metric::Exact(1_500));
		assert_eq!(parse_metric("2.345m"), Metric::Exact(2_345_000));
		assert_eq!(parse_metric("1.2345K"), Metric::Exact(1_234));
		assert_eq!(parse_metric("4B"), Metric::Exact(4_000_000_000));
	}

	#[test]
	fn plain_counts() {
		assert_eq!(parse_metric("42"), Metric::Exact(42));
		assert_eq!(parse_metric(" 0 "), Metric::Exact(0));
		assert_eq!(parse_metric("1,234"), Metric::Exact(1_234));
		assert_eq!(parse_metric("1.234.567"), Metric::Exact(1_234_567));
	}

	#[test]
	fn unsuffixed_decimals_keep_the_whole_part() {
		assert_eq!(parse_metric("1.5"), Metric::Degraded(1));
		assert_eq!(parse_metric("12,75"), Metric::Degraded(12));
		assert_eq!(parse_metric("1,2345"), Metric::Degraded(1));
	}

	#[test]
	fn unreadable_text_degrades_without_failing() {
		assert_eq!(parse_metric(""), Metric::Degraded(0));
		assert_eq!(parse_metric("abc"), Metric::Degraded(0));
		assert_eq!(parse_metric("views: 12"), Metric::Degraded(12));
		assert_eq!(parse_metric("5mb"), Metric::Degraded(5));
		assert_eq!(parse_metric("1.١٢٣٤٥k"), Metric::Degraded(1));
		assert_eq!(parse_metric("١٢٣"), Metric::Degraded(0));
		assert_eq!(parse_metric("٣.٥k"), Metric::Degraded(0));
		assert!(!parse_metric("abc").is_exact());
	}
}

//! Target identifier lists.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// One identifier per line; blank lines and `#` comments are ignored, a leading `@` is dropped.
pub fn parse_targets(content: &str) -> Vec<String> {
	content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.map(|line| line.trim_start_matches('@').to_string())
		.filter(|line| !line.is_empty())
		.collect()
}

pub fn load_targets(path: &Path) -> Result<Vec<String>> {
	Ok(parse_targets(&fs::read_to_string(path)?))
}

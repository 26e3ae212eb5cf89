//! Name orderings tried when a short name-like input finds nothing as typed.

const MAX_NAME_PARTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
struct NameParts {
	first: Option<String>,
	middle: Option<String>,
	last: String,
	suffix: Option<String>,
}

/// Candidate orderings of `text`, longest first, without the input itself. Empty when the
/// input does not split into one to three name parts.
pub fn name_permutations(text: &str, suffixes: &[String]) -> Vec<String> {
	let Some(parts) = parse_name(text, suffixes) else { return Vec::new() };
	let mut out: Vec<String> = Vec::new();
	let mut push = |value: String| {
		if !out.contains(&value) {
			out.push(value);
		}
	};
	let last = parts.last.as_str();

	push(last.to_string());

	if let Some(first) = parts.first.as_deref() {
		push(format!("{last} {first}"));
		push(format!("{last}, {first}"));
		push(format!("{first} {last}"));
		push(format!("{first}, {last}"));

		if let Some(middle) = parts.middle.as_deref() {
			let initial = middle_initial(middle);

			push(format!("{first} {middle} {last}"));
			push(format!("{first} {initial} {last}"));
			push(format!("{last}, {first} {middle}"));
			push(format!("{last}, {first} {initial}"));
			push(format!("{last} {first} {middle}"));
		}
		if let Some(suffix) = parts.suffix.as_deref() {
			for variant in suffix_variants(suffix) {
				push(format!("{first} {last} {variant}"));
				push(format!("{first} {last}, {variant}"));
				push(format!("{last} {variant}, {first}"));
				push(format!("{last}, {first} {variant}"));
			}
		}
	}

	let original = normalize_spacing(text);

	out.retain(|candidate| !candidate.eq_ignore_ascii_case(&original));
	// Stable sort keeps generation order among equal lengths.
	out.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

	out
}

fn parse_name(text: &str, suffixes: &[String]) -> Option<NameParts> {
	let comma_form = text.contains(',');
	let tokens: Vec<String> =
		text.replace(',', " ").split_whitespace().map(str::to_string).collect();

	if tokens.is_empty() || tokens.len() > MAX_NAME_PARTS {
		return None;
	}

	let parts = match tokens.as_slice() {
		[last] => NameParts { first: None, middle: None, last: last.clone(), suffix: None },
		[a, b] if comma_form => {
			NameParts { first: Some(b.clone()), middle: None, last: a.clone(), suffix: None }
		},
		[a, b] => NameParts { first: Some(a.clone()), middle: None, last: b.clone(), suffix: None },
		[a, b, c] if match_suffix(c, suffixes).is_some() => {
			let (first, last) = if comma_form { (b, a) } else { (a, b) };

			NameParts {
				first: Some(first.clone()),
				middle: None,
				last: last.clone(),
				suffix: match_suffix(c, suffixes),
			}
		},
		[a, b, c] if comma_form => NameParts {
			first: Some(b.clone()),
			middle: Some(c.clone()),
			last: a.clone(),
			suffix: None,
		},
		[a, b, c] => NameParts {
			first: Some(a.clone()),
			middle: Some(b.clone()),
			last: c.clone(),
			suffix: None,
		},
		_ => return None,
	};

	Some(parts)
}

/// The configured spelling of a suffix token, without its trailing period.
fn match_suffix(token: &str, suffixes: &[String]) -> Option<String> {
	let bare = token.trim_end_matches('.');

	suffixes
		.iter()
		.map(|suffix| suffix.trim_end_matches('.'))
		.find(|suffix| suffix.eq_ignore_ascii_case(bare))
		.map(str::to_string)
}

fn suffix_variants(suffix: &str) -> Vec<String> {
	let bare = suffix.trim_end_matches('.');

	// Roman numerals are never written with a trailing period.
	if bare.chars().all(|ch| matches!(ch.to_ascii_uppercase(), 'I' | 'V' | 'X')) {
		return vec![bare.to_string()];
	}

	vec![format!("{bare}."), bare.to_string()]
}

fn middle_initial(middle: &str) -> String {
	match middle.chars().next() {
		Some(initial) => format!("{}.", initial.to_uppercase()),
		None => String::new(),
	}
}

fn normalize_spacing(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn suffixes() -> Vec<String> {
		["Jr.", "Sr.", "II", "III", "IV"].iter().map(|value| value.to_string()).collect()
	}

	#[test]
	fn comma_form_drops_itself_and_sorts_longest_first() {
		let perms = name_permutations("Smith, John", &suffixes());

		assert_eq!(perms, vec!["John, Smith", "Smith John", "John Smith", "Smith"]);
	}

	#[test]
	fn single_token_has_no_alternatives() {
		assert!(name_permutations("Smith", &suffixes()).is_empty());
	}

	#[test]
	fn middle_name_adds_initial_variants() {
		let perms = name_permutations("John Quincy Smith", &suffixes());

		assert!(perms.contains(&"John Q. Smith".to_string()));
		assert!(perms.contains(&"Smith, John Quincy".to_string()));
		assert!(!perms.contains(&"John Quincy Smith".to_string()));
	}

	#[test]
	fn trailing_suffix_is_recognized() {
		let perms = name_permutations("John Smith jr", &suffixes());

		assert!(perms.contains(&"Smith Jr., John".to_string()));
		assert!(perms.contains(&"Smith, John Jr".to_string()));
		assert!(!perms.iter().any(|perm| perm.eq_ignore_ascii_case("John Smith jr")));
		assert!(perms.contains(&"Smith, John".to_string()));
	}

	#[test]
	fn roman_numeral_suffix_has_one_spelling() {
		let perms = name_permutations("John Smith III", &suffixes());

		assert!(perms.contains(&"Smith III, John".to_string()));
		assert!(!perms.iter().any(|perm| perm.contains("III.")));
	}

	#[test]
	fn too_many_parts_yield_nothing() {
		assert!(name_permutations("a b c d", &suffixes()).is_empty());
	}
}

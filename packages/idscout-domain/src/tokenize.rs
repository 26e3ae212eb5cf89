/// Splits `text` at its last `@` into local part and domain.
pub fn split_email(text: &str) -> Option<(&str, &str)> {
	let (local, domain) = text.trim().rsplit_once('@')?;

	if local.is_empty() {
		return None;
	}

	Some((local, domain))
}

/// Name-like text derived from an email local part: tokens split on `.` and whitespace, short
/// tokens dropped, joined with spaces. `None` when nothing usable remains or the result equals
/// the input.
pub fn email_name_tokens(text: &str, min_token_length: usize) -> Option<String> {
	let (local, _) = split_email(text)?;
	let tokens: Vec<&str> = local
		.split(|ch: char| ch == '.' || ch.is_whitespace())
		.filter(|token| token.chars().count() >= min_token_length)
		.collect();

	if tokens.is_empty() {
		return None;
	}

	let joined = tokens.join(" ");

	if joined.eq_ignore_ascii_case(text.trim()) {
		return None;
	}

	Some(joined)
}

/// Word fragments of `text` at least `min_token_length` characters long, de-duplicated
/// case-insensitively in first-seen order.
pub fn substring_tokens(text: &str, min_token_length: usize) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();

	for token in text.split(|ch: char| !(ch.is_alphanumeric() || ch == '_')) {
		if token.chars().count() < min_token_length {
			continue;
		}
		if out.iter().any(|seen| seen.eq_ignore_ascii_case(token)) {
			continue;
		}

		out.push(token.to_string());
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn email_split_uses_last_at_sign() {
		assert_eq!(split_email("a@b@corp.example"), Some(("a@b", "corp.example")));
		assert_eq!(split_email("@corp.example"), None);
		assert_eq!(split_email("plain"), None);
	}

	#[test]
	fn local_part_becomes_name_text() {
		assert_eq!(
			email_name_tokens("john.q.smith@corp.example", 3),
			Some("john smith".to_string())
		);
		assert_eq!(email_name_tokens("jq@corp.example", 3), None);
	}

	#[test]
	fn substring_tokens_drop_short_and_repeated_fragments() {
		assert_eq!(substring_tokens("Smith-J, SMITH / ops_team", 3), vec!["Smith", "ops_team"]);
	}
}

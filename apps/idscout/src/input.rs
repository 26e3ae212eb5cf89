//! Credential input: `identifier<delimiter>password` lines, or a CSV/TSV table whose header names
//! an identifier column and a password column.

use std::{
	fs,
	io::{self, Read},
	path::Path,
};

use color_eyre::eyre;

use idscout_service::CredentialLine;

const IDENTIFIER_COLUMNS: [&str; 9] = [
	"name",
	"username",
	"logon",
	"user",
	"accountname",
	"account",
	"email",
	"mail",
	"samaccountname",
];
const PASSWORD_COLUMNS: [&str; 7] =
	["password", "pass", "pw", "passwd", "clear", "cleartext", "cracked"];

/// Reads the whole input; `-` means stdin.
pub fn read_source(path: &Path) -> color_eyre::Result<String> {
	if path.as_os_str() == "-" {
		let mut raw = String::new();

		io::stdin().read_to_string(&mut raw)?;

		return Ok(raw);
	}

	fs::read_to_string(path)
		.map_err(|err| eyre::eyre!("Failed to read credentials from {}: {err}.", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Table {
	separator: u8,
	identifier: usize,
	password: usize,
}

/// Parses credentials, sniffing a tabular header on the first non-blank line.
pub fn parse_credentials(raw: &str, delimiter: &str) -> Vec<CredentialLine> {
	let body = skip_blank_lines(raw);
	let Some(table) = sniff_header(body) else {
		let lines = raw.lines().filter(|line| !line.trim().is_empty());

		return parse_delimited(lines, delimiter);
	};
	let mut reader = table_reader(body, table.separator);
	let mut out = Vec::new();

	for record in reader.records() {
		let record = match record {
			Ok(record) => record,
			Err(err) => {
				tracing::warn!(error = %err, "Skipping an unreadable row.");

				continue;
			},
		};
		let row = record.position().map(|position| position.line()).unwrap_or_default();
		let (Some(identifier), Some(password)) =
			(record.get(table.identifier), record.get(table.password))
		else {
			if record.iter().any(|cell| !cell.trim().is_empty()) {
				tracing::warn!(row, "Skipping a row with missing columns.");
			}

			continue;
		};

		if identifier.trim().is_empty() {
			continue;
		}

		out.push(CredentialLine::new(identifier.trim(), password));
	}

	out
}

fn parse_delimited<'a>(
	lines: impl Iterator<Item = &'a str>,
	delimiter: &str,
) -> Vec<CredentialLine> {
	let mut out = Vec::new();

	for (index, line) in lines.enumerate() {
		match CredentialLine::parse(line, delimiter) {
			Some(credential) => out.push(credential),
			None => tracing::warn!(line = index + 1, "Skipping a line without an identifier."),
		}
	}

	out
}

fn skip_blank_lines(raw: &str) -> &str {
	let mut offset = 0;

	for line in raw.split_inclusive('\n') {
		if !line.trim().is_empty() {
			break;
		}

		offset += line.len();
	}

	&raw[offset..]
}

fn table_reader(body: &str, separator: u8) -> csv::Reader<&[u8]> {
	csv::ReaderBuilder::new()
		.has_headers(true)
		.flexible(true)
		.delimiter(separator)
		.from_reader(body.as_bytes())
}

fn sniff_header(body: &str) -> Option<Table> {
	[b'\t', b',', b';'].into_iter().find_map(|separator| {
		let mut reader = table_reader(body, separator);
		let headers = reader.headers().ok()?;
		let cells: Vec<String> =
			headers.iter().map(|cell| cell.trim().to_ascii_lowercase()).collect();

		if cells.len() < 2 {
			return None;
		}

		let password = cells.iter().position(|cell| PASSWORD_COLUMNS.contains(&cell.as_str()))?;
		let identifier = cells.iter().enumerate().position(|(index, cell)| {
			index != password && IDENTIFIER_COLUMNS.contains(&cell.as_str())
		})?;

		Some(Table { separator, identifier, password })
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plain_lines_split_at_the_first_delimiter() {
		let parsed = parse_credentials("jdoe:Winter:2024\n\n ann@corp.example:pw\nbroken\n", ":");

		assert_eq!(
			parsed,
			vec![
				CredentialLine::new("jdoe", "Winter:2024"),
				CredentialLine::new("ann@corp.example", "pw"),
			]
		);
	}

	#[test]
	fn header_names_pick_the_columns() {
		let raw = "Hash,UserName,Cracked\nabc,jdoe,Winter2024!\ndef,\"smith, john\",\"a,\"\"b\"\n";
		let parsed = parse_credentials(raw, ":");

		assert_eq!(
			parsed,
			vec![
				CredentialLine::new("jdoe", "Winter2024!"),
				CredentialLine::new("smith, john", "a,\"b"),
			]
		);
	}

	#[test]
	fn tab_separated_headers_are_recognized() {
		let raw = "mail\tpassword\njdoe@corp.example\tpw one\n";

		assert_eq!(
			parse_credentials(raw, ":"),
			vec![CredentialLine::new("jdoe@corp.example", "pw one")]
		);
	}

	#[test]
	fn blank_lines_before_the_header_are_ignored() {
		let raw = "\n  \nuser;pass\njdoe;Winter2024!\n\nann;\n";

		assert_eq!(
			parse_credentials(raw, ":"),
			vec![CredentialLine::new("jdoe", "Winter2024!"), CredentialLine::new("ann", "")]
		);
	}

	#[test]
	fn lines_without_known_headers_stay_delimited() {
		let raw = "identity,secret\njdoe,pw\n";

		assert_eq!(
			parse_credentials(raw, ","),
			vec![CredentialLine::new("identity", "secret"), CredentialLine::new("jdoe", "pw")]
		);
	}
}

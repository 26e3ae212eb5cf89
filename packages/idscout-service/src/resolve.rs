use std::{
	collections::HashSet,
	sync::{
		Mutex,
		atomic::{AtomicBool, Ordering},
	},
};

use futures::future;
use serde::Serialize;

use crate::{BoxFuture, Error, IdScoutService, Result};
use idscout_domain::{
	attributes::{AttributeSetName, SearchAttributes},
	candidate::Candidate,
	permutation,
	planner::{self, NamedAttributes},
	query::{SearchQuery, Strategy, StrategyHint},
	tokenize,
};

/// One executed strategy: which text it searched, at what depth, and how many accounts it found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyRun {
	pub strategy: Strategy,
	pub depth: u32,
	pub text: String,
	pub hits: usize,
	pub speculative: bool,
}
impl StrategyRun {
	fn new(strategy: Strategy, depth: u32, text: impl Into<String>, hits: usize) -> Self {
		Self { strategy, depth, text: text.into(), hits, speculative: strategy.is_speculative() }
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
	pub candidates: Vec<Candidate>,
	pub trace: Vec<StrategyRun>,
	pub warnings: Vec<String>,
}
impl Resolution {
	pub fn keys(&self) -> Vec<&str> {
		self.candidates.iter().map(|candidate| candidate.key.as_str()).collect()
	}

	/// Whether a speculative strategy run produced hits.
	pub fn is_speculative(&self) -> bool {
		self.trace.iter().any(|run| run.speculative && run.hits > 0)
	}

	/// Inserts by key; a later sighting of the same account replaces the earlier one.
	fn upsert(&mut self, candidate: Candidate) {
		match self.candidates.iter_mut().find(|existing| existing.key == candidate.key) {
			Some(existing) => *existing = candidate,
			None => self.candidates.push(candidate),
		}
	}

	fn merge(&mut self, other: Resolution) {
		for candidate in other.candidates {
			self.upsert(candidate);
		}

		self.trace.extend(other.trace);
		self.warnings.extend(other.warnings);
	}
}

/// State shared by every nested search of one resolution.
#[derive(Debug, Default)]
struct Walk {
	visited: Mutex<HashSet<(String, StrategyHint)>>,
	depth_limited: AtomicBool,
}
impl Walk {
	/// Claims `(text, hint)` for this resolution. False when it was already searched.
	fn claim(&self, query: &SearchQuery) -> bool {
		let key = (query.text.trim().to_lowercase(), query.hint);

		self.visited.lock().unwrap_or_else(|err| err.into_inner()).insert(key)
	}

	/// True only for the first depth-limited search.
	fn first_depth_limit(&self) -> bool {
		!self.depth_limited.swap(true, Ordering::Relaxed)
	}
}

impl IdScoutService {
	/// A query carrying the configured resolver defaults.
	pub fn query(&self, text: impl Into<String>) -> SearchQuery {
		let resolver = &self.cfg.resolver;

		SearchQuery::new(text)
			.with_thorough(resolver.thorough)
			.with_substrings(resolver.allow_substrings)
			.with_min_token_length(resolver.min_token_length as usize)
	}

	/// Resolves free text to candidate accounts. This is the outermost entry point: it initializes
	/// the schema-pruned search sets, and nested strategy searches never come back through here.
	///
	/// When `properties` is non-empty, attributes fetched only to support matching are dropped
	/// from each candidate unless their value contains the searched text.
	pub async fn resolve(&self, query: SearchQuery, properties: &[String]) -> Result<Resolution> {
		if query.text.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Search text must be non-empty.".to_string(),
			});
		}

		let attrs = self.search_attributes().await?;
		let walk = Walk::default();
		let resolution = self.resolve_inner(attrs, properties, &walk, query, true).await;

		tracing::info!(
			candidates = resolution.candidates.len(),
			strategies = resolution.trace.len(),
			"Resolution finished."
		);

		Ok(resolution)
	}

	/// Resolves a structured record by searching its most specific known attribute.
	pub async fn resolve_input<I>(
		&self,
		input: &I,
		template: SearchQuery,
		properties: &[String],
	) -> Result<Resolution>
	where
		I: NamedAttributes + Sync,
	{
		let attrs = self.search_attributes().await?;
		let target = planner::infer_search_target(input, attrs);
		let query = SearchQuery { text: target.text, ..template };
		let mut resolution = self.resolve(query, properties).await?;

		if let Some(warning) = target.warning {
			tracing::warn!(%warning, "Structured input fell back to its text form.");

			resolution.warnings.insert(0, warning);
		}

		Ok(resolution)
	}

	fn resolve_inner<'a>(
		&'a self,
		attrs: &'a SearchAttributes,
		properties: &'a [String],
		walk: &'a Walk,
		query: SearchQuery,
		recursive: bool,
	) -> BoxFuture<'a, Resolution> {
		Box::pin(async move {
			let mut resolution = Resolution::default();
			let depth = query.recursion_depth;
			let max_depth = self.cfg.resolver.max_depth;

			if depth > max_depth {
				if walk.first_depth_limit() {
					tracing::warn!(depth, max_depth, "Recursion depth limit reached.");

					resolution.warnings.push(format!(
						"Skipped nested searches starting with '{}': depth {depth} exceeds the \
						 maximum of {max_depth}.",
						query.text
					));
				}

				return resolution;
			}
			if !walk.claim(&query) {
				tracing::debug!(depth, text = %query.text, "Already searched; skipped.");

				return resolution;
			}

			let thorough = query.thorough;

			if !thorough {
				let basic = &attrs.set(AttributeSetName::Basic).attributes;

				self.run_search(Strategy::Basic, &query, basic, properties, &mut resolution).await;
			}
			if thorough || resolution.candidates.is_empty() {
				let planned = planner::plan(&query, attrs);

				self.run_search(Strategy::Broad, &query, &planned, properties, &mut resolution)
					.await;
			}
			if recursive && (thorough || resolution.candidates.is_empty()) {
				let permutations =
					permutation::name_permutations(&query.text, &self.cfg.resolver.name_suffixes);
				let child_recursive = recursive && thorough;

				for text in permutations {
					let child = self
						.resolve_inner(
							attrs,
							properties,
							walk,
							query.subquery(text.as_str(), StrategyHint::Name),
							child_recursive,
						)
						.await;
					let hits = child.candidates.len();

					resolution.trace.push(StrategyRun::new(
						Strategy::NamePermutation,
						depth,
						text,
						hits,
					));
					resolution.merge(child);

					if hits > 0 && !thorough {
						break;
					}
				}
			}
			if (thorough || resolution.candidates.is_empty())
				&& let Some(name) = tokenize::email_name_tokens(&query.text, query.min_token_length)
			{
				let child = self
					.resolve_inner(
						attrs,
						properties,
						walk,
						query.subquery(name.as_str(), StrategyHint::Name),
						recursive,
					)
					.await;

				resolution.trace.push(StrategyRun::new(
					Strategy::EmailDecomposition,
					depth,
					name,
					child.candidates.len(),
				));
				resolution.merge(child);
			}
			if query.allow_substrings && (thorough || resolution.candidates.is_empty()) {
				self.explode_substrings(attrs, properties, walk, &query, &mut resolution).await;
			}

			resolution
		})
	}

	async fn explode_substrings(
		&self,
		attrs: &SearchAttributes,
		properties: &[String],
		walk: &Walk,
		query: &SearchQuery,
		resolution: &mut Resolution,
	) {
		let whole = query.text.trim();
		let tokens: Vec<String> = tokenize::substring_tokens(whole, query.min_token_length)
			.into_iter()
			.filter(|token| !token.eq_ignore_ascii_case(whole))
			.collect();

		if tokens.is_empty() {
			return;
		}

		tracing::warn!(
			speculative = true,
			depth = query.recursion_depth,
			tokens = tokens.len(),
			"Exploding search text into substrings; matches are speculative."
		);

		let children = future::join_all(tokens.iter().map(|token| {
			self.resolve_inner(
				attrs,
				properties,
				walk,
				query.subquery(token.as_str(), StrategyHint::Auto),
				false,
			)
		}))
		.await;

		for (token, child) in tokens.into_iter().zip(children) {
			resolution.trace.push(StrategyRun::new(
				Strategy::Substring,
				query.recursion_depth,
				token,
				child.candidates.len(),
			));
			resolution.merge(child);
		}

		if resolution.is_speculative() {
			resolution.warnings.push(format!(
				"Candidates for '{whole}' include substring matches, which may be false positives."
			));
		}
	}

	async fn run_search(
		&self,
		strategy: Strategy,
		query: &SearchQuery,
		attributes: &[String],
		properties: &[String],
		resolution: &mut Resolution,
	) {
		let depth = query.recursion_depth;
		let text = query.text.trim();

		if attributes.is_empty() {
			resolution
				.warnings
				.push(format!("No searchable attributes for the {strategy} strategy; skipped."));

			return;
		}

		let wanted = with_match_attributes(properties, attributes);
		let result = self.collaborators.directory.search(attributes, text, &wanted, None).await;
		let hits = match result {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, %strategy, depth, "Directory search failed.");

				resolution
					.warnings
					.push(format!("The {strategy} search for '{text}' failed: {err}."));

				Vec::new()
			},
		};

		tracing::debug!(%strategy, depth, %text, hits = hits.len(), "Strategy finished.");

		resolution.trace.push(StrategyRun::new(strategy, depth, text, hits.len()));

		for mut candidate in hits {
			if !properties.is_empty() {
				candidate.trim_attributes(properties, text);
			}

			resolution.upsert(candidate);
		}
	}
}

/// Requested properties plus the matched attributes, so a hit can show where it matched. Empty
/// stays empty and asks for everything.
fn with_match_attributes(properties: &[String], attributes: &[String]) -> Vec<String> {
	if properties.is_empty() {
		return Vec::new();
	}

	let mut out = properties.to_vec();

	for attribute in attributes {
		if !out.iter().any(|name| name.eq_ignore_ascii_case(attribute)) {
			out.push(attribute.clone());
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn match_attributes_extend_requested_properties() {
		let properties = vec!["sAMAccountName".to_string()];
		let attributes = vec!["samaccountname".to_string(), "mail".to_string()];

		assert_eq!(with_match_attributes(&properties, &attributes), vec!["sAMAccountName", "mail"]);
		assert!(with_match_attributes(&[], &attributes).is_empty());
	}

	#[test]
	fn later_sightings_replace_earlier_ones() {
		let mut resolution = Resolution::default();

		resolution.upsert(Candidate::new("CN=a"));
		resolution.upsert(Candidate::new("CN=b"));
		resolution.upsert(Candidate::new("CN=a").with(
			"mail",
			idscout_domain::candidate::AttrValue::Text("a@corp.example".to_string()),
		));

		assert_eq!(resolution.keys(), vec!["CN=a", "CN=b"]);
		assert!(resolution.candidates[0].get("mail").is_some());
	}
}

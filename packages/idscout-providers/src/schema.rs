/// Schema allow-list taken from configuration instead of the live subschema entry.
#[derive(Debug, Clone)]
pub struct StaticSchema {
	allowed: Vec<String>,
}
impl StaticSchema {
	pub fn new(allowed: Vec<String>) -> Self {
		Self { allowed }
	}

	/// The same list for every object class.
	pub fn allowed_attributes(&self, _object_class: &str) -> Vec<String> {
		self.allowed.clone()
	}
}

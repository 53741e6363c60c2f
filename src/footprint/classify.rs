use std::sync::OnceLock;

use regex::Regex;

use crate::error::ClassificationError;

/// Built-in (pattern, label prefix) rules, tested top to bottom.
const DEFAULT_RULES: &[(&str, &str)] = &[
    (r"^alloc::vec::", "Std mutable @ "),
    (r"^alloc::collections::", "Std mutable @ "),
    (r"^std::collections::", "Std mutable @ "),
    (r"^alloc::string::", "Std mutable @ "),
    (r"^alloc::(rc|sync)::", "Std shared @ "),
    (r"^collection_bench::workloads::persistent::", "Shared-structure immutable @ "),
    (r"^im_rc::", "im-rc immutable @ "),
    (r"^im::", "im immutable @ "),
    (r"^rpds::", "rpds immutable @ "),
    (r"^hashbrown::", "hashbrown mutable @ "),
    (r"^indexmap::", "IndexMap mutable @ "),
    (r"^smallvec::", "SmallVec mutable @ "),
    (r"^arrayvec::", "ArrayVec mutable @ "),
    (r"^heapless::", "heapless mutable @ "),
    (r"^crossbeam_queue::", "Crossbeam concurrent @ "),
    (r"^dashmap::", "DashMap concurrent @ "),
];

/// Maps fully-qualified type names to human-readable implementation labels.
#[derive(Clone, Debug)]
pub struct Classifier {
    rules: Vec<(Regex, String)>,
}

impl Classifier {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. Earlier rules take precedence.
    pub fn push(&mut self, pattern: &str, prefix: impl Into<String>) -> Result<(), regex::Error> {
        self.rules.push((Regex::new(pattern)?, prefix.into()));
        Ok(())
    }

    pub fn prefix(&self, type_name: &str) -> Result<&str, ClassificationError> {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(type_name))
            .map(|(_, prefix)| prefix.as_str())
            .ok_or_else(|| ClassificationError {
                type_name: type_name.to_string(),
            })
    }

    /// `prefix + simple type name`, e.g. `"Std mutable @ Vec"`.
    pub fn classify(&self, type_name: &str) -> Result<String, ClassificationError> {
        let prefix = self.prefix(type_name)?;
        Ok(format!("{prefix}{}", simple_name(type_name)))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        static RULES: OnceLock<Vec<(Regex, String)>> = OnceLock::new();
        let rules = RULES.get_or_init(|| {
            DEFAULT_RULES
                .iter()
                .map(|(pattern, prefix)| {
                    (
                        Regex::new(pattern).expect("built-in classification pattern"),
                        (*prefix).to_string(),
                    )
                })
                .collect()
        });
        Self {
            rules: rules.clone(),
        }
    }
}

/// Last path segment without generic arguments:
/// `alloc::collections::vec_deque::VecDeque<i32>` -> `VecDeque`. Dotted names
/// (`scala.collection.immutable.Vector`) are split the same way.
pub fn simple_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit(&[':', '.'][..]).next().unwrap_or(base)
}

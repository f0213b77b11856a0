//! Node-definition selection strategies.

use rand::Rng;

use infogrid_broker::{BrokerError, BrokerResult};

use crate::types::NodeDefinition;

/// Strategy deciding which of a node type's implementations to use.
///
/// A closed set: unknown tags are rejected when the strategy argument is
/// parsed, not at selection time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefinitionStrategy {
    /// Uniform random choice.
    #[default]
    Random,
    /// Always the first candidate; deterministic, mainly for tests.
    First,
}

impl DefinitionStrategy {
    /// Parse a strategy tag.
    pub fn parse(tag: &str) -> BrokerResult<Self> {
        match tag {
            "random" => Ok(Self::Random),
            "first" => Ok(Self::First),
            other => Err(BrokerError::Argument(format!(
                "unknown definition selection strategy {other:?}"
            ))),
        }
    }

    /// Choose one definition. `candidates` must not be empty.
    pub fn select<'a>(&self, candidates: &'a [NodeDefinition]) -> &'a NodeDefinition {
        match self {
            Self::Random => {
                let index = rand::thread_rng().gen_range(0..candidates.len());
                &candidates[index]
            }
            Self::First => &candidates[0],
        }
    }
}

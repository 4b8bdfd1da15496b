//! Standard node library
//!
//! The built-in node kinds: text sources, text transforms, LLM prompts,
//! and file IO.

mod file;
mod prompt;
mod text;
mod transform;

pub use file::TextFileNode;
pub use prompt::{PromptNode, ResponseFilter};
pub use text::StaticTextNode;
pub use transform::{JoinNode, RegexNode, SplitNode};

use std::sync::Arc;
use weaveruntime::NodeRegistry;

/// Register all standard nodes with a registry.
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(file::TextFileNodeFactory));
    registry.register(Arc::new(prompt::PromptNodeFactory));
    registry.register(Arc::new(text::StaticTextNodeFactory));
    registry.register(Arc::new(transform::JoinNodeFactory));
    registry.register(Arc::new(transform::RegexNodeFactory));
    registry.register(Arc::new(transform::SplitNodeFactory));
}

//! Builtin tools and the bridge that invokes any registered tool.
//!
//! The builtins are a small filesystem toolset confined to one base
//! directory. Remote tools arrive through `aru-mcp`; both kinds end up in
//! the same [`ToolRegistry`] and are executed through [`ToolBridge`].

pub mod path;
pub mod filesystem;
pub mod bridge;

pub use bridge::{ToolBridge, normalize_output};
pub use filesystem::{CreateDirectoryTool, ListDirectoryTool, ReadFileTool, WriteFileTool};

use aru_core::tool::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;

/// Register the filesystem builtins, all confined to `base_dir`.
pub fn register_builtins(registry: &mut ToolRegistry, base_dir: PathBuf) {
    registry.register(Arc::new(ReadFileTool::new(base_dir.clone())));
    registry.register(Arc::new(WriteFileTool::new(base_dir.clone())));
    registry.register(Arc::new(ListDirectoryTool::new(base_dir.clone())));
    registry.register(Arc::new(CreateDirectoryTool::new(base_dir)));
}

/// A registry holding only the builtins.
pub fn builtin_registry(base_dir: PathBuf) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry, base_dir);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = builtin_registry(PathBuf::from("."));
        assert_eq!(
            registry.names(),
            vec!["create_directory", "list_directory", "read_file", "write_file"]
        );
    }
}

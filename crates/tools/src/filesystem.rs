//! Filesystem builtins: read, write, list and create, all under one base directory.
//!
//! Expected failures (missing file, wrong kind of path, I/O errors) come
//! back as a failed [`ToolOutput`] so the model sees the reason. Bad
//! arguments and rejected paths are [`ToolError`]s.

use async_trait::async_trait;
use aru_core::error::ToolError;
use aru_core::tool::{Tool, ToolOutput};
use serde_json::{Value, json};
use std::path::PathBuf;

use crate::path::resolve_within;

fn string_arg<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": description }
        },
        "required": ["path"]
    })
}

pub struct ReadFileTool {
    base_dir: PathBuf,
}

impl ReadFileTool {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file (path relative to the working directory)."
    }

    fn parameters_schema(&self) -> Value {
        path_schema("Path to the file to read")
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let path = string_arg(&arguments, "path")?;
        let resolved = resolve_within(&self.base_dir, path)?;

        if !resolved.exists() {
            return Ok(ToolOutput::failure(format!("File not found: {path}")));
        }
        if !resolved.is_file() {
            return Ok(ToolOutput::failure(format!("Not a file: {path}")));
        }

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(ToolOutput::text(content)),
            Err(e) => Ok(ToolOutput::failure(format!("Failed to read file: {e}"))),
        }
    }
}

pub struct WriteFileTool {
    base_dir: PathBuf,
}

impl WriteFileTool {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the file to write" },
                "content": { "type": "string", "description": "Content to write to the file" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let path = string_arg(&arguments, "path")?;
        let content = string_arg(&arguments, "content")?;
        let resolved = resolve_within(&self.base_dir, path)?;

        if let Some(parent) = resolved.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolOutput::failure(format!("Failed to create directories: {e}")));
        }

        match tokio::fs::write(&resolved, content).await {
            Ok(()) => Ok(ToolOutput::text(format!("Successfully wrote to {path}"))),
            Err(e) => Ok(ToolOutput::failure(format!("Failed to write file: {e}"))),
        }
    }
}

pub struct ListDirectoryTool {
    base_dir: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory (defaults to the working directory)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to list", "default": "." }
            }
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");
        let resolved = resolve_within(&self.base_dir, path)?;

        if !resolved.exists() {
            return Ok(ToolOutput::failure(format!("Directory not found: {path}")));
        }
        if !resolved.is_dir() {
            return Ok(ToolOutput::failure(format!("Not a directory: {path}")));
        }

        let mut reader = match tokio::fs::read_dir(&resolved).await {
            Ok(r) => r,
            Err(e) => return Ok(ToolOutput::failure(format!("Failed to list directory: {e}"))),
        };

        let mut entries = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => {
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
                }
                Ok(None) => break,
                Err(e) => return Ok(ToolOutput::failure(format!("Failed to list directory: {e}"))),
            }
        }

        if entries.is_empty() {
            return Ok(ToolOutput::text("Empty directory"));
        }
        entries.sort();
        let listing = entries
            .iter()
            .map(|(name, is_dir)| format!("{}: {name}", if *is_dir { "DIR" } else { "FILE" }))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ToolOutput::text(listing))
    }
}

pub struct CreateDirectoryTool {
    base_dir: PathBuf,
}

impl CreateDirectoryTool {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory and any missing parents."
    }

    fn parameters_schema(&self) -> Value {
        path_schema("Path for the new directory")
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let path = string_arg(&arguments, "path")?;
        let resolved = resolve_within(&self.base_dir, path)?;

        match tokio::fs::create_dir_all(&resolved).await {
            Ok(()) => Ok(ToolOutput::text(format!("Successfully created directory: {path}"))),
            Err(e) => Ok(ToolOutput::failure(format!("Failed to create directory: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aru_core::tool::ToolContent;

    fn text_of(output: &ToolOutput) -> &str {
        match &output.content[0] {
            ToolContent::Text { text } => text,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "Hello, world!").unwrap();

        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let out = tool.execute(json!({"path": "hello.txt"})).await.unwrap();
        assert!(out.success);
        assert_eq!(text_of(&out), "Hello, world!");
    }

    #[tokio::test]
    async fn read_missing_file_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let out = tool.execute(json!({"path": "missing.txt"})).await.unwrap();
        assert!(!out.success);
        assert_eq!(text_of(&out), "File not found: missing.txt");
    }

    #[tokio::test]
    async fn read_requires_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(json!({"path": "notes/today.md", "content": "- ship it"}))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/today.md")).unwrap(),
            "- ship it"
        );
    }

    #[tokio::test]
    async fn write_outside_base_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(json!({"path": "../escape.txt", "content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathRejected(_)));
    }

    #[tokio::test]
    async fn list_directory_marks_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let tool = ListDirectoryTool::new(dir.path().to_path_buf());
        let out = tool.execute(json!({})).await.unwrap();
        assert_eq!(text_of(&out), "FILE: a.txt\nDIR: sub");
    }

    #[tokio::test]
    async fn list_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListDirectoryTool::new(dir.path().to_path_buf());
        let out = tool.execute(json!({"path": "."})).await.unwrap();
        assert_eq!(text_of(&out), "Empty directory");
    }

    #[tokio::test]
    async fn create_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateDirectoryTool::new(dir.path().to_path_buf());
        for _ in 0..2 {
            let out = tool.execute(json!({"path": "x/y"})).await.unwrap();
            assert!(out.success);
        }
        assert!(dir.path().join("x/y").is_dir());
    }
}

//! File tools confined to a [`SandboxConfig`].
//!
//! Every operation validates its paths before touching storage and runs on
//! the blocking thread pool, so a large tree walk never stalls the runtime
//! driving the completion-service calls.
use async_trait::async_trait;
use chrono::{DateTime, Local};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::ToolSchema;
use crate::patch::{apply_file_edits, EditOperation};
use crate::sandbox::SandboxConfig;
use crate::tool::{parse_arguments, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    ReadFile,
    ReadMultipleFiles,
    WriteFile,
    EditFile,
    ListDirectory,
    SearchFiles,
    CreateDirectory,
    MoveFile,
    GetFileInfo,
    DirectoryTree,
}

impl FileOperation {
    pub const ALL: [FileOperation; 10] = [
        FileOperation::ReadFile,
        FileOperation::ReadMultipleFiles,
        FileOperation::WriteFile,
        FileOperation::EditFile,
        FileOperation::ListDirectory,
        FileOperation::SearchFiles,
        FileOperation::CreateDirectory,
        FileOperation::MoveFile,
        FileOperation::GetFileInfo,
        FileOperation::DirectoryTree,
    ];

    fn schema(self) -> ToolSchema {
        let path_only = |description: &str| {
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": description}
                },
                "required": ["path"]
            })
        };

        match self {
            FileOperation::ReadFile => ToolSchema::new(
                "read_file",
                "Read the complete contents of a file from the file system.",
                path_only("Path of the file to read"),
            ),
            FileOperation::ReadMultipleFiles => ToolSchema::new(
                "read_multiple_files",
                "Read the contents of several files at once. A file that cannot be read \
                is reported inline and does not stop the others.",
                json!({
                    "type": "object",
                    "properties": {
                        "paths": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Paths of the files to read"
                        }
                    },
                    "required": ["paths"]
                }),
            ),
            FileOperation::WriteFile => ToolSchema::new(
                "write_file",
                "Create a new file or completely overwrite an existing file.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path of the file to write"},
                        "content": {"type": "string", "description": "Content to write to the file"}
                    },
                    "required": ["path", "content"]
                }),
            ),
            FileOperation::EditFile => ToolSchema::new(
                "edit_file",
                "Edit parts of an existing file. Each edit replaces oldText with newText; \
                indentation differences are tolerated. Returns a unified diff of the changes.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path of the file to edit"},
                        "edits": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "oldText": {"type": "string", "description": "Text to search for"},
                                    "newText": {"type": "string", "description": "Text to replace it with"}
                                },
                                "required": ["oldText", "newText"]
                            },
                            "description": "Edits to apply, in order"
                        },
                        "dryRun": {
                            "type": "boolean",
                            "description": "Preview the diff without writing the file",
                            "default": false
                        }
                    },
                    "required": ["path", "edits"]
                }),
            ),
            FileOperation::ListDirectory => ToolSchema::new(
                "list_directory",
                "List the files and directories in a directory, each marked [FILE] or [DIR].",
                path_only("Path of the directory to list"),
            ),
            FileOperation::SearchFiles => ToolSchema::new(
                "search_files",
                "Recursively search for files and directories whose name contains the pattern \
                (case-insensitive).",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Directory to start searching from"},
                        "pattern": {"type": "string", "description": "Text to look for in names"},
                        "excludePatterns": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Glob patterns, relative to the search root, to skip"
                        }
                    },
                    "required": ["path", "pattern"]
                }),
            ),
            FileOperation::CreateDirectory => ToolSchema::new(
                "create_directory",
                "Create a directory, including any missing parents. Succeeds if it already exists.",
                path_only("Path of the directory to create"),
            ),
            FileOperation::MoveFile => ToolSchema::new(
                "move_file",
                "Move or rename a file or directory. Fails if the destination already exists.",
                json!({
                    "type": "object",
                    "properties": {
                        "source": {"type": "string", "description": "Path to move"},
                        "destination": {"type": "string", "description": "New path"}
                    },
                    "required": ["source", "destination"]
                }),
            ),
            FileOperation::GetFileInfo => ToolSchema::new(
                "get_file_info",
                "Get metadata for a file or directory: size, timestamps, type and permissions.",
                path_only("Path of the file or directory"),
            ),
            FileOperation::DirectoryTree => ToolSchema::new(
                "directory_tree",
                "Get a recursive tree of files and directories as JSON, starting at the given path.",
                path_only("Root directory of the tree"),
            ),
        }
    }

    fn run(self, sandbox: &SandboxConfig, arguments: Value) -> AgentResult<String> {
        match self {
            FileOperation::ReadFile => {
                let args: PathArgs = parse_arguments(arguments)?;
                read_file(sandbox, &args.path)
            }
            FileOperation::ReadMultipleFiles => {
                let args: ReadMultipleFilesArgs = parse_arguments(arguments)?;
                Ok(read_multiple_files(sandbox, &args.paths))
            }
            FileOperation::WriteFile => {
                let args: WriteFileArgs = parse_arguments(arguments)?;
                write_file(sandbox, &args.path, &args.content)
            }
            FileOperation::EditFile => {
                let args: EditFileArgs = parse_arguments(arguments)?;
                let path = sandbox.validate(&args.path)?;
                apply_file_edits(&path, &args.edits, args.dry_run)
            }
            FileOperation::ListDirectory => {
                let args: PathArgs = parse_arguments(arguments)?;
                list_directory(sandbox, &args.path)
            }
            FileOperation::SearchFiles => {
                let args: SearchFilesArgs = parse_arguments(arguments)?;
                let root = sandbox.validate(&args.path)?;
                let results = search_files(sandbox, &root, &args.pattern, &args.exclude_patterns)?;
                if results.is_empty() {
                    Ok("No matching files found".to_string())
                } else {
                    Ok(results.join("\n"))
                }
            }
            FileOperation::CreateDirectory => {
                let args: PathArgs = parse_arguments(arguments)?;
                let path = sandbox.validate_for_create(&args.path)?;
                fs::create_dir_all(&path).map_err(|e| {
                    AgentError::ExecutionError(format!("Failed to create directory: {}", e))
                })?;
                Ok(format!("Successfully created directory {}", args.path))
            }
            FileOperation::MoveFile => {
                let args: MoveFileArgs = parse_arguments(arguments)?;
                move_file(sandbox, &args.source, &args.destination)
            }
            FileOperation::GetFileInfo => {
                let args: PathArgs = parse_arguments(arguments)?;
                let path = sandbox.validate(&args.path)?;
                Ok(FileInfo::read(&path)?.to_string())
            }
            FileOperation::DirectoryTree => {
                let args: PathArgs = parse_arguments(arguments)?;
                let root = sandbox.validate(&args.path)?;
                let tree = directory_tree(sandbox, &root)?;
                serde_json::to_string_pretty(&tree).map_err(|e| AgentError::Internal(e.to_string()))
            }
        }
    }
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct ReadMultipleFilesArgs {
    paths: Vec<String>,
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct EditFileArgs {
    path: String,
    edits: Vec<EditOperation>,
    #[serde(rename = "dryRun", default)]
    dry_run: bool,
}

#[derive(Deserialize)]
struct SearchFilesArgs {
    path: String,
    pattern: String,
    #[serde(rename = "excludePatterns", default)]
    exclude_patterns: Vec<String>,
}

#[derive(Deserialize)]
struct MoveFileArgs {
    source: String,
    destination: String,
}

/// One filesystem operation bound to the sandbox it validates against
pub struct FilesystemTool {
    operation: FileOperation,
    schema: ToolSchema,
    sandbox: Arc<SandboxConfig>,
}

impl FilesystemTool {
    pub fn new(operation: FileOperation, sandbox: Arc<SandboxConfig>) -> Self {
        Self {
            operation,
            schema: operation.schema(),
            sandbox,
        }
    }
}

#[async_trait]
impl Tool for FilesystemTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> AgentResult<String> {
        let operation = self.operation;
        let sandbox = Arc::clone(&self.sandbox);
        tokio::task::spawn_blocking(move || operation.run(&sandbox, arguments))
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))?
    }
}

/// Every filesystem tool, sharing one sandbox
pub fn filesystem_tools(sandbox: Arc<SandboxConfig>) -> Vec<Box<dyn Tool>> {
    FileOperation::ALL
        .iter()
        .map(|&operation| {
            Box::new(FilesystemTool::new(operation, Arc::clone(&sandbox))) as Box<dyn Tool>
        })
        .collect()
}

fn read_file(sandbox: &SandboxConfig, requested: &str) -> AgentResult<String> {
    let path = sandbox.validate(requested)?;
    fs::read_to_string(&path)
        .map_err(|e| AgentError::ExecutionError(format!("Failed to read file: {}", e)))
}

fn read_multiple_files(sandbox: &SandboxConfig, paths: &[String]) -> String {
    paths
        .iter()
        .map(|path| match read_file(sandbox, path) {
            Ok(content) => format!("{}:\n{}\n", path, content),
            Err(e) => format!("{}: Error - {}", path, e),
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

fn write_file(sandbox: &SandboxConfig, requested: &str, content: &str) -> AgentResult<String> {
    let path = sandbox.validate(requested)?;
    fs::write(&path, content)
        .map_err(|e| AgentError::ExecutionError(format!("Failed to write file: {}", e)))?;
    Ok(format!("Successfully wrote to {}", requested))
}

fn list_directory(sandbox: &SandboxConfig, requested: &str) -> AgentResult<String> {
    let path = sandbox.validate(requested)?;
    let entries = fs::read_dir(&path)
        .map_err(|e| AgentError::ExecutionError(format!("Failed to read directory: {}", e)))?;

    let mut formatted = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(validated) = sandbox.validate(&entry.path().to_string_lossy()) else {
            continue;
        };
        if validated.is_dir() {
            formatted.push(format!("[DIR] {}", name));
        } else {
            formatted.push(format!("[FILE] {}", name));
        }
    }

    if formatted.is_empty() {
        Ok("Directory is empty or has no accessible entries".to_string())
    } else {
        Ok(formatted.join("\n"))
    }
}

fn move_file(sandbox: &SandboxConfig, source: &str, destination: &str) -> AgentResult<String> {
    let from = sandbox.validate(source)?;
    let to = sandbox.validate(destination)?;
    if fs::symlink_metadata(&to).is_ok() {
        return Err(AgentError::InvalidParameters(format!(
            "Destination already exists: {}",
            destination
        )));
    }
    fs::rename(&from, &to)
        .map_err(|e| AgentError::ExecutionError(format!("Failed to move file: {}", e)))?;
    Ok(format!("Successfully moved {} to {}", source, destination))
}

/// Build the matcher for `excludePatterns`.
///
/// A pattern without a wildcard names a file or directory anywhere below the
/// root, so `node_modules` skips every `node_modules` directory and its contents.
fn exclude_matcher(patterns: &[String]) -> AgentResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let expanded = if pattern.contains('*') {
            vec![pattern.clone()]
        } else {
            vec![
                pattern.clone(),
                format!("**/{}", pattern),
                format!("**/{}/**", pattern),
            ]
        };
        for glob in expanded {
            builder.add(Glob::new(&glob).map_err(|e| {
                AgentError::InvalidParameters(format!("Invalid exclude pattern '{}': {}", pattern, e))
            })?);
        }
    }
    builder
        .build()
        .map_err(|e| AgentError::InvalidParameters(e.to_string()))
}

/// Depth-first search for entries whose name contains `pattern`, ignoring case.
///
/// Entries that fail validation are skipped silently, as are directories
/// already visited through another symlink.
pub fn search_files(
    sandbox: &SandboxConfig,
    root: &Path,
    pattern: &str,
    exclude_patterns: &[String],
) -> AgentResult<Vec<String>> {
    let excludes = exclude_matcher(exclude_patterns)?;
    let pattern = pattern.to_lowercase();
    let mut results = Vec::new();
    let mut visited = HashSet::from([root.to_path_buf()]);

    let mut stack = vec![fs::read_dir(root)
        .map_err(|e| AgentError::ExecutionError(format!("Failed to read directory: {}", e)))?];

    while let Some(entries) = stack.last_mut() {
        let Some(entry) = entries.next() else {
            stack.pop();
            continue;
        };
        let Ok(entry) = entry else { continue };

        let full_path = entry.path();
        let Ok(validated) = sandbox.validate(&full_path.to_string_lossy()) else {
            continue;
        };

        let relative = full_path.strip_prefix(root).unwrap_or(full_path.as_path());
        if excludes.is_match(relative) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.contains(&pattern) {
            results.push(full_path.display().to_string());
        }

        if validated.is_dir() && visited.insert(validated) {
            if let Ok(children) = fs::read_dir(&full_path) {
                stack.push(children);
            }
        }
    }

    Ok(results)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeEntry>>,
}

struct TreeNode {
    name: String,
    kind: EntryKind,
    parent: Option<usize>,
}

/// Walk `root` into a nested tree without recursion.
///
/// Nodes are collected into a flat arena first. A child is always created
/// after its parent, so folding the arena back to front finishes every
/// subtree before its parent is built.
pub fn directory_tree(sandbox: &SandboxConfig, root: &Path) -> AgentResult<Vec<TreeEntry>> {
    let mut nodes: Vec<TreeNode> = Vec::new();
    let mut visited = HashSet::from([root.to_path_buf()]);
    let mut pending: Vec<(PathBuf, Option<usize>)> = vec![(root.to_path_buf(), None)];
    let mut is_root = true;

    while let Some((dir, parent)) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if is_root => {
                return Err(AgentError::ExecutionError(format!(
                    "Failed to read directory: {}",
                    e
                )))
            }
            Err(_) => continue,
        };
        is_root = false;

        for entry in entries.flatten() {
            let Ok(validated) = sandbox.validate(&entry.path().to_string_lossy()) else {
                continue;
            };
            let kind = if validated.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            let index = nodes.len();
            nodes.push(TreeNode {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
                parent,
            });
            if kind == EntryKind::Directory && visited.insert(validated.clone()) {
                pending.push((validated, Some(index)));
            }
        }
    }

    let mut children: Vec<Vec<TreeEntry>> = (0..nodes.len()).map(|_| Vec::new()).collect();
    let mut top_level = Vec::new();
    for (index, node) in nodes.into_iter().enumerate().rev() {
        let entry = TreeEntry {
            name: node.name,
            kind: node.kind,
            children: match node.kind {
                EntryKind::Directory => {
                    let mut own = std::mem::take(&mut children[index]);
                    own.reverse();
                    Some(own)
                }
                EntryKind::File => None,
            },
        };
        match node.parent {
            Some(parent) => children[parent].push(entry),
            None => top_level.push(entry),
        }
    }
    top_level.reverse();
    Ok(top_level)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub size: u64,
    pub created: DateTime<Local>,
    pub modified: DateTime<Local>,
    pub accessed: DateTime<Local>,
    pub is_directory: bool,
    pub is_file: bool,
    /// Last three octal digits of the mode, e.g. `644`
    pub permissions: String,
}

impl FileInfo {
    pub fn read(path: &Path) -> AgentResult<Self> {
        let metadata = fs::metadata(path)?;
        let modified = metadata.modified()?;
        // Not every filesystem records a birth time
        let created = metadata.created().unwrap_or(modified);
        let accessed = metadata.accessed().unwrap_or(modified);

        Ok(FileInfo {
            size: metadata.len(),
            created: local_time(created),
            modified: local_time(modified),
            accessed: local_time(accessed),
            is_directory: metadata.is_dir(),
            is_file: metadata.is_file(),
            permissions: permission_bits(&metadata),
        })
    }
}

impl std::fmt::Display for FileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let format = "%Y-%m-%d %H:%M:%S";
        writeln!(f, "size: {}", self.size)?;
        writeln!(f, "created: {}", self.created.format(format))?;
        writeln!(f, "modified: {}", self.modified.format(format))?;
        writeln!(f, "accessed: {}", self.accessed.format(format))?;
        writeln!(f, "isDirectory: {}", self.is_directory)?;
        writeln!(f, "isFile: {}", self.is_file)?;
        write!(f, "permissions: {}", self.permissions)
    }
}

fn local_time(time: SystemTime) -> DateTime<Local> {
    DateTime::<Local>::from(time)
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:03o}", metadata.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> String {
    if metadata.permissions().readonly() {
        "444".to_string()
    } else {
        "666".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<SandboxConfig>, PathBuf) {
        let temp_dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(SandboxConfig::new([temp_dir.path().to_str().unwrap()]));
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        (temp_dir, sandbox, root)
    }

    async fn call(sandbox: &Arc<SandboxConfig>, operation: FileOperation, args: Value) -> AgentResult<String> {
        FilesystemTool::new(operation, Arc::clone(sandbox))
            .execute(args)
            .await
    }

    #[test]
    fn test_tool_names() {
        let (_temp_dir, sandbox, _root) = setup();
        let names: Vec<String> = filesystem_tools(sandbox)
            .iter()
            .map(|tool| tool.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "read_file",
                "read_multiple_files",
                "write_file",
                "edit_file",
                "list_directory",
                "search_files",
                "create_directory",
                "move_file",
                "get_file_info",
                "directory_tree"
            ]
        );
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (_temp_dir, sandbox, root) = setup();
        let path = root.join("hello.txt");
        let path_str = path.to_str().unwrap();

        let result = call(
            &sandbox,
            FileOperation::WriteFile,
            json!({"path": path_str, "content": "Hello, world!"}),
        )
        .await
        .unwrap();
        assert!(result.contains("Successfully wrote to"));

        let content = call(&sandbox, FileOperation::ReadFile, json!({"path": path_str}))
            .await
            .unwrap();
        assert_eq!(content, "Hello, world!");
    }

    #[tokio::test]
    async fn test_write_outside_sandbox_denied() {
        let (_temp_dir, sandbox, _root) = setup();
        let outside = tempfile::tempdir().unwrap();
        let path = outside.path().join("x.txt");

        let error = call(
            &sandbox,
            FileOperation::WriteFile,
            json!({"path": path.to_str().unwrap(), "content": "x"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(error, AgentError::AccessDenied(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_argument_is_invalid_parameters() {
        let (_temp_dir, sandbox, _root) = setup();
        let error = call(&sandbox, FileOperation::WriteFile, json!({"path": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(error, AgentError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_read_multiple_files_reports_failures_inline() {
        let (_temp_dir, sandbox, root) = setup();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        let good = root.join("a.txt");
        let bad = root.join("missing.txt");

        let result = call(
            &sandbox,
            FileOperation::ReadMultipleFiles,
            json!({"paths": [good.to_str().unwrap(), bad.to_str().unwrap()]}),
        )
        .await
        .unwrap();

        let sections: Vec<&str> = result.split("\n---\n").collect();
        assert_eq!(sections.len(), 2);
        assert!(sections[0].contains("alpha"));
        assert!(sections[1].contains("Error"));
    }

    #[tokio::test]
    async fn test_edit_file_returns_diff() {
        let (_temp_dir, sandbox, root) = setup();
        let path = root.join("code.py");
        fs::write(&path, "def f():\n    return 1\n").unwrap();

        let diff = call(
            &sandbox,
            FileOperation::EditFile,
            json!({
                "path": path.to_str().unwrap(),
                "edits": [{"oldText": "return 1", "newText": "return 2"}],
                "dryRun": true
            }),
        )
        .await
        .unwrap();
        assert!(diff.starts_with("```diff\n"));
        assert!(diff.contains("+    return 2"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "def f():\n    return 1\n");

        call(
            &sandbox,
            FileOperation::EditFile,
            json!({
                "path": path.to_str().unwrap(),
                "edits": [{"oldText": "return 1", "newText": "return 2"}]
            }),
        )
        .await
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "def f():\n    return 2\n");
    }

    #[tokio::test]
    async fn test_list_directory_annotates_entries() {
        let (_temp_dir, sandbox, root) = setup();
        fs::write(root.join("file.txt"), "x").unwrap();
        fs::create_dir(root.join("sub")).unwrap();

        let result = call(
            &sandbox,
            FileOperation::ListDirectory,
            json!({"path": root.to_str().unwrap()}),
        )
        .await
        .unwrap();

        let mut lines: Vec<&str> = result.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["[DIR] sub", "[FILE] file.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_directory_skips_escaping_symlinks() {
        let (_temp_dir, sandbox, root) = setup();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), root.join("link.txt"))
            .unwrap();
        fs::write(root.join("ok.txt"), "x").unwrap();

        let result = call(
            &sandbox,
            FileOperation::ListDirectory,
            json!({"path": root.to_str().unwrap()}),
        )
        .await
        .unwrap();
        assert_eq!(result, "[FILE] ok.txt");
    }

    #[tokio::test]
    async fn test_list_empty_directory() {
        let (_temp_dir, sandbox, root) = setup();
        let result = call(
            &sandbox,
            FileOperation::ListDirectory,
            json!({"path": root.to_str().unwrap()}),
        )
        .await
        .unwrap();
        assert_eq!(result, "Directory is empty or has no accessible entries");
    }

    #[test]
    fn test_search_is_case_insensitive_and_honors_excludes() {
        let (_temp_dir, sandbox, root) = setup();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/Main.rs"), "").unwrap();
        fs::write(root.join("src/nested/main_test.rs"), "").unwrap();
        fs::write(root.join("node_modules/pkg/main.js"), "").unwrap();

        let mut results =
            search_files(&sandbox, &root, "MAIN", &["node_modules".to_string()]).unwrap();
        results.sort();
        assert_eq!(
            results,
            vec![
                root.join("src/Main.rs").display().to_string(),
                root.join("src/nested/main_test.rs").display().to_string(),
            ]
        );

        let results = search_files(&sandbox, &root, "main", &["**/*.rs".to_string()]).unwrap();
        assert_eq!(
            results,
            vec![root.join("node_modules/pkg/main.js").display().to_string()]
        );
    }

    #[tokio::test]
    async fn test_search_without_matches() {
        let (_temp_dir, sandbox, root) = setup();
        let result = call(
            &sandbox,
            FileOperation::SearchFiles,
            json!({"path": root.to_str().unwrap(), "pattern": "nothing"}),
        )
        .await
        .unwrap();
        assert_eq!(result, "No matching files found");
    }

    #[tokio::test]
    async fn test_create_directory_is_idempotent_and_nested() {
        let (_temp_dir, sandbox, root) = setup();
        let path = root.join("a/b/c");
        let args = json!({"path": path.to_str().unwrap()});

        call(&sandbox, FileOperation::CreateDirectory, args.clone())
            .await
            .unwrap();
        call(&sandbox, FileOperation::CreateDirectory, args)
            .await
            .unwrap();
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_move_file() {
        let (_temp_dir, sandbox, root) = setup();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        let source = root.join("a.txt");

        let error = call(
            &sandbox,
            FileOperation::MoveFile,
            json!({"source": source.to_str().unwrap(), "destination": root.join("b.txt").to_str().unwrap()}),
        )
        .await
        .unwrap_err();
        assert!(matches!(error, AgentError::InvalidParameters(_)));

        call(
            &sandbox,
            FileOperation::MoveFile,
            json!({"source": source.to_str().unwrap(), "destination": root.join("c.txt").to_str().unwrap()}),
        )
        .await
        .unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(root.join("c.txt")).unwrap(), "a");
    }

    #[tokio::test]
    async fn test_get_file_info() {
        let (_temp_dir, sandbox, root) = setup();
        let path = root.join("info.txt");
        fs::write(&path, "12345").unwrap();

        let result = call(
            &sandbox,
            FileOperation::GetFileInfo,
            json!({"path": path.to_str().unwrap()}),
        )
        .await
        .unwrap();

        let keys: Vec<&str> = result
            .lines()
            .filter_map(|line| line.split_once(": ").map(|(key, _)| key))
            .collect();
        assert_eq!(
            keys,
            vec!["size", "created", "modified", "accessed", "isDirectory", "isFile", "permissions"]
        );
        assert!(result.contains("size: 5"));
        assert!(result.contains("isFile: true"));
        assert!(result.contains("isDirectory: false"));
    }

    #[test]
    fn test_directory_tree_structure() {
        let (_temp_dir, sandbox, root) = setup();
        fs::create_dir_all(root.join("src/deep")).unwrap();
        fs::write(root.join("src/deep/leaf.rs"), "").unwrap();
        fs::write(root.join("README.md"), "").unwrap();

        let mut tree = directory_tree(&sandbox, &root).unwrap();
        tree.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "README.md");
        assert_eq!(tree[0].kind, EntryKind::File);
        assert_eq!(tree[0].children, None);

        let src = &tree[1];
        assert_eq!(src.kind, EntryKind::Directory);
        let deep = &src.children.as_ref().unwrap()[0];
        assert_eq!(deep.name, "deep");
        assert_eq!(
            deep.children,
            Some(vec![TreeEntry {
                name: "leaf.rs".to_string(),
                kind: EntryKind::File,
                children: None,
            }])
        );
    }

    #[test]
    fn test_directory_tree_children_follow_listing_order() {
        let (_temp_dir, sandbox, root) = setup();
        for name in ["one", "two", "three"] {
            fs::create_dir(root.join(name)).unwrap();
            fs::write(root.join(name).join("f"), "").unwrap();
        }

        let listing: Vec<String> = fs::read_dir(&root)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        let tree = directory_tree(&sandbox, &root).unwrap();
        let names: Vec<String> = tree.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, listing);
    }

    #[tokio::test]
    async fn test_directory_tree_json() {
        let (_temp_dir, sandbox, root) = setup();
        fs::write(root.join("a.txt"), "").unwrap();

        let result = call(
            &sandbox,
            FileOperation::DirectoryTree,
            json!({"path": root.to_str().unwrap()}),
        )
        .await
        .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed, json!([{"name": "a.txt", "type": "file"}]));
    }
}

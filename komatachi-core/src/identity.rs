//! Identity files and system prompt assembly
//!
//! Six optional markdown files under the entity's home directory define who
//! the entity is, what it remembers, and how it should behave. They are
//! reloaded on every loop iteration so edits take effect on the next model
//! call without a restart.

use crate::types::ToolDef;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::Path;

/// The six identity slots. Absent files are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFiles {
    pub soul: Option<String>,
    pub identity: Option<String>,
    pub user: Option<String>,
    pub memory: Option<String>,
    pub agents: Option<String>,
    pub tools: Option<String>,
}

/// Read the identity files from `home_dir`.
///
/// A missing file is simply an empty slot; any other IO error propagates.
pub fn load_identity_files(home_dir: &Path) -> io::Result<IdentityFiles> {
    Ok(IdentityFiles {
        soul: read_optional(&home_dir.join("SOUL.md"))?,
        identity: read_optional(&home_dir.join("IDENTITY.md"))?,
        user: read_optional(&home_dir.join("USER.md"))?,
        memory: read_optional(&home_dir.join("MEMORY.md"))?,
        agents: read_optional(&home_dir.join("AGENTS.md"))?,
        tools: read_optional(&home_dir.join("TOOLS.md"))?,
    })
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Assemble the system prompt from identity files, tool summaries, and the
/// current time.
///
/// Section order reflects priority: who the entity is, what it can do, when
/// it is, what it remembers, how it should behave. Non-empty sections are
/// joined with a blank line; file contents are trimmed.
pub fn build_system_prompt(
    files: &IdentityFiles,
    tools: &[ToolDef],
    now: DateTime<Utc>,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(soul) = trimmed(&files.soul) {
        sections.push(soul.to_string());
    }
    if let Some(identity) = trimmed(&files.identity) {
        sections.push(identity.to_string());
    }
    if let Some(user) = trimmed(&files.user) {
        sections.push(format!("## About the User\n\n{user}"));
    }

    let tools_md = trimmed(&files.tools);
    if !tools.is_empty() || tools_md.is_some() {
        let mut section = String::from("## Available Tools");
        if !tools.is_empty() {
            section.push('\n');
            for tool in tools {
                section.push_str(&format!("\n- **{}**: {}", tool.name, tool.description));
            }
        }
        if let Some(extra) = tools_md {
            section.push_str("\n\n");
            section.push_str(extra);
        }
        sections.push(section);
    }

    sections.push(format!(
        "## Current Time\n\n{}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    if let Some(memory) = trimmed(&files.memory) {
        sections.push(format!("## Memory\n\n{memory}"));
    }
    if let Some(agents) = trimmed(&files.agents) {
        sections.push(format!("## Guidelines\n\n{agents}"));
    }

    sections.join("\n\n")
}

fn trimmed(slot: &Option<String>) -> Option<&str> {
    slot.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

//! Agents: the AI coding tools that consume installed skills.
//!
//! Each agent expects skills at a well-known directory relative to the
//! project root. The manifest's `agents` map may redefine a built-in
//! directory or register custom agents.

use std::collections::BTreeMap;

use crate::core::manifest::AgentConfig;

/// Special agent name that suppresses linking entirely.
pub const AGENT_NONE: &str = "none";

/// Built-in agents and their skills directories.
pub const BUILT_IN_AGENTS: &[(&str, &str)] = &[
    ("claude-code", ".claude/skills"),
    ("codex", ".codex/skills"),
    ("cursor", ".cursor/skills"),
    ("gemini", ".gemini/skills"),
    ("kiro", ".kiro/skills"),
    ("opencode", ".opencode/skills"),
];

/// Names of all built-in agents, in table order.
pub fn built_in_agent_names() -> Vec<String> {
    BUILT_IN_AGENTS.iter().map(|(n, _)| n.to_string()).collect()
}

/// Resolve an agent's skills directory from built-in defaults merged with
/// manifest overrides. Unknown names resolve to `None`; the caller warns
/// and skips them.
pub fn skills_dir(name: &str, overrides: &BTreeMap<String, AgentConfig>) -> Option<String> {
    if let Some(config) = overrides.get(name) {
        return Some(config.skills_dir.clone());
    }
    BUILT_IN_AGENTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, dir)| dir.to_string())
}

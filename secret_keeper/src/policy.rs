// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Policy Filter (C3)
//!
//! Syntactic, conservative command allow/deny engine consulted before every
//! `exec`. This is defense-in-depth behind the scrubber (C4), never a
//! substitute for it — see Design Note 9.

use regex::RegexSet;
use secret_keeper_domain::{PolicyDecision, PolicyFilter};
use std::sync::OnceLock;

/// First-token commands that are unconditionally blocked, regardless of
/// arguments.
const BLOCKED_COMMANDS: &[&str] = &[
    "env", "printenv", "export", "set", "xxd", "hexdump", "od", "base64", "history",
];

fn blocked_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            // Bare `echo $VAR` — the whole command dumps one variable,
            // as opposed to `echo hello $NAME`, which merely interpolates
            // one into a larger string (allowed; the scrubber catches it).
            r#"(?i)^\s*echo\s+"?\$[A-Za-z_][A-Za-z0-9_]*"?\s*$"#,
            r#"(?i)^\s*printf\s+"?\$[A-Za-z_][A-Za-z0-9_]*"?\s*$"#,
            r"(?i)\bcat\b.*/proc/\d+/environ",
            r"\$[A-Za-z_][A-Za-z0-9_]*\s*[|>]",
            r"(?i)>\s*/dev/tcp/",
            r"(?i)\bexport\b",
            r"(?i)\bprintenv\b",
            r"(?i)\bcompgen\s+-e\b",
            r"(?i)\bdeclare\s+-x\b",
        ])
        .expect("static pattern set is valid")
    })
}

fn first_token(command: &str) -> Option<&str> {
    command
        .split_whitespace()
        .next()
        .map(|tok| tok.rsplit('/').next().unwrap_or(tok))
}

/// The one shipped implementation of [`PolicyFilter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandPolicyFilter;

impl CommandPolicyFilter {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyFilter for CommandPolicyFilter {
    fn validate(&self, command: &str) -> PolicyDecision {
        if let Some(token) = first_token(command) {
            if BLOCKED_COMMANDS.contains(&token) {
                return PolicyDecision::Blocked(format!("Command '{token}' is blocked for security"));
            }
        }

        if blocked_patterns().is_match(command) {
            return PolicyDecision::Blocked("command matches a blocked pattern".to_string());
        }

        PolicyDecision::Allowed
    }
}

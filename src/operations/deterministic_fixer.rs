// src/operations/deterministic_fixer.rs
// DeterministicFixer (spec 4.6): pure, no-LLM fixer. Runs after every
// successful ImplementPhase when `postPhaseFixing=true` (spec 4.8). Handles
// mechanical fixes that don't need a model call; anything it can't resolve
// it reports as an unfixable issue instead of guessing.

use std::collections::HashSet;

use tracing::info;

use crate::sandbox::TypecheckIssue;

use super::types::DeterministicFixResult;

/// `node_modules` package names never get treated as local-path fixes even
/// when they look like a relative import (no leading `./`/`../`).
fn is_bare_specifier(spec: &str) -> bool {
    !spec.starts_with('.') && !spec.starts_with('/')
}

/// Extracts the npm package name a bare import specifier resolves to, e.g.
/// `@scope/pkg/sub/path` -> `@scope/pkg`, `lodash/debounce` -> `lodash`.
fn package_name(spec: &str) -> String {
    let mut parts = spec.splitn(3, '/');
    match parts.next() {
        Some(scope) if scope.starts_with('@') => {
            let name = parts.next().unwrap_or("");
            format!("{scope}/{name}")
        }
        Some(first) => first.to_string(),
        None => spec.to_string(),
    }
}

fn missing_module_name(message: &str) -> Option<String> {
    let marker = "Cannot find module '";
    let start = message.find(marker)? + marker.len();
    let rest = &message[start..];
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

/// Runs purely over the typecheck diagnostics already collected by
/// `SandboxClient::run_static_analysis`; never calls a model.
pub fn deterministic_fixer(
    _all_files: &std::collections::HashMap<String, String>,
    type_issues: &[TypecheckIssue],
) -> DeterministicFixResult {
    info!(issue_count = type_issues.len(), "running deterministic fixer");

    let mut install_packages: HashSet<String> = HashSet::new();
    let mut unfixable = Vec::new();

    for issue in type_issues {
        match issue.code.as_deref() {
            Some("TS2307") => match missing_module_name(&issue.message) {
                Some(spec) if is_bare_specifier(&spec) => {
                    install_packages.insert(package_name(&spec));
                }
                _ => unfixable.push(format!("{}:{}: {}", issue.file, issue.line, issue.message)),
            },
            _ => unfixable.push(format!("{}:{}: {}", issue.file, issue.line, issue.message)),
        }
    }

    let mut install_commands: Vec<String> = install_packages
        .into_iter()
        .map(|pkg| format!("bun install {pkg}"))
        .collect();
    install_commands.sort();

    DeterministicFixResult {
        modified_files: Vec::new(),
        unfixable_issues: unfixable,
        install_commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(file: &str, line: u32, message: &str, code: &str) -> TypecheckIssue {
        TypecheckIssue {
            file: file.to_string(),
            line,
            message: message.to_string(),
            code: Some(code.to_string()),
        }
    }

    #[test]
    fn surfaces_missing_module_as_install_command() {
        let issues = vec![issue(
            "src/app.tsx",
            3,
            "Cannot find module 'zod' or its corresponding type declarations.",
            "TS2307",
        )];
        let result = deterministic_fixer(&Default::default(), &issues);
        assert_eq!(result.install_commands, vec!["bun install zod".to_string()]);
        assert!(result.unfixable_issues.is_empty());
    }

    #[test]
    fn scoped_package_collapses_to_package_root() {
        let issues = vec![issue(
            "src/app.tsx",
            3,
            "Cannot find module '@radix-ui/react-dialog/primitive' or its corresponding type declarations.",
            "TS2307",
        )];
        let result = deterministic_fixer(&Default::default(), &issues);
        assert_eq!(result.install_commands, vec!["bun install @radix-ui/react-dialog".to_string()]);
    }

    #[test]
    fn relative_import_is_unfixable_not_an_install() {
        let issues = vec![issue(
            "src/app.tsx",
            3,
            "Cannot find module './missing-file' or its corresponding type declarations.",
            "TS2307",
        )];
        let result = deterministic_fixer(&Default::default(), &issues);
        assert!(result.install_commands.is_empty());
        assert_eq!(result.unfixable_issues.len(), 1);
    }

    #[test]
    fn non_ts2307_issue_is_unfixable() {
        let issues = vec![issue("src/app.tsx", 10, "Type 'string' is not assignable to type 'number'.", "TS2322")];
        let result = deterministic_fixer(&Default::default(), &issues);
        assert!(result.install_commands.is_empty());
        assert_eq!(result.unfixable_issues.len(), 1);
    }
}

//! Safety Analyzer: a static allowlist/denylist scanner over submitted
//! contract source and per-invocation input statements (spec §4.4).
//!
//! The scanner works over raw source text rather than a parsed AST of the
//! embedded DSL (spec §6) so that it also catches the literal denylisted
//! host-language constructs spec §8's boundary tests name directly
//! (`File.ReadAllText`, `Process.Start`, `Assembly.LoadFrom`, `unsafe { }`)
//! regardless of whether the surrounding source is otherwise valid DSL.

use once_cell::sync::Lazy;
use regex::Regex;

/// `using X.Y.Z;` namespace roots the analyzer accepts (spec §4.4: "system
/// numerics, collection generics, text, JSON text, compression,
/// LINQ-equivalent sequence operators, threading/tasks, diagnostics, HTTP
/// client, XML").
const ALLOWED_NAMESPACE_ROOTS: &[&str] = &[
    "System",
    "System.Collections.Generic",
    "System.Text",
    "System.Text.Json",
    "System.IO.Compression",
    "System.Linq",
    "System.Threading",
    "System.Threading.Tasks",
    "System.Diagnostics",
    "System.Net.Http",
    "System.Xml",
];

/// Contract DSL capability bundles a `use` statement may request (spec §9's
/// composition-over-inheritance design note, SPEC_FULL §6).
const ALLOWED_CAPABILITIES: &[&str] =
    &["token", "mintable", "burnable", "pausable", "freezable", "oracle"];

const DENY_TYPES: &[&str] = &[
    "File",
    "Directory",
    "Process",
    "Socket",
    "Thread",
    "Assembly",
    "Registry",
    "Stream",
    "Reflection",
    "Marshal",
];

const DENY_METHODS: &[&str] = &[
    "Start",
    "Invoke",
    "Load",
    "Delete",
    "Move",
    "Copy",
    "ReadAllBytes",
    "WriteAllBytes",
    "GetType",
    "CreateDomain",
    "Execute",
    "WriteAllText",
    "ReadAllText",
    "Encrypt",
    "Decrypt",
    "OpenSubKey",
    "CreateSubKey",
    "Bind",
    "Connect",
    "Listen",
    "Send",
    "Receive",
    "LoadFrom",
    "LoadFile",
    "LoadLibrary",
];

const DENY_KEYWORDS: &[&str] =
    &["unsafe", "extern", "dynamic", "goto", "volatile", "fixed", "stackalloc"];

static USING_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*using\s+([\w.]+)\s*;").unwrap());
static USE_CAPABILITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*use\s+([A-Za-z_][\w]*)\s*;").unwrap());
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());
static EXTERN_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*DllImport|\[\s*extern").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsafeCode {
    /// Human-readable reason naming the first offending construct (spec
    /// §4.4: "Each rejection returns a human-readable reason naming the
    /// first offending construct").
    pub reason: String,
}

impl std::fmt::Display for UnsafeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnsafeCode: {}", self.reason)
    }
}

impl std::error::Error for UnsafeCode {}

/// Scans `source` and rejects it on the first offending construct found, in
/// the order: namespace allowlist, denylisted keywords/attributes,
/// denylisted type.method access (spec §4.4).
pub fn check_source(source: &str) -> Result<(), UnsafeCode> {
    check_using_directives(source)?;
    check_use_capabilities(source)?;
    check_denied_keywords(source)?;
    check_extern_attributes(source)?;
    check_denied_member_access(source)?;
    Ok(())
}

/// Re-runs the same scan over a single invocation input statement (spec
/// §4.4: "This check runs before compilation and before each execution over
/// the inputs").
pub fn check_input(statement: &str) -> Result<(), UnsafeCode> {
    check_source(statement)
}

fn check_using_directives(source: &str) -> Result<(), UnsafeCode> {
    for cap in USING_DIRECTIVE.captures_iter(source) {
        let ns = &cap[1];
        // The bare "System" root only matches itself: it must not let a
        // dot-extension of it (e.g. "System.Reflection.Emit") ride in on
        // the prefix check meant for the more specific multi-component
        // roots below it.
        let allowed = ALLOWED_NAMESPACE_ROOTS.iter().any(|root| {
            if *root == "System" {
                ns == *root
            } else {
                ns == *root || ns.starts_with(&format!("{root}."))
            }
        });
        if !allowed {
            return Err(UnsafeCode {
                reason: format!("using directive '{ns}' is not in the namespace allowlist"),
            });
        }
    }
    Ok(())
}

fn check_use_capabilities(source: &str) -> Result<(), UnsafeCode> {
    for cap in USE_CAPABILITY.captures_iter(source) {
        let name = &cap[1];
        if !ALLOWED_CAPABILITIES.contains(&name) {
            return Err(UnsafeCode {
                reason: format!("use capability '{name}' is not in the capability allowlist"),
            });
        }
    }
    Ok(())
}

fn check_denied_keywords(source: &str) -> Result<(), UnsafeCode> {
    for &word in DENY_KEYWORDS {
        if IDENTIFIER
            .find_iter(source)
            .any(|m| m.as_str() == word)
        {
            return Err(UnsafeCode { reason: format!("forbidden keyword '{word}'") });
        }
    }
    Ok(())
}

fn check_extern_attributes(source: &str) -> Result<(), UnsafeCode> {
    if EXTERN_ATTRIBUTE.is_match(source) {
        return Err(UnsafeCode {
            reason: "forbidden platform-invoke/extern attribute".to_string(),
        });
    }
    Ok(())
}

static MEMBER_ACCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\.\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap());

fn check_denied_member_access(source: &str) -> Result<(), UnsafeCode> {
    for cap in MEMBER_ACCESS.captures_iter(source) {
        let ty = &cap[1];
        let method = &cap[2];
        if DENY_TYPES.contains(&ty) && DENY_METHODS.contains(&method) {
            return Err(UnsafeCode { reason: format!("forbidden call '{ty}.{method}'") });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowlisted_using_directives() {
        assert!(check_source("using System.Collections.Generic;\nvar x = 1;").is_ok());
    }

    #[test]
    fn rejects_non_allowlisted_using_directive() {
        let err = check_source("using System.Reflection.Emit;\n").unwrap_err();
        assert!(err.reason.contains("namespace allowlist"));
    }

    #[test]
    fn rejects_file_read_all_text() {
        let err = check_source("var data = File.ReadAllText(\"secret.txt\");").unwrap_err();
        assert!(err.reason.contains("File.ReadAllText"));
    }

    #[test]
    fn rejects_process_start() {
        let err = check_source("Process.Start(\"bad\");").unwrap_err();
        assert!(err.reason.contains("Process.Start"));
    }

    #[test]
    fn rejects_assembly_load_from() {
        let err = check_source("Assembly.LoadFrom(\"evil.dll\");").unwrap_err();
        assert!(err.reason.contains("Assembly.LoadFrom"));
    }

    #[test]
    fn rejects_unsafe_block() {
        let err = check_source("unsafe { var p = &x; }").unwrap_err();
        assert!(err.reason.contains("unsafe"));
    }

    #[test]
    fn rejects_goto() {
        let err = check_source("goto done;").unwrap_err();
        assert!(err.reason.contains("goto"));
    }

    #[test]
    fn rejects_unknown_capability() {
        let err = check_source("use filesystem;").unwrap_err();
        assert!(err.reason.contains("capability allowlist"));
    }

    #[test]
    fn accepts_known_capability() {
        assert!(check_source("use token;\nuse mintable;").is_ok());
    }

    #[test]
    fn input_statements_are_checked_with_the_same_rules() {
        assert!(check_input("transfer(a, b, 10)").is_ok());
        assert!(check_input("File.Delete(\"x\")").is_err());
    }
}

//! Three-layer code wrapping and the RPC shim (§4.4).
//!
//! Layer 1 binds the caller-supplied context as literal `const`
//! declarations, layer 2 is the user's code (normalized by the REPL
//! heuristic), layer 3 is the async result envelope plus the `mcp`
//! dynamic-dispatch surface that proxies tool calls over stdio to the
//! bridge (§4.4's out-of-sandbox bridge process).
//!
//! This is a pure, deterministic function of its inputs — same context
//! and code always produce the same wrapped source (§9 design notes,
//! "keep the composite generator / string assembly as a pure function";
//! the same discipline applies here).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{SandboxError, SandboxResult};

static CONTEXT_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern is valid"));

/// Keywords whose presence disqualifies the REPL heuristic's implicit
/// `return` wrapping (§4.4 REPL heuristic).
const CONTROL_KEYWORDS: &[&str] = &[
    "const", "let", "var", "function", "class", "if", "for", "while", "do", "switch", "try",
    "return", "throw", "break", "continue",
];

/// The stdout line prefix marking the final result envelope.
pub const RESULT_MARKER: &str = "<MARKER>";

/// Whether `code` should be wrapped as `return (<code>);` under the REPL
/// heuristic: true when none of [`CONTROL_KEYWORDS`] appear as whole
/// words anywhere in the source.
#[must_use]
pub fn is_pure_expression(code: &str) -> bool {
    CONTROL_KEYWORDS.iter().all(|kw| !contains_word(code, kw))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let bytes = haystack.as_bytes();
    let word_bytes = word.as_bytes();
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(word) {
        let absolute = start + pos;
        let before_ok = absolute == 0 || !is_ident(bytes[absolute - 1]);
        let after = absolute + word_bytes.len();
        let after_ok = after >= bytes.len() || !is_ident(bytes[after]);
        if before_ok && after_ok {
            return true;
        }
        start = absolute + 1;
        if start >= haystack.len() {
            break;
        }
    }
    false
}

/// Render one context binding as a `const` literal declaration.
///
/// # Errors
///
/// Returns [`SandboxError::InvalidContext`] if `name` does not match
/// `[A-Za-z_][A-Za-z0-9_]*`.
fn render_binding(name: &str, value: &Value) -> SandboxResult<String> {
    if !CONTEXT_NAME_PATTERN.is_match(name) {
        return Err(SandboxError::InvalidContext(name.to_string()));
    }
    let literal = serde_json::to_string(value)
        .map_err(|e| SandboxError::InvalidContext(format!("{name}: {e}")))?;
    Ok(format!("const {name} = {literal};"))
}

/// The RPC shim injected ahead of user code: a newline-delimited JSON
/// request/response bridge over stdin/stdout, and the `mcp[server][tool]`
/// dynamic dispatch surface built on top of it (§4.4).
const RPC_SHIM: &str = r"
const __pml_readline = require('node:readline');
const __pml_rl = __pml_readline.createInterface({ input: process.stdin, terminal: false });
const __pml_pending = new Map();
let __pml_next_id = 0;
__pml_rl.on('line', (line) => {
  let msg;
  try { msg = JSON.parse(line); } catch (e) { return; }
  if (msg.type === 'rpc_result' && __pml_pending.has(msg.id)) {
    const entry = __pml_pending.get(msg.id);
    __pml_pending.delete(msg.id);
    if (msg.success) entry.resolve(msg.result);
    else {
      const e = new Error((msg.error && msg.error.message) || 'rpc error');
      if (msg.error && msg.error.pml_pause) e.pml_pause = msg.error.pml_pause;
      entry.reject(e);
    }
  }
});
function __pml_rpc_call(server, tool, args) {
  return new Promise((resolve, reject) => {
    const id = 'rpc-' + (__pml_next_id++);
    __pml_pending.set(id, { resolve, reject });
    process.stdout.write(JSON.stringify({ type: 'rpc_call', id, server, tool, args }) + '\n');
  });
}
const mcp = new Proxy({}, {
  get(_target, server) {
    return new Proxy({}, {
      get(_t, tool) {
        return (args) => __pml_rpc_call(String(server), String(tool), args);
      },
    });
  },
});
";

/// Concatenate the three layers into the final source written to the
/// temp file (§4.4 Code wrapping).
///
/// # Errors
///
/// Returns [`SandboxError::InvalidContext`] if any context binding name
/// is invalid.
pub fn wrap_code(context: &HashMap<String, Value>, code: &str) -> SandboxResult<String> {
    let mut bindings = Vec::with_capacity(context.len());
    for (name, value) in context {
        bindings.push(render_binding(name, value)?);
    }
    bindings.sort();

    let body = if is_pure_expression(code) {
        format!("return ({code});")
    } else {
        code.to_string()
    };

    Ok(format!(
        "{RPC_SHIM}\n{bindings}\n\n(async () => {{\n  try {{\n    const __pml_result = await (async () => {{\n{body}\n    }})();\n    const __pml_normalized = __pml_result === undefined ? null : __pml_result;\n    process.stdout.write({RESULT_MARKER:?} + JSON.stringify({{ success: true, result: __pml_normalized }}) + '\\n');\n  }} catch (err) {{\n    const __pml_type = (err && err.constructor && err.constructor.name) || 'Error';\n    const __pml_message = String((err && err.message) || err);\n    const __pml_stack = (err && err.stack) || '';\n    const __pml_error = {{ type: __pml_type, message: __pml_message, stack: __pml_stack }};\n    if (err && err.pml_pause) __pml_error.pml_pause = err.pml_pause;\n    process.stdout.write({RESULT_MARKER:?} + JSON.stringify({{ success: false, error: __pml_error }}) + '\\n');\n  }}\n  process.exit(0);\n}})();\n",
        bindings = bindings.join("\n"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_expression_has_no_control_keywords() {
        assert!(is_pure_expression("1 + 2"));
        assert!(is_pure_expression("mcp.fs.read({path: '/tmp/x'})"));
        assert!(!is_pure_expression("let x = 1; x + 1"));
        assert!(!is_pure_expression("return 1;"));
    }

    #[test]
    fn word_boundary_matching_does_not_false_positive() {
        // "forEach" contains "for" as a substring but not as a whole word.
        assert!(is_pure_expression("items.forEach(i => i)"));
        // "class" as a substring of "classification" should not match.
        assert!(is_pure_expression("classification.length"));
    }

    #[test]
    fn rejects_invalid_context_names() {
        let mut ctx = HashMap::new();
        ctx.insert("1bad".to_string(), Value::Null);
        let result = wrap_code(&ctx, "null");
        assert!(matches!(result, Err(SandboxError::InvalidContext(_))));
    }

    #[test]
    fn pure_expression_is_wrapped_in_return() {
        let wrapped = wrap_code(&HashMap::new(), "1 + 1").unwrap();
        assert!(wrapped.contains("return (1 + 1);"));
    }

    #[test]
    fn explicit_code_is_passed_through_unwrapped() {
        let wrapped = wrap_code(&HashMap::new(), "return 42;").unwrap();
        assert!(wrapped.contains("return 42;"));
        assert!(!wrapped.contains("return (return 42;);"));
    }
}

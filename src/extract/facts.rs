//! Heuristic [`NodeFacts`] derived from a symbol's source text.
use std::sync::LazyLock;

use regex::Regex;

use super::{RawCall, RawSymbol};
use crate::model::{CallFact, HandlerFact, NodeFacts, RoleHints};

static ASYNC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:async|suspend)\b").unwrap());

static CONDITIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|else|elif|switch|case|match|when|unless)\b|\s\?\s").unwrap()
});

static EMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.(?:emit|dispatch|publish|trigger|dispatchEvent)\(\s*['"]([\w:.\-]+)['"]"#)
        .unwrap()
});

static HANDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\.(?:on|once|addEventListener|addListener|subscribe)\(\s*['"]([\w:.\-]+)['"]\s*(?:,\s*(?:this\.|self\.)?([A-Za-z_]\w*))?"#,
    )
    .unwrap()
});

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:this|self)\.([A-Za-z_]\w*)(\.(?:push|append|add|set|insert|remove|delete|clear|pop|splice|extend|update)\(|\s*(?:\+\+|--|[-+*/]?=(?:[^=>]|$))|\s*\(|)",
    )
    .unwrap()
});

const SOURCE_PREFIXES: &[&str] = &[
    "get", "fetch", "load", "read", "query", "find", "list", "select", "request", "receive",
    "recv", "search", "lookup", "pull", "download", "scan", "input",
];

const SINK_PREFIXES: &[&str] = &[
    "save", "write", "send", "emit", "publish", "render", "print", "log", "post", "put",
    "persist", "upload", "notify", "dispatch", "display", "output", "insert", "delete",
    "remove", "update",
];

const TRANSFORMER_PREFIXES: &[&str] = &[
    "to", "map", "convert", "transform", "format", "parse", "normalize", "serialize",
    "deserialize", "calculate", "compute", "filter", "reduce", "sort", "validate", "encode",
    "decode",
];

const STORE_SUFFIXES: &[&str] = &[
    "store", "repository", "repo", "cache", "state", "db", "database",
];

const SOURCE_CALLS: &[&str] = &["fetch", "axios", "readFile", "readFileSync", "request", "query"];

const RECEIVERS: &[&str] = &["self", "&self", "&mut self", "mut self", "this", "cls"];

/// A call made inside a symbol, with the text of the line it sits on.
pub struct CallSite<'a> {
    pub call: &'a RawCall,
    pub line_text: &'a str,
}

/// Derives facts for `symbol`. `header` is the full source line the symbol
/// starts on, which carries modifiers such as `export` that the symbol's own
/// text may not include.
pub fn derive_facts(
    symbol: &RawSymbol,
    header: &str,
    calls: &[CallSite<'_>],
    language: &str,
) -> NodeFacts {
    let callable = symbol.kind.is_callable();
    let mut facts = NodeFacts {
        is_async: ASYNC.is_match(header) || ASYNC.is_match(&symbol.signature),
        is_exported: is_exported(&symbol.name, header, &symbol.signature, language),
        has_conditional: callable && CONDITIONAL.is_match(&symbol.text),
        ..NodeFacts::default()
    };

    if callable {
        facts.parameters = parameters(&symbol.signature, language);
        facts.calls = calls
            .iter()
            .filter_map(|site| call_fact(&site.call.name, site.call.line, site.line_text))
            .collect();
        for caps in EMIT.captures_iter(&symbol.text) {
            push_unique(&mut facts.emits, &caps[1]);
        }
        for caps in HANDLE.captures_iter(&symbol.text) {
            let handler = caps
                .get(2)
                .map(|m| m.as_str())
                .filter(|h| !matches!(*h, "async" | "function"))
                .map(str::to_string);
            let fact = HandlerFact {
                event: caps[1].to_string(),
                handler,
            };
            if !facts.handles.contains(&fact) {
                facts.handles.push(fact);
            }
        }
        for caps in FIELD.captures_iter(&symbol.text) {
            let field = &caps[1];
            let tail = caps.get(2).map_or("", |m| m.as_str()).trim_start();
            if tail.starts_with('(') {
                continue;
            }
            if tail.is_empty() {
                push_unique(&mut facts.reads_fields, field);
            } else {
                push_unique(&mut facts.writes_fields, field);
            }
        }
    }

    facts.roles = role_hints(symbol, &facts);
    facts
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn is_exported(name: &str, header: &str, signature: &str, language: &str) -> bool {
    match language {
        "typescript" | "javascript" => header.trim_start().starts_with("export"),
        "rust" => signature.trim_start().starts_with("pub"),
        "go" => name.chars().next().is_some_and(char::is_uppercase),
        "python" | "ruby" => !name.starts_with('_'),
        "java" | "csharp" => header.contains("public"),
        "c" => !header.contains("static"),
        _ => !header.contains("private"),
    }
}

/// Parameter names from a signature's first parenthesised list.
pub(crate) fn parameters(signature: &str, language: &str) -> Vec<String> {
    // Skip a go method's receiver list.
    let from = if language == "go" && signature.trim_start().starts_with("func (") {
        signature.find(')').map_or(0, |i| i + 1)
    } else {
        0
    };
    let Some(open) = signature[from..].find('(').map(|i| i + from) else {
        return Vec::new();
    };
    let inner = &signature[open + 1..];
    let mut depth = 0i32;
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev = ' ';
    for c in inner.chars() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            '>' if prev == '-' || prev == '=' => {}
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                prev = c;
                continue;
            }
            _ => {}
        }
        current.push(c);
        prev = c;
    }
    parts.push(current);

    parts
        .iter()
        .filter_map(|part| parameter_name(part, language))
        .collect()
}

fn parameter_name(part: &str, language: &str) -> Option<String> {
    let part = part.trim();
    if part.is_empty() || RECEIVERS.contains(&part) {
        return None;
    }
    let head = part
        .split(['=', ':'])
        .next()
        .unwrap_or(part)
        .trim();
    let tokens: Vec<&str> = head.split_whitespace().collect();
    // `name Type` in go, `Type name` / `mut name: T` elsewhere.
    let token = if let Some(dollar) = tokens.iter().find(|t| t.starts_with('$')) {
        *dollar
    } else if language == "go" {
        tokens.first().copied()?
    } else {
        tokens.last().copied()?
    };
    let name: String = token
        .trim_start_matches(['.', '&', '*', '$'])
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() || RECEIVERS.contains(&name.as_str()) {
        None
    } else {
        Some(name)
    }
}

/// Call-site flags read from the line holding the call.
fn call_fact(name: &str, line: usize, text: &str) -> Option<CallFact> {
    let pos = find_call(text, name)?;
    let before = &text[..pos];
    let after = text[pos + name.len()..].trim_start();
    let args = after.strip_prefix('(').map_or("", str::trim_start);
    Some(CallFact {
        name: name.to_string(),
        line,
        has_args: !args.starts_with(')'),
        awaited: ASYNC_AWAIT.is_match(before) || after.contains(".await"),
        assigned: has_assignment(before),
        returned: before.trim_start().starts_with("return"),
        conditional: CONDITIONAL.is_match(text) || text.contains("&&") || text.contains("||"),
    })
}

static ASYNC_AWAIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bawait\b").unwrap());

/// Byte offset of `name(` in `text`, matching whole identifiers only.
fn find_call(text: &str, name: &str) -> Option<usize> {
    text.match_indices(name).map(|(i, _)| i).find(|&i| {
        let prev_ok = text[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        let next_ok = text[i + name.len()..].trim_start().starts_with('(');
        prev_ok && next_ok
    })
}

/// True when `before` ends in an assignment (`x = `, `let x = `, `x := `).
fn has_assignment(before: &str) -> bool {
    let bytes = before.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        if b != b'=' {
            return false;
        }
        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        let next = bytes.get(i + 1).copied().unwrap_or(b' ');
        !matches!(prev, b'=' | b'!' | b'<' | b'>') && !matches!(next, b'=' | b'>')
    })
}

fn starts_with_word(name: &str, prefixes: &[&str]) -> bool {
    let lower = name.to_lowercase();
    prefixes.iter().any(|p| {
        lower.starts_with(p)
            && name
                .get(p.len()..)
                .is_some_and(|rest| rest.chars().next().is_none_or(|c| c.is_uppercase() || c == '_'))
    })
}

fn role_hints(symbol: &RawSymbol, facts: &NodeFacts) -> RoleHints {
    let lower = symbol.name.to_lowercase();
    let store = (symbol.kind.is_type_like() || !symbol.kind.is_callable())
        && STORE_SUFFIXES.iter().any(|s| lower.ends_with(s));
    if !symbol.kind.is_callable() {
        return RoleHints {
            store,
            ..RoleHints::default()
        };
    }

    let data_source = starts_with_word(&symbol.name, SOURCE_PREFIXES)
        || facts.calls.iter().any(|c| SOURCE_CALLS.contains(&c.name.as_str()));
    let data_sink =
        starts_with_word(&symbol.name, SINK_PREFIXES) || !facts.emits.is_empty();
    let returns_value = symbol.text.contains("return") || symbol.signature.contains("->");
    let transformer = starts_with_word(&symbol.name, TRANSFORMER_PREFIXES)
        || (!facts.parameters.is_empty() && returns_value);
    RoleHints {
        data_source,
        data_sink,
        store: false,
        transformer,
    }
}

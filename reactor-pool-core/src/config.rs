//! The `thread_pool <name> threads=<N> [max_queue=<M>];` directive
//! grammar.
//!
//! Full configuration-file parsing (locating this directive inside a
//! larger config language, include files, variable expansion) is an
//! out-of-scope external collaborator. This module is deliberately small:
//! it only recognizes the one directive named explicitly, giving a caller
//! something runnable to point at the default-fill and
//! missing-pool-diagnostic behaviors without hand-building [`PoolConfig`]
//! values.

use crate::error::ConfigError;
use crate::registry::ConfigRegistry;

/// One parsed `thread_pool` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDirective {
    pub name: String,
    pub threads: u32,
    pub max_queue: Option<u32>,
}

/// Parses a single directive line (with or without the trailing `;`).
/// Whitespace-separated, `threads=`/`max_queue=` may appear in either
/// order after the name.
pub fn parse_directive(line: &str, file: &str, line_no: u32) -> Result<ParsedDirective, ConfigError> {
    let trimmed = line.trim().trim_end_matches(';').trim();
    let mut tokens = trimmed.split_whitespace();

    match tokens.next() {
        Some("thread_pool") => {}
        _ => {
            return Err(ConfigError::InvalidInteger {
                name: format!("{}:{}", file, line_no),
                field: "directive",
                value: trimmed.to_owned(),
            })
        }
    }

    let name = tokens
        .next()
        .ok_or_else(|| ConfigError::MissingThreads {
            name: format!("{}:{}", file, line_no),
        })?
        .to_owned();

    let mut threads: Option<u32> = None;
    let mut max_queue: Option<u32> = None;

    for token in tokens {
        if let Some(value) = token.strip_prefix("threads=") {
            threads = Some(parse_nonzero_uint(&name, "threads", value)?);
        } else if let Some(value) = token.strip_prefix("max_queue=") {
            max_queue = Some(parse_uint(&name, "max_queue", value)?);
        }
    }

    let threads = threads.ok_or_else(|| ConfigError::MissingThreads { name: name.clone() })?;

    Ok(ParsedDirective {
        name,
        threads,
        max_queue,
    })
}

fn parse_uint(name: &str, field: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidInteger {
        name: name.to_owned(),
        field,
        value: value.to_owned(),
    })
}

fn parse_nonzero_uint(name: &str, field: &'static str, value: &str) -> Result<u32, ConfigError> {
    let parsed = parse_uint(name, field, value)?;
    if parsed == 0 {
        return Err(ConfigError::InvalidInteger {
            name: name.to_owned(),
            field,
            value: value.to_owned(),
        });
    }
    Ok(parsed)
}

/// Parses a whole config text (one directive per non-blank,
/// non-`#`-comment line) and binds every declaration into a fresh
/// [`ConfigRegistry`].
pub fn parse_config(text: &str, file: &str) -> Result<ConfigRegistry, ConfigError> {
    let mut registry = ConfigRegistry::new();

    for (offset, raw_line) in text.lines().enumerate() {
        let line_no = (offset + 1) as u32;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let directive = parse_directive(line, file, line_no)?;
        registry.declare(
            &directive.name,
            directive.threads,
            directive.max_queue,
            (file.to_owned(), line_no),
        )?;
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_directive() {
        let d = parse_directive("thread_pool io threads=4;", "pool.conf", 10).unwrap();
        assert_eq!(d.name, "io");
        assert_eq!(d.threads, 4);
        assert_eq!(d.max_queue, None);
    }

    #[test]
    fn parses_max_queue_in_either_order() {
        let a = parse_directive("thread_pool io max_queue=8 threads=4;", "x", 1).unwrap();
        let b = parse_directive("thread_pool io threads=4 max_queue=8;", "x", 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.max_queue, Some(8));
    }

    #[test]
    fn rejects_zero_threads() {
        assert!(parse_directive("thread_pool io threads=0;", "x", 1).is_err());
    }

    #[test]
    fn rejects_missing_threads() {
        assert!(parse_directive("thread_pool io;", "x", 1).is_err());
    }

    #[test]
    fn parse_config_default_fills_unreferenced_default() {
        let registry = parse_config("", "pool.conf").unwrap();
        let pools = registry.finalize().unwrap();
        assert!(pools.is_empty());
    }

    // No `thread_pool` directive at all, but code references pool
    // "default" -> it initializes with threads=32, max_queue=65536.
    #[test]
    fn referenced_but_undeclared_default_pool_is_auto_filled() {
        let mut registry = parse_config("", "pool.conf").unwrap();
        registry.pool_add(None, ("pool.conf".to_owned(), 3));

        let pools = registry.finalize().unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].name, "default");
        assert_eq!(pools[0].threads, Some(32));
        assert_eq!(pools[0].max_queue, 65536);
    }

    // Code references pool "img" without a matching `thread_pool`
    // directive -> finalize fails, naming "img" and the referencing
    // source location.
    #[test]
    fn referenced_but_undeclared_non_default_pool_fails_finalize() {
        let mut registry = parse_config("", "app.conf").unwrap();
        registry.pool_add(Some("img"), ("app.conf".to_owned(), 42));

        let err = registry.finalize().unwrap_err();
        match err {
            ConfigError::UnresolvedPool { name, file, line } => {
                assert_eq!(name, "img");
                assert_eq!(file, "app.conf");
                assert_eq!(line, 42);
            }
            other => panic!("expected UnresolvedPool, got {:?}", other),
        }
    }
}

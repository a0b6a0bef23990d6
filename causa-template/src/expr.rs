//! A minimal parser for the `${ expr }` interpolation syntax used inside
//! template objects.
//!
//! This grammar never needs a general-purpose expression engine: every
//! fetcher invocation is an identifier call with string-literal
//! arguments, e.g. `${ configuration('a.b') }` or `${ secret('s1') }`.
//! Literal text around `${ ... }` segments is concatenated with the
//! stringified call result, matching classic template interpolation.

/// One piece of a parsed template: either literal text to copy verbatim,
/// or a fetcher call to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, copied unchanged into the rendered output.
    Literal(String),
    /// A call `name(arg1, arg2, ...)` with string-literal arguments.
    Call { name: String, args: Vec<String> },
}

/// Parses a template format string into an ordered list of segments.
pub fn parse(format: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let bytes = format.as_bytes();
    let mut i = 0;
    let mut literal_start = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if i > literal_start {
                segments.push(Segment::Literal(format[literal_start..i].to_string()));
            }
            let expr_start = i + 2;
            let expr_end = format[expr_start..]
                .find('}')
                .map(|offset| expr_start + offset)
                .ok_or_else(|| format!("unterminated '${{' starting at byte {i}"))?;
            let expr = format[expr_start..expr_end].trim();
            segments.push(parse_call(expr)?);
            i = expr_end + 1;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    if literal_start < bytes.len() {
        segments.push(Segment::Literal(format[literal_start..].to_string()));
    }
    Ok(segments)
}

fn parse_call(expr: &str) -> Result<Segment, String> {
    let open = expr
        .find('(')
        .ok_or_else(|| format!("expected a call expression, got '{expr}'"))?;
    if !expr.ends_with(')') {
        return Err(format!("expected a call expression, got '{expr}'"));
    }
    let name = expr[..open].trim().to_string();
    let starts_valid = name
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_valid {
        return Err(format!("invalid fetcher name '{name}'"));
    }
    let args_src = &expr[open + 1..expr.len() - 1];
    let args = parse_args(args_src)?;
    Ok(Segment::Call { name, args })
}

fn parse_args(src: &str) -> Result<Vec<String>, String> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut args = Vec::new();
    for raw in split_top_level_commas(trimmed) {
        args.push(parse_string_literal(raw.trim())?);
    }
    Ok(args)
}

fn split_top_level_commas(src: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quote: Option<char> = None;
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    for idx in 0..chars.len() {
        let (pos, ch) = chars[idx];
        match in_quote {
            Some(q) if ch == q && (idx == 0 || chars[idx - 1].1 != '\\') => in_quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => in_quote = Some(ch),
            None if ch == ',' => {
                parts.push(&src[start..pos]);
                start = pos + ch.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&src[start..]);
    parts
}

fn parse_string_literal(arg: &str) -> Result<String, String> {
    let bytes = arg.as_bytes();
    if bytes.len() < 2 {
        return Err(format!("expected a string literal argument, got '{arg}'"));
    }
    let quote = bytes[0];
    if (quote != b'\'' && quote != b'"') || bytes[bytes.len() - 1] != quote {
        return Err(format!("expected a quoted string argument, got '{arg}'"));
    }
    let inner = &arg[1..arg.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => return Err("dangling escape in string literal".to_string()),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_plus_single_call() {
        let segs = parse("value: ${ configuration('a') }!").unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Literal("value: ".to_string()),
                Segment::Call {
                    name: "configuration".to_string(),
                    args: vec!["a".to_string()],
                },
                Segment::Literal("!".to_string()),
            ]
        );
    }

    #[test]
    fn parses_multiple_args() {
        let segs = parse("${ secret(\"s1\", 'extra') }").unwrap();
        assert_eq!(
            segs,
            vec![Segment::Call {
                name: "secret".to_string(),
                args: vec!["s1".to_string(), "extra".to_string()],
            }]
        );
    }

    #[test]
    fn pure_literal_has_no_calls() {
        let segs = parse("no interpolation here").unwrap();
        assert_eq!(segs, vec![Segment::Literal("no interpolation here".to_string())]);
    }

    #[test]
    fn rejects_unterminated_expr() {
        assert!(parse("${ configuration('a')").is_err());
    }
}

// Placeholder scanner and modifier-chain parser

use super::ast::{ModifierCall, ModifierSyntaxError, TokenExpr, TokenPath, TokenSpan};

// Private-use stand-ins for `\{{` and `\}}`. Each is three bytes in UTF-8,
// the same as the escape it replaces, so span offsets are unchanged.
const ESCAPED_OPEN: &str = "\u{E000}";
const ESCAPED_CLOSE: &str = "\u{E001}";

/// Find every non-escaped `{{...}}` span in a template.
///
/// A `{{` or `}}` preceded by `\` is escaped and skipped.
pub fn find_token_spans(template: &str) -> Vec<TokenSpan> {
    scan_token_spans(&protect_escaped_braces(template))
}

/// Swap the template's own `\{{`/`\}}` escapes for markers that the scanner
/// never matches. Backslashes introduced later by substituted values are
/// left alone.
pub fn protect_escaped_braces(template: &str) -> String {
    template
        .replace("\\{{", ESCAPED_OPEN)
        .replace("\\}}", ESCAPED_CLOSE)
}

/// Turn protected escapes back into literal braces. Runs once, after
/// expansion.
pub fn restore_escaped_braces(text: &str) -> String {
    text.replace(ESCAPED_OPEN, "{{").replace(ESCAPED_CLOSE, "}}")
}

/// Find every `{{...}}` span in one left-to-right pass over protected text.
///
/// When another `{{` opens before the closing `}}`, the innermost
/// placeholder wins so nested placeholders expand from the inside out.
pub fn scan_token_spans(text: &str) -> Vec<TokenSpan> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut spans = Vec::new();
    let mut i = 0;

    while i + 1 < len {
        if !(bytes[i] == b'{' && bytes[i + 1] == b'{') {
            i += 1;
            continue;
        }

        let mut open = i;
        let mut j = i + 2;
        let mut close = None;
        while j + 1 < len {
            if bytes[j] == b'{' && bytes[j + 1] == b'{' {
                open = j;
                j += 2;
                continue;
            }
            if bytes[j] == b'}' && bytes[j + 1] == b'}' {
                close = Some(j);
                break;
            }
            j += 1;
        }

        match close {
            Some(j) => {
                spans.push(TokenSpan {
                    start: open,
                    end: j + 2,
                });
                i = j + 2;
            }
            None => break,
        }
    }

    spans
}

pub fn has_unescaped_token(template: &str) -> bool {
    !find_token_spans(template).is_empty()
}

/// Parse the inside of a placeholder into path and modifier chain.
///
/// Malformed stages are dropped; the rest of the chain still applies.
pub fn parse_token(inner: &str) -> TokenExpr {
    let mut pieces = split_unescaped_pipes(inner).into_iter();
    let raw_path = pieces.next().unwrap_or_default().trim().to_string();
    let path = parse_path(&raw_path);

    let mut modifiers = Vec::new();
    for stage in pieces {
        let stage = stage.trim();
        if stage.is_empty() {
            continue;
        }
        match ModifierParser::parse(stage) {
            Ok(call) => modifiers.push(call),
            Err(e) => tracing::debug!(token = %raw_path, "Ignoring malformed modifier: {}", e),
        }
    }

    TokenExpr {
        raw_path,
        path,
        modifiers,
    }
}

/// Split a dotted path; `None` if any segment is empty or has characters
/// outside identifiers.
pub fn parse_path(raw: &str) -> Option<TokenPath> {
    if raw.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    for segment in raw.split('.') {
        let segment = segment.trim();
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')
        {
            return None;
        }
        segments.push(segment.to_string());
    }
    Some(TokenPath::new(segments))
}

/// Split on `|` unless written as `\|`
pub fn split_unescaped_pipes(input: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => pieces.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    pieces.push(current);
    pieces
}

/// Recursive-descent parser for one `name(arg, "arg")` stage
pub struct ModifierParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> ModifierParser<'a> {
    pub fn parse(stage: &'a str) -> Result<ModifierCall, ModifierSyntaxError> {
        let mut parser = Self {
            input: stage,
            pos: 0,
        };
        parser.parse_call()
    }

    fn parse_call(&mut self) -> Result<ModifierCall, ModifierSyntaxError> {
        let name = self.parse_identifier()?;
        self.skip_whitespace();

        match self.peek_char() {
            None => Ok(ModifierCall::new(&name, Vec::new())),
            Some('(') => {
                self.pos += 1;
                let rest = self.input[self.pos..].trim_end();
                let Some(body) = rest.strip_suffix(')') else {
                    return Err(self.error(self.input.len(), "Expected ')' to close arguments"));
                };
                Ok(ModifierCall::new(&name, split_args(body)))
            }
            Some(ch) => Err(self.error(self.pos, &format!("Unexpected character '{}'", ch))),
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ModifierSyntaxError> {
        let mut ident = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(self.error(self.pos, "Expected modifier name"));
        }
        Ok(ident)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn error(&self, position: usize, message: &str) -> ModifierSyntaxError {
        ModifierSyntaxError {
            stage: self.input.to_string(),
            position,
            message: message.to_string(),
        }
    }
}

/// Comma-split modifier arguments. Commas inside quotes do not split;
/// surrounding `'`/`"` quotes are stripped.
pub fn split_args(body: &str) -> Vec<String> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in body.chars() {
        match (ch, quote) {
            ('"' | '\'', None) => {
                quote = Some(ch);
                current.push(ch);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                current.push(ch);
            }
            (',', None) => args.push(unquote(std::mem::take(&mut current).trim())),
            _ => current.push(ch),
        }
    }
    args.push(unquote(current.trim()));
    args
}

fn unquote(arg: &str) -> String {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return arg[1..arg.len() - 1].to_string();
        }
    }
    arg.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::template::ast::TokenNamespace;

    fn raw_spans(template: &str) -> Vec<&str> {
        find_token_spans(template)
            .iter()
            .map(|s| s.raw(template))
            .collect()
    }

    #[test]
    fn test_find_simple_spans() {
        assert_eq!(
            raw_spans("Hi {{user.username}}, see {{site.name | upper}}"),
            vec!["{{user.username}}", "{{site.name | upper}}"]
        );
    }

    #[test]
    fn test_escaped_spans_are_skipped() {
        assert!(raw_spans("\\{{x}}").is_empty());
        assert_eq!(raw_spans("\\{{x\\}} and {{y}}"), vec!["{{y}}"]);
    }

    #[test]
    fn test_unclosed_span() {
        assert!(raw_spans("{{entry.title").is_empty());
        assert_eq!(raw_spans("{{a}} {{b"), vec!["{{a}}"]);
    }

    #[test]
    fn test_innermost_span_wins() {
        assert_eq!(raw_spans("{{ {{entry.a}} }}"), vec!["{{entry.a}}"]);
    }

    #[test]
    fn test_span_inner_text() {
        let template = "x{{ entry.title }}y";
        let spans = find_token_spans(template);
        assert_eq!(spans[0].inner(template), " entry.title ");
        assert_eq!(spans[0].start, 1);
        assert_eq!(spans[0].end, 18);
    }

    #[test]
    fn test_restore_escaped_braces() {
        let protected = protect_escaped_braces("\\{{x\\}}");
        assert_eq!(protected.len(), "\\{{x\\}}".len());
        assert!(scan_token_spans(&protected).is_empty());
        assert_eq!(restore_escaped_braces(&protected), "{{x}}");
        assert_eq!(restore_escaped_braces(&protect_escaped_braces("\\{{x}}")), "{{x}}");
    }

    #[test]
    fn test_substituted_backslash_is_not_an_escape() {
        // Only the template's own escapes are protected
        let text = format!("C:\\{}", "{{entry.missing}}");
        assert_eq!(raw_spans(&protect_escaped_braces("\\{{a}}")).len(), 0);
        assert_eq!(scan_token_spans(&text).len(), 1);
        assert_eq!(restore_escaped_braces(&text), text);
    }

    #[test]
    fn test_parse_token_with_chain() {
        let expr = parse_token(" entry.title | upper | truncate(3, \"...\") ");
        let path = expr.path.unwrap();
        assert_eq!(path.segments, vec!["entry", "title"]);
        assert_eq!(path.namespace(), TokenNamespace::Entry);
        assert_eq!(expr.modifiers.len(), 2);
        assert_eq!(expr.modifiers[0], ModifierCall::new("upper", vec![]));
        assert_eq!(
            expr.modifiers[1],
            ModifierCall::new("truncate", vec!["3".to_string(), "...".to_string()])
        );
    }

    #[test]
    fn test_malformed_stage_is_dropped() {
        let expr = parse_token("x | up-per | lower | trunc(3");
        assert_eq!(expr.modifiers, vec![ModifierCall::new("lower", vec![])]);
    }

    #[test]
    fn test_invalid_path() {
        assert!(parse_token("not a path").path.is_none());
        assert!(parse_token("entry..title").path.is_none());
        assert!(parse_token("").path.is_none());
        assert!(parse_token("items.0.name").path.is_some());
    }

    #[test]
    fn test_escaped_pipe() {
        assert_eq!(split_unescaped_pipes("a|b\\|c"), vec!["a", "b|c"]);
        let expr = parse_token("x | default(a\\|b)");
        assert_eq!(expr.modifiers[0].args, vec!["a|b"]);
    }

    #[test]
    fn test_modifier_parser_errors() {
        let err = ModifierParser::parse("(3)").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("Expected modifier name"));

        let err = ModifierParser::parse("truncate(3").unwrap_err();
        assert_eq!(err.position, 10);

        let err = ModifierParser::parse("upper!").unwrap_err();
        assert_eq!(err.position, 5);
        assert!(err.to_string().contains("Unexpected character '!'"));
    }

    #[test]
    fn test_split_args() {
        assert!(split_args("  ").is_empty());
        assert_eq!(split_args("2,\"!\""), vec!["2", "!"]);
        assert_eq!(split_args("'a, b', c"), vec!["a, b", "c"]);
        assert_eq!(split_args("\"\""), vec![""]);
        assert_eq!(split_args(" 10 , 'x' "), vec!["10", "x"]);
    }
}

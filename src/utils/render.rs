// src/utils/render.rs

//! Markdown + LaTeX rendering for question and mark-scheme text.
//!
//! Math spans (`$...$`, `$$...$$`, `\(...\)`, `\[...\]`) are lifted out
//! before Markdown parsing so that `_` and `*` inside formulas are not read
//! as emphasis. After Markdown rendering with `pulldown_cmark` the math is
//! put back as escaped TeX wrapped in `<span class="math ...">` for the
//! browser-side typesetter, or as bare TeX inside tag attributes (image alt
//! text). The result is then sanitized with `ammonia`.
//!
//! Rendering never fails: malformed input degrades to literal text.

use std::sync::LazyLock;

use ammonia::Builder;
use pulldown_cmark::{Options, Parser, html};

/// Private-use characters delimiting a math placeholder. Stripped from the
/// input first so user text can never forge one.
const TOKEN_OPEN: char = '\u{E000}';
const TOKEN_CLOSE: char = '\u{E001}';

static SANITIZER: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::default();
    builder.add_allowed_classes("span", ["math", "inline", "display"]);
    builder
});

#[derive(Debug, Clone, Copy, PartialEq)]
enum MathMode {
    Inline,
    Display,
}

#[derive(Debug)]
struct MathSpan {
    mode: MathMode,
    tex: String,
}

/// Renders Markdown with embedded LaTeX into sanitized HTML.
pub fn render_markdown(input: &str) -> String {
    let (protected, spans) = extract_math(input);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(&protected, options);
    let mut raw_html = String::new();
    html::push_html(&mut raw_html, parser);

    let restored = restore_math(&raw_html, &spans);
    SANITIZER.clean(&restored).to_string()
}

fn extract_math(input: &str) -> (String, Vec<MathSpan>) {
    let chars: Vec<char> = input
        .chars()
        .filter(|c| *c != TOKEN_OPEN && *c != TOKEN_CLOSE)
        .collect();
    let len = chars.len();

    let mut out = String::with_capacity(input.len());
    let mut spans = Vec::new();
    let mut i = 0;

    let mut push_span = |out: &mut String, mode: MathMode, tex: &[char]| {
        out.push(TOKEN_OPEN);
        out.push_str(&spans.len().to_string());
        out.push(TOKEN_CLOSE);
        spans.push(MathSpan {
            mode,
            tex: tex.iter().collect(),
        });
    };

    while i < len {
        let c = chars[i];

        // Code spans are copied verbatim.
        if c == '`' {
            let run = run_length(&chars, i, '`');
            match find_backtick_run(&chars, i + run, run) {
                Some(end) => {
                    out.extend(&chars[i..end + run]);
                    i = end + run;
                }
                None => {
                    out.extend(&chars[i..i + run]);
                    i += run;
                }
            }
            continue;
        }

        if c == '\\' && i + 1 < len {
            let next = chars[i + 1];
            let close = match next {
                '(' => Some((')', MathMode::Inline)),
                '[' => Some((']', MathMode::Display)),
                _ => None,
            };
            if let Some((close, mode)) = close {
                if let Some(end) = find_pair(&chars, i + 2, '\\', close) {
                    push_span(&mut out, mode, &chars[i + 2..end]);
                    i = end + 2;
                    continue;
                }
            }
            // Keep escape pairs intact (`\$` stays a literal dollar).
            out.push(c);
            out.push(next);
            i += 2;
            continue;
        }

        if c == '$' {
            if i + 1 < len && chars[i + 1] == '$' {
                if let Some(end) = find_pair(&chars, i + 2, '$', '$') {
                    if end > i + 2 {
                        push_span(&mut out, MathMode::Display, &chars[i + 2..end]);
                        i = end + 2;
                        continue;
                    }
                }
                out.push_str("$$");
                i += 2;
                continue;
            }

            if i + 1 < len && !chars[i + 1].is_whitespace() {
                if let Some(end) = find_inline_close(&chars, i + 1) {
                    push_span(&mut out, MathMode::Inline, &chars[i + 1..end]);
                    i = end + 1;
                    continue;
                }
            }
        }

        out.push(c);
        i += 1;
    }

    (out, spans)
}

fn run_length(chars: &[char], start: usize, c: char) -> usize {
    chars[start..].iter().take_while(|x| **x == c).count()
}

/// Finds the next run of exactly `run` backticks at or after `start`.
fn find_backtick_run(chars: &[char], start: usize, run: usize) -> Option<usize> {
    let mut k = start;
    while k < chars.len() {
        if chars[k] == '`' {
            let n = run_length(chars, k, '`');
            if n == run {
                return Some(k);
            }
            k += n;
        } else {
            k += 1;
        }
    }
    None
}

/// Finds `a` immediately followed by `b`, skipping backslash escapes.
fn find_pair(chars: &[char], start: usize, a: char, b: char) -> Option<usize> {
    let mut k = start;
    while k + 1 < chars.len() {
        if chars[k] == a && chars[k + 1] == b {
            return Some(k);
        }
        if chars[k] == '\\' && a != '\\' {
            k += 2;
            continue;
        }
        k += 1;
    }
    None
}

/// Closing `$` for inline math: not preceded by whitespace, not followed by a
/// digit, and not past a blank line. This keeps "$5 and $10" literal.
fn find_inline_close(chars: &[char], start: usize) -> Option<usize> {
    let mut k = start;
    while k < chars.len() {
        match chars[k] {
            '\\' => {
                k += 2;
                continue;
            }
            '\n' if chars.get(k + 1) == Some(&'\n') => return None,
            '$' if k > start
                && !chars[k - 1].is_whitespace()
                && !chars.get(k + 1).is_some_and(|n| n.is_ascii_digit()) =>
            {
                return Some(k);
            }
            _ => {}
        }
        k += 1;
    }
    None
}

/// Replaces placeholders with math markup. Inside a tag (an attribute value)
/// only the delimited TeX is written, since markup is not allowed there.
fn restore_math(html: &str, spans: &[MathSpan]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars();
    let mut in_tag = false;

    while let Some(c) = chars.next() {
        if c != TOKEN_OPEN {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        for d in chars.by_ref() {
            if d == TOKEN_CLOSE {
                break;
            }
            digits.push(d);
        }
        let Some(span) = digits.parse::<usize>().ok().and_then(|idx| spans.get(idx)) else {
            continue;
        };

        let tex = ammonia::clean_text(&span.tex);
        let markup = match (span.mode, in_tag) {
            (MathMode::Inline, true) => format!(r"\({}\)", tex),
            (MathMode::Display, true) => format!(r"\[{}\]", tex),
            (MathMode::Inline, false) => {
                format!(r#"<span class="math inline">\({}\)</span>"#, tex)
            }
            (MathMode::Display, false) => {
                format!(r#"<span class="math display">\[{}\]</span>"#, tex)
            }
        };
        out.push_str(&markup);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plain_markdown() {
        let html = render_markdown("**Resultant force** = 16 N");
        assert!(html.contains("<strong>Resultant force</strong>"));
    }

    #[test]
    fn inline_math_is_not_read_as_emphasis() {
        let html = render_markdown("Use $v_1 = u_1 + a_1 t$ and $a*b*c$.");
        assert!(html.contains(r#"<span class="math inline">\(v_1 = u_1 + a_1 t\)</span>"#));
        assert!(html.contains(r#"\(a*b*c\)"#));
        assert!(!html.contains("<em>"));
    }

    #[test]
    fn display_math_and_bracket_delimiters() {
        let html = render_markdown("$$R = \\frac{V}{I}$$\n\nand \\[F = ma\\]");
        assert!(html.contains(r#"<span class="math display">\[R = \frac{V}{I}\]</span>"#));
        assert!(html.contains(r#"<span class="math display">\[F = ma\]</span>"#));
    }

    #[test]
    fn tex_is_html_escaped() {
        let html = render_markdown("$a < b & c > d$");
        assert!(html.contains(r"\(a &lt; b &amp; c &gt; d\)"));
    }

    #[test]
    fn math_in_image_alt_text_stays_plain_tex() {
        let html = render_markdown("![Force $F$ on block](diagram.png)");
        assert!(html.contains(r#"alt="Force \(F\) on block""#), "{html}");
        assert!(!html.contains("<span"));
    }

    #[test]
    fn only_math_classes_survive_on_spans() {
        let html = render_markdown(r#"<span class="evil math">x</span> and $y$"#);
        assert!(!html.contains("evil"));
        assert!(html.contains(r#"<span class="math inline">\(y\)</span>"#));
    }

    #[test]
    fn currency_stays_literal() {
        let html = render_markdown("It costs $5 and $10.");
        assert!(html.contains("$5 and $10"));
        assert!(!html.contains("math"));
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let html = render_markdown(r"Price \$3 per $x$");
        assert!(html.contains("Price $3 per"));
        assert!(html.contains(r"\(x\)"));
    }

    #[test]
    fn code_spans_are_left_alone() {
        let html = render_markdown("Type `$x$` literally");
        assert!(html.contains("<code>$x$</code>"));
    }

    #[test]
    fn scripts_are_stripped() {
        let html = render_markdown("Hi <script>alert(1)</script> <b onclick=\"x()\">there</b>");
        assert!(!html.contains("<script"));
        assert!(!html.contains("onclick"));
    }

    #[test]
    fn forged_placeholders_are_dropped() {
        let html = render_markdown("a\u{E000}0\u{E001}b");
        assert!(html.contains("a0b"));
    }

    #[test]
    fn unclosed_delimiters_render_literally() {
        for input in ["$$x", "$x", "\\(x", "\\[x", "``x`", "$ x$", "$\n\n$"] {
            let html = render_markdown(input);
            assert!(!html.contains("math"), "{input:?} rendered as math: {html}");
        }
    }

    /// Every short string over an alphabet of delimiter characters renders.
    #[test]
    fn renders_every_short_delimiter_combination() {
        let alphabet = ['$', '\\', '`', '*', '_', '\n', 'a', 'é', '\u{E000}', '('];
        let mut inputs = vec![String::new()];
        for _ in 0..4 {
            let mut next = Vec::with_capacity(inputs.len() * alphabet.len());
            for prefix in &inputs {
                for c in alphabet {
                    let mut s = prefix.clone();
                    s.push(c);
                    next.push(s);
                }
            }
            for s in &next {
                let _ = render_markdown(s);
            }
            inputs = next;
        }
    }
}

use comrak::{markdown_to_html_with_plugins, Options, Plugins};

use crate::highlight::TokenHighlighter;
use crate::sanitize::Sanitizer;
use crate::schema::SanitizeSchema;
use crate::theme::{is_valid_class_name, scoped_stylesheet, Palette};

pub const DEFAULT_SCOPE_CLASS: &str = "markdown-body";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Multimedia/table allow-list, `data:` sources, token classes and raw HTML.
    pub extended: bool,
    /// Class of the wrapping element; the stylesheet is scoped to it.
    pub scope_class: String,
    pub palette: Palette,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            extended: true,
            scope_class: String::from(DEFAULT_SCOPE_CLASS),
            palette: Palette::default(),
        }
    }
}

impl RenderOptions {
    pub fn with_extended(extended: bool) -> Self {
        Self {
            extended,
            ..Self::default()
        }
    }
}

/// Sanitized output of one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub stylesheet: String,
}

impl Rendered {
    /// Standalone page with the token stylesheet inlined.
    pub fn to_document(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
            self.stylesheet, self.html
        )
    }
}

/// markdown → (raw HTML) → highlight → sanitize → scoped output.
pub struct MarkdownRenderer {
    options: RenderOptions,
    comrak: Options<'static>,
    highlighter: TokenHighlighter,
    sanitizer: Sanitizer,
    stylesheet: String,
}

impl MarkdownRenderer {
    pub fn new(mut options: RenderOptions) -> Self {
        if !is_valid_class_name(&options.scope_class) {
            log::warn!(
                "Invalid scope class {:?}, using {}",
                options.scope_class,
                DEFAULT_SCOPE_CLASS
            );
            options.scope_class = String::from(DEFAULT_SCOPE_CLASS);
        }
        options.palette.validate();

        let schema = SanitizeSchema::for_flag(options.extended);
        log::debug!(
            "Markdown renderer: extended={}, {} tags allowed",
            options.extended,
            schema.tag_names.len()
        );

        Self {
            comrak: create_comrak_options(options.extended),
            highlighter: TokenHighlighter::new(),
            sanitizer: Sanitizer::new(&schema),
            stylesheet: scoped_stylesheet(&options.scope_class, &options.palette),
            options,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn render(&self, src: &str) -> Rendered {
        let mut plugins = Plugins::default();
        plugins.render.codefence_syntax_highlighter = Some(&self.highlighter);

        let html = markdown_to_html_with_plugins(src, &self.comrak, &plugins);
        let clean = self.sanitizer.clean(&html);
        log::trace!(
            "Rendered {} bytes of markdown into {} bytes ({} before sanitizing)",
            src.len(),
            clean.len(),
            html.len()
        );

        Rendered {
            html: format!("<div class=\"{}\">{}</div>", self.options.scope_class, clean),
            stylesheet: self.stylesheet.clone(),
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

/// Render with the default options and return the scoped HTML fragment.
pub fn to_html(src: &str) -> String {
    MarkdownRenderer::default().render(src).html
}

fn create_comrak_options(extended: bool) -> Options<'static> {
    let mut opt = Options::default();

    // GitHub-flavored markdown
    opt.extension.strikethrough = true;
    opt.extension.table = true;
    opt.extension.autolink = true;
    opt.extension.tasklist = true;
    opt.extension.footnotes = true;

    // Raw HTML is passed through only when extended; the sanitizer runs either way
    opt.render.unsafe_ = extended;
    opt.render.escape = !extended;

    opt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str, extended: bool) -> String {
        MarkdownRenderer::new(RenderOptions::with_extended(extended))
            .render(md)
            .html
    }

    #[test]
    fn test_basic_markdown() {
        let md = "# Hello\n\nThis is **bold** and *italic*.";
        let html = to_html(md);
        assert!(html.contains("<h1>"));
        assert!(html.contains("<strong>"));
        assert!(html.contains("<em>"));
    }

    #[test]
    fn test_gfm_table() {
        let md = "| Header 1 | Header 2 |\n|----------|----------|\n| Cell 1   | Cell 2   |";
        for extended in [false, true] {
            let html = render(md, extended);
            assert!(html.contains("<table>"));
            assert!(html.contains("<thead>"));
            assert!(html.contains("<tbody>"));
        }
    }

    #[test]
    fn test_gfm_strikethrough_and_autolink() {
        let html = to_html("~~gone~~ see https://example.com");
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains(r#"href="https://example.com""#));
    }

    #[test]
    fn test_gfm_tasklist() {
        let html = to_html("- [x] done\n- [ ] todo\n");
        assert!(html.contains(r#"type="checkbox""#));
        assert!(html.contains("checked"));
    }

    #[test]
    fn test_output_is_scoped() {
        let html = to_html("text");
        assert!(html.starts_with(r#"<div class="markdown-body">"#));
        assert!(html.ends_with("</div>"));
    }

    #[test]
    fn test_invalid_scope_class_falls_back() {
        let renderer = MarkdownRenderer::new(RenderOptions {
            scope_class: String::from("x\"><script>"),
            ..RenderOptions::default()
        });
        assert_eq!(renderer.options().scope_class, DEFAULT_SCOPE_CLASS);
        let rendered = renderer.render("hi");
        assert!(rendered.html.starts_with(r#"<div class="markdown-body">"#));
        assert!(rendered.stylesheet.contains(".markdown-body .hljs-keyword"));
    }

    #[test]
    fn test_raw_html_only_when_extended() {
        let md = "before <kbd>Ctrl</kbd> after";
        assert!(render(md, true).contains("<kbd>Ctrl</kbd>"));

        let escaped = render(md, false);
        assert!(!escaped.contains("<kbd>"));
        assert!(escaped.contains("&lt;kbd&gt;"));
    }

    #[test]
    fn test_document_includes_stylesheet() {
        let doc = MarkdownRenderer::default().render("# Title").to_document();
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<style>\n.markdown-body .hljs-doctag"));
        assert!(doc.contains("<h1>Title</h1>"));
    }
}

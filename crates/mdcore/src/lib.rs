pub mod highlight;
pub mod markdown;
pub mod sanitize;
pub mod schema;
pub mod theme;

pub use highlight::{TokenHighlighter, HIGHLIGHT_TOKEN_CLASSES};
pub use markdown::{to_html, MarkdownRenderer, RenderOptions, Rendered};
pub use sanitize::Sanitizer;
pub use schema::SanitizeSchema;
pub use theme::{Palette, ThemeColor};

mod card;
mod text;

pub use card::{TABLE_WIDTH, render};
use crossterm::style::{Attribute, Color, ContentStyle};

/// Presentation styles, turned into escape sequences only by [`paint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Safe,
    Warning,
    SelfOwned,
    OtherOwned,
    Bold,
}

impl Style {
    fn content_style(self) -> ContentStyle {
        let mut style = ContentStyle::new();
        match self {
            Style::Safe => style.foreground_color = Some(Color::Green),
            Style::Warning => style.foreground_color = Some(Color::Red),
            Style::SelfOwned => style.foreground_color = Some(Color::Blue),
            Style::OtherOwned => {}
            Style::Bold => style.attributes.set(Attribute::Bold),
        }
        style
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: Option<Style>,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style: Some(style),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    /// Width in terminal columns; everything we render is single-width.
    pub fn width(&self) -> usize {
        self.spans.iter().map(|span| span.text.chars().count()).sum()
    }

    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

/// Resolve styles to ANSI escapes, one output line per [`Line`].
pub fn paint(lines: &[Line]) -> String {
    let mut out = String::new();
    for line in lines {
        for span in &line.spans {
            match span.style {
                Some(style) => out.push_str(&style.content_style().apply(&span.text).to_string()),
                None => out.push_str(&span.text),
            }
        }
        out.push('\n');
    }
    out
}

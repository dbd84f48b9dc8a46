//! Paginated PDF report.
//!
//! Same layout as the HTML document: a dark header with the date range, a
//! stats band, the executive summary, the ranked top stories, and one section
//! per category. The file is written with `lopdf` using the standard
//! Helvetica faces, so no font files are needed. Text is WinAnsi encoded;
//! characters outside that set print as `?`.

use crate::models::{Briefing, BriefingStory, Category};
use crate::outputs::html::TITLE;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const FOOTER_Y: f32 = 28.0;

const NAVY: &str = "#0D1B2A";
const SLATE: &str = "#1E293B";
const TEXT_BLACK: &str = "#111827";
const DARK_GRAY: &str = "#374151";
const MID_GRAY: &str = "#9CA3AF";
const HEADER_GRAY: &str = "#CBD5E1";
const ACCENT_GOLD: &str = "#F59E0B";
const LINK_BLUE: &str = "#1A56DB";
const WARNING_BROWN: &str = "#92400E";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    /// Average glyph width as a fraction of the font size.
    fn avg_width(self) -> f32 {
        match self {
            Font::Regular => 0.50,
            Font::Bold => 0.55,
        }
    }
}

/// `#RRGGBB` to PDF color components; unreadable channels are 0.
fn rgb(hex: &str) -> [f32; 3] {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .map_or(0.0, |v| f32::from(v) / 255.0)
    };
    [channel(0), channel(2), channel(4)]
}

/// Encode `text` for a WinAnsi simple font.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            '\t' | '\n' | '\r' => b' ',
            _ => b'?',
        })
        .collect()
}

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// Words longer than a line are split.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > max_chars {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            lines.push(word.chars().take(max_chars).collect());
            word = word.chars().skip(max_chars).collect();
        }
        if word.is_empty() {
            continue;
        }
        let line_len = line.chars().count();
        if line_len > 0 && line_len + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn color_op(operator: &str, hex: &str) -> Operation {
    let [r, g, b] = rgb(hex);
    Operation::new(
        operator,
        vec![Object::Real(r), Object::Real(g), Object::Real(b)],
    )
}

/// Top-down layout cursor that breaks pages as content accumulates.
struct PageWriter {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Break the page unless `height` more points fit above the bottom margin.
    fn reserve(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.new_page();
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: &str) {
        self.ops.push(color_op("rg", color));
        self.ops.push(Operation::new(
            "re",
            vec![
                Object::Real(x),
                Object::Real(y),
                Object::Real(width),
                Object::Real(height),
            ],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn text_at(&mut self, x: f32, y: f32, font: Font, size: f32, color: &str, text: &str) {
        self.ops.extend([
            Operation::new("BT", vec![]),
            color_op("rg", color),
            Operation::new("Tf", vec![font.resource().into(), Object::Real(size)]),
            Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Wrapped text starting `indent` points right of the margin.
    fn paragraph(&mut self, font: Font, size: f32, color: &str, indent: f32, text: &str) {
        let leading = size * 1.4;
        let max_chars = ((CONTENT_WIDTH - indent) / (size * font.avg_width())) as usize;
        for line in wrap(text, max_chars) {
            self.reserve(leading);
            self.y -= leading;
            self.text_at(MARGIN + indent, self.y, font, size, color, &line);
        }
    }

    fn heading(&mut self, text: &str, color: &str) {
        self.reserve(60.0);
        self.gap(20.0);
        self.text_at(MARGIN, self.y, Font::Bold, 15.0, color, text);
        self.fill_rect(MARGIN, self.y - 6.0, CONTENT_WIDTH, 1.5, color);
        self.gap(14.0);
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(self.ops);
        }
        self.pages
    }
}

fn header(w: &mut PageWriter, briefing: &Briefing) {
    let top = PAGE_HEIGHT;
    w.fill_rect(0.0, top - 120.0, PAGE_WIDTH, 120.0, NAVY);
    w.text_at(MARGIN, top - 45.0, Font::Bold, 10.0, MID_GRAY, "WEEKLY BRIEFING");
    w.text_at(MARGIN, top - 78.0, Font::Bold, 26.0, "#FFFFFF", "AI & Tech");
    w.text_at(
        MARGIN,
        top - 102.0,
        Font::Regular,
        12.0,
        HEADER_GRAY,
        &briefing.date_range.display(),
    );

    w.fill_rect(0.0, top - 162.0, PAGE_WIDTH, 42.0, SLATE);
    let stats = [
        (briefing.stories.len(), "Stories"),
        (briefing.source_count(), "Sources"),
        (briefing.category_count(), "Categories"),
    ];
    for (i, (value, label)) in stats.into_iter().enumerate() {
        let x = MARGIN + i as f32 * (CONTENT_WIDTH / 3.0);
        w.text_at(x, top - 147.0, Font::Bold, 16.0, ACCENT_GOLD, &value.to_string());
        w.text_at(x + 34.0, top - 145.0, Font::Regular, 10.0, MID_GRAY, label);
    }
    w.y = top - 162.0 - 10.0;
}

fn story_entry(w: &mut PageWriter, rank: Option<usize>, story: &BriefingStory, body: &str) {
    w.reserve(70.0);
    w.gap(6.0);
    let title = match rank {
        Some(n) => format!("{n}. {}", story.title),
        None => story.title.clone(),
    };
    w.paragraph(Font::Bold, 11.0, TEXT_BLACK, 0.0, &title);
    let (source_color, _) = story.source.colors();
    let meta = format!(
        "{}  |  {}",
        story.source.display_name(),
        story.published.format("%b %d")
    );
    w.paragraph(Font::Bold, 8.0, source_color, 0.0, &meta);
    if !body.trim().is_empty() {
        w.paragraph(Font::Regular, 9.5, DARK_GRAY, 0.0, body);
    }
    w.paragraph(Font::Regular, 7.5, LINK_BLUE, 0.0, &story.url);
    w.gap(6.0);
}

fn footer(page: usize, total: usize, briefing: &Briefing) -> Vec<Operation> {
    let mut w = PageWriter::new();
    let text = format!(
        "{TITLE}  |  {}  |  Page {page} of {total}",
        briefing.date_range.display()
    );
    w.text_at(MARGIN, FOOTER_Y, Font::Regular, 8.0, MID_GRAY, &text);
    w.ops
}

/// Lay the briefing out into per-page content operations.
fn layout(briefing: &Briefing) -> Vec<Vec<Operation>> {
    let mut w = PageWriter::new();
    header(&mut w, briefing);

    if briefing.degraded {
        w.gap(8.0);
        w.paragraph(
            Font::Bold,
            9.5,
            WARNING_BROWN,
            0.0,
            "Automatic categorization was unavailable for this edition; stories are listed without topic grouping.",
        );
    }

    w.heading("Executive Summary", TEXT_BLACK);
    w.paragraph(Font::Regular, 10.5, DARK_GRAY, 0.0, &briefing.executive_summary);

    let top: Vec<_> = briefing.resolved_top_stories().collect();
    if !top.is_empty() {
        w.heading("Top Stories", ACCENT_GOLD);
        for (i, (story, extended)) in top.into_iter().enumerate() {
            story_entry(&mut w, Some(i + 1), story, extended);
        }
    }

    for (category, stories) in briefing.by_category() {
        category_section(&mut w, category, &stories);
    }
    w.finish()
}

fn category_section(w: &mut PageWriter, category: Category, stories: &[&BriefingStory]) {
    let (color, _) = category.colors();
    w.heading(&format!("{} ({})", category.label(), stories.len()), color);
    for story in stories {
        story_entry(w, None, story, story.best_summary());
    }
}

/// Render the briefing as a PDF document.
pub fn render_pdf(briefing: &Briefing) -> Result<Vec<u8>, lopdf::Error> {
    let pages = layout(briefing);
    let total = pages.len();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource() => regular,
            Font::Bold.resource() => bold,
        },
    });

    let mut kids = Vec::with_capacity(total);
    for (i, mut operations) in pages.into_iter().enumerate() {
        operations.extend(footer(i + 1, total, briefing));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(total as i64),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(win_ansi(TITLE)),
        "Producer" => Object::string_literal(concat!("ai_news_briefing ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

//! Self-contained HTML rendition of the briefing.
//!
//! Inline styles only, so the document survives email clients that strip
//! `<style>` blocks. Every piece of text that came from a source or from the
//! model is escaped; URLs are escaped as attribute values.

use crate::models::{Briefing, BriefingStory, Category};
use crate::utils::slugify_title;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write;

pub const TITLE: &str = "AI & Tech Weekly Briefing";

fn badge(out: &mut String, label: &str, (fg, bg): (&str, &str)) {
    let _ = write!(
        out,
        r#"<span style="display:inline-block;font-size:11px;font-weight:700;color:{fg};background:{bg};border-radius:4px;padding:2px 8px;margin-right:6px;">{}</span>"#,
        text(label)
    );
}

fn stat(out: &mut String, value: usize, label: &str) {
    let _ = write!(
        out,
        r#"<td style="text-align:center;"><div style="font-size:24px;font-weight:800;color:#F59E0B;">{value}</div><div style="font-size:11px;color:#94A3B8;">{label}</div></td>"#
    );
}

fn story_card(out: &mut String, story: &BriefingStory, body: &str) {
    out.push_str(
        r#"<div style="border:1px solid #E5E7EB;border-radius:8px;padding:14px 16px;margin:0 0 12px;">"#,
    );
    badge(out, story.source.display_name(), story.source.colors());
    let _ = write!(
        out,
        r#"<span style="font-size:11px;color:#9CA3AF;">{}</span>"#,
        story.published.format("%b %d")
    );
    let _ = write!(
        out,
        r#"<div style="margin:8px 0 6px;font-size:15px;font-weight:700;"><a href="{}" style="color:#111827;text-decoration:none;">{}</a></div>"#,
        attr(&story.url),
        text(&story.title)
    );
    let _ = write!(
        out,
        r#"<p style="margin:0;font-size:13px;color:#4B5563;line-height:1.6;">{}</p>"#,
        text(body)
    );
    out.push_str("</div>\n");
}

fn category_section(out: &mut String, category: Category, stories: &[&BriefingStory]) {
    let (fg, _) = category.colors();
    let _ = write!(
        out,
        r#"<h2 id="{}" style="font-size:18px;color:{fg};border-bottom:2px solid {fg};padding-bottom:4px;margin:28px 0 12px;">{} "#,
        attr(&slugify_title(category.short_name())),
        text(category.label())
    );
    badge(out, &stories.len().to_string(), category.colors());
    out.push_str("</h2>\n");
    for story in stories {
        story_card(out, story, story.best_summary());
    }
}

/// Render the full HTML document.
pub fn render_html(briefing: &Briefing) -> String {
    let date_range = briefing.date_range.display();
    let mut out = String::with_capacity(16 * 1024);
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
</head>
<body style="margin:0;padding:0;background:#F3F4F6;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Helvetica,Arial,sans-serif;">
<div style="max-width:640px;margin:0 auto;padding:32px 16px;">
<div style="background:linear-gradient(135deg,#0D1B2A,#1B0D2A);border-radius:12px 12px 0 0;padding:32px 36px;text-align:center;">
<div style="font-size:13px;font-weight:600;color:#94A3B8;text-transform:uppercase;letter-spacing:2px;">Weekly Briefing</div>
<div style="font-size:28px;font-weight:800;color:#FFFFFF;">AI &amp; Tech</div>
<div style="font-size:14px;color:#CBD5E1;">{range}</div>
</div>
<table width="100%" cellpadding="0" cellspacing="0" style="background:#1E293B;padding:16px 36px;"><tr>"#,
        title = text(TITLE),
        range = text(&date_range),
    );
    stat(&mut out, briefing.stories.len(), "Stories");
    stat(&mut out, briefing.source_count(), "Sources");
    stat(&mut out, briefing.category_count(), "Categories");
    out.push_str("</tr></table>\n");

    out.push_str(r#"<div style="background:#FFFFFF;border-radius:0 0 12px 12px;padding:32px 36px;">"#);
    out.push('\n');
    if briefing.degraded {
        out.push_str(
            r#"<p style="background:#FEF3C7;color:#92400E;border-radius:6px;padding:10px 14px;font-size:13px;">Automatic categorization was unavailable for this edition; stories are listed without topic grouping.</p>"#,
        );
        out.push('\n');
    }

    let _ = write!(
        out,
        r#"<h2 style="font-size:18px;color:#111827;margin:0 0 10px;">Executive Summary</h2>
<p style="font-size:14px;color:#374151;line-height:1.7;">{}</p>
"#,
        text(&briefing.executive_summary)
    );

    let top: Vec<_> = briefing.resolved_top_stories().collect();
    if !top.is_empty() {
        out.push_str(
            r#"<h2 style="font-size:18px;color:#111827;margin:28px 0 12px;">Top Stories</h2>"#,
        );
        out.push('\n');
        for (story, extended) in top {
            story_card(&mut out, story, extended);
        }
    }

    for (category, stories) in briefing.by_category() {
        category_section(&mut out, category, &stories);
    }

    let _ = write!(
        out,
        r#"</div>
<p style="font-size:11px;color:#9CA3AF;text-align:center;margin-top:16px;">{} &nbsp;&bull;&nbsp; {}</p>
</div>
</body>
</html>
"#,
        text(TITLE),
        text(&date_range)
    );
    out
}

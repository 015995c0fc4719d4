//! PDF rendering of a summary and its derived artifacts.
//!
//! Text is laid out with the standard Helvetica fonts on A4 pages, wrapped
//! on an average glyph width and paginated top to bottom.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::db::{QnaPair, Translation};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 11.0;
const LEADING: f32 = 1.35;

/// Average Helvetica glyph width as a fraction of the font size
const AVG_CHAR_WIDTH: f32 = 0.5;

const REGULAR_FONT: &str = "F1";
const BOLD_FONT: &str = "F2";

/// A unit of document content
#[derive(Debug, Clone)]
pub enum Block {
    Heading(String),
    /// Newlines start new paragraphs
    Paragraph(String),
}

struct Line {
    font: &'static str,
    size: f32,
    text: String,
    space_before: f32,
}

/// Render the export of one summary
pub fn summary_report(
    title: &str,
    generated_at: DateTime<Utc>,
    summary_text: &str,
    translations: &[Translation],
    qna: &[QnaPair],
) -> Result<Vec<u8>, lopdf::Error> {
    let mut blocks = vec![
        Block::Paragraph(format!("Generated on {}", generated_at.format("%B %-d, %Y"))),
        Block::Heading("Summary".to_string()),
        Block::Paragraph(summary_text.to_string()),
    ];

    for translation in translations {
        blocks.push(Block::Heading(format!("Translation ({})", translation.language)));
        blocks.push(Block::Paragraph(translation.text.clone()));
    }

    if !qna.is_empty() {
        blocks.push(Block::Heading("Questions & Answers".to_string()));
        for (i, pair) in qna.iter().enumerate() {
            blocks.push(Block::Paragraph(format!("Q{}: {}", i + 1, pair.question)));
            blocks.push(Block::Paragraph(format!("A: {}", pair.answer)));
        }
    }

    render_pdf(title, &blocks)
}

/// Render a titled document
pub fn render_pdf(title: &str, blocks: &[Block]) -> Result<Vec<u8>, lopdf::Error> {
    let mut lines = Vec::new();
    push_wrapped(&mut lines, BOLD_FONT, TITLE_SIZE, title, 0.0);
    for block in blocks {
        match block {
            Block::Heading(text) => push_wrapped(&mut lines, BOLD_FONT, HEADING_SIZE, text, HEADING_SIZE),
            Block::Paragraph(text) => {
                for paragraph in text.split('\n') {
                    push_wrapped(&mut lines, REGULAR_FONT, BODY_SIZE, paragraph, BODY_SIZE * 0.5);
                }
            }
        }
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR_FONT => regular_id,
            BOLD_FONT => bold_id,
        },
    });

    let mut page_ids: Vec<ObjectId> = Vec::new();
    for page in paginate(&lines) {
        let mut operations = Vec::new();
        for (line, y) in page {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![line.font.into(), line.size.into()]));
            operations.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_win_ansi(&line.text))],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.into_iter().map(Object::from).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

fn push_wrapped(lines: &mut Vec<Line>, font: &'static str, size: f32, text: &str, space_before: f32) {
    let max_chars = ((PAGE_WIDTH - 2.0 * MARGIN) / (size * AVG_CHAR_WIDTH)) as usize;
    for (i, text) in wrap(text, max_chars).into_iter().enumerate() {
        lines.push(Line {
            font,
            size,
            text,
            space_before: if i == 0 { space_before } else { 0.0 },
        });
    }
}

/// Assign lines to pages with their baseline positions
fn paginate(lines: &[Line]) -> Vec<Vec<(&Line, f32)>> {
    let top = PAGE_HEIGHT - MARGIN;
    let mut pages = vec![Vec::new()];
    let mut y = top;

    for line in lines {
        let mut next = y - line.space_before - line.size * LEADING;
        if next < MARGIN && pages.last().is_some_and(|page| !page.is_empty()) {
            pages.push(Vec::new());
            next = top - line.size * LEADING;
        }
        if let Some(page) = pages.last_mut() {
            page.push((line, next));
        }
        y = next;
    }

    pages
}

/// Greedy word wrap on character count, splitting words longer than a line
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: String = word.to_string();
        let mut word_len = word.chars().count();

        while word_len > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let split_at = word
                .char_indices()
                .nth(max_chars)
                .map(|(idx, _)| idx)
                .unwrap_or(word.len());
            let rest = word.split_off(split_at);
            lines.push(word);
            word = rest;
            word_len = word.chars().count();
        }

        if current_len > 0 && current_len + 1 + word_len > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(&word);
        current_len += word_len;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encode for the WinAnsi font encoding; unmappable characters become `?`
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap("abcdefghijkl xy", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "kl xy"]);
    }

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("café"), b"caf\xe9".to_vec());
        assert_eq!(encode_win_ansi("it’s"), b"it\x92s".to_vec());
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn test_long_document_paginates() {
        let paragraph = "word ".repeat(4000);
        let pdf = render_pdf("Long", &[Block::Paragraph(paragraph)]).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn test_summary_report_contains_sections() {
        let translations = vec![Translation::new("s1", "Spanish", "Un resumen corto.".into())];
        let qna = vec![QnaPair {
            question: "What is it about?".into(),
            answer: "Testing.".into(),
        }];

        let pdf = summary_report("notes.pdf", Utc::now(), "A short summary.", &translations, &qna)
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&pdf).unwrap();
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("Summary"));
        assert!(text.contains("Translation (Spanish)"));
        assert!(text.contains("Q1: What is it about?"));
    }
}

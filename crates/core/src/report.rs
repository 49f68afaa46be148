//! Local text extraction for uploaded PDF reports.

const MAX_DOCUMENT_CHARS: usize = 60_000;

/// Text of each page, in order. pdf-extract separates pages with form feeds.
pub fn extract_pdf_pages(bytes: &[u8]) -> anyhow::Result<Vec<String>> {
    anyhow::ensure!(!bytes.is_empty(), "PDF body is empty");
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| anyhow::anyhow!("failed to extract text from PDF: {e}"))?;
    Ok(split_pages(&text))
}

pub fn split_pages(text: &str) -> Vec<String> {
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|p| p.trim().to_string())
        .collect();

    // A trailing form feed leaves one empty page at the end.
    match pages.split_last() {
        Some((last, rest)) if last.is_empty() && !rest.is_empty() => rest.to_vec(),
        _ => pages,
    }
}

/// Pages joined with `--- Page N ---` markers, capped at a prompt-friendly size.
pub fn document_text(pages: &[String]) -> String {
    let mut out = String::new();
    for (idx, page) in pages.iter().enumerate() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("--- Page {} ---\n", idx + 1));
        out.push_str(page);
    }

    match out.char_indices().nth(MAX_DOCUMENT_CHARS) {
        Some((cut, _)) => {
            tracing::warn!(
                pages = pages.len(),
                chars = MAX_DOCUMENT_CHARS,
                "document text truncated"
            );
            out.truncate(cut);
            out.push_str("\n[truncated]");
            out
        }
        None => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_form_feed_and_drops_trailing_empty_page() {
        let pages = split_pages("Page one text\n\x0c  Page two \x0c");
        assert_eq!(pages, vec!["Page one text".to_string(), "Page two".to_string()]);
    }

    #[test]
    fn single_page_without_form_feed() {
        assert_eq!(split_pages("only"), vec!["only".to_string()]);
    }

    #[test]
    fn document_text_marks_pages() {
        let text = document_text(&["alpha".to_string(), "beta".to_string()]);
        assert_eq!(text, "--- Page 1 ---\nalpha\n\n--- Page 2 ---\nbeta");
    }

    #[test]
    fn long_documents_are_truncated() {
        let page = "x".repeat(MAX_DOCUMENT_CHARS + 10);
        let text = document_text(&[page]);
        assert!(text.ends_with("[truncated]"));
        assert!(text.chars().count() < MAX_DOCUMENT_CHARS + 20);
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(extract_pdf_pages(b"").is_err());
        assert!(extract_pdf_pages(b"definitely not a pdf").is_err());
    }
}

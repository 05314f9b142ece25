//! Document normalization: extracted pages → one ordered text stream.
//!
//! Each page contributes its running body text first, then its tables.
//! Tables are rendered as tab-separated rows under a generated
//! `# Page N – Table M` header so the model can tell cells apart from prose.

/// A table extracted from a page; `None` marks a cell with no text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Text and tables of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    /// 1-based page number.
    pub number: usize,
    /// Running body text as extracted.
    pub text: String,
    /// Tables in detection order.
    pub tables: Vec<Table>,
}

/// Join every page into one string, preserving reading order.
///
/// Pages are emitted in increasing page-number order regardless of the
/// order of `pages`. Returns an empty string when nothing was extracted;
/// deciding whether that is fatal is up to the caller.
pub fn normalize_pages(pages: &[PageContent]) -> String {
    let mut ordered: Vec<&PageContent> = pages.iter().collect();
    ordered.sort_by_key(|p| p.number);

    let mut parts: Vec<String> = Vec::new();
    for page in ordered {
        if !page.text.trim().is_empty() {
            parts.push(page.text.clone());
        }

        for (t, table) in page.tables.iter().enumerate() {
            if table.is_empty() {
                continue;
            }
            parts.push(table_header(page.number, t + 1));
            parts.extend(table.rows.iter().map(|row| render_row(row)));
        }
    }

    parts.join("\n")
}

/// Trimmed, non-blank lines of a normalized document.
pub fn significant_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

fn table_header(page: usize, table: usize) -> String {
    format!("\n# Page {page} – Table {table}")
}

fn render_row(row: &[Option<String>]) -> String {
    row.iter()
        .map(|cell| cell.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn body_text_precedes_tables() {
        let pages = vec![PageContent {
            number: 1,
            text: "Prescription list".into(),
            tables: vec![Table::new(vec![
                vec![cell("Drug"), cell("Dose")],
                vec![cell("Metformin"), None],
            ])],
        }];
        let out = normalize_pages(&pages);
        assert_eq!(
            out,
            "Prescription list\n\n# Page 1 – Table 1\nDrug\tDose\nMetformin\t"
        );
    }

    #[test]
    fn pages_are_ordered_by_number() {
        let pages = vec![
            PageContent {
                number: 2,
                text: "second".into(),
                tables: vec![],
            },
            PageContent {
                number: 1,
                text: "first".into(),
                tables: vec![],
            },
        ];
        assert_eq!(normalize_pages(&pages), "first\nsecond");
    }

    #[test]
    fn blank_text_is_skipped_but_tables_kept() {
        let pages = vec![PageContent {
            number: 3,
            text: "  \n ".into(),
            tables: vec![
                Table::default(),
                Table::new(vec![vec![cell("Aspirin"), cell("81mg")]]),
            ],
        }];
        let out = normalize_pages(&pages);
        // Empty first table is skipped but still counts toward the index.
        assert_eq!(out, "\n# Page 3 – Table 2\nAspirin\t81mg");
    }

    #[test]
    fn empty_document_yields_empty_string() {
        assert_eq!(normalize_pages(&[]), "");
        let pages = vec![PageContent {
            number: 1,
            ..Default::default()
        }];
        assert_eq!(normalize_pages(&pages), "");
    }

    #[test]
    fn significant_lines_trim_and_drop_blanks() {
        let lines = significant_lines("  a \n\n\t\nb\n  c");
        assert_eq!(lines, vec!["a", "b", "c"]);
    }
}

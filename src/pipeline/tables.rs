//! Table detection from positioned text.
//!
//! pdfium exposes text as segments with bounding boxes but has no notion of
//! tables. We rebuild them geometrically:
//!
//! 1. boxes whose vertical centres fall inside the same band form a line;
//! 2. inside a line, a horizontal gap wider than the line height starts a
//!    new cell;
//! 3. two or more consecutive lines with at least two cells form a table;
//! 4. cell left edges are clustered across the table into column anchors,
//!    so a row that lacks a cell gets a `None` hole in that column.
//!
//! Coordinates follow PDF conventions: points, y grows upwards.

use super::normalize::Table;

const MIN_COLUMNS: usize = 2;
const MIN_ROWS: usize = 2;
/// Left edges closer than this (in points) belong to the same column.
const COLUMN_TOLERANCE: f32 = 6.0;

/// A run of text and its bounding box on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl TextBox {
    pub fn new(text: impl Into<String>, left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            text: text.into(),
            left,
            right,
            top,
            bottom,
        }
    }

    fn centre_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    fn height(&self) -> f32 {
        (self.top - self.bottom).abs()
    }
}

#[derive(Debug, Clone)]
struct Cell {
    text: String,
    left: f32,
}

/// Find tables among the text boxes of one page, top to bottom.
pub fn detect_tables(boxes: &[TextBox]) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut run: Vec<Vec<Cell>> = Vec::new();

    for line in group_lines(boxes) {
        let cells = split_cells(&line);
        if cells.len() >= MIN_COLUMNS {
            run.push(cells);
        } else {
            flush_run(&mut run, &mut tables);
        }
    }
    flush_run(&mut run, &mut tables);

    tables
}

fn flush_run(run: &mut Vec<Vec<Cell>>, tables: &mut Vec<Table>) {
    if run.len() >= MIN_ROWS {
        tables.push(align_columns(run));
    }
    run.clear();
}

/// Group boxes into lines, top line first, boxes left to right.
fn group_lines(boxes: &[TextBox]) -> Vec<Vec<&TextBox>> {
    let mut sorted: Vec<&TextBox> = boxes.iter().filter(|b| !b.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| b.centre_y().total_cmp(&a.centre_y()));

    let mut lines: Vec<Vec<&TextBox>> = Vec::new();
    for b in sorted {
        match lines.last_mut() {
            Some(line) if same_band(line[0], b) => line.push(b),
            _ => lines.push(vec![b]),
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.left.total_cmp(&b.left));
    }
    lines
}

fn same_band(anchor: &TextBox, b: &TextBox) -> bool {
    let (lo, hi) = if anchor.bottom <= anchor.top {
        (anchor.bottom, anchor.top)
    } else {
        (anchor.top, anchor.bottom)
    };
    let c = b.centre_y();
    c >= lo && c <= hi
}

fn split_cells(line: &[&TextBox]) -> Vec<Cell> {
    let height = line
        .iter()
        .map(|b| b.height())
        .fold(0.0_f32, f32::max)
        .max(1.0);

    let mut cells: Vec<Cell> = Vec::new();
    let mut last_right = f32::NEG_INFINITY;
    for b in line {
        let text = b.text.trim();
        match cells.last_mut() {
            Some(cell) if b.left - last_right <= height => {
                cell.text.push(' ');
                cell.text.push_str(text);
            }
            _ => cells.push(Cell {
                text: text.to_string(),
                left: b.left,
            }),
        }
        last_right = last_right.max(b.right);
    }
    cells
}

fn align_columns(rows: &[Vec<Cell>]) -> Table {
    let mut lefts: Vec<f32> = rows.iter().flatten().map(|c| c.left).collect();
    lefts.sort_by(f32::total_cmp);

    let mut anchors: Vec<f32> = Vec::new();
    for left in lefts {
        match anchors.last() {
            Some(&a) if left - a <= COLUMN_TOLERANCE => {}
            _ => anchors.push(left),
        }
    }

    let rows = rows
        .iter()
        .map(|cells| {
            let mut row: Vec<Option<String>> = vec![None; anchors.len()];
            for cell in cells {
                let col = nearest_anchor(&anchors, cell.left);
                match &mut row[col] {
                    Some(existing) => {
                        existing.push(' ');
                        existing.push_str(&cell.text);
                    }
                    slot => *slot = Some(cell.text.clone()),
                }
            }
            row
        })
        .collect();

    Table::new(rows)
}

fn nearest_anchor(anchors: &[f32], left: f32) -> usize {
    anchors
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (left - **a).abs().total_cmp(&(left - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

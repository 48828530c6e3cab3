use super::types::{Line, TableBlock};
use crate::pipeline_config::LayoutConfig;

/// Find runs of aligned body lines and rebuild them as tables.
///
/// Adjacent line pairs are compared left to right. A heading on either side
/// of a pair ends the current run. Runs shorter than `min_table_rows` are
/// discarded. Lines that end up in a table get `in_table = true`.
///
/// Best-effort heuristic: thresholds come from `LayoutConfig` and were tuned
/// on a small corpus.
pub fn detect_tables(lines: &mut [Line], config: &LayoutConfig) -> Vec<TableBlock> {
    let mut tables = Vec::new();
    let mut run: Vec<usize> = Vec::new();

    for i in 1..lines.len() {
        let prev = &lines[i - 1];
        let current = &lines[i];

        if prev.is_heading || current.is_heading {
            flush_run(lines, &mut run, &mut tables, config);
            continue;
        }

        if continues_table(prev, current, config) {
            if run.is_empty() {
                run.push(i - 1);
            }
            run.push(i);
        } else {
            flush_run(lines, &mut run, &mut tables, config);
        }
    }
    flush_run(lines, &mut run, &mut tables, config);

    if !tables.is_empty() {
        tracing::debug!(
            tables = tables.len(),
            rows = tables.iter().map(|t| t.rows.len()).sum::<usize>(),
            "Tables detected"
        );
    }

    tables
}

/// Share of positions in `prev` that have a counterpart in `next`,
/// normalized by the shorter line.
pub fn alignment_score(prev: &Line, next: &Line, tolerance: f64) -> f64 {
    let shorter = prev.word_count().min(next.word_count());
    if shorter == 0 {
        return 0.0;
    }
    let matched = prev
        .words
        .iter()
        .filter(|a| {
            next.words
                .iter()
                .any(|b| (a.center_x - b.center_x).abs() <= tolerance)
        })
        .count();
    matched as f64 / shorter as f64
}

fn continues_table(prev: &Line, next: &Line, config: &LayoutConfig) -> bool {
    prev.word_count() > config.min_row_words
        && prev.word_count().abs_diff(next.word_count()) <= config.max_word_count_delta
        && alignment_score(prev, next, config.column_tolerance) > config.min_alignment_score
}

fn flush_run(
    lines: &mut [Line],
    run: &mut Vec<usize>,
    tables: &mut Vec<TableBlock>,
    config: &LayoutConfig,
) {
    let indices = std::mem::take(run);
    if indices.len() < config.min_table_rows {
        return;
    }

    let table = build_table(lines, indices, config.column_tolerance);
    for &i in &table.line_indices {
        lines[i].in_table = true;
    }
    tables.push(table);
}

fn build_table(lines: &[Line], line_indices: Vec<usize>, tolerance: f64) -> TableBlock {
    let mut positions: Vec<f64> = line_indices
        .iter()
        .flat_map(|&i| lines[i].words.iter().map(|w| w.center_x))
        .collect();
    let column_positions = cluster_columns(&mut positions, tolerance);

    let rows: Vec<Vec<String>> = line_indices
        .iter()
        .map(|&i| assign_cells(&lines[i], &column_positions))
        .collect();
    let rendered_text = render_rows(&rows);

    TableBlock {
        rows,
        column_positions,
        rendered_text,
        line_indices,
    }
}

/// Greedy 1-D clustering over sorted positions. A new column starts when a
/// position is at least `tolerance` away from the last one added; each
/// column sits at the mean of its cluster.
pub fn cluster_columns(positions: &mut [f64], tolerance: f64) -> Vec<f64> {
    positions.sort_by(|a, b| a.total_cmp(b));

    let mut columns = Vec::new();
    let mut cluster: Vec<f64> = Vec::new();
    for &x in positions.iter() {
        if let Some(&last) = cluster.last() {
            if x - last >= tolerance {
                columns.push(mean(&cluster));
                cluster.clear();
            }
        }
        cluster.push(x);
    }
    if !cluster.is_empty() {
        columns.push(mean(&cluster));
    }
    columns
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Put every word of the row into its nearest column. Words landing in the
/// same column are space-joined in left-to-right order.
fn assign_cells(line: &Line, columns: &[f64]) -> Vec<String> {
    let mut cells = vec![String::new(); columns.len()];
    for word in &line.words {
        let Some(nearest) = nearest_column(word.center_x, columns) else {
            continue;
        };
        let cell = &mut cells[nearest];
        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(&word.text);
    }
    cells
}

fn nearest_column(x: f64, columns: &[f64]) -> Option<usize> {
    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
        .map(|(i, _)| i)
}

/// Fixed-width rendering: columns left-justified to their widest cell and
/// separated by two spaces.
pub fn render_rows(rows: &[Vec<String>]) -> String {
    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..column_count)
        .map(|c| {
            rows.iter()
                .filter_map(|r| r.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::types::{BoundingBox, WordToken};

    /// Line whose words are centered on the given x positions.
    fn row(y: f64, cells: &[(&str, f64)]) -> Line {
        let words = cells
            .iter()
            .enumerate()
            .map(|(i, (text, cx))| {
                WordToken::new(
                    text,
                    BoundingBox { x1: cx - 0.02, y1: y, x2: cx + 0.02, y2: y + 0.02 },
                    0,
                    0,
                    i,
                )
            })
            .collect();
        Line::from_words(words)
    }

    fn heading(y: f64, text: &str) -> Line {
        let mut line = row(y, &[(text, 0.1)]);
        line.is_heading = true;
        line
    }

    fn grid() -> Vec<Line> {
        vec![
            row(0.10, &[("a1", 0.1), ("b1", 0.4), ("c1", 0.7)]),
            row(0.15, &[("a2", 0.1), ("b2", 0.4), ("c2", 0.7)]),
            row(0.20, &[("a3", 0.1), ("b3", 0.4), ("c3", 0.7)]),
        ]
    }

    #[test]
    fn three_by_three_grid_is_one_table_with_three_columns() {
        let mut lines = grid();
        let tables = detect_tables(&mut lines, &LayoutConfig::default());

        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.column_positions.len(), 3);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1], vec!["a2", "b2", "c2"]);
        assert_eq!(table.line_indices, vec![0, 1, 2]);
        assert!(lines.iter().all(|l| l.in_table));
    }

    #[test]
    fn column_positions_are_cluster_means() {
        let mut xs = vec![0.405, 0.1, 0.7, 0.395, 0.11, 0.69];
        let columns = cluster_columns(&mut xs, 0.03);
        assert_eq!(columns.len(), 3);
        assert!((columns[0] - 0.105).abs() < 1e-9);
        assert!((columns[1] - 0.4).abs() < 1e-9);
        assert!((columns[2] - 0.695).abs() < 1e-9);
    }

    #[test]
    fn clustering_compares_with_last_added_position() {
        // Steps of 0.02 chain into one cluster even though the ends are 0.06 apart.
        let mut xs = vec![0.10, 0.12, 0.14, 0.16];
        assert_eq!(cluster_columns(&mut xs, 0.03).len(), 1);
    }

    #[test]
    fn heading_splits_runs() {
        let mut lines = grid();
        lines.insert(1, heading(0.12, "SKAT"));
        let tables = detect_tables(&mut lines, &LayoutConfig::default());

        // Row 0 is isolated above the heading; rows 2 and 3 still form a table.
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].line_indices, vec![2, 3]);
        assert!(!lines[0].in_table);
        assert!(!lines[1].in_table);
    }

    #[test]
    fn two_word_lines_never_start_a_table() {
        let mut lines = vec![
            row(0.10, &[("Navn", 0.1), ("Jensen", 0.4)]),
            row(0.15, &[("Afdeling", 0.1), ("Kirurgi", 0.4)]),
        ];
        assert!(detect_tables(&mut lines, &LayoutConfig::default()).is_empty());
        assert!(lines.iter().all(|l| !l.in_table));
    }

    #[test]
    fn misaligned_lines_are_not_a_table() {
        let mut lines = vec![
            row(0.10, &[("a", 0.1), ("b", 0.4), ("c", 0.7)]),
            row(0.15, &[("d", 0.25), ("e", 0.55), ("f", 0.85)]),
        ];
        assert!(detect_tables(&mut lines, &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn word_count_jump_breaks_run() {
        let mut lines = vec![
            row(0.10, &[("a", 0.1), ("b", 0.3), ("c", 0.5), ("d", 0.7), ("e", 0.9)]),
            row(0.15, &[("f", 0.1), ("g", 0.3), ("h", 0.5)]),
        ];
        assert!(detect_tables(&mut lines, &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn alignment_score_uses_shorter_line() {
        let prev = row(0.10, &[("a", 0.1), ("b", 0.4), ("c", 0.7)]);
        let next = row(0.15, &[("d", 0.1), ("e", 0.41)]);
        assert!((alignment_score(&prev, &next, 0.03) - 1.0).abs() < 1e-9);

        let empty = Line::from_words(Vec::new());
        assert_eq!(alignment_score(&prev, &empty, 0.03), 0.0);
    }

    #[test]
    fn words_sharing_a_column_are_joined() {
        let mut lines = vec![
            row(0.10, &[("Tekst", 0.1), ("Antal", 0.4), ("Beløb", 0.7)]),
            row(0.15, &[("Fast", 0.09), ("løn", 0.12), ("1", 0.4), ("24559.41", 0.7)]),
        ];
        let tables = detect_tables(&mut lines, &LayoutConfig::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[1], vec!["Fast løn", "1", "24559.41"]);
    }

    #[test]
    fn rendering_pads_to_widest_cell() {
        let rows = vec![
            vec!["Grundløn".to_string(), "24559.41".to_string(), "kr".to_string()],
            vec!["Tillæg".to_string(), "1751.08".to_string(), String::new()],
        ];
        assert_eq!(render_rows(&rows), "Grundløn  24559.41  kr\nTillæg    1751.08");
    }

    #[test]
    fn empty_input_yields_no_tables() {
        let mut lines: Vec<Line> = Vec::new();
        assert!(detect_tables(&mut lines, &LayoutConfig::default()).is_empty());
    }
}

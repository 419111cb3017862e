//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `reporag search` | `render_results_table()` |
//! | `reporag ask` | `render_sources_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};
use reporag_core::{ScoredCandidate, Source};

use super::format::{one_line, truncate_str};

/// Render the final ranking of `reporag search`.
///
/// ```text
/// #   FILE                 LINES   CATEGORY   SCORE   PREVIEW
/// 1   src/auth/login.py    1-40    code       0.912   def login(user, password): ...
/// ```
pub fn render_results_table(candidates: &[ScoredCandidate]) -> String {
    if candidates.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("FILE"),
        Cell::new("LINES"),
        Cell::new("CATEGORY"),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("PREVIEW"),
    ]);

    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(3)),  // #
        ColumnConstraint::LowerBoundary(Width::Fixed(20)), // FILE
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // LINES
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // CATEGORY
        ColumnConstraint::LowerBoundary(Width::Fixed(7)),  // SCORE
    ]);

    for (rank, candidate) in candidates.iter().enumerate() {
        let metadata = &candidate.chunk.metadata;
        table.add_row(vec![
            Cell::new(rank + 1).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(metadata.file_path().unwrap_or("unknown"), 40)),
            Cell::new(candidate.chunk.line_span()),
            Cell::new(metadata.category().unwrap_or("-")),
            Cell::new(format!("{:.3}", candidate.score)).set_alignment(CellAlignment::Right),
            Cell::new(one_line(&candidate.chunk.text, 48)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render answer sources for `reporag ask`.
///
/// ```text
/// FILE                 LINES   CATEGORY   SCORE   SIMILARITY
/// src/auth/login.py    1-40    code       0.912   0.820
/// ```
pub fn render_sources_table(sources: &[Source]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("FILE"),
        Cell::new("LINES"),
        Cell::new("CATEGORY"),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("SIMILARITY").set_alignment(CellAlignment::Right),
    ]);

    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(20)), // FILE
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // LINES
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // CATEGORY
        ColumnConstraint::LowerBoundary(Width::Fixed(7)),  // SCORE
        ColumnConstraint::LowerBoundary(Width::Fixed(10)), // SIMILARITY
    ]);

    for source in sources {
        let similarity = source
            .semantic_score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(truncate_str(&source.file, 40)),
            Cell::new(&source.lines),
            Cell::new(&source.category),
            Cell::new(format!("{:.3}", source.score)).set_alignment(CellAlignment::Right),
            Cell::new(similarity).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

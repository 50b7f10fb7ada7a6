use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::models::RawRow;

/// Tables the portal tags with this class hold the recent assignment grades.
const GRADE_TABLE: &str = "table.portalTable";

#[derive(Debug, Clone, Copy)]
struct Column {
    index: usize,
    name: &'static str,
}

const DATE_MAGNITUDE: Column = Column { index: 0, name: "date magnitude" };
const DATE_UNIT: Column = Column { index: 1, name: "date unit" };
const COURSE: Column = Column { index: 2, name: "course" };
const ASSIGNMENT: Column = Column { index: 3, name: "assignment" };
const GRADE: Column = Column { index: 6, name: "grade" };

/// The row did not have the shape the grades table is expected to have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRowError {
    #[error("row {row}: missing column {column} ({name}), found {found} cells")]
    MissingColumn {
        row: usize,
        column: usize,
        name: &'static str,
        found: usize,
    },
    #[error("row {row}: assignment cell has no link")]
    MissingLink { row: usize },
    #[error("row {row}: date magnitude {text:?} is not a whole number")]
    BadMagnitude { row: usize, text: String },
}

pub struct RowExtractor {
    table: Selector,
    body: Selector,
    row: Selector,
    link: Selector,
}

impl Default for RowExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RowExtractor {
    pub fn new() -> Self {
        Self {
            table: Selector::parse(GRADE_TABLE).expect("static selector"),
            body: Selector::parse("tbody").expect("static selector"),
            row: Selector::parse("tr").expect("static selector"),
            link: Selector::parse("a").expect("static selector"),
        }
    }

    /// Walk every grade table body row in page order.
    ///
    /// Rows are numbered from zero across all grade tables; a malformed row
    /// is reported as an error item and the walk carries on with the next one.
    pub fn rows<'a>(
        &'a self,
        page: &'a Html,
    ) -> impl Iterator<Item = Result<RawRow, MalformedRowError>> + 'a {
        page.select(&self.table)
            .flat_map(move |table| table.select(&self.body))
            .flat_map(move |body| body.select(&self.row))
            .enumerate()
            .map(move |(index, row)| self.read_row(index, row))
    }

    fn read_row(&self, index: usize, row: ElementRef<'_>) -> Result<RawRow, MalformedRowError> {
        let cells: Vec<ElementRef<'_>> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "td")
            .collect();

        let cell = |column: Column| {
            cells
                .get(column.index)
                .copied()
                .ok_or(MalformedRowError::MissingColumn {
                    row: index,
                    column: column.index,
                    name: column.name,
                    found: cells.len(),
                })
        };

        let magnitude_text = cell_text(cell(DATE_MAGNITUDE)?);
        let date_magnitude =
            magnitude_text
                .parse::<u32>()
                .map_err(|_| MalformedRowError::BadMagnitude {
                    row: index,
                    text: magnitude_text.clone(),
                })?;

        let assignment = cell(ASSIGNMENT)?
            .select(&self.link)
            .next()
            .map(cell_text)
            .ok_or(MalformedRowError::MissingLink { row: index })?;

        Ok(RawRow {
            date_magnitude,
            date_unit: cell_text(cell(DATE_UNIT)?),
            course: cell_text(cell(COURSE)?),
            assignment,
            grade_text: cell_text(cell(GRADE)?),
        })
    }
}

/// Visible text of an element with runs of whitespace (including &nbsp;)
/// collapsed to single spaces.
fn cell_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

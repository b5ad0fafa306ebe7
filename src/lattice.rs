use std::collections::BTreeMap;

use tracing::debug;

use crate::layout::{PageLayout, Segment, TextFragment};
use crate::model::RawTable;

// Largest deviation from horizontal/vertical still read as a ruling, and the
// gap tolerated where two rulings meet.
const RULING_TOLERANCE: f32 = 2.0;
// Rulings shorter than this are glyph strokes or decoration, not cell borders.
const MIN_RULING_LENGTH: f32 = 4.0;
// Ruling positions closer than this are the same grid line.
const GRID_SNAP: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ruling {
    orientation: Orientation,
    position: f32,
    start: f32,
    end: f32,
}

impl Ruling {
    fn from_segment(segment: &Segment) -> Option<Self> {
        let dx = (segment.x1 - segment.x0).abs();
        let dy = (segment.y1 - segment.y0).abs();
        if dy <= RULING_TOLERANCE && dx >= MIN_RULING_LENGTH {
            return Some(Self {
                orientation: Orientation::Horizontal,
                position: (segment.y0 + segment.y1) / 2.0,
                start: segment.x0.min(segment.x1),
                end: segment.x0.max(segment.x1),
            });
        }
        if dx <= RULING_TOLERANCE && dy >= MIN_RULING_LENGTH {
            return Some(Self {
                orientation: Orientation::Vertical,
                position: (segment.x0 + segment.x1) / 2.0,
                start: segment.y0.min(segment.y1),
                end: segment.y0.max(segment.y1),
            });
        }
        None
    }

    fn spans(&self, value: f32) -> bool {
        value >= self.start - RULING_TOLERANCE && value <= self.end + RULING_TOLERANCE
    }

    fn touches(&self, other: &Self) -> bool {
        if self.orientation == other.orientation {
            return (self.position - other.position).abs() <= RULING_TOLERANCE
                && self.start <= other.end + RULING_TOLERANCE
                && other.start <= self.end + RULING_TOLERANCE;
        }
        self.spans(other.position) && other.spans(self.position)
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = index;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, left: usize, right: usize) {
        let left = self.find(left);
        let right = self.find(right);
        if left != right {
            self.parent[right] = left;
        }
    }
}

fn group_rulings(rulings: &[Ruling]) -> Vec<Vec<Ruling>> {
    let mut set = DisjointSet::new(rulings.len());
    for left in 0..rulings.len() {
        for right in (left + 1)..rulings.len() {
            if rulings[left].touches(&rulings[right]) {
                set.union(left, right);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<Ruling>> = BTreeMap::new();
    for (index, ruling) in rulings.iter().enumerate() {
        groups.entry(set.find(index)).or_default().push(*ruling);
    }
    groups.into_values().collect()
}

fn snap_positions(mut values: Vec<f32>) -> Vec<f32> {
    values.sort_by(f32::total_cmp);
    let mut snapped: Vec<f32> = Vec::new();
    for value in values {
        match snapped.last() {
            Some(last) if value - *last <= GRID_SNAP => {}
            _ => snapped.push(value),
        }
    }
    snapped
}

#[derive(Debug, Clone, PartialEq)]
struct Grid {
    rows: Vec<f32>,
    columns: Vec<f32>,
}

impl Grid {
    fn from_rulings(rulings: &[Ruling]) -> Option<Self> {
        let positions = |orientation| {
            rulings
                .iter()
                .filter(|ruling| ruling.orientation == orientation)
                .map(|ruling| ruling.position)
                .collect::<Vec<_>>()
        };

        let mut rows = snap_positions(positions(Orientation::Horizontal));
        rows.reverse();
        let columns = snap_positions(positions(Orientation::Vertical));
        if rows.len() < 2 || columns.len() < 2 {
            return None;
        }
        Some(Self { rows, columns })
    }

    fn top(&self) -> f32 {
        self.rows[0]
    }

    fn cell_of(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let row = self
            .rows
            .windows(2)
            .position(|pair| y <= pair[0] && y >= pair[1])?;
        let column = self
            .columns
            .windows(2)
            .position(|pair| x >= pair[0] && x <= pair[1])?;
        Some((row, column))
    }

    fn fill(&self, page: u32, fragments: &[TextFragment]) -> RawTable {
        let mut cells: BTreeMap<(usize, usize), Vec<&TextFragment>> = BTreeMap::new();
        for fragment in fragments {
            let (x, y) = anchor(fragment);
            if let Some(cell) = self.cell_of(x, y) {
                cells.entry(cell).or_default().push(fragment);
            }
        }

        let mut rows = vec![vec![String::new(); self.columns.len() - 1]; self.rows.len() - 1];
        for ((row, column), mut parts) in cells {
            parts.sort_by(|left, right| right.y.total_cmp(&left.y).then(left.x.total_cmp(&right.x)));
            rows[row][column] = parts
                .iter()
                .map(|fragment| fragment.text.trim())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }

        RawTable::new(page, rows)
    }
}

// A point safely inside the first glyph: just right of the start and a third
// of the font size above the baseline.
fn anchor(fragment: &TextFragment) -> (f32, f32) {
    let lift = if fragment.font_size > 0.0 {
        fragment.font_size * 0.3
    } else {
        1.0
    };
    (fragment.x + 0.5, fragment.y + lift)
}

pub(crate) fn detect_lattice_tables(layout: &PageLayout) -> Vec<RawTable> {
    let rulings = layout
        .segments
        .iter()
        .filter_map(Ruling::from_segment)
        .collect::<Vec<_>>();

    let mut grids = group_rulings(&rulings)
        .iter()
        .filter_map(|group| Grid::from_rulings(group))
        .collect::<Vec<_>>();
    grids.sort_by(|left, right| right.top().total_cmp(&left.top()));

    debug!(
        page = layout.page_number,
        rulings = rulings.len(),
        tables = grids.len(),
        "lattice detection finished"
    );

    grids
        .iter()
        .map(|grid| grid.fill(layout.page_number, &layout.fragments))
        .collect()
}

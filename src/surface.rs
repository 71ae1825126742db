//! The seam between the reconciler and whatever renders rows.

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub rank: u32,
    /// 0 for the first row at a rank, 1 for the second tied row, and so on.
    pub occurrence: u32,
}

impl RowKey {
    pub fn new(rank: u32, occurrence: u32) -> Self {
        Self { rank, occurrence }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Growth {
    Up,
    Down,
    Same,
}

impl Growth {
    pub fn from_change(change: Option<f64>) -> Self {
        match change {
            Some(change) if change > 0.0 => Growth::Up,
            Some(change) if change < 0.0 => Growth::Down,
            _ => Growth::Same,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Growth::Up => "up",
            Growth::Down => "down",
            Growth::Same => "same",
        }
    }
}

/// Everything a rendered row shows. Two equal contents render identically.
#[derive(Clone, Debug, PartialEq)]
pub struct RowContent {
    pub rank: String,
    pub icon: String,
    pub name: String,
    pub points: String,
    pub reward: String,
    pub growth: Growth,
    pub is_member: bool,
    pub shared_rank: bool,
    pub is_last: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

pub trait RowSurface {
    type Row: Clone;

    fn create_row(&mut self, key: RowKey, content: &RowContent) -> Self::Row;
    /// Inserts `row` right after `anchor`, or appends when `anchor` is `None`.
    fn insert_after(&mut self, row: &Self::Row, anchor: Option<&Self::Row>);
    fn insert_before(&mut self, row: &Self::Row, next: &Self::Row);
    fn patch_row(&mut self, row: &Self::Row, content: &RowContent);
    fn remove_row(&mut self, row: &Self::Row);
    /// Row position in viewport coordinates.
    fn row_rect(&self, row: &Self::Row) -> Option<Rect>;
    /// Scroll container position in viewport coordinates.
    fn container_rect(&self) -> Option<Rect>;
}

#[derive(Clone, Debug)]
struct MemoryRow {
    id: u64,
    key: RowKey,
    content: RowContent,
}

/// In-memory row list with fixed row height, used by the headless host and
/// in tests. Every structural change or patch counts as one mutation.
#[derive(Debug)]
pub struct MemorySurface {
    rows: Vec<MemoryRow>,
    detached: Vec<MemoryRow>,
    next_id: u64,
    mutations: usize,
    row_height: f64,
    container: Rect,
    scroll_top: f64,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new(40.0, Rect { top: 0.0, bottom: 400.0 })
    }
}

impl MemorySurface {
    pub fn new(row_height: f64, container: Rect) -> Self {
        Self {
            rows: Vec::new(),
            detached: Vec::new(),
            next_id: 1,
            mutations: 0,
            row_height,
            container,
            scroll_top: 0.0,
        }
    }

    pub fn mutations(&self) -> usize {
        self.mutations
    }

    pub fn scroll_to(&mut self, scroll_top: f64) {
        self.scroll_top = scroll_top;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> Vec<RowKey> {
        self.rows.iter().map(|row| row.key).collect()
    }

    pub fn contents(&self) -> Vec<RowContent> {
        self.rows.iter().map(|row| row.content.clone()).collect()
    }

    pub fn row_ids(&self) -> Vec<u64> {
        self.rows.iter().map(|row| row.id).collect()
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    fn take_detached(&mut self, id: u64) -> Option<MemoryRow> {
        let index = self.detached.iter().position(|row| row.id == id)?;
        Some(self.detached.remove(index))
    }
}

impl RowSurface for MemorySurface {
    type Row = u64;

    fn create_row(&mut self, key: RowKey, content: &RowContent) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.detached.push(MemoryRow {
            id,
            key,
            content: content.clone(),
        });
        id
    }

    fn insert_after(&mut self, row: &u64, anchor: Option<&u64>) {
        let Some(new_row) = self.take_detached(*row) else {
            return;
        };
        self.mutations += 1;
        match anchor.and_then(|anchor| self.position(*anchor)) {
            Some(index) => self.rows.insert(index + 1, new_row),
            None => self.rows.push(new_row),
        }
    }

    fn insert_before(&mut self, row: &u64, next: &u64) {
        let Some(new_row) = self.take_detached(*row) else {
            return;
        };
        self.mutations += 1;
        match self.position(*next) {
            Some(index) => self.rows.insert(index, new_row),
            None => self.rows.push(new_row),
        }
    }

    fn patch_row(&mut self, row: &u64, content: &RowContent) {
        if let Some(index) = self.position(*row) {
            self.rows[index].content = content.clone();
            self.mutations += 1;
        }
    }

    fn remove_row(&mut self, row: &u64) {
        if let Some(index) = self.position(*row) {
            self.rows.remove(index);
            self.mutations += 1;
        }
    }

    fn row_rect(&self, row: &u64) -> Option<Rect> {
        let index = self.position(*row)?;
        let top = self.container.top + index as f64 * self.row_height - self.scroll_top;
        Some(Rect {
            top,
            bottom: top + self.row_height,
        })
    }

    fn container_rect(&self) -> Option<Rect> {
        Some(self.container)
    }
}

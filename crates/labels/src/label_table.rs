//! Dense 64K table from address to label names.
//!
//! After [`LabelTable::calculate_offsets`] every address without a label
//! points back to the nearest lower address that has one, so
//! "label + offset" lookups need no search.

/// One cell of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LabelCell {
    /// No label here and none below.
    #[default]
    Empty,
    /// Labels defined exactly at this address.
    Labels(Vec<String>),
    /// Distance to the nearest lower address with labels.
    OffsetFrom(u16),
}

/// Labels for every 64K address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    cells: Box<[LabelCell]>,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: vec![LabelCell::Empty; 0x1_0000].into_boxed_slice(),
        }
    }

    /// Removes all labels and offsets.
    pub fn clear(&mut self) {
        self.cells.fill(LabelCell::Empty);
    }

    /// Adds `label` at `addr` unless it is already there.
    ///
    /// Offsets calculated earlier are overwritten.
    pub fn add(&mut self, addr: u16, label: &str) {
        let cell = &mut self.cells[usize::from(addr)];
        match cell {
            LabelCell::Labels(labels) => {
                if !labels.iter().any(|l| l == label) {
                    labels.push(label.to_string());
                }
            }
            LabelCell::Empty | LabelCell::OffsetFrom(_) => {
                *cell = LabelCell::Labels(vec![label.to_string()]);
            }
        }
    }

    /// Cell at `addr`.
    #[must_use]
    pub fn cell(&self, addr: u16) -> &LabelCell {
        &self.cells[usize::from(addr)]
    }

    /// Labels defined exactly at `addr`.
    #[must_use]
    pub fn labels_at(&self, addr: u16) -> &[String] {
        match self.cell(addr) {
            LabelCell::Labels(labels) => labels,
            LabelCell::Empty | LabelCell::OffsetFrom(_) => &[],
        }
    }

    /// Fills the gaps after each labelled address with back offsets.
    pub fn calculate_offsets(&mut self) {
        let mut offset: Option<u16> = None;
        for cell in self.cells.iter_mut() {
            match cell {
                LabelCell::Labels(_) => offset = Some(1),
                LabelCell::Empty | LabelCell::OffsetFrom(_) => {
                    *cell = offset.map_or(LabelCell::Empty, LabelCell::OffsetFrom);
                    offset = offset.map(|o| o.wrapping_add(1));
                }
            }
        }
    }

    /// Labels at `addr`, or labels of the nearest lower address with `+offset`
    /// appended.
    #[must_use]
    pub fn labels_plus_index(&self, addr: u16) -> Vec<String> {
        match self.cell(addr) {
            LabelCell::Labels(labels) => labels.clone(),
            LabelCell::OffsetFrom(offset) => self
                .labels_at(addr.wrapping_sub(*offset))
                .iter()
                .map(|label| format!("{label}+{offset}"))
                .collect(),
            LabelCell::Empty => Vec::new(),
        }
    }
}

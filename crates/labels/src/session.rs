//! A debug session: the target memory model, its labels and the current
//! slot configuration.

use log::debug;
use memory_model::{split_long_address, MemoryModel};

use crate::config::LabelsConfig;
use crate::error::LabelsError;
use crate::labels::Labels;

/// Names of CPU registers holding a value, provided by the debugger.
pub trait RegisterProvider {
    /// Registers whose current value equals `value`.
    fn registers_equal_to(&self, value: u16) -> Vec<String>;
}

/// Target model, labels and slots of one debug session.
#[derive(Debug, Clone)]
pub struct Session {
    model: MemoryModel,
    labels: Labels,
    slots: Vec<usize>,
}

impl Session {
    /// Builds the model and reads all list files of `config`.
    ///
    /// # Errors
    ///
    /// Fails for an invalid memory model or if any list file could not be
    /// read.
    pub fn from_config(config: &LabelsConfig) -> Result<Self, LabelsError> {
        let model = config.build_model()?;
        let mut labels = Labels::new(config.small_values_maximum);
        labels.read_list_files(config, &model)?;
        Ok(Self::new(model, labels))
    }

    /// Session over already loaded labels, with the initial slots of `model`.
    #[must_use]
    pub fn new(model: MemoryModel, labels: Labels) -> Self {
        let slots = model.initial_slots().to_vec();
        Self {
            model,
            labels,
            slots,
        }
    }

    /// The target memory model.
    #[must_use]
    pub const fn model(&self) -> &MemoryModel {
        &self.model
    }

    /// The labels.
    #[must_use]
    pub const fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Bank currently paged into each slot.
    #[must_use]
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Updates the paged banks, e.g. after the program switched banks.
    pub fn set_slots(&mut self, slots: &[usize]) {
        debug!("Slots: {slots:?}");
        self.slots = slots.to_vec();
    }

    /// Long address of `addr` with the current slots. Addresses already
    /// carrying a bank stay unchanged.
    #[must_use]
    pub fn resolve_address(&self, addr: u32) -> u32 {
        match split_long_address(addr) {
            (_, Some(_)) => addr,
            (addr16, None) => self.model.create_long_address(addr16, &self.slots),
        }
    }
}

#[cfg(test)]
mod tests {
    use memory_model::{MemoryModel, PredefinedModel};

    use super::Session;
    use crate::labels::Labels;

    #[test]
    fn resolves_with_current_slots() {
        let model = MemoryModel::predefined(PredefinedModel::Zx128k).unwrap();
        let mut session = Session::new(model, Labels::default());
        assert_eq!(session.slots(), [8, 5, 2, 0]);
        assert_eq!(session.resolve_address(0xC000), 0x1_C000);
        session.set_slots(&[8, 5, 2, 7]);
        assert_eq!(session.resolve_address(0xC000), 0x8_C000);
        assert_eq!(session.resolve_address(0x4000), 0x6_4000);
        assert_eq!(session.resolve_address(0x3_C000), 0x3_C000);
    }
}

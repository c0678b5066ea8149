use serde::{Deserialize, Serialize};

const FULL_HEADER: [&str; 5] = ["Name", "Normal", "Bacterial", "Viral", "COVID-19"];
const COMBINED_HEADER: [&str; 4] = ["Name", "Normal", "Pneumonia", "COVID-19"];
const BINARY_HEADER: [&str; 3] = ["Name", "Non-Covid", "Covid"];

/// Which set of classes ends up in the report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassLayout {
    /// Normal, bacterial pneumonia, viral pneumonia, COVID-19.
    #[default] Full,
    /// Bacterial and viral merged into one pneumonia class.
    CombinedPneumonia,
    /// Non-covid against covid, derived from either of the above.
    Binary,
}

impl ClassLayout {
    /// The binary flag wins over the pneumonia flag.
    pub fn select(combine_pneumonia: bool, binary_eval: bool) -> Self {
        if binary_eval {
            ClassLayout::Binary
        } else if combine_pneumonia {
            ClassLayout::CombinedPneumonia
        } else {
            ClassLayout::Full
        }
    }

    pub fn header(&self) -> &'static [&'static str] {
        match self {
            ClassLayout::Full => &FULL_HEADER,
            ClassLayout::CombinedPneumonia => &COMBINED_HEADER,
            ClassLayout::Binary => &BINARY_HEADER,
        }
    }

    pub fn class_names(&self) -> &'static [&'static str] {
        &self.header()[1..]
    }

    pub fn num_classes(&self) -> usize {
        self.class_names().len()
    }

    /// Width of the raw model output before any collapse.
    pub fn model_classes(combine_pneumonia: bool) -> usize {
        if combine_pneumonia {
            COMBINED_HEADER.len() - 1
        } else {
            FULL_HEADER.len() - 1
        }
    }
}

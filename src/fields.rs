// src/fields.rs

use crate::record::{Field, InvoicePatch, InvoiceRecord};

/// The editable form.
pub trait FieldStore: Send {
    /// Overwrite every field present in `data`; absent fields keep their value.
    fn populate(&mut self, data: &InvoicePatch);

    /// Current values. `file_name` is `None` while no file is selected.
    fn collect(&self) -> InvoiceRecord;

    /// Every field back to empty, including the attached file name.
    fn reset(&mut self);

    fn set(&mut self, field: Field, value: String);

    fn attach_file(&mut self, name: Option<String>);
}

/// In-memory form state.
#[derive(Debug, Default)]
pub struct FormFields {
    values: InvoiceRecord,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FieldStore for FormFields {
    fn populate(&mut self, data: &InvoicePatch) {
        for field in Field::ALL {
            if let Some(value) = data.get(field) {
                *self.values.get_mut(field) = value.to_string();
            }
        }
    }

    fn collect(&self) -> InvoiceRecord {
        self.values.clone()
    }

    fn reset(&mut self) {
        self.values = InvoiceRecord::default();
    }

    fn set(&mut self, field: Field, value: String) {
        *self.values.get_mut(field) = value;
    }

    fn attach_file(&mut self, name: Option<String>) {
        self.values.file_name = name;
    }
}

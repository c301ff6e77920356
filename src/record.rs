// src/record.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The editable invoice fields, in the order the save endpoint expects them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceRecord {
    pub file_name: Option<String>,
    pub supplier: String,
    pub invoice_date: String,
    pub invoice_amount: String,
    pub btw_amount: String,
    pub btw_number: String,
    pub kvk: String,
    pub notes: String,
}

impl InvoiceRecord {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Supplier => &self.supplier,
            Field::InvoiceDate => &self.invoice_date,
            Field::InvoiceAmount => &self.invoice_amount,
            Field::BtwAmount => &self.btw_amount,
            Field::BtwNumber => &self.btw_number,
            Field::Kvk => &self.kvk,
            Field::Notes => &self.notes,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Supplier => &mut self.supplier,
            Field::InvoiceDate => &mut self.invoice_date,
            Field::InvoiceAmount => &mut self.invoice_amount,
            Field::BtwAmount => &mut self.btw_amount,
            Field::BtwNumber => &mut self.btw_number,
            Field::Kvk => &mut self.kvk,
            Field::Notes => &mut self.notes,
        }
    }

    /// Every text field as a patch, used to restore a snapshot into the form.
    pub fn to_patch(&self) -> InvoicePatch {
        let mut patch = InvoicePatch::default();
        for field in Field::ALL {
            *patch.get_mut(field) = Some(self.get(field).to_string());
        }
        patch
    }
}

/// A partial [`InvoiceRecord`]. `None` means "leave the current value alone".
///
/// Values are accepted as strings, numbers or booleans; `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InvoicePatch {
    #[serde(default, deserialize_with = "lenient_text")]
    pub supplier: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub btw_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub btw_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub kvk: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: Option<String>,
}

impl InvoicePatch {
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Supplier => self.supplier.as_deref(),
            Field::InvoiceDate => self.invoice_date.as_deref(),
            Field::InvoiceAmount => self.invoice_amount.as_deref(),
            Field::BtwAmount => self.btw_amount.as_deref(),
            Field::BtwNumber => self.btw_number.as_deref(),
            Field::Kvk => self.kvk.as_deref(),
            Field::Notes => self.notes.as_deref(),
        }
    }

    fn get_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Supplier => &mut self.supplier,
            Field::InvoiceDate => &mut self.invoice_date,
            Field::InvoiceAmount => &mut self.invoice_amount,
            Field::BtwAmount => &mut self.btw_amount,
            Field::BtwNumber => &mut self.btw_number,
            Field::Kvk => &mut self.kvk,
            Field::Notes => &mut self.notes,
        }
    }

    /// Number of fields carried by the patch.
    pub fn field_count(&self) -> usize {
        Field::ALL.iter().filter(|f| self.get(**f).is_some()).count()
    }
}

/// The seven text fields of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Supplier,
    InvoiceDate,
    InvoiceAmount,
    BtwAmount,
    BtwNumber,
    Kvk,
    Notes,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Supplier,
        Field::InvoiceDate,
        Field::InvoiceAmount,
        Field::BtwAmount,
        Field::BtwNumber,
        Field::Kvk,
        Field::Notes,
    ];

    /// The wire / form name of the field.
    pub fn name(self) -> &'static str {
        match self {
            Field::Supplier => "supplier",
            Field::InvoiceDate => "invoice_date",
            Field::InvoiceAmount => "invoice_amount",
            Field::BtwAmount => "btw_amount",
            Field::BtwNumber => "btw_number",
            Field::Kvk => "kvk",
            Field::Notes => "notes",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

/// Identifier handed back by the save endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accept any JSON scalar as text; servers are not consistent about
/// sending amounts as strings.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_patch_accepts_numbers_and_null() {
        let patch: InvoicePatch = serde_json::from_str(
            r#"{"supplier": "Acme BV", "invoice_amount": 123.45, "kvk": null, "extra": 1}"#,
        )
        .unwrap();

        assert_eq!(patch.supplier.as_deref(), Some("Acme BV"));
        assert_eq!(patch.invoice_amount.as_deref(), Some("123.45"));
        assert_eq!(patch.kvk, None);
        assert_eq!(patch.field_count(), 2);
    }

    #[test]
    fn test_record_serializes_in_save_order() {
        let record = InvoiceRecord {
            supplier: "Acme".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.starts_with(r#"{"file_name":null,"supplier":"Acme","invoice_date":"""#));
        assert!(json.ends_with(r#""notes":""}"#));
    }

    #[test]
    fn test_record_missing_fields_default_empty() {
        let record: InvoiceRecord = serde_json::from_str(r#"{"kvk": "12345678"}"#).unwrap();
        assert_eq!(record.kvk, "12345678");
        assert_eq!(record.supplier, "");
        assert_eq!(record.file_name, None);
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(field.name().parse::<Field>(), Ok(field));
        }
        assert!("total".parse::<Field>().is_err());
    }

    #[test]
    fn test_to_patch_carries_every_text_field() {
        let record = InvoiceRecord {
            file_name: Some("a.pdf".into()),
            notes: "n".into(),
            ..Default::default()
        };
        let patch = record.to_patch();
        assert_eq!(patch.field_count(), 7);
        assert_eq!(patch.notes.as_deref(), Some("n"));
        assert_eq!(patch.supplier.as_deref(), Some(""));
    }
}

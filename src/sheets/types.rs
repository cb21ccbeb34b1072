use serde::{Deserialize, Serialize};

/// Subset of the spreadsheet resource returned by `spreadsheets.get`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpreadsheetMetadata {
    /// Tabs, absent for an empty field mask
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

/// One sheet (tab) of a spreadsheet
#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    /// Tab properties
    pub properties: SheetProperties,
}

/// Sheet properties; only the title is needed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetProperties {
    /// Tab title
    pub title: String,
}

/// Body of `spreadsheets.batchUpdate`
#[derive(Debug, Clone, Serialize)]
pub struct BatchUpdateRequest {
    /// Operations, applied in order
    pub requests: Vec<BatchRequest>,
}

/// A single batch update operation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    /// Add-tab operation
    pub add_sheet: AddSheetRequest,
}

/// Add a new tab with the given properties
#[derive(Debug, Clone, Serialize)]
pub struct AddSheetRequest {
    /// Properties of the new tab
    pub properties: SheetProperties,
}

/// A block of cell values, row-major
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    /// A1 range, or a bare tab name for the whole tab
    pub range: String,
    /// `ROWS` or `COLUMNS`
    pub major_dimension: String,
    /// Cell values
    pub values: Vec<Vec<String>>,
}

/// Response from `values.update`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    /// Range actually written
    pub updated_range: Option<String>,
    /// Rows written
    pub updated_rows: Option<u32>,
    /// Cells written
    pub updated_cells: Option<u32>,
}

impl SpreadsheetMetadata {
    /// Titles of all tabs, in spreadsheet order
    pub fn titles(&self) -> Vec<String> {
        self.sheets
            .iter()
            .map(|s| s.properties.title.clone())
            .collect()
    }
}

impl BatchUpdateRequest {
    /// Request that adds one tab
    pub fn add_sheet(title: impl Into<String>) -> Self {
        Self {
            requests: vec![BatchRequest {
                add_sheet: AddSheetRequest {
                    properties: SheetProperties {
                        title: title.into(),
                    },
                },
            }],
        }
    }
}

impl ValueRange {
    /// Row-major value range
    pub fn rows(range: impl Into<String>, values: Vec<Vec<String>>) -> Self {
        Self {
            range: range.into(),
            major_dimension: "ROWS".to_string(),
            values,
        }
    }
}

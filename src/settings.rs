//! Rendering and presentation settings.

use serde::Deserialize;

/// Settings consulted when values are rendered and results are shaped.
///
/// Deserializes from JSON with every key optional:
///
/// ```
/// use quarry::QuerySettings;
///
/// let settings: QuerySettings = serde_json::from_str(r#"{"render_null_as": "n/a"}"#).unwrap();
/// assert_eq!(settings.render_null_as, "n/a");
/// assert_eq!(settings.table_id_column_name, "File");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Text used when a null value is rendered
    pub render_null_as: String,
    /// strftime format for dates without a time component
    pub date_format: String,
    /// strftime format for dates with a time component
    pub date_time_format: String,
    /// Header of the identifier column in TABLE output
    pub table_id_column_name: String,
    /// Whether result shapes report how many rows they contain
    pub display_result_count: bool,
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            render_null_as: "-".to_string(),
            date_format: "%B %d, %Y".to_string(),
            date_time_format: "%-I:%M %p - %B %d, %Y".to_string(),
            table_id_column_name: "File".to_string(),
            display_result_count: true,
        }
    }
}

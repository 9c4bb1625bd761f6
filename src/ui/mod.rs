// UI and formatting module

pub mod formatters;

// Re-export commonly used items for cleaner imports
pub use formatters::{
    format_duration, format_number, print_query_set, print_report, print_series_summary,
};

pub mod handlers;

pub use handlers::{
    build_scan_options, describe_path, format_finding_line, format_severity_counts,
    initialize_database, log_level, parse_target,
};

mod file_size;

pub use file_size::format_size;

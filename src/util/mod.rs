pub mod env;
pub mod tracing;

/// Makes a game title safe to use as a file name: spaces become `_` and `:` is dropped.
pub fn safe_file_stem(name: &str) -> String {
    name.replace(' ', "_").replace(':', "")
}

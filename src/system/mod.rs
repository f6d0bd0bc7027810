pub mod logger;
pub(crate) mod settings_output;

pub(crate) use settings_output::settings_lines;

pub(crate) mod file_table;
pub(crate) mod loading;
pub(crate) mod modal;
pub(crate) mod text;

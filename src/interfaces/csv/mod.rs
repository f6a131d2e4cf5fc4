//! CSV adapters: command logs in, order and reputation reports out.

pub mod command_reader;
pub mod report_writer;

pub mod command_reader;
pub mod split_writer;

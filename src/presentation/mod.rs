// Presentation layer - Keyword facade and command line
pub mod cli;
pub mod keywords;

//! PDF recombination: merging attachment documents and printing the result.

pub mod merge;
pub mod print;

// lib.rs
pub mod alignment_record;
pub mod cigar;
pub mod coord_map;
pub mod index;
pub mod input;
pub mod query;
pub mod registry;
pub mod seqidx;

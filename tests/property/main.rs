// tests/property/main.rs

mod buckets;
mod merge;

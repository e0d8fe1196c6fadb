//! Text output: per-scope blocks for documents and the console run summary.

pub mod generator;
pub mod render;

pub use generator::generate_run_summary;
pub use render::render_blocks;

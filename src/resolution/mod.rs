pub mod conflict_resolver;
pub mod summary;

pub use conflict_resolver::{assemble_linked_rows, is_good_match, resolve_conflicts, ResolutionOutput};
pub use summary::build_summary;

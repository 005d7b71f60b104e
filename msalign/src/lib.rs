// data module
pub mod data {
    pub mod feature;
    pub mod row;
    pub mod table;
    pub mod library;
    pub mod grouping;
}

// algorithm module
pub mod algorithm {
    pub mod scoring;
    pub mod path_growing;
    pub mod stable_marriage;
    pub mod social_graph;
    pub mod social_stable;
    pub mod sequence_alignment;
    pub mod matching;
}

// alignment driver module
pub mod align {
    pub mod params;
    pub mod folder;
    pub mod library_builder;
    pub mod report;
}

pub mod error;

// Re-export commonly used types
pub use align::folder::{align_tables, MasterListFolder};
pub use align::params::{AlignParams, MatchingMethod};
pub use data::table::Table;
pub use error::{AlignError, Result};

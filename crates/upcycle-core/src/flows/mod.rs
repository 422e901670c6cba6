//! The named flows.

pub mod material_identification;
pub mod upcycling_ideas;

pub use material_identification::{
    IdentifyMaterialInput, MaterialIdentification, identify_material,
};
pub use upcycling_ideas::{
    MIN_IDEAS, SuggestUpcyclingIdeasInput, UpcyclingIdeas, suggest_upcycling_ideas,
};

// Geography Resolution (Layer 1)
// Maps free-text portal area strings onto the canonical geography tree

pub mod normalize;
pub mod resolver;

pub use normalize::{normalize_area_text, slugify};
pub use resolver::{
    GeoReferenceStore, GeoResolver, GeoResolverConfig, InMemoryGeoStore, MatchConfidence,
    Resolution,
};

//! Run input: film manifest, poster discovery, title normalization

pub mod manifest;
pub mod movie_name;
pub mod poster_scanner;

pub use manifest::{load_manifest, select_films};
pub use movie_name::clean_movie_name;
pub use poster_scanner::{attach_posters, scan_posters};

pub mod colour;
pub mod player;
pub mod reward;
pub mod trial;

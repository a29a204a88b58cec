//! Lucky Card suspicion model: trials, the player's suspicion update, the
//! softmax response model and the session driver that plays them.

pub mod data;
pub mod error;
pub mod game;
pub mod model;
pub mod response;

pub use error::ModelError;

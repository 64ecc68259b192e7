//! Text commands handled by the bots

pub mod suggestions;
pub mod voice;

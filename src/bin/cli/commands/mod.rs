pub mod add;
pub mod decks;
pub mod due;
pub mod review;
pub mod sync;
pub mod transfer;

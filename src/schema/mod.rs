//! Document shapes on both sides of the sync: what the board API returns
//! (`trello`) and what we store and serve (`data`).

pub mod data;
pub mod trello;

mod ingredients;
mod recipes;
mod relations;
mod shopping;
mod tags;
mod users;

#[cfg(test)]
mod testing;

pub use ingredients::*;
pub use recipes::*;
pub use relations::*;
pub use shopping::*;
pub use tags::*;
pub use users::*;

mod path_constraint;
mod path_sampler;
mod skeleton;

pub use path_constraint::PathConstraint;
pub use skeleton::*;



#[cfg(test)]
mod path_sampler_tests;

pub mod rules;

pub use rules::{evaluate_password, PolicyEvaluation, SPECIAL_CHARACTERS};

pub mod cli;
pub mod specificity;

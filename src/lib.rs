pub mod config;
pub mod copy_tree;
pub mod coverage;
pub mod discovery;
pub mod error;
pub mod events;
pub mod execution;
pub mod mapping;
pub mod operators;
pub mod outcome;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod position;
pub mod prepare;
pub mod rewriter;
pub mod runner;
pub mod side_effects;
pub mod skip;
pub mod sources;
pub mod state;
pub mod steps;
pub mod syntax;

//! Request descriptor compiler
//!
//! Turns the declarative strings found in UI declarations into descriptors
//! the request builders consume. Pure parse and resolve; nothing here
//! touches shared state.

pub mod grammar;
pub mod vars;

pub use grammar::{
    compile, find_alias, format_conds, parse_join_spec, parse_order_spec, CompileError, Compiled,
    Direction, JoinDescriptor, JoinKind, OrderDescriptor, ALL_PLACEHOLDER,
};
pub use vars::{
    concat_array, parse_sk_args, resolve_variable, ArgFn, ArgPool, ArgValue, ResolveContext,
    SemanticKey,
};

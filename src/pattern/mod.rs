mod reduce;
mod value;

pub use reduce::{ArgsIter, CyclicReducer, PatternReducer, ReduceControls};
pub use value::{Args, Param, Pattern, PatternMap, Value};

//! Sort-by-expression engine and the sorting cycle decorator.

pub mod decorator;
pub mod expression;
pub mod order_spec;
pub mod sorter;
pub mod typed_key;

pub use decorator::{
    prepare_batch, CyclePhase, CycleReport, SortingCycle, SortingDecorator, SortingOptions,
    EVENTS_ORDER_KEY, INCLUDE_SORT_INFO_KEY, SORT_INFO_KEY,
};
pub use expression::{render_or_fallback, ExpressionRenderer, RenderError, TeraRenderer, INDEX_VAR};
pub use order_spec::{OrderKey, OrderSpec, OrderSpecError};
pub use sorter::{sort_tuples, SortTuple};
pub use typed_key::{parse_key, parse_time, try_parse_key, KeyParseError, TypedValue, ValueType};

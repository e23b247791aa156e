//! # seqflow
//!
//! Lazy, single-use sequence pipelines with sequential and parallel
//! evaluation.
//!
//! ## Building a pipeline
//!
//! 1. **Sources**: `from_collection`, `of` / `sequence!`, `empty`,
//!    `generate`, `iterate`, `iterate_while`
//! 2. **Stages** (lazy): `filter`, `map`, `flat_map`, `peek`, `distinct`,
//!    `limit`, `skip`, `take_while`, `drop_while`, `sorted`, `sorted_by`
//! 3. **Mode**: `parallel`, `sequential`
//! 4. **Terminals** (exactly one): `for_each`, `for_each_ordered`, `count`,
//!    `reduce`, `reduce_with`, `min`/`max`(`_by`), `find_first`, `find_any`,
//!    `any_match`/`all_match`/`none_match`, `collect`, `to_list`, `to_set`,
//!    `iter`
//!
//! ```
//! use seqflow::Sequence;
//!
//! let values = Sequence::iterate(1, |x| x + 1)
//!     .skip(5)?
//!     .limit(5)?
//!     .to_list()?;
//! assert_eq!(values, vec![6, 7, 8, 9, 10]);
//! # Ok::<(), seqflow::SequenceError>(())
//! ```
//!
//! Every operation takes the handle by `&mut self` and closes it. Touching a
//! handle again fails with [`SequenceError::ClosedSequence`]:
//!
//! ```
//! use seqflow::{Sequence, SequenceError};
//!
//! let mut twenty = Sequence::iterate(10, |x| x + 2).limit(20)?;
//! twenty.for_each(|x| println!("{x}"))?;
//! assert_eq!(twenty.count(), Err(SequenceError::ClosedSequence));
//! # Ok::<(), SequenceError>(())
//! ```
//!
//! Unbounded sequences (`generate`, `iterate`) must be bounded before a
//! materialising terminal such as `count` or `collect`; otherwise the call
//! never returns.

pub mod batch;
pub mod config;
pub mod error;
mod parallel;
pub mod pool;
mod sequence;
mod stage;
mod terminal;

pub use config::EngineConfig;
pub use error::{ConfigError, Result, SequenceError};
pub use sequence::{ExecutionMode, Sequence, SequenceState};
pub use terminal::SequenceIter;

//! Sampling consistency checks between a source cluster and its replica.
//!
//! A run picks a handful of documents from each source collection, looks
//! each one up by `_id` in the destination and compares the two encodings
//! byte for byte. The first mismatch, or the first missing document unless
//! misses are tolerated, stops the whole run.
//!
//! Three sampling strategies are available:
//!
//! - **Skip walk**: walks the collection in `_id` order with a fixed step
//!   from a random start offset. Works on any server version.
//! - **Random predicate**: lets the server pick documents with `$sample`,
//!   `$sampleRate` or `$rand`. Requires a recent enough server.
//! - **Full scan**: visits every document. Chosen whenever the sample rate is 1.
//!
//! ```ignore
//! let config = CheckConfig::new("shop");
//! let report = Verifier::new(&source, &destination, &config).run().await?;
//! println!("{}", report.summary());
//! ```

pub mod compare;
pub mod config;
pub mod deadline;
pub mod index;
pub mod sampler;
pub mod verifier;

pub use compare::{Comparator, Progress};
pub use config::{CheckConfig, DEFAULT_PREVIEW_LIMIT};
pub use deadline::bounded;
pub use index::{compare_indexes, diff_index_sets};
pub use sampler::{open_sampler, FullScan, RandomPredicate, SampleStream, SkipWalk};
pub use verifier::Verifier;

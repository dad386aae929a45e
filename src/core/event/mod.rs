// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod pattern_match;
pub mod stream_event;
pub mod value;

pub use pattern_match::{MatchedEvent, PartialMatch, PatternMatch, SharedPartialMatch};
pub use stream_event::{Event, SharedEvent};
pub use value::AttributeValue;

//! Spoken command capture: keyword compilation, field extraction and the
//! session controller that decides when a command is complete.

pub mod clock;
pub mod extractor;
pub mod keywords;
pub mod session;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use extractor::{FieldExtractor, FieldMap, FieldValue, LABEL_FIELD, TITLE_FIELD};
pub use keywords::{KeywordMatch, KeywordSpec};
pub use session::{CommandController, CommandOutcome, CommandSession, DEFAULT_QUIESCENCE};
pub use status::{LastCommand, SessionPhase, SessionStatus, SessionStatusHandle};

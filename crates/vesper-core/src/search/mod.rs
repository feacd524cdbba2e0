mod ranker;
mod session;

pub use ranker::{FuzzyRanker, Ranker, SubstringRanker};
pub use session::{AcceptOutcome, DebounceTicket, QueryPhase, SearchSession, SelectionPolicy};

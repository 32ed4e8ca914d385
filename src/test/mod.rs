pub mod chiptst;
pub mod comparator;
pub mod harness;
pub mod runner;

pub use chiptst::{ChipTest, Outcome};
pub use comparator::TestComparator;
pub use harness::TestHarness;
pub use runner::TestRunner;

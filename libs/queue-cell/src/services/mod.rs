pub mod capacity;
pub mod deadline;
pub mod policy;
pub mod reorder;
pub mod reservation;
pub mod schedule_time;
pub mod sweep;
pub mod worker;

pub use capacity::*;
pub use deadline::*;
pub use policy::*;
pub use reorder::*;
pub use reservation::*;
pub use schedule_time::*;
pub use sweep::*;
pub use worker::*;

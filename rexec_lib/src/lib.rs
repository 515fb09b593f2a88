//! In-process job control: start OS processes, capture their output and stop them.
//!
//! [`Hub`] is the registry, [`Job`] owns one process and its lifecycle,
//! [`OutputBuffer`] holds what a process wrote to one of its streams.

pub mod buffer;
pub mod error;
pub mod hub;
pub mod job;
mod process;

pub use buffer::OutputBuffer;
pub use error::{JobError, Result};
pub use hub::Hub;
pub use job::{Job, JobId, JobReport, JobStatus};

/// exit code recorded for a process that was ended by a signal
pub const KILLED_EXIT_CODE: i32 = -1;

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::Once;

    use lazy_static::lazy_static;
    use tokio::runtime::Runtime;

    lazy_static! {
        pub static ref RUNTIME: Runtime = Runtime::new().unwrap();
    }
    static INIT: Once = Once::new();

    pub fn setup() {
        INIT.call_once(|| {
            tracing_subscriber::fmt().with_test_writer().init();
        });
    }
}

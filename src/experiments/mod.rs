pub mod aggregate;
pub mod attribution;
pub mod assignment;
pub mod bayesian;
pub mod config;
pub mod cookie;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod sample_size;
pub mod stats;
pub mod tracking;

pub use assignment::select_variant;
pub use attribution::{Attribution, TouchHistory};
pub use config::{Experiment, ExperimentError, ExperimentStatus, Variant};
pub use cookie::{Assignments, CookieSettings, AB_COOKIE_NAME};
pub use registry::ExperimentRegistry;
pub use resolver::{AssignmentResolver, ExperimentContext, NewAssignment, Resolution};
pub use tracking::{QuizCta, ShareMethod, Tracker, TrackingEvent, TrackingSink};

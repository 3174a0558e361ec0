pub mod job_controller;
pub mod job_panel;

pub use job_controller::JobController;
pub use job_panel::{JobPanelState, PanelPhase};

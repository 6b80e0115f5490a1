mod probe_scheduler;

pub use probe_scheduler::ProbeScheduler;

//! 日程编排

pub mod builder;

pub use builder::{Agenda, AgendaBuilder, AgendaOptions, DaySummary, CANDIDATE_FACTOR};

#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod loader;
pub mod progress;
pub mod quiz;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use config::QuizConfig;
pub use error::{AppServicesError, ConfigError, LoadError, MachineError};
pub use loader::{DataLoader, FileFetcher, HttpFetcher, LoadedStage, PayloadFetcher, StaticFetcher};
pub use progress::ProgressStore;
pub use quiz::{ContinuePlan, QuizMachine, Stage, TimeoutAction};
